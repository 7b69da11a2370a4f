//! Signal payload validation.
//!
//! Fail-fast, in check order: schema (fields present, right types), range
//! (positive prices, risk bounds), directional consistency. Total and
//! side-effect free: never touches registry or ledger state.

use serde_json::Value;

use shared::{Direction, RelayError, Result, Signal, TradeMode};

pub struct SignalValidator;

impl SignalValidator {
    pub fn validate(raw: &Value) -> Result<Signal> {
        // Schema checks first: every field present and correctly typed.
        let symbol = require_str(raw, "symbol")?;
        if symbol.trim().is_empty() {
            return Err(RelayError::Schema("symbol must not be empty".to_string()));
        }
        let direction = match require_str(raw, "direction")? {
            "LONG" => Direction::Long,
            "SHORT" => Direction::Short,
            other => {
                return Err(RelayError::Schema(format!(
                    "direction must be LONG or SHORT, got {other:?}"
                )))
            }
        };
        let entry = require_number(raw, "entry")?;
        let take_profit = require_number(raw, "take_profit")?;
        let stop_loss = require_number(raw, "stop_loss")?;
        let risk_pct = require_number(raw, "risk_pct")?;
        let mode = match require_str(raw, "mode")? {
            "CONSERVATIVE" => TradeMode::Conservative,
            "AGGRESSIVE" => TradeMode::Aggressive,
            other => {
                return Err(RelayError::Schema(format!(
                    "mode must be CONSERVATIVE or AGGRESSIVE, got {other:?}"
                )))
            }
        };

        // Range checks.
        for (name, value) in [
            ("entry", entry),
            ("take_profit", take_profit),
            ("stop_loss", stop_loss),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RelayError::Range(format!(
                    "{name} must be a positive price, got {value}"
                )));
            }
        }
        if !risk_pct.is_finite() || risk_pct <= 0.0 || risk_pct > 100.0 {
            return Err(RelayError::Range(format!(
                "risk_pct must be in (0, 100], got {risk_pct}"
            )));
        }

        // Directional consistency. Violations are rejected, never corrected.
        let ordered = match direction {
            Direction::Long => take_profit > entry && entry > stop_loss,
            Direction::Short => take_profit < entry && entry < stop_loss,
        };
        if !ordered {
            let expected = match direction {
                Direction::Long => "take_profit > entry > stop_loss",
                Direction::Short => "take_profit < entry < stop_loss",
            };
            return Err(RelayError::DirectionInconsistent(format!(
                "{direction:?} requires {expected}, got take_profit={take_profit} entry={entry} stop_loss={stop_loss}"
            )));
        }

        Ok(Signal {
            symbol: symbol.to_string(),
            direction,
            entry,
            take_profit,
            stop_loss,
            risk_pct,
            mode,
        })
    }
}

fn require_str<'a>(raw: &'a Value, field: &str) -> Result<&'a str> {
    raw.get(field)
        .ok_or_else(|| RelayError::Schema(format!("missing field: {field}")))?
        .as_str()
        .ok_or_else(|| RelayError::Schema(format!("{field} must be a string")))
}

fn require_number(raw: &Value, field: &str) -> Result<f64> {
    raw.get(field)
        .ok_or_else(|| RelayError::Schema(format!("missing field: {field}")))?
        .as_f64()
        .ok_or_else(|| RelayError::Schema(format!("{field} must be a number")))
}
