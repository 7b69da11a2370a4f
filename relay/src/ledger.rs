//! Append-only P&L ledger.
//!
//! Entries are never edited or deleted; corrections are new offsetting
//! entries. Followers report asynchronously and may lag, so out-of-order
//! reports are accepted and flagged, never rejected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use shared::{JsonStore, LedgerEntry, PnlSummary, RelayError, Result};

use crate::registry::SubscriberRegistry;

type Entries = HashMap<String, Vec<LedgerEntry>>;

pub struct PnlLedger {
    registry: Arc<SubscriberRegistry>,
    entries: RwLock<Entries>,
    store: Option<JsonStore<Entries>>,
    profit_share_rate: Decimal,
}

impl PnlLedger {
    pub fn new(registry: Arc<SubscriberRegistry>, profit_share_rate: Decimal) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
            store: None,
            profit_share_rate,
        }
    }

    pub fn with_store(
        registry: Arc<SubscriberRegistry>,
        store: JsonStore<Entries>,
        profit_share_rate: Decimal,
    ) -> Result<Self> {
        let entries = store.load()?.unwrap_or_default();
        Ok(Self {
            registry,
            entries: RwLock::new(entries),
            store: Some(store),
            profit_share_rate,
        })
    }

    /// Append one reported outcome. The account must exist; the ledger never
    /// silently drops a report.
    pub async fn record(
        &self,
        identity: &str,
        signal_reference: &str,
        realized_pnl: Decimal,
        reported_at: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        self.registry
            .get(identity)
            .await
            .map_err(|_| RelayError::UnknownAccount(identity.to_string()))?;

        let mut entries = self.entries.write().await;
        let per_account = entries.entry(identity.to_string()).or_default();
        let newest_seen = per_account.iter().map(|e| e.reported_at).max();
        let out_of_order = newest_seen.map_or(false, |newest| reported_at < newest);
        if out_of_order {
            warn!(
                "Out-of-order P&L report from {} (signal {})",
                identity, signal_reference
            );
        }

        let entry = LedgerEntry {
            account_identity: identity.to_string(),
            signal_reference: signal_reference.to_string(),
            realized_pnl,
            reported_at,
            recorded_at: Utc::now(),
            out_of_order,
        };
        per_account.push(entry.clone());
        if let Some(store) = &self.store {
            store.save(&entries)?;
        }

        info!("💰 Recorded P&L {} for {}", realized_pnl, identity);
        Ok(entry)
    }

    /// Fold over entries whose `reported_at` falls in `[from, to)`. Sum and
    /// count are commutative, so the result is independent of insertion
    /// order. Profit share is due only on a positive total.
    pub async fn summarize(
        &self,
        identity: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PnlSummary> {
        self.registry
            .get(identity)
            .await
            .map_err(|_| RelayError::UnknownAccount(identity.to_string()))?;

        let entries = self.entries.read().await;
        let mut total_pnl = Decimal::ZERO;
        let mut entry_count = 0;
        if let Some(per_account) = entries.get(identity) {
            for entry in per_account {
                if entry.reported_at >= from && entry.reported_at < to {
                    total_pnl += entry.realized_pnl;
                    entry_count += 1;
                }
            }
        }

        let profit_share_due = if total_pnl > Decimal::ZERO {
            (total_pnl * self.profit_share_rate).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(PnlSummary {
            total_pnl,
            entry_count,
            profit_share_due,
        })
    }

    /// Ledger-wide totals for the admin surface.
    pub async fn totals(&self) -> (usize, Decimal) {
        let entries = self.entries.read().await;
        let mut count = 0;
        let mut total = Decimal::ZERO;
        for per_account in entries.values() {
            count += per_account.len();
            for entry in per_account {
                total += entry.realized_pnl;
            }
        }
        (count, total)
    }
}
