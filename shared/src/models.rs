use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment/trial standing of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    FreeTrial,
    Paid,
    Expired,
    Suspended,
}

/// How the dispatcher reaches a subscriber's agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliverySink {
    /// Push: the relay POSTs each signal to this URL.
    Webhook { url: String },
    /// Pull: the agent polls the latest-signal endpoint.
    Poll,
}

/// Follower account. Accounts are never physically deleted; suspension is a
/// status transition so ledger history stays traceable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub identity: String,
    pub access_token: String,
    pub status: EntitlementStatus,
    pub entitlement_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sink: DeliverySink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    Conservative,
    Aggressive,
}

/// A validated trading signal. Ephemeral: lives in the signal log and in
/// webhook payloads, never in durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub risk_pct: f64,
    pub mode: TradeMode,
}

/// Broadcast-time wrapper carrying the correlation id followers echo back
/// in their P&L reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub signal_id: Uuid,
    pub broadcast_at: DateTime<Utc>,
    pub signal: Signal,
}

impl SignalEnvelope {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal_id: Uuid::new_v4(),
            broadcast_at: Utc::now(),
            signal,
        }
    }
}

/// Why the entitlement gate denied delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Suspended,
    Expired,
    TrialExpired,
    UnrecognizedState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    TimedOut,
}

/// Aggregate result of one broadcast call.
///
/// `recipients_allowed` is fixed at gate-evaluation time: "allowed" means
/// entitled, not received. Delivery failures show up in `delivery_outcomes`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub signal_id: Uuid,
    pub recipients_allowed: usize,
    pub recipients_blocked: usize,
    pub blocked: HashMap<String, DenyReason>,
    pub delivery_outcomes: HashMap<String, DeliveryOutcome>,
}

/// One reported trade outcome. Append-only; corrections are new offsetting
/// entries, never edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_identity: String,
    pub signal_reference: String,
    pub realized_pnl: Decimal,
    pub reported_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub out_of_order: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlSummary {
    pub total_pnl: Decimal,
    pub entry_count: usize,
    pub profit_share_due: Decimal,
}

/// Per-status subscriber counts for the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub free_trial: usize,
    pub paid: usize,
    pub expired: usize,
    pub suspended: usize,
}
