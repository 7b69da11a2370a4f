//! Signal relay core: entitlement-gated broadcast of trading signals.
//!
//! One trusted source submits signals; the relay fans each signal out to every
//! entitled follower and books reported trade outcomes for revenue-share
//! accounting. Modules:
//!
//! - **registry**: durable subscriber accounts, sole owner of account state
//! - **entitlement**: pure allow/deny decision per subscriber
//! - **validator**: structural and semantic signal checks
//! - **dispatcher**: bounded-concurrency fan-out with partial-failure accounting
//! - **delivery**: transport seam for webhook sinks
//! - **signal_log**: recent signals for pull-based agents
//! - **ledger**: append-only P&L attribution

pub mod delivery;
pub mod dispatcher;
pub mod entitlement;
pub mod ledger;
pub mod registry;
pub mod signal_log;
pub mod validator;

pub use delivery::{DeliveryTransport, WebhookTransport};
pub use dispatcher::{credentials_match, BroadcastDispatcher};
pub use entitlement::{decide, Decision};
pub use ledger::PnlLedger;
pub use registry::SubscriberRegistry;
pub use signal_log::SignalLog;
pub use validator::SignalValidator;
