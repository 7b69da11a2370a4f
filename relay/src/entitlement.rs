//! Entitlement gate.
//!
//! Pure decision function: given an account record and the current time,
//! decide whether a signal may be delivered. Side effects (the lazy
//! transition of a lapsed Paid account to Expired) are the caller's job.

use chrono::{DateTime, Utc};
use tracing::error;

use shared::{Account, DenyReason, EntitlementStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Rules evaluated in order: suspension wins over everything, then payment
/// standing, then trial standing. A stored `Expired` status denies with the
/// same reason a freshly observed lapse does.
pub fn decide(account: &Account, now: DateTime<Utc>) -> Decision {
    match (account.status, account.entitlement_expiry) {
        (EntitlementStatus::Suspended, _) => Decision::Deny(DenyReason::Suspended),
        (EntitlementStatus::Paid, None) => Decision::Allow,
        (EntitlementStatus::Paid, Some(expiry)) if expiry > now => Decision::Allow,
        (EntitlementStatus::Paid, Some(_)) => Decision::Deny(DenyReason::Expired),
        (EntitlementStatus::FreeTrial, Some(expiry)) if expiry > now => Decision::Allow,
        (EntitlementStatus::FreeTrial, Some(_)) => Decision::Deny(DenyReason::TrialExpired),
        (EntitlementStatus::Expired, _) => Decision::Deny(DenyReason::Expired),
        (status, expiry) => {
            // FreeTrial without an expiry cannot be produced by the registry.
            error!(
                "Invariant violation: account {} in unrecognized state {:?}/{:?}",
                account.identity, status, expiry
            );
            Decision::Deny(DenyReason::UnrecognizedState)
        }
    }
}

/// True when the deny observation should trigger the async transition of a
/// lapsed Paid account to stored Expired.
pub fn observed_paid_lapse(account: &Account, decision: Decision) -> bool {
    account.status == EntitlementStatus::Paid
        && decision == Decision::Deny(DenyReason::Expired)
}
