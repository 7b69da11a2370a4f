//! Broadcast dispatcher: one signal in, entitlement-gated concurrent fan-out.
//!
//! One unreachable follower must never block delivery to the rest: every
//! delivery attempt runs under its own timeout and failures are recorded
//! per account, not raised. The broadcast settles only after every attempt
//! has finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use shared::{
    Account, DeliveryOutcome, DeliverySink, DispatchResult, EntitlementStatus, RelayError,
    Result, Signal, SignalEnvelope,
};

use crate::delivery::DeliveryTransport;
use crate::entitlement::{self, Decision};
use crate::registry::SubscriberRegistry;
use crate::signal_log::SignalLog;

/// Compare credentials by digest so timing does not depend on where the
/// strings first differ.
pub fn credentials_match(expected: &str, provided: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
}

pub struct BroadcastDispatcher {
    registry: Arc<SubscriberRegistry>,
    signal_log: Arc<SignalLog>,
    transport: Arc<dyn DeliveryTransport>,
    admin_secret: String,
    delivery_timeout: Duration,
    max_in_flight: usize,
}

impl BroadcastDispatcher {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        signal_log: Arc<SignalLog>,
        transport: Arc<dyn DeliveryTransport>,
        admin_secret: impl Into<String>,
        delivery_timeout: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            registry,
            signal_log,
            transport,
            admin_secret: admin_secret.into(),
            delivery_timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub async fn broadcast(
        &self,
        signal: Signal,
        admin_credential: &str,
    ) -> Result<DispatchResult> {
        // Credential check short-circuits before any registry read.
        if !credentials_match(&self.admin_secret, admin_credential) {
            warn!("Broadcast rejected: invalid admin credential");
            return Err(RelayError::Unauthorized);
        }

        let envelope = SignalEnvelope::new(signal);
        let now = Utc::now();
        // Consistent snapshot: accounts created or suspended from here on are
        // not part of this broadcast.
        let snapshot = self.registry.list_active().await;

        let mut allowed = Vec::new();
        let mut blocked = HashMap::new();
        for account in snapshot {
            let decision = entitlement::decide(&account, now);
            match decision {
                Decision::Allow => allowed.push(account),
                Decision::Deny(reason) => {
                    if entitlement::observed_paid_lapse(&account, decision) {
                        self.schedule_expiry_transition(&account);
                    }
                    blocked.insert(account.identity.clone(), reason);
                }
            }
        }

        self.signal_log.record(envelope.clone()).await;

        // Fixed at gate time: "allowed" means entitled, not received.
        let recipients_allowed = allowed.len();

        let delivery_outcomes: HashMap<String, DeliveryOutcome> = stream::iter(allowed)
            .map(|account| {
                let envelope = envelope.clone();
                async move {
                    let outcome = self.attempt_delivery(&account, &envelope).await;
                    (account.identity, outcome)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let delivered = delivery_outcomes
            .values()
            .filter(|o| matches!(o, DeliveryOutcome::Delivered))
            .count();
        info!(
            "📡 Broadcast {}: {} allowed ({} delivered), {} blocked",
            envelope.signal_id,
            recipients_allowed,
            delivered,
            blocked.len()
        );

        Ok(DispatchResult {
            signal_id: envelope.signal_id,
            recipients_allowed,
            recipients_blocked: blocked.len(),
            blocked,
            delivery_outcomes,
        })
    }

    /// Exactly one attempt per account per broadcast; retry policy belongs to
    /// the external transport, not here.
    async fn attempt_delivery(
        &self,
        account: &Account,
        envelope: &SignalEnvelope,
    ) -> DeliveryOutcome {
        match &account.sink {
            // Pull-based agents collect the envelope from the signal log.
            DeliverySink::Poll => DeliveryOutcome::Delivered,
            DeliverySink::Webhook { url } => {
                let attempt = self.transport.deliver(url, envelope);
                match tokio::time::timeout(self.delivery_timeout, attempt).await {
                    Ok(Ok(())) => DeliveryOutcome::Delivered,
                    Ok(Err(e)) => {
                        warn!("Delivery to {} failed: {}", account.identity, e);
                        DeliveryOutcome::Failed(e.to_string())
                    }
                    Err(_) => {
                        warn!("Delivery to {} timed out", account.identity);
                        DeliveryOutcome::TimedOut
                    }
                }
            }
        }
    }

    /// The gate stays pure; a lapsed Paid account observed during gating is
    /// moved to Expired off the broadcast path.
    fn schedule_expiry_transition(&self, account: &Account) {
        let registry = self.registry.clone();
        let identity = account.identity.clone();
        let expiry = account.entitlement_expiry;
        tokio::spawn(async move {
            if let Err(e) = registry
                .update_status(&identity, EntitlementStatus::Expired, expiry)
                .await
            {
                warn!("Failed to expire subscriber {}: {}", identity, e);
            }
        });
    }
}
