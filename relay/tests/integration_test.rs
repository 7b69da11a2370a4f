//! End-to-end broadcast flows with scripted delivery transports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use relay::{
    BroadcastDispatcher, DeliveryTransport, PnlLedger, SignalLog, SignalValidator,
    SubscriberRegistry,
};
use shared::{
    Account, DeliveryOutcome, DeliverySink, DenyReason, EntitlementStatus, RelayError,
    SignalEnvelope,
};

const ADMIN_SECRET: &str = "test-admin-secret";

/// Records every attempted URL; URLs containing "fail" error out and URLs
/// containing "slow" hang past any reasonable delivery timeout.
#[derive(Default)]
struct ScriptedTransport {
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedTransport {
    async fn deliver(&self, url: &str, _envelope: &SignalEnvelope) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.contains("fail") {
            anyhow::bail!("connection refused");
        }
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }
}

struct Harness {
    registry: Arc<SubscriberRegistry>,
    signal_log: Arc<SignalLog>,
    transport: Arc<ScriptedTransport>,
    dispatcher: BroadcastDispatcher,
}

fn harness() -> Harness {
    let registry = Arc::new(SubscriberRegistry::new(14));
    let signal_log = Arc::new(SignalLog::new());
    let transport = Arc::new(ScriptedTransport::default());
    let dispatcher = BroadcastDispatcher::new(
        registry.clone(),
        signal_log.clone(),
        transport.clone(),
        ADMIN_SECRET,
        Duration::from_millis(250),
        8,
    );
    Harness {
        registry,
        signal_log,
        transport,
        dispatcher,
    }
}

async fn add_subscriber(
    registry: &SubscriberRegistry,
    identity: &str,
    status: EntitlementStatus,
    expiry: Option<DateTime<Utc>>,
    sink: DeliverySink,
) -> Account {
    registry.create(identity, sink).await.unwrap();
    registry.update_status(identity, status, expiry).await.unwrap()
}

fn ada_short_signal() -> shared::Signal {
    SignalValidator::validate(&json!({
        "symbol": "ADA/USDT",
        "direction": "SHORT",
        "entry": 0.53517,
        "take_profit": 0.50460,
        "stop_loss": 0.55370,
        "risk_pct": 2.0,
        "mode": "AGGRESSIVE",
    }))
    .unwrap()
}

#[tokio::test]
async fn wrong_admin_credential_short_circuits() {
    let h = harness();
    add_subscriber(
        &h.registry,
        "a@x.com",
        EntitlementStatus::Paid,
        None,
        DeliverySink::Webhook {
            url: "https://agent-a.example/hook".to_string(),
        },
    )
    .await;

    let result = h.dispatcher.broadcast(ada_short_signal(), "wrong").await;
    assert!(matches!(result, Err(RelayError::Unauthorized)));

    // Nothing downstream happened: no delivery attempts, no logged signal.
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.signal_log.total_recorded().await, 0);
}

#[tokio::test]
async fn counts_follow_the_gate() {
    let h = harness();
    let now = Utc::now();

    // N = 5 subscribers, K = 3 pass the gate.
    add_subscriber(&h.registry, "paid@x.com", EntitlementStatus::Paid, None, DeliverySink::Poll)
        .await;
    add_subscriber(
        &h.registry,
        "termed@x.com",
        EntitlementStatus::Paid,
        Some(now + chrono::Duration::days(30)),
        DeliverySink::Poll,
    )
    .await;
    add_subscriber(
        &h.registry,
        "trial@x.com",
        EntitlementStatus::FreeTrial,
        Some(now + chrono::Duration::days(7)),
        DeliverySink::Poll,
    )
    .await;
    add_subscriber(
        &h.registry,
        "lapsed-trial@x.com",
        EntitlementStatus::FreeTrial,
        Some(now - chrono::Duration::days(1)),
        DeliverySink::Poll,
    )
    .await;
    add_subscriber(
        &h.registry,
        "suspended@x.com",
        EntitlementStatus::Suspended,
        None,
        DeliverySink::Poll,
    )
    .await;

    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();

    assert_eq!(result.recipients_allowed, 3);
    assert_eq!(result.recipients_blocked, 2);
    assert_eq!(
        result.blocked.get("lapsed-trial@x.com"),
        Some(&DenyReason::TrialExpired)
    );
    assert_eq!(
        result.blocked.get("suspended@x.com"),
        Some(&DenyReason::Suspended)
    );
    assert_eq!(result.delivery_outcomes.len(), 3);
}

#[tokio::test]
async fn one_unreachable_sink_does_not_block_the_rest() {
    let h = harness();
    for (identity, url) in [
        ("a@x.com", "https://agent-a.example/hook"),
        ("b@x.com", "https://fail.example/hook"),
        ("c@x.com", "https://agent-c.example/hook"),
    ] {
        add_subscriber(
            &h.registry,
            identity,
            EntitlementStatus::Paid,
            None,
            DeliverySink::Webhook {
                url: url.to_string(),
            },
        )
        .await;
    }

    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();

    // "Allowed" is fixed at gate time regardless of delivery success.
    assert_eq!(result.recipients_allowed, 3);
    assert_eq!(result.recipients_blocked, 0);
    assert_eq!(
        result.delivery_outcomes.get("a@x.com"),
        Some(&DeliveryOutcome::Delivered)
    );
    assert!(matches!(
        result.delivery_outcomes.get("b@x.com"),
        Some(DeliveryOutcome::Failed(_))
    ));
    assert_eq!(
        result.delivery_outcomes.get("c@x.com"),
        Some(&DeliveryOutcome::Delivered)
    );
}

#[tokio::test]
async fn each_account_gets_exactly_one_attempt() {
    let h = harness();
    for identity in ["a@x.com", "b@x.com"] {
        add_subscriber(
            &h.registry,
            identity,
            EntitlementStatus::Paid,
            None,
            DeliverySink::Webhook {
                url: format!("https://{identity}.example/hook"),
            },
        )
        .await;
    }

    h.dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();

    let mut calls = h.transport.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "https://a@x.com.example/hook".to_string(),
            "https://b@x.com.example/hook".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_sink_times_out_without_cancelling_siblings() {
    let h = harness();
    add_subscriber(
        &h.registry,
        "slow@x.com",
        EntitlementStatus::Paid,
        None,
        DeliverySink::Webhook {
            url: "https://slow.example/hook".to_string(),
        },
    )
    .await;
    add_subscriber(
        &h.registry,
        "fast@x.com",
        EntitlementStatus::Paid,
        None,
        DeliverySink::Webhook {
            url: "https://fast.example/hook".to_string(),
        },
    )
    .await;

    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();

    assert_eq!(
        result.delivery_outcomes.get("slow@x.com"),
        Some(&DeliveryOutcome::TimedOut)
    );
    assert_eq!(
        result.delivery_outcomes.get("fast@x.com"),
        Some(&DeliveryOutcome::Delivered)
    );
}

#[tokio::test]
async fn lapsed_paid_account_transitions_to_expired() {
    let h = harness();
    add_subscriber(
        &h.registry,
        "lapsed@x.com",
        EntitlementStatus::Paid,
        Some(Utc::now() - chrono::Duration::days(1)),
        DeliverySink::Poll,
    )
    .await;

    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();
    assert_eq!(
        result.blocked.get("lapsed@x.com"),
        Some(&DenyReason::Expired)
    );

    // The transition runs off the broadcast path; give it a moment.
    let mut status = EntitlementStatus::Paid;
    for _ in 0..100 {
        status = h.registry.get("lapsed@x.com").await.unwrap().status;
        if status == EntitlementStatus::Expired {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, EntitlementStatus::Expired);
}

#[tokio::test]
async fn broadcast_with_no_subscribers_still_reports() {
    let h = harness();
    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();
    assert_eq!(result.recipients_allowed, 0);
    assert_eq!(result.recipients_blocked, 0);
    assert!(result.delivery_outcomes.is_empty());
}

#[tokio::test]
async fn end_to_end_signal_and_pnl_flow() {
    let h = harness();
    let ledger = PnlLedger::new(h.registry.clone(), Decimal::new(10, 2));

    // Signup issues a token and a trial; the trial account is entitled.
    let account = h
        .registry
        .create("a@x.com", DeliverySink::Poll)
        .await
        .unwrap();
    assert!(account.access_token.starts_with("rk_"));

    let result = h
        .dispatcher
        .broadcast(ada_short_signal(), ADMIN_SECRET)
        .await
        .unwrap();
    assert_eq!(result.recipients_allowed, 1);
    assert_eq!(result.recipients_blocked, 0);

    // The agent polls, acts, and reports the outcome against the signal id.
    let envelope = h.signal_log.latest_for("a@x.com").await.unwrap();
    assert_eq!(envelope.signal.symbol, "ADA/USDT");
    assert_eq!(envelope.signal_id, result.signal_id);

    let entry = ledger
        .record(
            "a@x.com",
            &envelope.signal_id.to_string(),
            Decimal::new(4230, 2),
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!entry.out_of_order);

    let summary = ledger
        .summarize(
            "a@x.com",
            DateTime::<Utc>::MIN_UTC,
            Utc::now() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.total_pnl, Decimal::new(4230, 2));
    // 10% of 42.30.
    assert_eq!(summary.profit_share_due, Decimal::new(423, 2));
}

#[tokio::test]
async fn inconsistent_short_signal_is_rejected_before_dispatch() {
    // Same signal as the happy path but entry below take_profit.
    let err = SignalValidator::validate(&json!({
        "symbol": "ADA/USDT",
        "direction": "SHORT",
        "entry": 0.50,
        "take_profit": 0.50460,
        "stop_loss": 0.55370,
        "risk_pct": 2.0,
        "mode": "AGGRESSIVE",
    }))
    .unwrap_err();
    assert!(matches!(err, RelayError::DirectionInconsistent(_)));
}
