use std::sync::Arc;
use std::time::Duration;

use relay::{BroadcastDispatcher, PnlLedger, SignalLog, SubscriberRegistry, WebhookTransport};
use shared::{Config, JsonStore};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
    pub dispatcher: Arc<BroadcastDispatcher>,
    pub ledger: Arc<PnlLedger>,
    pub signal_log: Arc<SignalLog>,
    pub admin_secret: String,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let registry = Arc::new(SubscriberRegistry::with_store(
            JsonStore::new(&config.accounts_file),
            config.trial_days,
        )?);
        let signal_log = Arc::new(SignalLog::new());
        let transport = Arc::new(WebhookTransport::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            registry.clone(),
            signal_log.clone(),
            transport,
            config.admin_secret.clone(),
            Duration::from_secs(config.delivery_timeout_secs),
            config.max_concurrent_deliveries,
        ));
        let ledger = Arc::new(PnlLedger::with_store(
            registry.clone(),
            JsonStore::new(&config.ledger_file),
            config.profit_share_rate,
        )?);

        Ok(AppState {
            registry,
            dispatcher,
            ledger,
            signal_log,
            admin_secret: config.admin_secret.clone(),
        })
    }
}
