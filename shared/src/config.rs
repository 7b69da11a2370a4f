use dotenv::dotenv;
use rust_decimal::Decimal;

pub struct Config {
    pub admin_secret: String,
    pub bind_addr: String,
    pub accounts_file: String,
    pub ledger_file: String,
    pub delivery_timeout_secs: u64,
    pub max_concurrent_deliveries: usize,
    pub trial_days: i64,
    pub profit_share_rate: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            admin_secret: std::env::var("ADMIN_SECRET")?,
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            accounts_file: std::env::var("ACCOUNTS_FILE")
                .unwrap_or_else(|_| "./relay_accounts.json".to_string()),
            ledger_file: std::env::var("LEDGER_FILE")
                .unwrap_or_else(|_| "./relay_ledger.json".to_string()),
            delivery_timeout_secs: std::env::var("DELIVERY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            max_concurrent_deliveries: std::env::var("MAX_CONCURRENT_DELIVERIES")
                .unwrap_or_else(|_| "32".to_string())
                .parse()
                .unwrap_or(32),
            trial_days: std::env::var("TRIAL_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()
                .unwrap_or(14),
            profit_share_rate: std::env::var("PROFIT_SHARE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| Decimal::new(10, 2)),
        })
    }
}
