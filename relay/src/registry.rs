//! Subscriber registry - sole owner of account state.
//!
//! All mutation goes through one async RwLock, so concurrent signups with the
//! same identity resolve deterministically: exactly one wins, the rest get
//! `DuplicateIdentity`.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::info;

use shared::{
    Account, DeliverySink, EntitlementStatus, JsonStore, RegistryStats, RelayError, Result,
};

const TOKEN_PREFIX: &str = "rk_";
// 24 bytes = 192 bits of OsRng entropy per token.
const TOKEN_BYTES: usize = 24;

#[derive(Default)]
struct RegistryState {
    // Insertion order is the listing order; indexes point into this vec.
    accounts: Vec<Account>,
    by_identity: HashMap<String, usize>,
    by_token: HashMap<String, usize>,
}

impl RegistryState {
    fn index(&mut self, idx: usize) {
        let account = &self.accounts[idx];
        self.by_identity.insert(account.identity.clone(), idx);
        self.by_token.insert(account.access_token.clone(), idx);
    }
}

pub struct SubscriberRegistry {
    state: RwLock<RegistryState>,
    store: Option<JsonStore<Vec<Account>>>,
    trial_days: i64,
}

impl SubscriberRegistry {
    /// In-memory registry, no persistence. Used by tests and embedders that
    /// bring their own durability.
    pub fn new(trial_days: i64) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            store: None,
            trial_days,
        }
    }

    /// Registry backed by a JSON snapshot file; loads existing accounts.
    pub fn with_store(store: JsonStore<Vec<Account>>, trial_days: i64) -> Result<Self> {
        let mut state = RegistryState {
            accounts: store.load()?.unwrap_or_default(),
            ..Default::default()
        };
        for idx in 0..state.accounts.len() {
            state.index(idx);
        }
        Ok(Self {
            state: RwLock::new(state),
            store: Some(store),
            trial_days,
        })
    }

    fn mint_access_token() -> String {
        let mut buf = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut buf);
        format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(buf))
    }

    /// Register a new subscriber. The only path that mints access tokens.
    pub async fn create(&self, identity: &str, sink: DeliverySink) -> Result<Account> {
        if identity.trim().is_empty() {
            return Err(RelayError::Schema("identity must not be empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state.by_identity.contains_key(identity) {
            return Err(RelayError::DuplicateIdentity(identity.to_string()));
        }

        let mut token = Self::mint_access_token();
        // A collision is astronomically unlikely; re-mint rather than reuse.
        while state.by_token.contains_key(&token) {
            token = Self::mint_access_token();
        }

        let now = Utc::now();
        let account = Account {
            identity: identity.to_string(),
            access_token: token,
            status: EntitlementStatus::FreeTrial,
            entitlement_expiry: Some(now + Duration::days(self.trial_days)),
            created_at: now,
            sink,
        };

        let idx = state.accounts.len();
        state.accounts.push(account.clone());
        state.index(idx);
        self.persist(&state)?;

        info!("✅ Registered subscriber {}", identity);
        Ok(account)
    }

    /// Look up by identity or by access token.
    pub async fn get(&self, handle: &str) -> Result<Account> {
        let state = self.state.read().await;
        let idx = state
            .by_identity
            .get(handle)
            .or_else(|| state.by_token.get(handle))
            .ok_or_else(|| RelayError::NotFound(handle.to_string()))?;
        Ok(state.accounts[*idx].clone())
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Account> {
        let state = self.state.read().await;
        let idx = state
            .by_token
            .get(token)
            .ok_or_else(|| RelayError::NotFound("access token".to_string()))?;
        Ok(state.accounts[*idx].clone())
    }

    /// Entitlement state is only ever mutated here, driven by payment events
    /// or the dispatcher's lazy expiry transition.
    pub async fn update_status(
        &self,
        identity: &str,
        status: EntitlementStatus,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Account> {
        // A trial without an expiry would be unrecognizable at the gate.
        if status == EntitlementStatus::FreeTrial && expiry.is_none() {
            return Err(RelayError::Schema(
                "free_trial status requires an expiry".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let idx = *state
            .by_identity
            .get(identity)
            .ok_or_else(|| RelayError::NotFound(identity.to_string()))?;

        let account = &mut state.accounts[idx];
        account.status = status;
        account.entitlement_expiry = expiry;
        let updated = account.clone();
        self.persist(&state)?;

        info!("Subscriber {} moved to {:?}", identity, status);
        Ok(updated)
    }

    /// Consistent snapshot of every account on the books, in insertion order.
    /// Accounts are never physically deleted, so "active" means "registered";
    /// entitlement is the gate's concern, and the gate needs to see suspended
    /// and expired accounts to report deny reasons.
    pub async fn list_active(&self) -> Vec<Account> {
        self.state.read().await.accounts.clone()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        let mut stats = RegistryStats {
            total: state.accounts.len(),
            ..Default::default()
        };
        for account in &state.accounts {
            match account.status {
                EntitlementStatus::FreeTrial => stats.free_trial += 1,
                EntitlementStatus::Paid => stats.paid += 1,
                EntitlementStatus::Expired => stats.expired += 1,
                EntitlementStatus::Suspended => stats.suspended += 1,
            }
        }
        stats
    }

    fn persist(&self, state: &RegistryState) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&state.accounts)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_carry_prefix_and_length() {
        let token = SubscriberRegistry::mint_access_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        // 24 bytes -> 32 base64 chars, no padding.
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 32);
    }
}
