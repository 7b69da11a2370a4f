//! Recent-signal log for pull-based agents.
//!
//! Keeps a bounded window of broadcast envelopes plus a per-subscriber
//! acknowledgement cursor, so each poll hands out a given envelope at most
//! once per subscriber. Signals are ephemeral; nothing here is durable.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use shared::SignalEnvelope;

const MAX_RETAINED: usize = 256;

#[derive(Default)]
struct LogState {
    next_seq: u64,
    entries: VecDeque<(u64, SignalEnvelope)>,
    // Highest sequence each subscriber has acknowledged.
    cursors: HashMap<String, u64>,
}

#[derive(Default)]
pub struct SignalLog {
    state: RwLock<LogState>,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, envelope: SignalEnvelope) {
        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push_back((seq, envelope));
        if state.entries.len() > MAX_RETAINED {
            state.entries.pop_front();
        }
    }

    /// Newest envelope this subscriber has not yet seen, advancing the
    /// cursor. Intermediate envelopes the agent slept through are skipped;
    /// only the latest signal is actionable.
    pub async fn latest_for(&self, identity: &str) -> Option<SignalEnvelope> {
        let mut state = self.state.write().await;
        let acked = state.cursors.get(identity).copied();
        let (seq, envelope) = match state.entries.back() {
            Some((seq, envelope)) if acked.map_or(true, |a| *seq > a) => {
                (*seq, envelope.clone())
            }
            _ => return None,
        };
        state.cursors.insert(identity.to_string(), seq);
        Some(envelope)
    }

    /// Total envelopes ever recorded (not just the retained window).
    pub async fn total_recorded(&self) -> u64 {
        self.state.read().await.next_seq
    }
}
