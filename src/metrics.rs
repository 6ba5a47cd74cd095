//! Relay metrics sink
//!
//! The relay reports successes to an injected sink; the embedding process
//! decides how counters are exported. The provided [`SuccessCounter`] keeps
//! per-chain totals readable in-process.

use std::collections::HashMap;
use std::sync::Mutex;

/// Sink for relay success counters. Implementations must tolerate
/// concurrent increments from parallel relay attempts.
pub trait RelayMetrics: Send + Sync {
    /// Records one successful redemption outcome for a destination chain.
    fn inc_successes(&self, chain_id: u16);
}

/// In-process success counter keyed by destination chain id.
#[derive(Debug, Default)]
pub struct SuccessCounter {
    counters: Mutex<HashMap<u16, u64>>,
}

impl SuccessCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total for one destination chain.
    pub fn successes(&self, chain_id: u16) -> u64 {
        self.counters
            .lock()
            .expect("metrics lock poisoned")
            .get(&chain_id)
            .copied()
            .unwrap_or(0)
    }
}

impl RelayMetrics for SuccessCounter {
    fn inc_successes(&self, chain_id: u16) {
        let mut counters = self.counters.lock().expect("metrics lock poisoned");
        *counters.entry(chain_id).or_insert(0) += 1;
    }
}
