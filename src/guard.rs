//! Redemption guard
//!
//! Pure decision logic shared by every chain backend: given the observed
//! completion state and the check-only flag, decide whether the attempt
//! short-circuits or proceeds to submission. Keeping this free of I/O makes
//! repeated relay calls for the same message safe once redemption has landed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome classification of one relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayStatus {
    /// Redemption was observed on-chain before this attempt
    #[serde(rename = "already redeemed")]
    AlreadyRedeemed,
    /// Redemption is still outstanding (check-only probes end here)
    #[serde(rename = "not redeemed")]
    NotRedeemed,
    /// This attempt submitted the redemption
    #[serde(rename = "redeemed")]
    Redeemed,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RelayStatus::AlreadyRedeemed => "already redeemed",
            RelayStatus::NotRedeemed => "not redeemed",
            RelayStatus::Redeemed => "redeemed",
        };
        f.write_str(text)
    }
}

/// Uniform result of one relay attempt, never partially populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOutcome {
    /// True when redemption is known to have landed on-chain
    pub redeemed: bool,
    /// Classification of how this attempt ended
    pub result: RelayStatus,
}

impl RelayOutcome {
    /// Outcome for a transfer that was already fully settled.
    pub fn already_redeemed() -> Self {
        Self {
            redeemed: true,
            result: RelayStatus::AlreadyRedeemed,
        }
    }

    /// Outcome for a probe that found redemption still outstanding.
    pub fn not_redeemed() -> Self {
        Self {
            redeemed: false,
            result: RelayStatus::NotRedeemed,
        }
    }

    /// Outcome for a freshly submitted redemption.
    pub fn redeemed() -> Self {
        Self {
            redeemed: true,
            result: RelayStatus::Redeemed,
        }
    }
}

/// What the guard decided about one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Return this outcome without touching chain state
    ShortCircuit(RelayOutcome),
    /// Proceed to submission; report [`RelayOutcome::redeemed`] on success
    Submit,
}

/// Applies the shared redemption decision rule.
///
/// # Arguments
///
/// * `already_redeemed` - Completion signal observed on the destination chain
/// * `check_only` - Probe mode: report state without mutating chain state
pub fn decide(already_redeemed: bool, check_only: bool) -> GuardDecision {
    if already_redeemed {
        GuardDecision::ShortCircuit(RelayOutcome::already_redeemed())
    } else if check_only {
        GuardDecision::ShortCircuit(RelayOutcome::not_redeemed())
    } else {
        GuardDecision::Submit
    }
}
