//! Redemption dispatch core for cross-chain attestation relaying
//!
//! Given a signed transfer attestation and a destination chain, decides
//! whether redemption is still needed, selects the matching chain backend,
//! submits (or only probes) the redemption, and interprets chain-specific
//! completion state.

pub mod chains;
pub mod config;
pub mod dispatch;
pub mod guard;
pub mod metrics;
pub mod settlement;
pub mod vaa;

// Re-export public types for convenience
pub use chains::{BackendSelection, ChainFamily, EvmBackend, LedgerBackend};
pub use config::{ChainConfig, KeyMaterial, RelayerConfig, SigningKey, SupportedToken};
pub use dispatch::{RelayDispatcher, RelayOptions};
pub use guard::{GuardDecision, RelayOutcome, RelayStatus};
pub use metrics::{RelayMetrics, SuccessCounter};
pub use settlement::{
    EscrowFetchPolicy, SettlementHeader, SettlementMarker, SettlementState, TokenLeg,
};
pub use vaa::{ParsedVaa, TransferMessage};
