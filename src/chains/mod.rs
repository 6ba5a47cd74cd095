//! Chain Backends Module
//!
//! One backend per chain family: EVM-family chains redeem through a
//! settlement contract, the ledger chain through an escrow settlement
//! program. Family-specific quirks (the Celo client construction path, the
//! hard-wired mainnet wiring) live behind the backends, not at call sites.

pub mod abis;
pub mod evm;
pub mod ledger;

// Re-export for convenience
pub use evm::EvmBackend;
pub use ledger::LedgerBackend;

use std::fmt;

/// Chain id of the ledger chain in the cross-chain numbering scheme.
pub const CHAIN_ID_SOLANA: u16 = 1;

/// Chain id of the hard-wired mainnet EVM chain.
pub const CHAIN_ID_AVALANCHE: u16 = 6;

/// Chain id of the EVM variant needing the alternate client construction.
pub const CHAIN_ID_CELO: u16 = 14;

/// Chain family a destination belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    /// EVM-compatible chains
    Evm,
    /// The Solana-style ledger chain
    Ledger,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => f.write_str("evm"),
            ChainFamily::Ledger => f.write_str("ledger"),
        }
    }
}

/// Which EVM backend construction path a relay attempt uses.
///
/// `Mainnet` reproduces the legacy hard-wired wiring: a fixed chain id and
/// RPC endpoint regardless of the destination config's node_url. The caller
/// names the path explicitly; there is no process-wide flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Build the backend from the destination chain's configuration
    #[default]
    Configured,
    /// Build the backend against the fixed mainnet infrastructure
    Mainnet,
}
