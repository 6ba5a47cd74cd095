//! Configuration Management Module
//!
//! This module holds the validated, immutable description of every
//! destination chain the relay can redeem on, plus the supported token list.
//! Configuration is constructed once at process start, validated, and shared
//! read-only across all relay attempts.

use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use std::str::FromStr;

use crate::chains::{ChainFamily, CHAIN_ID_SOLANA};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Top-level relayer configuration.
///
/// This structure holds:
/// - One entry per supported destination chain
/// - The token list used by callers to decide which transfers to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Supported destination chains (use [[chain]] in TOML for multiple)
    #[serde(rename = "chain", default)]
    pub chains: Vec<ChainConfig>,
    /// Supported tokens (use [[token]] in TOML for multiple)
    #[serde(rename = "token", default)]
    pub supported_tokens: Vec<SupportedToken>,
}

/// Configuration for one destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain identifier in the cross-chain numbering scheme
    pub chain_id: u16,
    /// Human-readable name for the chain
    pub chain_name: String,
    /// Symbol of the chain's native currency (e.g. "AVAX", "SOL")
    pub native_currency_symbol: String,
    /// RPC endpoint URL for chain communication
    pub node_url: String,
    /// Address of the token bridge used for completion checks
    pub token_bridge_address: String,
    /// Core bridge address (required on the ledger chain)
    #[serde(default)]
    pub bridge_address: Option<String>,
    /// Wrapped native asset identifier
    #[serde(default)]
    pub wrapped_asset: Option<String>,
    /// Address of the settlement program/contract redeemed against
    pub settlement_program_address: String,
    /// Signing key material, shaped per chain family
    pub key_material: KeyMaterial,
}

/// Signing key material for one chain.
///
/// Exactly one shape applies to a given chain: hex-encoded private keys for
/// EVM-family chains, raw key bytes for the ledger chain. Use the `type`
/// field to specify which shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KeyMaterial {
    /// Ordered list of hex private keys for an EVM-family chain
    #[serde(rename = "evm")]
    Evm { private_keys: Vec<String> },
    /// Ordered list of raw key bytes for the ledger chain
    #[serde(rename = "ledger")]
    Ledger { private_keys: Vec<Vec<u8>> },
}

impl KeyMaterial {
    /// Chain family this key material is shaped for
    pub fn family(&self) -> ChainFamily {
        match self {
            KeyMaterial::Evm { .. } => ChainFamily::Evm,
            KeyMaterial::Ledger { .. } => ChainFamily::Ledger,
        }
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        match self {
            KeyMaterial::Evm { private_keys } => private_keys.len(),
            KeyMaterial::Ledger { private_keys } => private_keys.len(),
        }
    }

    /// True when no keys are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single-attempt signing key override, shaped like one [`KeyMaterial`]
/// entry. Callers that manage their own key rotation pass this instead of
/// relying on the chain's configured keys.
#[derive(Debug, Clone)]
pub enum SigningKey {
    /// Hex private key for an EVM-family chain
    Evm(String),
    /// Raw key bytes for the ledger chain
    Ledger(Vec<u8>),
}

/// One supported token entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportedToken {
    /// Chain the token is native to
    pub chain_id: u16,
    /// Token address or mint, in the chain's native format
    pub address: String,
}

impl ChainConfig {
    /// Chain family this configuration describes, derived from the chain id.
    pub fn family(&self) -> ChainFamily {
        if self.chain_id == CHAIN_ID_SOLANA {
            ChainFamily::Ledger
        } else {
            ChainFamily::Evm
        }
    }
}

impl RelayerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Resolves the config path (argument, RELAYER_CONFIG_PATH env var, or default)
    /// 2. Loads and parses the configuration
    /// 3. Validates the configuration
    ///
    /// The token list is plain structured data; entries that do not parse
    /// against the schema are a hard error, never interpreted.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file. If None, uses RELAYER_CONFIG_PATH env var or default.
    ///
    /// # Returns
    ///
    /// * `Ok(RelayerConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, parse failure, or validation failure
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("RELAYER_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/relayer.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: RelayerConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/relayer.template.toml config/relayer.toml\n\
                Then edit config/relayer.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default path.
    ///
    /// This is equivalent to calling `load_from_path(None)`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Looks up a chain configuration by chain id.
    pub fn get_chain_by_id(&self, chain_id: u16) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one chain is configured
    /// - Chain ids are unique
    /// - Every chain passes its per-family field checks
    /// - Token entries reference configured chains and have a valid format
    ///   for that chain's family
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: At least one [[chain]] must be configured"
            ));
        }

        for i in 0..self.chains.len() {
            for j in (i + 1)..self.chains.len() {
                if self.chains[i].chain_id == self.chains[j].chain_id {
                    return Err(anyhow::anyhow!(
                        "Configuration error: Chains {} and {} have the same chain id {}",
                        self.chains[i].chain_name,
                        self.chains[j].chain_name,
                        self.chains[i].chain_id
                    ));
                }
            }
        }

        for chain in &self.chains {
            chain.validate()?;
        }

        for token in &self.supported_tokens {
            let chain = self.get_chain_by_id(token.chain_id).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown chain_id {} in supported token entry",
                    token.chain_id
                )
            })?;
            validate_token_format(&token.address, chain.family()).map_err(|e| {
                anyhow::anyhow!(
                    "Invalid token address for chain {}: {}",
                    chain.chain_name,
                    e
                )
            })?;
        }

        Ok(())
    }
}

impl ChainConfig {
    /// Validates a single chain entry.
    ///
    /// All chains need the shared fields populated and at least one signing
    /// key whose shape matches the chain family. The ledger chain
    /// additionally requires the core bridge address and the wrapped native
    /// asset identifier.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Chain entry is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chain_id == 0 {
            anyhow::bail!("Missing required field in chain config: chain_id");
        }
        if self.chain_name.is_empty() {
            anyhow::bail!("Missing required field in chain config: chain_name");
        }
        if self.native_currency_symbol.is_empty() {
            anyhow::bail!("Missing required field in chain config: native_currency_symbol");
        }
        if self.node_url.is_empty() {
            anyhow::bail!("Missing required field in chain config: node_url");
        }
        if self.token_bridge_address.is_empty() {
            anyhow::bail!("Missing required field in chain config: token_bridge_address");
        }
        if self.settlement_program_address.is_empty() {
            anyhow::bail!("Missing required field in chain config: settlement_program_address");
        }
        if self.key_material.is_empty() {
            anyhow::bail!(
                "Chain {} has no signing keys configured",
                self.chain_name
            );
        }
        if self.key_material.family() != self.family() {
            anyhow::bail!(
                "Chain {} has {} key material but is a {} chain",
                self.chain_name,
                self.key_material.family(),
                self.family()
            );
        }

        if self.family() == ChainFamily::Ledger {
            if self.bridge_address.as_deref().unwrap_or("").is_empty() {
                anyhow::bail!("Missing required field in chain config: bridge_address");
            }
            if self.wrapped_asset.as_deref().unwrap_or("").is_empty() {
                anyhow::bail!("Missing required field in chain config: wrapped_asset");
            }
            // Raw ledger keys are 64 bytes (seed + public key)
            if let KeyMaterial::Ledger { private_keys } = &self.key_material {
                for key in private_keys {
                    if key.len() != 64 {
                        anyhow::bail!(
                            "Invalid ledger key length for chain {}: expected 64 bytes, got {}",
                            self.chain_name,
                            key.len()
                        );
                    }
                }
            }
        } else if self.wrapped_asset.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("Missing required field in chain config: wrapped_asset");
        }

        Ok(())
    }
}

/// Validates a token address format for a chain family.
///
/// - EVM: `0x`-prefixed hex, 20 or 32 bytes (32 when carried in the
///   chain-agnostic address format).
/// - Ledger: base58-encoded mint (no `0x` prefix).
///
/// # Arguments
///
/// * `token` - Token address or mint string
/// * `family` - Chain family the token belongs to
///
/// # Returns
///
/// - `Ok(())` - Token format is valid for the chain family
/// - `Err(anyhow::Error)` - Token format is invalid
fn validate_token_format(token: &str, family: ChainFamily) -> anyhow::Result<()> {
    match family {
        ChainFamily::Ledger => {
            if token.starts_with("0x") {
                // Hex form - must be the 32-byte chain-agnostic format
                let bytes = hex::decode(token.trim_start_matches("0x"))
                    .map_err(|_| anyhow::anyhow!("Invalid hex ledger mint"))?;
                if bytes.len() != 32 {
                    anyhow::bail!(
                        "Invalid ledger mint length: expected 32 bytes, got {}",
                        bytes.len()
                    );
                }
            } else {
                Pubkey::from_str(token)
                    .map_err(|_| anyhow::anyhow!("Invalid base58 ledger mint"))?;
            }
        }
        ChainFamily::Evm => {
            let stripped = token
                .strip_prefix("0x")
                .ok_or_else(|| anyhow::anyhow!("EVM token must be 0x-prefixed hex string"))?;
            let bytes =
                hex::decode(stripped).map_err(|_| anyhow::anyhow!("Invalid hex EVM token"))?;
            if bytes.len() != 20 && bytes.len() != 32 {
                anyhow::bail!(
                    "Invalid EVM token length: expected 20 or 32 bytes, got {}",
                    bytes.len()
                );
            }
        }
    }
    Ok(())
}
