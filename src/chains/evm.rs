//! EVM chain backend
//!
//! Owns a JSON-RPC provider and a signing wallet for one EVM-family chain
//! and implements the two core operations: the bridge completion check and
//! the redemption submission against the settlement contract.

use anyhow::{Context, Result};
use ethers::abi::Abi;
use ethers::contract::Contract;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U64};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::chains::abis::{SETTLEMENT_ABI, TOKEN_BRIDGE_ABI};
use crate::chains::{ChainFamily, CHAIN_ID_AVALANCHE, CHAIN_ID_CELO};
use crate::config::{ChainConfig, KeyMaterial, SigningKey};

/// Receipt polling interval for submitted transactions.
const RECEIPT_POLL_INTERVAL_MS: u64 = 500;

/// Fixed infrastructure used by the hard-wired mainnet construction path.
pub const MAINNET_NODE_URL: &str = "https://api.avax.network/ext/bc/C/rpc";
/// EVM network id of the hard-wired mainnet chain.
pub const MAINNET_NETWORK_ID: u64 = 43114;
/// Settlement contract of the hard-wired mainnet chain.
pub const MAINNET_SETTLEMENT_ADDRESS: &str = "0xd768ffbc3904f89f53af2a640e3b6c640d85d6b9";

type EvmClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Backend for one EVM-family destination chain.
pub struct EvmBackend {
    client: Arc<EvmClient>,
    node_url: String,
    token_bridge_address: Address,
    settlement_address: Address,
    chain_id: u16,
    /// Set on the chain variant whose client construction requires
    /// legacy-format transactions
    legacy_transactions: bool,
}

impl EvmBackend {
    /// Builds a backend from a destination chain's configuration.
    ///
    /// The chain id selects the client construction path: the one EVM
    /// variant that needs specialized provider/wallet wiring is detected
    /// here, before any other EVM logic runs. The wallet's network id is
    /// read from the node itself.
    ///
    /// # Arguments
    ///
    /// * `config` - Destination chain configuration (must be EVM-family)
    /// * `key_override` - Optional signing key replacing the configured keys
    ///
    /// # Returns
    ///
    /// * `Ok(EvmBackend)` - Connected backend
    /// * `Err(anyhow::Error)` - Config defect or provider construction failure
    pub async fn from_config(
        config: &ChainConfig,
        key_override: Option<&SigningKey>,
    ) -> Result<Self> {
        if config.family() != ChainFamily::Evm {
            anyhow::bail!(
                "Chain {} is not an EVM-family chain",
                config.chain_name
            );
        }

        let private_key = resolve_private_key(config, key_override)?;
        let wallet = parse_wallet(&private_key)?;
        let provider = new_provider(&config.node_url)?;

        // Wallet network id comes from the node so signatures match the
        // chain the provider actually talks to.
        let client = SignerMiddleware::new_with_provider_chain(provider, wallet)
            .await
            .context("Failed to read network id from node")?;

        Ok(Self {
            client: Arc::new(client),
            node_url: config.node_url.clone(),
            token_bridge_address: parse_address(&config.token_bridge_address)
                .context("Invalid token_bridge_address")?,
            settlement_address: parse_address(&config.settlement_program_address)
                .context("Invalid settlement_program_address")?,
            chain_id: config.chain_id,
            legacy_transactions: config.chain_id == CHAIN_ID_CELO,
        })
    }

    /// Builds the hard-wired mainnet backend.
    ///
    /// The chain id, network id, RPC endpoint, and settlement contract are
    /// fixed; only the signing key and the token bridge address come from
    /// the passed configuration. Callers choosing this path get a backend
    /// pointed at fixed infrastructure regardless of the config's node_url.
    ///
    /// # Arguments
    ///
    /// * `config` - Destination chain configuration (keys and token bridge)
    /// * `key_override` - Optional signing key replacing the configured keys
    pub fn mainnet(config: &ChainConfig, key_override: Option<&SigningKey>) -> Result<Self> {
        let private_key = resolve_private_key(config, key_override)?;
        let wallet = parse_wallet(&private_key)?.with_chain_id(MAINNET_NETWORK_ID);
        let provider = new_provider(MAINNET_NODE_URL)?;
        let client = SignerMiddleware::new(provider, wallet);

        Ok(Self {
            client: Arc::new(client),
            node_url: MAINNET_NODE_URL.to_string(),
            token_bridge_address: parse_address(&config.token_bridge_address)
                .context("Invalid token_bridge_address")?,
            settlement_address: parse_address(MAINNET_SETTLEMENT_ADDRESS)
                .context("Invalid mainnet settlement address")?,
            chain_id: CHAIN_ID_AVALANCHE,
            legacy_transactions: false,
        })
    }

    /// Asks the token bridge whether this transfer was already redeemed.
    ///
    /// # Arguments
    ///
    /// * `double_digest` - Double Keccak digest of the attestation body
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Completion flag from the bridge
    /// * `Err(anyhow::Error)` - RPC failure
    pub async fn is_redeemed(&self, double_digest: [u8; 32]) -> Result<bool> {
        let abi: Abi =
            serde_json::from_str(TOKEN_BRIDGE_ABI).context("Failed to parse bridge ABI")?;
        let bridge = Contract::new(self.token_bridge_address, abi, self.client.clone());

        let completed: bool = bridge
            .method("isTransferCompleted", H256::from(double_digest))
            .context("Failed to build isTransferCompleted call")?
            .call()
            .await
            .context("isTransferCompleted call failed")?;

        debug!(
            chain_id = self.chain_id,
            completed, "Queried bridge completion flag"
        );
        Ok(completed)
    }

    /// Submits the redemption against the settlement contract.
    ///
    /// Selects the plain redemption path or the unwrap-native path based on
    /// the caller's flag, waits for the receipt, and fails on revert.
    ///
    /// # Arguments
    ///
    /// * `raw_vaa` - Raw signed attestation bytes
    /// * `unwrap_native` - Redeem to the native asset instead of the wrapped one
    ///
    /// # Returns
    ///
    /// * `Ok(TransactionReceipt)` - Mined redemption transaction
    /// * `Err(anyhow::Error)` - Submission failure or chain-level rejection
    pub async fn submit_redemption(
        &self,
        raw_vaa: &[u8],
        unwrap_native: bool,
    ) -> Result<TransactionReceipt> {
        let abi: Abi =
            serde_json::from_str(SETTLEMENT_ABI).context("Failed to parse settlement ABI")?;
        let settlement = Contract::new(self.settlement_address, abi, self.client.clone());

        let method = if unwrap_native {
            "redeemTransferNative"
        } else {
            "redeemTransfer"
        };
        info!(
            chain_id = self.chain_id,
            method,
            signer = %self.client.address(),
            "Submitting redemption"
        );

        let call = settlement
            .method::<_, ()>(method, Bytes::from(raw_vaa.to_vec()))
            .context("Failed to build redemption call")?;
        let call = if self.legacy_transactions {
            call.legacy()
        } else {
            call
        };

        let pending = call
            .send()
            .await
            .context("Failed to send redemption transaction")?;
        let receipt = pending
            .await
            .context("Failed to confirm redemption transaction")?
            .ok_or_else(|| anyhow::anyhow!("Redemption transaction dropped from the mempool"))?;

        if receipt.status == Some(U64::zero()) {
            anyhow::bail!(
                "Redemption transaction reverted: {:?}",
                receipt.transaction_hash
            );
        }

        Ok(receipt)
    }

    /// Destination chain id this backend redeems on.
    pub fn chain_id(&self) -> u16 {
        self.chain_id
    }

    /// RPC endpoint the backend talks to.
    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// Settlement contract the backend redeems against.
    pub fn settlement_address(&self) -> Address {
        self.settlement_address
    }

    /// True when this backend was built through the alternate
    /// client-construction path.
    pub fn uses_legacy_transactions(&self) -> bool {
        self.legacy_transactions
    }

    /// Address the backend signs with.
    pub fn signer_address(&self) -> Address {
        self.client.signer().address()
    }
}

/// Builds a JSON-RPC provider.
///
/// Only http(s) endpoints are supported; websocket transports are rejected
/// because their failure modes cannot be contained to the attempt.
fn new_provider(url: &str) -> Result<Provider<Http>> {
    if !url.starts_with("http") {
        anyhow::bail!("node_url does not start with http/https: {}", url);
    }
    let provider = Provider::<Http>::try_from(url)
        .context("Failed to create JSON-RPC provider")?
        .interval(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS));
    Ok(provider)
}

/// Picks the signing key for an attempt: the override when given, otherwise
/// the first configured key. The key shape must match the chain family.
fn resolve_private_key(
    config: &ChainConfig,
    key_override: Option<&SigningKey>,
) -> Result<String> {
    match key_override {
        Some(SigningKey::Evm(key)) => Ok(key.clone()),
        Some(SigningKey::Ledger(_)) => {
            anyhow::bail!("Ledger-shaped key override passed to an EVM backend")
        }
        None => match &config.key_material {
            KeyMaterial::Evm { private_keys } => private_keys
                .first()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Chain {} has no signing keys", config.chain_name)),
            KeyMaterial::Ledger { .. } => anyhow::bail!(
                "Chain {} carries ledger key material but is an EVM chain",
                config.chain_name
            ),
        },
    }
}

/// Decodes a hex private key into a wallet.
fn parse_wallet(private_key: &str) -> Result<LocalWallet> {
    let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = hex::decode(stripped).context("Invalid hex private key")?;
    LocalWallet::from_bytes(&bytes).context("Invalid private key bytes")
}

/// Parses a 0x-prefixed EVM address.
fn parse_address(value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|e| anyhow::anyhow!("Invalid EVM address {}: {}", value, e))
}
