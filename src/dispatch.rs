//! Relay dispatch
//!
//! Single entry point per relay attempt: route the attested transfer to the
//! destination chain's backend, run the redemption guard, submit when still
//! needed, and return a uniform outcome. Attempts are independent; callers
//! may retry freely because the guard short-circuits once redemption has
//! landed on-chain.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::chains::{BackendSelection, EvmBackend, LedgerBackend, CHAIN_ID_SOLANA};
use crate::config::{ChainConfig, SigningKey};
use crate::guard::{decide, GuardDecision, RelayOutcome};
use crate::metrics::RelayMetrics;
use crate::settlement::{
    fetch_settlement_state, is_fully_settled, EscrowFetchPolicy, SettlementHeader,
};
use crate::vaa::{parse_transfer_payload, parse_vaa, TransferMessage};

/// Per-attempt relay options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayOptions {
    /// Redeem to the native asset instead of the wrapped one (EVM only)
    pub unwrap_native: bool,
    /// Probe redemption state without mutating chain state
    pub check_only: bool,
    /// EVM backend construction path
    pub backend: BackendSelection,
}

/// Routes relay attempts to chain backends and applies the redemption guard.
pub struct RelayDispatcher {
    metrics: Arc<dyn RelayMetrics>,
    escrow_fetch_policy: EscrowFetchPolicy,
}

impl RelayDispatcher {
    /// Creates a dispatcher reporting successes to the given sink.
    pub fn new(metrics: Arc<dyn RelayMetrics>) -> Self {
        Self {
            metrics,
            escrow_fetch_policy: EscrowFetchPolicy::default(),
        }
    }

    /// Overrides the escrow fetch retry policy (ledger chain only).
    pub fn with_escrow_fetch_policy(mut self, policy: EscrowFetchPolicy) -> Self {
        self.escrow_fetch_policy = policy;
        self
    }

    /// Relays one attested transfer to its destination chain.
    ///
    /// Selects the backend by the destination chain's family, runs the
    /// redemption guard, and submits when redemption is still outstanding.
    /// Safe to call repeatedly for the same message.
    ///
    /// # Arguments
    ///
    /// * `destination` - Destination chain configuration
    /// * `counterpart` - Configuration of the chain on the other side of the transfer
    /// * `signed_vaa_hex` - Hex-encoded signed attestation
    /// * `options` - Per-attempt options
    /// * `key_override` - Optional signing key replacing the configured keys
    ///
    /// # Returns
    ///
    /// * `Ok(RelayOutcome)` - Uniform outcome, never partially populated
    /// * `Err(anyhow::Error)` - Config defect, RPC failure, or chain-level rejection
    pub async fn relay(
        &self,
        destination: &ChainConfig,
        counterpart: &ChainConfig,
        signed_vaa_hex: &str,
        options: &RelayOptions,
        key_override: Option<&SigningKey>,
    ) -> Result<RelayOutcome> {
        let raw_vaa = decode_hex_vaa(signed_vaa_hex)?;

        if destination.chain_id == CHAIN_ID_SOLANA {
            self.relay_to_ledger(destination, counterpart, &raw_vaa, options, key_override)
                .await
        } else {
            self.relay_to_evm(destination, counterpart, &raw_vaa, options, key_override)
                .await
        }
    }

    /// Relays to an EVM-family destination.
    async fn relay_to_evm(
        &self,
        destination: &ChainConfig,
        counterpart: &ChainConfig,
        raw_vaa: &[u8],
        options: &RelayOptions,
        key_override: Option<&SigningKey>,
    ) -> Result<RelayOutcome> {
        let vaa = parse_vaa(raw_vaa)?;
        let backend = EvmBackend::from_config(destination, key_override).await?;

        debug!(
            chain = %destination.chain_name,
            sequence = vaa.sequence,
            "Checking whether the attestation has already been redeemed"
        );
        let already_redeemed = backend.is_redeemed(vaa.double_digest).await?;

        match decide(already_redeemed, options.check_only) {
            GuardDecision::ShortCircuit(outcome) => {
                return Ok(self.finish(destination.chain_id, outcome));
            }
            GuardDecision::Submit => {}
        }

        let transfer = parse_transfer_payload(&vaa.payload)?;
        verify_settlement_sender(&transfer, counterpart)?;
        if options.unwrap_native {
            info!(
                chain = %destination.chain_name,
                signer = %backend.signer_address(),
                "Will redeem and unwrap using configured signer"
            );
        } else {
            info!(
                chain = %destination.chain_name,
                signer = %backend.signer_address(),
                "Will redeem using configured signer"
            );
        }

        let submit_backend = match options.backend {
            BackendSelection::Configured => backend,
            BackendSelection::Mainnet => EvmBackend::mainnet(destination, key_override)?,
        };
        let receipt = submit_backend
            .submit_redemption(raw_vaa, options.unwrap_native)
            .await?;
        info!(
            chain = %destination.chain_name,
            tx = ?receipt.transaction_hash,
            "Redemption submitted"
        );

        Ok(self.finish(destination.chain_id, RelayOutcome::redeemed()))
    }

    /// Relays to the ledger destination.
    async fn relay_to_ledger(
        &self,
        destination: &ChainConfig,
        counterpart: &ChainConfig,
        raw_vaa: &[u8],
        options: &RelayOptions,
        key_override: Option<&SigningKey>,
    ) -> Result<RelayOutcome> {
        let vaa = parse_vaa(raw_vaa)?;
        if vaa.emitter_chain != counterpart.chain_id {
            anyhow::bail!(
                "Attestation emitted on chain {} but counterpart config describes chain {}",
                vaa.emitter_chain,
                counterpart.chain_id
            );
        }

        let transfer = parse_transfer_payload(&vaa.payload)?;
        if !transfer.has_extended_payload() {
            anyhow::bail!("Transfer carries no settlement payload");
        }
        let header = SettlementHeader::parse(&transfer.extended_payload)?;

        // Fails fast on configuration defects (missing core bridge address)
        let backend = LedgerBackend::from_config(destination, key_override)?;

        let bridge_completed = backend.is_redeemed(&vaa).await?;
        let settlement_state = fetch_settlement_state(
            backend.http(),
            backend.rpc_url(),
            backend.settlement_program(),
            &header,
            self.escrow_fetch_policy,
        )
        .await;

        // The bridge flag alone is not enough: downstream legs may still be
        // settling even though the inbound leg is recorded.
        let fully_settled = bridge_completed
            && settlement_state
                .as_ref()
                .map(is_fully_settled)
                .unwrap_or(false);
        debug!(
            sequence = vaa.sequence,
            bridge_completed,
            escrow_found = settlement_state.is_some(),
            fully_settled,
            "Ledger completion state"
        );

        match decide(fully_settled, options.check_only) {
            GuardDecision::ShortCircuit(outcome) => Ok(self.finish(destination.chain_id, outcome)),
            GuardDecision::Submit => {
                let signature = backend.submit_redemption(&vaa, &transfer, &header).await?;
                info!(signature = %signature, "Ledger redemption submitted");
                Ok(self.finish(destination.chain_id, RelayOutcome::redeemed()))
            }
        }
    }

    /// Records the outcome's metrics side effect and passes it through.
    ///
    /// Every outcome with `redeemed == true` counts as a success, whether it
    /// came from a fresh submission or the already-redeemed short-circuit.
    fn finish(&self, chain_id: u16, outcome: RelayOutcome) -> RelayOutcome {
        if outcome.redeemed {
            self.metrics.inc_successes(chain_id);
        }
        if outcome.result == crate::guard::RelayStatus::AlreadyRedeemed {
            info!(chain_id, "Attestation has already been redeemed");
        }
        outcome
    }
}

/// Decodes a hex-encoded signed attestation.
fn decode_hex_vaa(signed_vaa_hex: &str) -> Result<Vec<u8>> {
    let stripped = signed_vaa_hex
        .strip_prefix("0x")
        .unwrap_or(signed_vaa_hex);
    hex::decode(stripped).context("Invalid hex attestation")
}

/// For transfers carrying a settlement payload, checks the recorded sender
/// against the counterpart chain's settlement program.
fn verify_settlement_sender(
    transfer: &TransferMessage,
    counterpart: &ChainConfig,
) -> Result<()> {
    if !transfer.has_extended_payload() {
        return Ok(());
    }

    let expected = settlement_program_bytes(counterpart)?;
    if transfer.sender_address != expected {
        anyhow::bail!(
            "Settlement payload sender does not match counterpart settlement program {}",
            counterpart.settlement_program_address
        );
    }
    Ok(())
}

/// Settlement program address of a chain in the 32-byte wire format.
///
/// Short addresses are left zero padded to 32 bytes.
fn settlement_program_bytes(config: &ChainConfig) -> Result<[u8; 32]> {
    let addr = &config.settlement_program_address;
    let decoded = if let Some(stripped) = addr.strip_prefix("0x") {
        hex::decode(stripped).context("Invalid hex settlement program address")?
    } else {
        bs58::decode(addr)
            .into_vec()
            .context("Invalid base58 settlement program address")?
    };

    if decoded.len() > 32 {
        anyhow::bail!(
            "Settlement program address too long: {} bytes",
            decoded.len()
        );
    }
    let mut out = [0u8; 32];
    out[32 - decoded.len()..].copy_from_slice(&decoded);
    Ok(out)
}
