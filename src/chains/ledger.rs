//! Ledger chain backend
//!
//! Owns the RPC clients and signing identity for the Solana-style ledger
//! chain. Completion is tracked through a per-transfer claim account under
//! the token bridge program; redemption goes through the escrow settlement
//! program. Account reads use raw JSON-RPC, submission the chain's RPC
//! client.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::pubkey::Pubkey;
use solana_program::system_program;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::{AccountMeta, Instruction},
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::chains::ChainFamily;
use crate::config::{ChainConfig, KeyMaterial, SigningKey};
use crate::settlement::SettlementHeader;
use crate::vaa::{ParsedVaa, TransferMessage};

// Well-known program id from the ledger chain's token runtime.
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Instruction set of the escrow settlement program.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum SettlementInstruction {
    /// Redeem an attested transfer into its escrow record
    RedeemTransfer {
        vaa_digest: [u8; 32],
        sequence: u64,
    },
}

/// Backend for the ledger destination chain.
pub struct LedgerBackend {
    http: reqwest::Client,
    rpc_url: String,
    rpc_client: RpcClient,
    token_bridge_program: Pubkey,
    core_bridge_program: Pubkey,
    settlement_program: Pubkey,
    keypair: Keypair,
    chain_id: u16,
}

impl LedgerBackend {
    /// Builds a backend from the ledger chain's configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Destination chain configuration (must be the ledger chain)
    /// * `key_override` - Optional signing key replacing the configured keys
    ///
    /// # Returns
    ///
    /// * `Ok(LedgerBackend)` - Connected backend
    /// * `Err(anyhow::Error)` - Config defect or client construction failure
    pub fn from_config(config: &ChainConfig, key_override: Option<&SigningKey>) -> Result<Self> {
        if config.family() != ChainFamily::Ledger {
            anyhow::bail!("Chain {} is not the ledger chain", config.chain_name);
        }

        let bridge_address = config
            .bridge_address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Chain {} is missing the core bridge address",
                    config.chain_name
                )
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        let rpc_client = RpcClient::new_with_commitment(
            config.node_url.clone(),
            CommitmentConfig::confirmed(),
        );

        Ok(Self {
            http,
            rpc_url: config.node_url.clone(),
            rpc_client,
            token_bridge_program: Pubkey::from_str(&config.token_bridge_address)
                .context("Invalid token_bridge_address")?,
            core_bridge_program: Pubkey::from_str(bridge_address)
                .context("Invalid bridge_address")?,
            settlement_program: Pubkey::from_str(&config.settlement_program_address)
                .context("Invalid settlement_program_address")?,
            keypair: resolve_keypair(config, key_override)?,
            chain_id: config.chain_id,
        })
    }

    /// Derives the claim account tracking this transfer's redemption.
    ///
    /// Keyed by the emitting contract, emitter chain, and sequence, so every
    /// attested transfer has exactly one claim.
    pub fn claim_address(&self, vaa: &ParsedVaa) -> Pubkey {
        Pubkey::find_program_address(
            &[
                &vaa.emitter_address,
                &vaa.emitter_chain.to_be_bytes(),
                &vaa.sequence.to_be_bytes(),
            ],
            &self.token_bridge_program,
        )
        .0
    }

    /// Checks whether the transfer's claim account is marked claimed.
    ///
    /// A missing claim account means the transfer has not been redeemed.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Claim flag
    /// * `Err(anyhow::Error)` - RPC failure
    pub async fn is_redeemed(&self, vaa: &ParsedVaa) -> Result<bool> {
        let claim = self.claim_address(vaa);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [
                claim.to_string(),
                { "encoding": "base64" }
            ]
        });

        let response: serde_json::Value = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .context("Failed to call getAccountInfo")?
            .json()
            .await
            .context("Failed to parse getAccountInfo response")?;

        if let Some(error) = response.get("error") {
            return Err(anyhow::anyhow!("Ledger RPC error: {}", error));
        }

        let value = response
            .get("result")
            .and_then(|r| r.get("value"))
            .ok_or_else(|| anyhow::anyhow!("Invalid getAccountInfo response"))?;
        if value.is_null() {
            debug!(claim = %claim, "No claim account, transfer not redeemed");
            return Ok(false);
        }

        let data_base64 = value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing account data in getAccountInfo response"))?;
        let data = STANDARD
            .decode(data_base64)
            .context("Invalid base64 claim account data")?;

        Ok(data.first().copied() == Some(1))
    }

    /// Submits the redemption against the settlement program.
    ///
    /// # Arguments
    ///
    /// * `vaa` - Parsed attestation
    /// * `transfer` - Decoded transfer record (recipient, amounts)
    /// * `header` - Settlement header from the transfer's extended payload
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Transaction signature
    /// * `Err(anyhow::Error)` - Submission failure or chain-level rejection
    pub async fn submit_redemption(
        &self,
        vaa: &ParsedVaa,
        transfer: &TransferMessage,
        header: &SettlementHeader,
    ) -> Result<String> {
        let escrow_record = header.escrow_record_address(&self.settlement_program);
        let claim = self.claim_address(vaa);
        let recipient = Pubkey::new_from_array(transfer.target_address);
        let token_program =
            Pubkey::from_str(TOKEN_PROGRAM_ID).context("Invalid token program id")?;

        info!(
            escrow = %escrow_record,
            recipient = %recipient,
            payer = %self.keypair.pubkey(),
            "Submitting ledger redemption"
        );

        let redeem_ix = Instruction {
            program_id: self.settlement_program,
            accounts: vec![
                AccountMeta::new(escrow_record, false),
                AccountMeta::new(claim, false),
                AccountMeta::new(recipient, false),
                AccountMeta::new_readonly(self.core_bridge_program, false),
                AccountMeta::new_readonly(self.token_bridge_program, false),
                AccountMeta::new(self.keypair.pubkey(), true),
                AccountMeta::new_readonly(token_program, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: SettlementInstruction::RedeemTransfer {
                vaa_digest: vaa.digest,
                sequence: vaa.sequence,
            }
            .try_to_vec()
            .context("Failed to serialize redeem instruction")?,
        };

        let blockhash = self
            .rpc_client
            .get_latest_blockhash()
            .await
            .context("Failed to get latest blockhash")?;
        let tx = Transaction::new_signed_with_payer(
            &[redeem_ix],
            Some(&self.keypair.pubkey()),
            &[&self.keypair],
            blockhash,
        );
        let signature = self
            .rpc_client
            .send_and_confirm_transaction(&tx)
            .await
            .context("Failed to send redeem transaction")?;

        Ok(signature.to_string())
    }

    /// Async HTTP client shared with the settlement-state fetch.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// RPC endpoint the backend talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Settlement program redeemed against.
    pub fn settlement_program(&self) -> &Pubkey {
        &self.settlement_program
    }

    /// Destination chain id this backend redeems on.
    pub fn chain_id(&self) -> u16 {
        self.chain_id
    }
}

/// Picks the signing keypair for an attempt: the override when given,
/// otherwise the first configured key. The key shape must match the family.
fn resolve_keypair(config: &ChainConfig, key_override: Option<&SigningKey>) -> Result<Keypair> {
    let bytes = match key_override {
        Some(SigningKey::Ledger(bytes)) => bytes.clone(),
        Some(SigningKey::Evm(_)) => {
            anyhow::bail!("EVM-shaped key override passed to the ledger backend")
        }
        None => match &config.key_material {
            KeyMaterial::Ledger { private_keys } => private_keys
                .first()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Chain {} has no signing keys", config.chain_name))?,
            KeyMaterial::Evm { .. } => anyhow::bail!(
                "Chain {} carries EVM key material but is the ledger chain",
                config.chain_name
            ),
        },
    };

    Keypair::try_from(bytes.as_slice())
        .map_err(|e| anyhow::anyhow!("Invalid ledger keypair bytes: {}", e))
}
