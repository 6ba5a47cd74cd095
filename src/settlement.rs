//! Escrow settlement state
//!
//! The ledger side of a multi-leg transfer settles through an escrow record
//! owned by the settlement program. The record tracks a terminal marker plus
//! one entry per token leg on each side of the transfer; a leg is only done
//! once its outbound confirmation sequence has been posted back. This module
//! decodes the record and applies the dual-completion rule.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;
use tracing::debug;

/// PDA seed of escrow records under the settlement program.
const ESCROW_SEED: &[u8] = b"escrow";

/// Terminal marker of an escrow record.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementMarker {
    /// Legs are still settling
    Pending,
    /// All legs executed
    Completed,
    /// Transfer was rolled back
    Aborted,
}

impl SettlementMarker {
    /// True for markers that end the escrow's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementMarker::Completed | SettlementMarker::Aborted)
    }
}

/// One asset movement within a multi-leg transfer.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenLeg {
    /// Asset identifier (mint) in 32-byte form
    pub mint: [u8; 32],
    /// Amount moved on this leg, in base units
    pub amount: u64,
    /// Sequence of this leg's outbound confirmation; None until posted
    pub return_vaa_sequence: Option<u64>,
}

/// Escrow record account data.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct SettlementState {
    /// Account discriminator written by the settlement program
    pub discriminator: [u8; 8],
    /// Lifecycle marker
    pub marker: SettlementMarker,
    /// Legs flowing into the escrow
    pub input_tokens: Vec<TokenLeg>,
    /// Legs flowing out of the escrow
    pub output_tokens: Vec<TokenLeg>,
}

/// Settlement header carried in a transfer's extended payload.
///
/// Addresses the escrow record for the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementHeader {
    /// Header version byte
    pub version: u8,
    /// Escrow identifier, used as a PDA seed
    pub escrow_id: [u8; 32],
}

impl SettlementHeader {
    /// Parses a settlement header from extended payload bytes.
    ///
    /// # Arguments
    ///
    /// * `extended_payload` - Extended payload of a kind-3 transfer
    ///
    /// # Returns
    ///
    /// * `Ok(SettlementHeader)` - Parsed header
    /// * `Err(anyhow::Error)` - Payload too short to carry a header
    pub fn parse(extended_payload: &[u8]) -> Result<Self> {
        if extended_payload.len() < 33 {
            anyhow::bail!(
                "Extended payload too short for settlement header: {} bytes",
                extended_payload.len()
            );
        }
        let version = extended_payload[0];
        let escrow_id: [u8; 32] = extended_payload[1..33]
            .try_into()
            .context("Failed to read escrow id")?;
        Ok(Self { version, escrow_id })
    }

    /// Derives the escrow record address under the settlement program.
    pub fn escrow_record_address(&self, settlement_program: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[ESCROW_SEED, &self.escrow_id], settlement_program).0
    }
}

/// Retry policy for the escrow record fetch.
///
/// The fetch is deliberately soft: failures are swallowed and retried up to
/// `attempts` times, then reported as "no state found". Callers cannot tell
/// a lookup failure apart from genuine absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowFetchPolicy {
    /// Total fetch attempts before giving up
    pub attempts: u32,
}

impl Default for EscrowFetchPolicy {
    fn default() -> Self {
        Self { attempts: 2 }
    }
}

/// Applies the dual-completion rule.
///
/// A transfer is fully settled only when the marker is terminal and every
/// leg on both sides has a posted return sequence. A terminal marker with an
/// unposted leg means downstream confirmations are still in flight.
pub fn is_fully_settled(state: &SettlementState) -> bool {
    state.marker.is_terminal()
        && state
            .input_tokens
            .iter()
            .all(|leg| leg.return_vaa_sequence.is_some())
        && state
            .output_tokens
            .iter()
            .all(|leg| leg.return_vaa_sequence.is_some())
}

/// Fetches the escrow record addressed by the settlement header.
///
/// Fetched fresh on every call, no caching. Every failure (transport error,
/// RPC error, undecodable account) is logged at debug and counts against the
/// retry budget; exhaustion yields `None`, never an error. A missing account
/// also yields `None`.
///
/// # Arguments
///
/// * `http` - Async HTTP client for JSON-RPC
/// * `rpc_url` - Ledger RPC endpoint
/// * `settlement_program` - Settlement program id
/// * `header` - Settlement header addressing the escrow record
/// * `policy` - Bounded retry policy
pub async fn fetch_settlement_state(
    http: &reqwest::Client,
    rpc_url: &str,
    settlement_program: &Pubkey,
    header: &SettlementHeader,
    policy: EscrowFetchPolicy,
) -> Option<SettlementState> {
    let record_address = header.escrow_record_address(settlement_program);

    for attempt in 1..=policy.attempts {
        match fetch_account_data(http, rpc_url, &record_address).await {
            Ok(None) => return None,
            Ok(Some(data)) => match SettlementState::try_from_slice(&data) {
                Ok(state) => return Some(state),
                Err(e) => {
                    debug!(
                        attempt,
                        escrow = %record_address,
                        "Undecodable escrow record: {}",
                        e
                    );
                }
            },
            Err(e) => {
                debug!(attempt, escrow = %record_address, "Escrow fetch failed: {}", e);
            }
        }
    }

    None
}

/// Reads one account's data over JSON-RPC.
///
/// # Returns
///
/// * `Ok(Some(data))` - Account exists; decoded data bytes
/// * `Ok(None)` - Account does not exist
/// * `Err(anyhow::Error)` - Transport or RPC failure
async fn fetch_account_data(
    http: &reqwest::Client,
    rpc_url: &str,
    address: &Pubkey,
) -> Result<Option<Vec<u8>>> {
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getAccountInfo",
        "params": [
            address.to_string(),
            { "encoding": "base64" }
        ]
    });

    let response: serde_json::Value = http
        .post(rpc_url)
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
        return Ok(None);
    }

    let data_base64 = value
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|d| d.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing account data in getAccountInfo response"))?;
    let data = STANDARD
        .decode(data_base64)
        .context("Invalid base64 account data")?;
    Ok(Some(data))
}
