//! Signed attestation message parsing
//!
//! An attestation message wraps a guardian-signed observation body. The body
//! carries the emitter identity, a sequence number, and an opaque payload;
//! for token transfers the payload is a fixed 133-byte transfer record,
//! optionally followed by an extended payload used by the multi-leg
//! settlement protocol.

use anyhow::{Context, Result};
use sha3::{Digest, Keccak256};

/// Byte length of one guardian signature entry (index + signature + recovery id).
const SIGNATURE_ENTRY_LEN: usize = 66;

/// Offset of the extended payload within a transfer payload.
const EXTENDED_PAYLOAD_OFFSET: usize = 133;

/// Transfer payload kind carrying a fee field.
pub const PAYLOAD_KIND_TRANSFER: u8 = 1;

/// Transfer payload kind carrying a sender address and an extended payload.
pub const PAYLOAD_KIND_TRANSFER_WITH_PAYLOAD: u8 = 3;

/// A parsed attestation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVaa {
    /// Envelope version byte
    pub version: u8,
    /// Index of the guardian set that signed the message
    pub guardian_set_index: u32,
    /// Number of guardian signatures carried
    pub signature_count: u8,
    /// Observation timestamp (seconds)
    pub timestamp: u32,
    /// Observation nonce
    pub nonce: u32,
    /// Chain the message was emitted on
    pub emitter_chain: u16,
    /// Emitting contract, zero-padded to 32 bytes
    pub emitter_address: [u8; 32],
    /// Emitter-scoped sequence number
    pub sequence: u64,
    /// Finality level the emitter requested
    pub consistency_level: u8,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
    /// Keccak256 of the observation body
    pub digest: [u8; 32],
    /// Keccak256 of the digest; the key EVM bridges use for completion bookkeeping
    pub double_digest: [u8; 32],
}

/// A decoded token transfer payload.
///
/// Amounts and addresses are kept in the 32-byte chain-agnostic wire format;
/// backends narrow them to their native representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMessage {
    /// Payload kind byte (1 = transfer, 3 = transfer with extended payload)
    pub payload_kind: u8,
    /// Transfer amount, big-endian u256
    pub amount: [u8; 32],
    /// Token address on its origin chain
    pub origin_address: [u8; 32],
    /// Chain the token is native to
    pub origin_chain: u16,
    /// Redemption target address
    pub target_address: [u8; 32],
    /// Redemption target chain
    pub target_chain: u16,
    /// Fee (kind 1) or sender address (kind 3)
    pub sender_address: [u8; 32],
    /// Extended payload bytes for multi-leg transfers (empty for kind 1)
    pub extended_payload: Vec<u8>,
}

impl TransferMessage {
    /// True when this transfer carries the extended multi-leg payload.
    pub fn has_extended_payload(&self) -> bool {
        self.payload_kind == PAYLOAD_KIND_TRANSFER_WITH_PAYLOAD
            && !self.extended_payload.is_empty()
    }
}

/// Parses a signed attestation message from raw bytes.
///
/// Signatures are length-checked and skipped, not verified; verification is
/// the guardian network's job and happens before messages reach the relay.
///
/// # Arguments
///
/// * `bytes` - Raw signed message
///
/// # Returns
///
/// * `Ok(ParsedVaa)` - Parsed message with body digests
/// * `Err(anyhow::Error)` - Truncated or malformed message
pub fn parse_vaa(bytes: &[u8]) -> Result<ParsedVaa> {
    if bytes.len() < 6 {
        anyhow::bail!("Attestation too short: {} bytes", bytes.len());
    }

    let version = bytes[0];
    let guardian_set_index = u32::from_be_bytes(
        bytes[1..5]
            .try_into()
            .context("Failed to read guardian set index")?,
    );
    let signature_count = bytes[5];

    let body_offset = 6 + signature_count as usize * SIGNATURE_ENTRY_LEN;
    if bytes.len() < body_offset {
        anyhow::bail!(
            "Attestation truncated inside signatures: {} bytes, need {}",
            bytes.len(),
            body_offset
        );
    }

    let body = &bytes[body_offset..];
    // timestamp(4) + nonce(4) + emitter_chain(2) + emitter_address(32)
    // + sequence(8) + consistency_level(1)
    if body.len() < 51 {
        anyhow::bail!("Attestation body too short: {} bytes", body.len());
    }

    let timestamp = u32::from_be_bytes(body[0..4].try_into().context("Failed to read timestamp")?);
    let nonce = u32::from_be_bytes(body[4..8].try_into().context("Failed to read nonce")?);
    let emitter_chain =
        u16::from_be_bytes(body[8..10].try_into().context("Failed to read emitter chain")?);
    let emitter_address: [u8; 32] = body[10..42]
        .try_into()
        .context("Failed to read emitter address")?;
    let sequence = u64::from_be_bytes(body[42..50].try_into().context("Failed to read sequence")?);
    let consistency_level = body[50];
    let payload = body[51..].to_vec();

    let digest: [u8; 32] = Keccak256::digest(body).into();
    let double_digest: [u8; 32] = Keccak256::digest(digest).into();

    Ok(ParsedVaa {
        version,
        guardian_set_index,
        signature_count,
        timestamp,
        nonce,
        emitter_chain,
        emitter_address,
        sequence,
        consistency_level,
        payload,
        digest,
        double_digest,
    })
}

/// Parses a token transfer payload.
///
/// The fixed prefix is 133 bytes; anything beyond it is the extended payload
/// consumed by the settlement protocol.
///
/// # Arguments
///
/// * `payload` - Attestation payload bytes
///
/// # Returns
///
/// * `Ok(TransferMessage)` - Decoded transfer
/// * `Err(anyhow::Error)` - Unknown payload kind or truncated payload
pub fn parse_transfer_payload(payload: &[u8]) -> Result<TransferMessage> {
    if payload.len() < EXTENDED_PAYLOAD_OFFSET {
        anyhow::bail!(
            "Transfer payload too short: {} bytes, need {}",
            payload.len(),
            EXTENDED_PAYLOAD_OFFSET
        );
    }

    let payload_kind = payload[0];
    if payload_kind != PAYLOAD_KIND_TRANSFER && payload_kind != PAYLOAD_KIND_TRANSFER_WITH_PAYLOAD {
        anyhow::bail!("Unknown transfer payload kind: {}", payload_kind);
    }

    let amount: [u8; 32] = payload[1..33].try_into().context("Failed to read amount")?;
    let origin_address: [u8; 32] = payload[33..65]
        .try_into()
        .context("Failed to read origin address")?;
    let origin_chain = u16::from_be_bytes(
        payload[65..67]
            .try_into()
            .context("Failed to read origin chain")?,
    );
    let target_address: [u8; 32] = payload[67..99]
        .try_into()
        .context("Failed to read target address")?;
    let target_chain = u16::from_be_bytes(
        payload[99..101]
            .try_into()
            .context("Failed to read target chain")?,
    );
    let sender_address: [u8; 32] = payload[101..133]
        .try_into()
        .context("Failed to read sender field")?;
    let extended_payload = payload[EXTENDED_PAYLOAD_OFFSET..].to_vec();

    Ok(TransferMessage {
        payload_kind,
        amount,
        origin_address,
        origin_chain,
        target_address,
        target_chain,
        sender_address,
        extended_payload,
    })
}
