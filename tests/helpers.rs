//! Shared test helpers for relay integration tests
//!
//! Provides attestation builders, chain configurations pointed at mock RPC
//! servers, and JSON-RPC responders that emulate just enough of each chain
//! family's node behavior.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::{Request, Respond, ResponseTemplate};

use solana_program::pubkey::Pubkey;

use redeemer::config::{ChainConfig, KeyMaterial};
use redeemer::chains::CHAIN_ID_SOLANA;
use redeemer::settlement::SettlementHeader;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Emitter contract used by test attestations
pub const DUMMY_EMITTER_ADDRESS: [u8; 32] = [0xEE; 32];

/// Escrow id addressed by test settlement payloads
pub const DUMMY_ESCROW_ID: [u8; 32] = [0x42; 32];

/// Ledger settlement program (raw bytes; base58 form is derived)
pub const DUMMY_LEDGER_SETTLEMENT_PROGRAM: [u8; 32] = [0x51; 32];

/// Token bridge program on the ledger chain (raw bytes)
pub const DUMMY_LEDGER_TOKEN_BRIDGE: [u8; 32] = [0x7B; 32];

/// Core bridge program on the ledger chain (raw bytes)
pub const DUMMY_LEDGER_CORE_BRIDGE: [u8; 32] = [0x6B; 32];

/// Well-funded test key used by EVM chain configs
pub const DUMMY_EVM_PRIVATE_KEY: &str =
    "4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";

/// Base58 form of the ledger token bridge program id.
pub fn ledger_token_bridge_b58() -> String {
    bs58::encode(DUMMY_LEDGER_TOKEN_BRIDGE).into_string()
}

// ============================================================================
// ATTESTATION BUILDERS
// ============================================================================

/// Builds a raw signed attestation around the given payload.
pub fn build_vaa(emitter_chain: u16, sequence: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.push(1u8); // version
    bytes.extend_from_slice(&0u32.to_be_bytes()); // guardian set index
    bytes.push(1u8); // one signature
    bytes.extend_from_slice(&[0u8; 66]);
    bytes.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // timestamp
    bytes.extend_from_slice(&7u32.to_be_bytes()); // nonce
    bytes.extend_from_slice(&emitter_chain.to_be_bytes());
    bytes.extend_from_slice(&DUMMY_EMITTER_ADDRESS);
    bytes.extend_from_slice(&sequence.to_be_bytes());
    bytes.push(32u8); // consistency level
    bytes.extend_from_slice(payload);
    bytes
}

/// Builds a transfer payload; `sender` fills the kind-3 sender field.
pub fn build_transfer_payload(
    kind: u8,
    target_chain: u16,
    sender: [u8; 32],
    extended: &[u8],
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.push(kind);
    payload.extend_from_slice(&[0u8; 24]);
    payload.extend_from_slice(&1_000_000u64.to_be_bytes()); // amount
    payload.extend_from_slice(&[0xAA; 32]); // origin address
    payload.extend_from_slice(&6u16.to_be_bytes()); // origin chain
    payload.extend_from_slice(&[0xBB; 32]); // target address
    payload.extend_from_slice(&target_chain.to_be_bytes());
    payload.extend_from_slice(&sender);
    payload.extend_from_slice(extended);
    payload
}

/// Extended payload carrying a settlement header for [`DUMMY_ESCROW_ID`].
pub fn settlement_extended_payload() -> Vec<u8> {
    let mut extended = vec![1u8];
    extended.extend_from_slice(&DUMMY_ESCROW_ID);
    extended
}

/// Hex-encodes an attestation the way callers hand it to the dispatcher.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

// ============================================================================
// CHAIN CONFIGURATIONS
// ============================================================================

/// EVM destination chain config pointed at a mock node.
pub fn evm_chain_config(chain_id: u16, node_url: &str) -> ChainConfig {
    ChainConfig {
        chain_id,
        chain_name: format!("test-evm-{}", chain_id),
        native_currency_symbol: "ETH".to_string(),
        node_url: node_url.to_string(),
        token_bridge_address: "0x0e082f06ff657d94310cb8ce8b0d9a04541d8052".to_string(),
        bridge_address: None,
        wrapped_asset: Some("0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7".to_string()),
        settlement_program_address: "0xd768ffbc3904f89f53af2a640e3b6c640d85d6b9".to_string(),
        key_material: KeyMaterial::Evm {
            private_keys: vec![DUMMY_EVM_PRIVATE_KEY.to_string()],
        },
    }
}

/// Ledger destination chain config pointed at a mock node.
pub fn ledger_chain_config(node_url: &str, keypair_bytes: Vec<u8>) -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID_SOLANA,
        chain_name: "test-ledger".to_string(),
        native_currency_symbol: "SOL".to_string(),
        node_url: node_url.to_string(),
        token_bridge_address: ledger_token_bridge_b58(),
        bridge_address: Some(bs58::encode(DUMMY_LEDGER_CORE_BRIDGE).into_string()),
        wrapped_asset: Some("So11111111111111111111111111111111111111112".to_string()),
        settlement_program_address: bs58::encode(DUMMY_LEDGER_SETTLEMENT_PROGRAM).into_string(),
        key_material: KeyMaterial::Ledger {
            private_keys: vec![keypair_bytes],
        },
    }
}

// ============================================================================
// LEDGER ACCOUNT ADDRESSES
// ============================================================================

/// Claim account the ledger backend checks for a test attestation.
pub fn claim_address_for(emitter_chain: u16, sequence: u64) -> Pubkey {
    let token_bridge = Pubkey::new_from_array(DUMMY_LEDGER_TOKEN_BRIDGE);
    Pubkey::find_program_address(
        &[
            &DUMMY_EMITTER_ADDRESS,
            &emitter_chain.to_be_bytes(),
            &sequence.to_be_bytes(),
        ],
        &token_bridge,
    )
    .0
}

/// Escrow record addressed by [`settlement_extended_payload`].
pub fn escrow_record_address() -> Pubkey {
    let header = SettlementHeader {
        version: 1,
        escrow_id: DUMMY_ESCROW_ID,
    };
    header.escrow_record_address(&Pubkey::new_from_array(DUMMY_LEDGER_SETTLEMENT_PROGRAM))
}

// ============================================================================
// MOCK JSON-RPC RESPONDERS
// ============================================================================

/// Emulates an EVM node: answers the handful of JSON-RPC methods the
/// provider stack issues and records every method name seen.
pub struct EvmRpcResponder {
    /// Completion flag the bridge reports for eth_call
    pub transfer_completed: bool,
    /// EVM network id reported by eth_chainId
    pub network_id: u64,
    /// Method names in arrival order
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl EvmRpcResponder {
    pub fn new(transfer_completed: bool, network_id: u64) -> Self {
        Self {
            transfer_completed,
            network_id,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn method_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

impl Respond for EvmRpcResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("JSON-RPC request body");
        let method = body["method"].as_str().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(method.clone());

        let result = match method.as_str() {
            "eth_chainId" => json!(format!("0x{:x}", self.network_id)),
            "eth_call" => {
                if self.transfer_completed {
                    json!(format!("0x{}01", "00".repeat(31)))
                } else {
                    json!(format!("0x{}", "00".repeat(32)))
                }
            }
            "eth_gasPrice" => json!("0x3b9aca00"),
            "eth_getTransactionCount" => json!("0x0"),
            "eth_estimateGas" => json!("0x5208"),
            "eth_blockNumber" => json!("0x2"),
            "eth_sendRawTransaction" => {
                json!("0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b")
            }
            "eth_getTransactionByHash" => json!({
                "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                "nonce": "0x0",
                "blockHash":
                    "0x6fd9e2a26ab1eb3e7f943a1ff9a4e851c2518db9438a96b95fdbb5e790d2ac32",
                "blockNumber": "0x1",
                "transactionIndex": "0x0",
                "from": "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1",
                "to": "0xd768ffbc3904f89f53af2a640e3b6c640d85d6b9",
                "value": "0x0",
                "gasPrice": "0x3b9aca00",
                "gas": "0x5208",
                "input": "0x",
                "v": "0x0",
                "r": "0x1",
                "s": "0x1"
            }),
            "eth_getTransactionReceipt" => json!({
                "transactionHash":
                    "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                "transactionIndex": "0x0",
                "blockHash":
                    "0x6fd9e2a26ab1eb3e7f943a1ff9a4e851c2518db9438a96b95fdbb5e790d2ac32",
                "blockNumber": "0x1",
                "from": "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1",
                "to": "0xd768ffbc3904f89f53af2a640e3b6c640d85d6b9",
                "cumulativeGasUsed": "0x5208",
                "gasUsed": "0x5208",
                "contractAddress": null,
                "logs": [],
                "status": "0x1",
                "logsBloom": format!("0x{}", "00".repeat(256)),
                "effectiveGasPrice": "0x3b9aca00"
            }),
            _ => json!(null),
        };

        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": result
        }))
    }
}

/// One mock ledger account: base64 data plus an owner.
#[derive(Clone)]
pub struct MockAccount {
    pub data: Vec<u8>,
    pub owner: String,
}

/// Emulates a ledger node: serves configured accounts over getAccountInfo
/// and accepts transaction submission. Accounts can be set to fail their
/// first N reads to exercise retry behavior.
pub struct LedgerRpcResponder {
    accounts: Mutex<HashMap<String, MockAccount>>,
    /// Per-address number of initial getAccountInfo calls to fail
    failures: Mutex<HashMap<String, usize>>,
    /// getAccountInfo calls seen, by address
    pub account_reads: Arc<Mutex<Vec<String>>>,
    /// Number of sendTransaction calls seen
    pub transactions_sent: Arc<AtomicUsize>,
}

impl LedgerRpcResponder {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            account_reads: Arc::new(Mutex::new(Vec::new())),
            transactions_sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Registers an account the node will serve.
    pub fn set_account(&self, address: &str, data: Vec<u8>, owner: &str) {
        self.accounts.lock().unwrap().insert(
            address.to_string(),
            MockAccount {
                data,
                owner: owner.to_string(),
            },
        );
    }

    /// Makes the first `count` reads of `address` fail with an RPC error.
    pub fn fail_first_reads(&self, address: &str, count: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(address.to_string(), count);
    }

    pub fn reads_of(&self, address: &str) -> usize {
        self.account_reads
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == address)
            .count()
    }

    fn respond_account_info(&self, body: &serde_json::Value) -> serde_json::Value {
        let address = body["params"][0].as_str().unwrap_or_default().to_string();
        self.account_reads.lock().unwrap().push(address.clone());

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&address) {
            if *remaining > 0 {
                *remaining -= 1;
                return json!({
                    "jsonrpc": "2.0",
                    "id": body["id"],
                    "error": { "code": -32005, "message": "node is behind" }
                });
            }
        }
        drop(failures);

        let value = match self.accounts.lock().unwrap().get(&address) {
            Some(account) => json!({
                "data": [STANDARD.encode(&account.data), "base64"],
                "executable": false,
                "lamports": 1_000_000u64,
                "owner": account.owner,
                "rentEpoch": 0,
                "space": account.data.len()
            }),
            None => json!(null),
        };

        json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": { "context": { "apiVersion": "2.0.0", "slot": 1 }, "value": value }
        })
    }
}

impl Respond for LedgerRpcResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("JSON-RPC request body");
        let method = body["method"].as_str().unwrap_or_default();

        let response = match method {
            "getAccountInfo" => self.respond_account_info(&body),
            "getLatestBlockhash" => json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {
                    "context": { "apiVersion": "2.0.0", "slot": 1 },
                    "value": {
                        "blockhash": bs58::encode([1u8; 32]).into_string(),
                        "lastValidBlockHeight": 100
                    }
                }
            }),
            "sendTransaction" => {
                self.transactions_sent.fetch_add(1, Ordering::SeqCst);
                let signature = extract_transaction_signature(&body);
                json!({ "jsonrpc": "2.0", "id": body["id"], "result": signature })
            }
            "getSignatureStatuses" => json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {
                    "context": { "apiVersion": "2.0.0", "slot": 2 },
                    "value": [{
                        "slot": 1,
                        "confirmations": 10,
                        "err": null,
                        "status": { "Ok": null },
                        "confirmationStatus": "finalized"
                    }]
                }
            }),
            "isBlockhashValid" => json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": { "context": { "apiVersion": "2.0.0", "slot": 2 }, "value": true }
            }),
            _ => json!({ "jsonrpc": "2.0", "id": body["id"], "result": null }),
        };

        ResponseTemplate::new(200).set_body_json(response)
    }
}

/// Pulls the first signature out of an encoded transaction so the mock node
/// echoes back exactly what the client signed.
fn extract_transaction_signature(body: &serde_json::Value) -> String {
    let encoded = body["params"][0].as_str().unwrap_or_default();
    let bytes = STANDARD
        .decode(encoded)
        .or_else(|_| bs58::decode(encoded).into_vec())
        .unwrap_or_default();
    // Wire format: compact signature count, then 64 bytes per signature
    if bytes.len() >= 65 {
        bs58::encode(&bytes[1..65]).into_string()
    } else {
        bs58::encode([0u8; 64]).into_string()
    }
}
