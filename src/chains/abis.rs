//! ABI fragments for the EVM contracts the relay touches.

/// Token bridge completion oracle.
pub const TOKEN_BRIDGE_ABI: &str = r#"[
  {
    "type": "function",
    "name": "isTransferCompleted",
    "stateMutability": "view",
    "inputs": [
      { "name": "hash", "type": "bytes32" }
    ],
    "outputs": [
      { "name": "", "type": "bool" }
    ]
  }
]"#;

/// Settlement contract redemption entry points.
pub const SETTLEMENT_ABI: &str = r#"[
  {
    "type": "function",
    "name": "redeemTransfer",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "encodedMessage", "type": "bytes" }
    ],
    "outputs": []
  },
  {
    "type": "function",
    "name": "redeemTransferNative",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "encodedMessage", "type": "bytes" }
    ],
    "outputs": []
  }
]"#;
