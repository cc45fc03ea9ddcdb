//! ABI types and decoding for the vault contract.
//!
//! The five user-facing vault events and their topic0 hashes. Raw logs arrive in the
//! JSON-RPC `eth_getLogs` shape and are decoded into [VaultLog], one variant per event.

use alloy::primitives::{Address, B256, U256};
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use std::sync::OnceLock;
use thiserror::Error;

/// Canonical signatures of every event the indexer subscribes to.
pub const VAULT_EVENT_SIGNATURES: [&str; 5] = [
    "UserDeposited(address,uint256)",
    "UserRequestedWithdrawal(address,uint256,uint256)",
    "UserWithdrawn(address,uint256)",
    "UserModifiedPendingWithdrawal(address,uint256,uint256)",
    "UserCancelledPendingWithdrawal(address)",
];

/// keccak256 of an event signature.
pub fn event_topic(signature: &str) -> B256 {
    B256::from_slice(&Keccak256::digest(signature.as_bytes()))
}

/// topic0 for each entry of [VAULT_EVENT_SIGNATURES], same order.
pub fn vault_event_topics() -> &'static [B256; 5] {
    static TOPICS: OnceLock<[B256; 5]> = OnceLock::new();
    TOPICS.get_or_init(|| VAULT_EVENT_SIGNATURES.map(event_topic))
}

/// A log as returned by `eth_getLogs`. Pending logs carry no block number or
/// transaction hash, so both are optional here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
}

impl RawLog {
    /// Block number, if present and well-formed.
    pub fn block_number(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(|s| parse_hex_u64(s).ok())
    }

    /// Transaction hash, if present and well-formed.
    pub fn transaction_hash(&self) -> Option<B256> {
        self.transaction_hash
            .as_deref()
            .and_then(|s| parse_hex_bytes_32(s).ok())
    }

    pub fn log_index(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(|s| parse_hex_u64(s).ok())
    }
}

/// Decoded vault event. Each variant carries exactly the fields its Solidity event declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultLog {
    UserDeposited {
        user: Address,
        amount: U256,
    },
    UserRequestedWithdrawal {
        user: Address,
        amount: U256,
        request_time: U256,
    },
    UserWithdrawn {
        user: Address,
        amount: U256,
    },
    UserModifiedPendingWithdrawal {
        user: Address,
        previous_amount: U256,
        new_amount: U256,
    },
    UserCancelledPendingWithdrawal {
        user: Address,
    },
    /// Any log whose topic0 is not one of the vault events.
    Unknown { topic0: Option<B256> },
}

impl VaultLog {
    pub fn name(&self) -> &'static str {
        match self {
            VaultLog::UserDeposited { .. } => "UserDeposited",
            VaultLog::UserRequestedWithdrawal { .. } => "UserRequestedWithdrawal",
            VaultLog::UserWithdrawn { .. } => "UserWithdrawn",
            VaultLog::UserModifiedPendingWithdrawal { .. } => "UserModifiedPendingWithdrawal",
            VaultLog::UserCancelledPendingWithdrawal { .. } => "UserCancelledPendingWithdrawal",
            VaultLog::Unknown { .. } => "Unknown",
        }
    }

    /// The indexed `user` argument; `None` for unknown events.
    pub fn user(&self) -> Option<Address> {
        match self {
            VaultLog::UserDeposited { user, .. }
            | VaultLog::UserRequestedWithdrawal { user, .. }
            | VaultLog::UserWithdrawn { user, .. }
            | VaultLog::UserModifiedPendingWithdrawal { user, .. }
            | VaultLog::UserCancelledPendingWithdrawal { user } => Some(*user),
            VaultLog::Unknown { .. } => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{event}: expected {expected} topics, got {got}")]
    Topics {
        event: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{event}: data too short ({got} bytes, need {need})")]
    Data {
        event: &'static str,
        need: usize,
        got: usize,
    },
    #[error("invalid hex in {field}: {reason}")]
    Hex { field: &'static str, reason: String },
}

/// Decode a raw log into a [VaultLog]. Logs with an unrecognized topic0 decode to
/// [VaultLog::Unknown]; a recognized topic0 with malformed topics or data is an error.
pub fn decode_vault_log(log: &RawLog) -> Result<VaultLog, DecodeError> {
    let topics = log
        .topics
        .iter()
        .map(|t| {
            parse_hex_bytes_32(t).map_err(|reason| DecodeError::Hex {
                field: "topics",
                reason,
            })
        })
        .collect::<Result<Vec<B256>, _>>()?;
    let Some(topic0) = topics.first().copied() else {
        return Ok(VaultLog::Unknown { topic0: None });
    };
    let Some(idx) = vault_event_topics().iter().position(|t| *t == topic0) else {
        return Ok(VaultLog::Unknown {
            topic0: Some(topic0),
        });
    };
    let event = VAULT_EVENT_NAMES[idx];
    if topics.len() != 2 {
        return Err(DecodeError::Topics {
            event,
            expected: 2,
            got: topics.len(),
        });
    }
    // `user` is indexed; the topic is the address left-padded to 32 bytes.
    let user = Address::from_word(topics[1]);
    let data = parse_hex_bytes(&log.data).map_err(|reason| DecodeError::Hex {
        field: "data",
        reason,
    })?;
    let words = |n: usize| -> Result<Vec<U256>, DecodeError> {
        if data.len() < n * 32 {
            return Err(DecodeError::Data {
                event,
                need: n * 32,
                got: data.len(),
            });
        }
        Ok(data
            .chunks_exact(32)
            .take(n)
            .map(U256::from_be_slice)
            .collect())
    };

    let decoded = match idx {
        0 => {
            let w = words(1)?;
            VaultLog::UserDeposited { user, amount: w[0] }
        }
        1 => {
            let w = words(2)?;
            VaultLog::UserRequestedWithdrawal {
                user,
                amount: w[0],
                request_time: w[1],
            }
        }
        2 => {
            let w = words(1)?;
            VaultLog::UserWithdrawn { user, amount: w[0] }
        }
        3 => {
            let w = words(2)?;
            VaultLog::UserModifiedPendingWithdrawal {
                user,
                previous_amount: w[0],
                new_amount: w[1],
            }
        }
        _ => VaultLog::UserCancelledPendingWithdrawal { user },
    };
    Ok(decoded)
}

const VAULT_EVENT_NAMES: [&str; 5] = [
    "UserDeposited",
    "UserRequestedWithdrawal",
    "UserWithdrawn",
    "UserModifiedPendingWithdrawal",
    "UserCancelledPendingWithdrawal",
];

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| e.to_string())
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| e.to_string())
}

fn parse_hex_bytes_32(s: &str) -> Result<B256, String> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}

/// `0x`-prefixed lowercase hex of a 32-byte value.
pub fn hex_b256(value: &B256) -> String {
    format!("0x{}", hex::encode(value.as_slice()))
}

/// `0x`-prefixed lowercase hex of an address.
pub fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
