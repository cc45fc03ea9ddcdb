//! Mapping from decoded vault logs to stored [VaultEvent] records.

use crate::abi::{hex_address, VaultLog};
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wallet recorded when a log carries no `user` argument.
pub const UNKNOWN_WALLET: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Deposit,
    WithdrawRequest,
    WithdrawExecuted,
    WithdrawModified,
    WithdrawCancelled,
    Unknown,
}

impl EventType {
    pub const WITHDRAWALS: [EventType; 4] = [
        EventType::WithdrawRequest,
        EventType::WithdrawExecuted,
        EventType::WithdrawModified,
        EventType::WithdrawCancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Deposit => "DEPOSIT",
            EventType::WithdrawRequest => "WITHDRAW_REQUEST",
            EventType::WithdrawExecuted => "WITHDRAW_EXECUTED",
            EventType::WithdrawModified => "WITHDRAW_MODIFIED",
            EventType::WithdrawCancelled => "WITHDRAW_CANCELLED",
            EventType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(EventType::Deposit),
            "WITHDRAW_REQUEST" => Ok(EventType::WithdrawRequest),
            "WITHDRAW_EXECUTED" => Ok(EventType::WithdrawExecuted),
            "WITHDRAW_MODIFIED" => Ok(EventType::WithdrawModified),
            "WITHDRAW_CANCELLED" => Ok(EventType::WithdrawCancelled),
            "UNKNOWN" => Ok(EventType::Unknown),
            other => Err(format!("unknown event type {other:?}")),
        }
    }
}

/// Type, wallet and amount of a log, before chain metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub event_type: EventType,
    pub wallet_address: String,
    /// Base-10 encoded uint256.
    pub amount: String,
}

/// One row of the vault event log, keyed by `tx_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEvent {
    pub tx_hash: String,
    pub wallet_address: String,
    pub event_type: EventType,
    pub amount: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

impl VaultEvent {
    pub fn new(
        tx_hash: String,
        block_number: u64,
        timestamp: DateTime<Utc>,
        classified: Classified,
    ) -> Self {
        Self {
            tx_hash,
            wallet_address: classified.wallet_address,
            event_type: classified.event_type,
            amount: classified.amount,
            block_number,
            timestamp,
        }
    }
}

/// Pure classification of a decoded log.
pub fn classify(log: &VaultLog) -> Classified {
    let (event_type, amount) = match log {
        VaultLog::UserDeposited { amount, .. } => (EventType::Deposit, *amount),
        VaultLog::UserRequestedWithdrawal { amount, .. } => (EventType::WithdrawRequest, *amount),
        VaultLog::UserWithdrawn { amount, .. } => (EventType::WithdrawExecuted, *amount),
        VaultLog::UserModifiedPendingWithdrawal { new_amount, .. } => {
            (EventType::WithdrawModified, *new_amount)
        }
        VaultLog::UserCancelledPendingWithdrawal { .. } => (EventType::WithdrawCancelled, U256::ZERO),
        VaultLog::Unknown { .. } => (EventType::Unknown, U256::ZERO),
    };
    let wallet_address = log
        .user()
        .map(|u| hex_address(&u))
        .unwrap_or_else(|| UNKNOWN_WALLET.to_string());
    Classified {
        event_type,
        wallet_address,
        amount: amount.to_string(),
    }
}
