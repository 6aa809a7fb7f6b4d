pub mod abi;
pub mod deployer;
pub mod error;
pub mod provider;
pub mod signer;
pub mod staking;
pub mod transaction;
pub mod utils;

#[cfg(test)]
pub mod mock;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use serde::{Deserialize, Serialize};

/// Handle returned as soon as the node accepts a transaction.
/// Says nothing about inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: TxHash,
    pub nonce: u64,
}

/// One log from a receipt, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl LogEntry {
    pub fn signature(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// Execution outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub success: bool,
    pub block_number: u64,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedInstance {
    pub address: Address,
    pub implementation_address: Address,
    pub transaction_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedImplementation {
    pub address: Address,
    pub transaction_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeOutcome {
    pub instance: Address,
    pub amount: U256,
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// `isOpen()` as read before submission, when the read was requested.
    pub pool_open: Option<bool>,
}

/// Progress signals for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TxEvent {
    Submitted {
        label: String,
        tx_hash: TxHash,
        nonce: u64,
    },
    Confirmed {
        label: String,
        tx_hash: TxHash,
        block_number: u64,
        success: bool,
    },
}
