use alloy::primitives::{TxHash, B256, U256};
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the deployment and staking workflows.
///
/// `Encoding`, `InvalidRequest`, `EmptyLogs`, `CreationEventMissing`,
/// `UnexpectedEmitter` and `MissingContractAddress` are integration errors
/// raised locally. The remaining variants come from the node and carry the
/// transaction hash when one exists so the caller can decide how to retry.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to encode call data: {0}")]
    Encoding(String),

    #[error("Invalid transaction request: {0}")]
    InvalidRequest(String),

    #[error("Node rejected transaction: {message}")]
    Submission { message: String },

    #[error("Could not observe transaction 0x{tx_hash:x}: {message}")]
    Observation { tx_hash: TxHash, message: String },

    #[error("Transaction 0x{tx_hash:x} not confirmed after {waited:?}; it may still be mined")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },

    #[error("Transaction 0x{tx_hash:x} reverted in block {block_number}")]
    Reverted { tx_hash: TxHash, block_number: u64 },

    #[error("Stake of {amount} rejected: transaction 0x{tx_hash:x} reverted in block {block_number}")]
    StakingRejected {
        tx_hash: TxHash,
        block_number: u64,
        amount: U256,
    },

    #[error("Inconsistent state: transaction 0x{tx_hash:x} succeeded but emitted no logs")]
    EmptyLogs { tx_hash: TxHash },

    #[error("Transaction 0x{tx_hash:x} emitted no log with topic 0x{signature:x}")]
    CreationEventMissing { tx_hash: TxHash, signature: B256 },

    #[error("Creation log in transaction 0x{tx_hash:x} was emitted by the factory 0x{emitter:x}, not a new instance")]
    UnexpectedEmitter {
        tx_hash: TxHash,
        emitter: alloy::primitives::Address,
    },

    #[error("Creation transaction 0x{tx_hash:x} has no contract address in its receipt")]
    MissingContractAddress { tx_hash: TxHash },

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ClientError {
    /// Hash of the transaction the error relates to, if it got that far.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Observation { tx_hash, .. }
            | Self::ConfirmationTimeout { tx_hash, .. }
            | Self::Reverted { tx_hash, .. }
            | Self::StakingRejected { tx_hash, .. }
            | Self::EmptyLogs { tx_hash }
            | Self::CreationEventMissing { tx_hash, .. }
            | Self::UnexpectedEmitter { tx_hash, .. }
            | Self::MissingContractAddress { tx_hash } => Some(*tx_hash),
            Self::Encoding(_) | Self::InvalidRequest(_) | Self::Submission { .. } | Self::Rpc(_) => {
                None
            }
        }
    }
}
