use crate::ethereum::{
    abi::IDpPool,
    error::ClientError,
    provider::ChainClient,
    transaction::{GasParams, TransactionConfirmer, TransactionSubmitter, TxRequest},
    utils, StakeOutcome,
};
use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Reads `isOpen()` on a pool instance.
pub async fn read_is_open(client: &dyn ChainClient, instance: Address) -> Result<bool, ClientError> {
    let raw = client
        .call(instance, IDpPool::isOpenCall {}.abi_encode().into())
        .await
        .map_err(|e| ClientError::Rpc(utils::interpret_rpc_error(&e.to_string())))?;

    IDpPool::isOpenCall::abi_decode_returns(&raw, true)
        .map(|ret| ret._0)
        .map_err(|e| ClientError::Rpc(format!("Failed to decode isOpen() result: {}", e)))
}

#[derive(Debug, Clone)]
pub struct StakingInvoker {
    client: Arc<dyn ChainClient>,
    submitter: TransactionSubmitter,
    confirmer: TransactionConfirmer,
}

impl StakingInvoker {
    pub fn new(
        client: Arc<dyn ChainClient>,
        submitter: TransactionSubmitter,
        confirmer: TransactionConfirmer,
    ) -> Self {
        Self {
            client,
            submitter,
            confirmer,
        }
    }

    pub async fn is_open(&self, instance: Address) -> Result<bool, ClientError> {
        read_is_open(self.client.as_ref(), instance).await
    }

    /// Stakes `amount` base units on `instance` and waits for the result.
    ///
    /// With `check_open` the pool state is read first for feedback only;
    /// the pool itself decides whether to accept the stake.
    pub async fn stake(
        &self,
        instance: Address,
        amount: U256,
        gas: GasParams,
        check_open: bool,
    ) -> Result<StakeOutcome, ClientError> {
        if amount.is_zero() {
            return Err(ClientError::InvalidRequest(
                "stake amount must be positive".to_string(),
            ));
        }

        let pool_open = if check_open {
            match self.is_open(instance).await {
                Ok(open) => {
                    info!("Pool 0x{:x} isOpen: {}", instance, open);
                    if !open {
                        warn!("Pool 0x{:x} reports closed; the stake will likely revert", instance);
                    }
                    Some(open)
                }
                Err(e) => {
                    warn!("Could not read isOpen() on 0x{:x}: {}", instance, e);
                    None
                }
            }
        } else {
            None
        };

        let calldata = IDpPool::stakeCall { amount }.abi_encode();
        let tx = TxRequest::call(instance, calldata, gas);
        let handle = self.submitter.submit("stake", &tx).await?;

        let receipt = match self.confirmer.confirm("stake", &handle).await {
            Ok(receipt) => receipt,
            Err(ClientError::Reverted {
                tx_hash,
                block_number,
            }) => {
                return Err(ClientError::StakingRejected {
                    tx_hash,
                    block_number,
                    amount,
                })
            }
            Err(e) => return Err(e),
        };

        Ok(StakeOutcome {
            instance,
            amount,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            pool_open,
        })
    }
}
