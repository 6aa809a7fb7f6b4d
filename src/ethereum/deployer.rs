use crate::ethereum::{
    abi::{Initializer, ITransparentFactory},
    error::ClientError,
    transaction::{GasParams, TransactionConfirmer, TransactionSubmitter, TxRequest},
    DeployedImplementation, DeployedInstance, Receipt,
};
use alloy::{
    primitives::{Address, Bytes, B256},
    sol_types::SolCall,
};
use serde_json::Value;
use tracing::{info, warn};

/// How the new instance's address is read from the factory receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Emitter of the first log whose first topic is this event signature.
    EventSignature(B256),
    /// Emitter of the first log, whatever it is.
    FirstLog,
}

/// Picks the new instance address out of a successful factory receipt.
///
/// Logs emitted by the factory itself never identify the instance.
pub fn extract_instance_address(
    receipt: &Receipt,
    factory: Address,
    source: AddressSource,
) -> Result<Address, ClientError> {
    let tx_hash = receipt.transaction_hash;

    if receipt.logs.is_empty() {
        return Err(ClientError::EmptyLogs { tx_hash });
    }

    let log = match source {
        AddressSource::EventSignature(signature) => receipt
            .logs
            .iter()
            .find(|log| log.signature() == Some(&signature))
            .ok_or(ClientError::CreationEventMissing { tx_hash, signature })?,
        AddressSource::FirstLog => &receipt.logs[0],
    };

    if log.address == factory {
        return Err(ClientError::UnexpectedEmitter {
            tx_hash,
            emitter: log.address,
        });
    }

    Ok(log.address)
}

#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub factory: Address,
    pub implementation: Address,
    pub initializer: Initializer,
    pub init_args: Value,
    pub gas: GasParams,
}

/// Deploys implementations and factory clones.
#[derive(Debug, Clone)]
pub struct CloneDeployer {
    submitter: TransactionSubmitter,
    confirmer: TransactionConfirmer,
    address_source: AddressSource,
}

impl CloneDeployer {
    pub fn new(
        submitter: TransactionSubmitter,
        confirmer: TransactionConfirmer,
        address_source: AddressSource,
    ) -> Self {
        if address_source == AddressSource::FirstLog {
            warn!("No creation event configured; instance address will be read from the first receipt log");
        }
        Self {
            submitter,
            confirmer,
            address_source,
        }
    }

    /// Clones `request.implementation` through the factory and initializes it
    /// in the same transaction. The address is only known once the
    /// transaction is confirmed.
    pub async fn deploy_clone(&self, request: &CloneRequest) -> Result<DeployedInstance, ClientError> {
        let init_calldata = request.initializer.encode(&request.init_args)?;

        let calldata = ITransparentFactory::createContractCall {
            implementation: request.implementation,
            data: init_calldata,
        }
        .abi_encode();

        info!(
            "Cloning 0x{:x} through factory 0x{:x} with {}",
            request.implementation,
            request.factory,
            request.initializer.signature()
        );

        let tx = TxRequest::call(request.factory, calldata, request.gas);
        let handle = self.submitter.submit("createContract", &tx).await?;
        let receipt = self.confirmer.confirm("createContract", &handle).await?;

        let address = extract_instance_address(&receipt, request.factory, self.address_source)?;
        info!("Clone deployed to 0x{:x}", address);

        Ok(DeployedInstance {
            address,
            implementation_address: request.implementation,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }

    /// Deploys contract creation bytecode directly.
    pub async fn deploy_implementation(
        &self,
        bytecode: Bytes,
        gas: GasParams,
    ) -> Result<DeployedImplementation, ClientError> {
        let tx = TxRequest::create(bytecode, gas);
        let handle = self.submitter.submit("deploy", &tx).await?;
        let receipt = self.confirmer.confirm("deploy", &handle).await?;

        let address = receipt
            .contract_address
            .ok_or(ClientError::MissingContractAddress {
                tx_hash: receipt.transaction_hash,
            })?;
        info!("Implementation deployed to 0x{:x}", address);

        Ok(DeployedImplementation {
            address,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}
