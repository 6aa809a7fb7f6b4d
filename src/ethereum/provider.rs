use crate::config::NetworkConfig;
use crate::ethereum::{utils, LogEntry, Receipt};
use alloy::{
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Everything the workflows need from a node.
///
/// Implementations map one method to one JSON-RPC request and never retry.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    /// Transaction count of `address` at the pending block.
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash>;

    /// Block the transaction was included in, `None` while pending or unknown.
    async fn transaction_block(&self, hash: TxHash) -> Result<Option<u64>>;

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// `ChainClient` over an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
}

impl RpcClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", rpc_url, e))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// Connects and checks the node serves the configured chain.
    pub async fn connect(network_config: &NetworkConfig) -> Result<Self> {
        let client = Self::new(&network_config.rpc_url)?;

        let chain_id = client.chain_id().await.map_err(|e| {
            anyhow!(
                "Cannot connect to {}: {}. Please check your RPC endpoint configuration and network connectivity.",
                client.rpc_url,
                utils::interpret_rpc_error(&e.to_string())
            )
        })?;

        if chain_id != network_config.chain_id {
            return Err(anyhow!(
                "Chain id mismatch: {} serves chain {}, configuration expects {}",
                client.rpc_url,
                chain_id,
                network_config.chain_id
            ));
        }

        tracing::info!("Connected to {} (chain {})", client.rpc_url, chain_id);
        Ok(client)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_block(&self, hash: TxHash) -> Result<Option<u64>> {
        let tx = self.provider.get_transaction_by_hash(hash).await?;
        Ok(tx.and_then(|tx| tx.block_number))
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        receipt.map(convert_receipt).transpose()
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().to(to).input(data.into());
        Ok(self.provider.call(&request).await?)
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> Result<Receipt> {
    let block_number = receipt.block_number.ok_or_else(|| {
        anyhow!(
            "Receipt for 0x{:x} has no block number",
            receipt.transaction_hash
        )
    })?;

    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| LogEntry {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
        })
        .collect();

    Ok(Receipt {
        transaction_hash: receipt.transaction_hash,
        success: receipt.status(),
        block_number,
        gas_used: receipt.gas_used as u64,
        contract_address: receipt.contract_address,
        logs,
    })
}
