use crate::ethereum::{
    error::ClientError, provider::ChainClient, signer::Signer, utils, Receipt, TxEvent, TxHandle,
};
use alloy::{
    eips::eip2718::Encodable2718,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash},
    rpc::types::TransactionRequest,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Explicit gas parameters. Nothing in this crate asks the node to estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: u64,
    pub gas_price: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTarget {
    Call(Address),
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub target: TxTarget,
    pub input: Bytes,
    pub gas: GasParams,
}

impl TxRequest {
    pub fn call(to: Address, input: impl Into<Bytes>, gas: GasParams) -> Self {
        Self {
            target: TxTarget::Call(to),
            input: input.into(),
            gas,
        }
    }

    pub fn create(bytecode: impl Into<Bytes>, gas: GasParams) -> Self {
        Self {
            target: TxTarget::Create,
            input: bytecode.into(),
            gas,
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.gas.gas_limit == 0 {
            return Err(ClientError::InvalidRequest(
                "gas limit must be positive".to_string(),
            ));
        }
        if self.gas.gas_price == 0 {
            return Err(ClientError::InvalidRequest(
                "gas price must be positive".to_string(),
            ));
        }
        if self.target == TxTarget::Create && self.input.is_empty() {
            return Err(ClientError::InvalidRequest(
                "contract creation requires bytecode".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional listener for submission and confirmation progress.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<UnboundedSender<TxEvent>>,
}

impl EventSink {
    pub fn new(sender: UnboundedSender<TxEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn emit(&self, event: TxEvent) {
        match &event {
            TxEvent::Submitted {
                label,
                tx_hash,
                nonce,
            } => info!("{} submitted: 0x{:x} (nonce {})", label, tx_hash, nonce),
            TxEvent::Confirmed {
                label,
                tx_hash,
                block_number,
                success,
            } => info!(
                "{} confirmed: 0x{:x} in block {} ({})",
                label,
                tx_hash,
                block_number,
                if *success { "success" } else { "reverted" }
            ),
        }

        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is listening any more.
            let _ = sender.send(event);
        }
    }
}

/// Signs requests locally and broadcasts them.
#[derive(Debug, Clone)]
pub struct TransactionSubmitter {
    client: Arc<dyn ChainClient>,
    signer: Arc<Signer>,
    chain_id: u64,
    events: EventSink,
}

impl TransactionSubmitter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        signer: Arc<Signer>,
        chain_id: u64,
        events: EventSink,
    ) -> Self {
        Self {
            client,
            signer,
            chain_id,
            events,
        }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Signs and broadcasts `request`.
    ///
    /// Holds the signer's nonce lock from nonce selection until the node
    /// answers, and only advances the nonce when the node accepted the
    /// transaction. Each call broadcasts a new transaction.
    pub async fn submit(&self, label: &str, request: &TxRequest) -> Result<TxHandle, ClientError> {
        request.validate()?;

        let from = self.signer.address();
        let mut next_nonce = self.signer.nonces().lock().await;

        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => {
                let nonce = self
                    .client
                    .transaction_count(from)
                    .await
                    .map_err(|e| ClientError::Submission {
                        message: format!(
                            "could not read nonce for 0x{:x}: {}",
                            from,
                            utils::interpret_rpc_error(&e.to_string())
                        ),
                    })?;
                debug!("Seeded nonce for 0x{:x} at {}", from, nonce);
                nonce
            }
        };

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(request.gas.gas_limit)
            .with_gas_price(request.gas.gas_price);

        tx = match request.target {
            TxTarget::Call(to) => tx.with_to(to).with_input(request.input.clone()),
            TxTarget::Create => tx.with_deploy_code(request.input.clone()),
        };

        let envelope = tx
            .build(self.signer.wallet())
            .await
            .map_err(|e| ClientError::InvalidRequest(format!("failed to sign transaction: {}", e)))?;
        let local_hash = *envelope.tx_hash();
        let raw: Bytes = envelope.encoded_2718().into();

        let tx_hash = self
            .client
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                let raw = e.to_string();
                if raw.contains("nonce") {
                    // Our view of the account is stale; re-read it next time.
                    *next_nonce = None;
                }
                ClientError::Submission {
                    message: format!("{} (nonce {})", utils::interpret_rpc_error(&raw), nonce),
                }
            })?;

        if tx_hash != local_hash {
            warn!(
                "Node reported hash 0x{:x}, locally computed 0x{:x}",
                tx_hash, local_hash
            );
        }

        *next_nonce = Some(nonce + 1);
        drop(next_nonce);

        self.events.emit(TxEvent::Submitted {
            label: label.to_string(),
            tx_hash,
            nonce,
        });

        Ok(TxHandle {
            hash: tx_hash,
            nonce,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub poll_interval: Duration,
    /// Give up waiting after this long. The transaction itself stays live.
    pub timeout: Option<Duration>,
    /// Blocks required on top of inclusion, counting the inclusion block.
    pub confirmations: u64,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: Some(Duration::from_secs(300)),
            confirmations: 1,
        }
    }
}

/// Waits for inclusion, then fetches the receipt once.
#[derive(Debug, Clone)]
pub struct TransactionConfirmer {
    client: Arc<dyn ChainClient>,
    options: ConfirmOptions,
    events: EventSink,
}

impl TransactionConfirmer {
    pub fn new(client: Arc<dyn ChainClient>, options: ConfirmOptions, events: EventSink) -> Self {
        Self {
            client,
            options,
            events,
        }
    }

    /// Suspends until `handle` is mined and returns its receipt.
    ///
    /// A reverted receipt is returned as `ClientError::Reverted`.
    pub async fn confirm(&self, label: &str, handle: &TxHandle) -> Result<Receipt, ClientError> {
        let tx_hash = handle.hash;
        let started = Instant::now();
        let confirmations = self.options.confirmations.max(1);

        loop {
            let included = self
                .observe(tx_hash, started, self.client.transaction_block(tx_hash))
                .await?;

            if let Some(block) = included {
                if confirmations == 1 {
                    break;
                }

                let head = self
                    .observe(tx_hash, started, self.client.block_number())
                    .await?;

                if head + 1 >= block + confirmations {
                    break;
                }
                debug!(
                    "0x{:x} in block {}, head {}, waiting for {} confirmations",
                    tx_hash, block, head, confirmations
                );
            } else {
                debug!("0x{:x} not yet included", tx_hash);
            }

            if let Some(timeout) = self.options.timeout {
                if started.elapsed() >= timeout {
                    return Err(ClientError::ConfirmationTimeout {
                        tx_hash,
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::time::sleep(self.options.poll_interval).await;
        }

        let receipt = self
            .client
            .transaction_receipt(tx_hash)
            .await
            .map_err(|e| ClientError::Observation {
                tx_hash,
                message: utils::interpret_rpc_error(&e.to_string()),
            })?
            .ok_or_else(|| ClientError::Observation {
                tx_hash,
                message: "transaction is included but the node returned no receipt".to_string(),
            })?;

        self.events.emit(TxEvent::Confirmed {
            label: label.to_string(),
            tx_hash,
            block_number: receipt.block_number,
            success: receipt.success,
        });

        if !receipt.success {
            return Err(ClientError::Reverted {
                tx_hash,
                block_number: receipt.block_number,
            });
        }

        Ok(receipt)
    }
}

impl TransactionConfirmer {
    /// Runs one poll, bounded by whatever is left of the timeout.
    async fn observe<T>(
        &self,
        tx_hash: TxHash,
        started: Instant,
        poll: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, ClientError> {
        let result = match self.options.timeout {
            Some(timeout) => {
                let remaining = timeout.saturating_sub(started.elapsed());
                tokio::time::timeout(remaining, poll).await.map_err(|_| {
                    ClientError::ConfirmationTimeout {
                        tx_hash,
                        waited: started.elapsed(),
                    }
                })?
            }
            None => poll.await,
        };

        result.map_err(|e| ClientError::Observation {
            tx_hash,
            message: utils::interpret_rpc_error(&e.to_string()),
        })
    }
}
