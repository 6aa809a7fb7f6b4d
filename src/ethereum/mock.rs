//! Scripted in-memory node used by the workflow tests.

use crate::ethereum::{abi::IDpPool, provider::ChainClient, LogEntry, Receipt};
use alloy::{
    consensus::TxEnvelope,
    eips::eip2718::Decodable2718,
    primitives::{address, b256, keccak256, Address, Bytes, TxHash, TxKind, B256},
    sol_types::{SolCall, SolValue},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

// anvil/hardhat account #0
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const FACTORY: Address = address!("2c3E69CfB6b3cc8879598bd531e6622929e3014e");
pub const IMPLEMENTATION: Address = address!("d20360f9cb804d34523b4EAb96602fD1D30EC9be");
pub const OWNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const TOKEN: Address = address!("F87bD72Da7fb8aDAa4E91AaFAC4100663F4b5A7D");
pub const NEW_INSTANCE: Address = address!("C05580256a3D1357dea4889C1364d2fbc57D632C");

/// keccak256("Initialized(uint64)")
pub const INITIALIZED_TOPIC: B256 =
    b256!("c7f505b2f371ae2175ee4913f4499e1f2633a7b5936321eed1cdaeb6115181d2");

#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: TxHash,
    pub nonce: u64,
    pub to: Option<Address>,
    pub input: Bytes,
    pub gas_limit: u64,
    pub gas_price: u128,
}

#[derive(Debug)]
struct MockState {
    account_nonce: u64,
    nonce_reads: usize,
    polls_until_inclusion: usize,
    head: u64,
    sent: Vec<SentTx>,
    included_at: HashMap<TxHash, u64>,
    inclusion_polls: HashMap<TxHash, usize>,
    receipt_fetches: HashMap<TxHash, usize>,
    creation_logs: Vec<LogEntry>,
    pool_open: bool,
    revert_all: bool,
    reject_next: Option<String>,
    failing_polls: Option<String>,
    stall_polls: bool,
    withhold_receipts: bool,
    omit_contract_address: bool,
    failing_calls: Option<String>,
    calls: usize,
}

#[derive(Debug)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                account_nonce: 0,
                nonce_reads: 0,
                polls_until_inclusion: 1,
                head: 100,
                sent: Vec::new(),
                included_at: HashMap::new(),
                inclusion_polls: HashMap::new(),
                receipt_fetches: HashMap::new(),
                creation_logs: vec![LogEntry {
                    address: NEW_INSTANCE,
                    topics: vec![INITIALIZED_TOPIC],
                    data: Bytes::from(vec![0u8; 32]),
                }],
                pool_open: true,
                revert_all: false,
                reject_next: None,
                failing_polls: None,
                stall_polls: false,
                withhold_receipts: false,
                omit_contract_address: false,
                failing_calls: None,
                calls: 0,
            }),
        }
    }

    pub fn set_account_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().account_nonce = nonce;
    }

    /// Number of inclusion polls that return `None` before the next one
    /// reports the transaction mined.
    pub fn set_polls_until_inclusion(&self, polls: usize) {
        self.state.lock().unwrap().polls_until_inclusion = polls;
    }

    pub fn set_creation_logs(&self, logs: Vec<LogEntry>) {
        self.state.lock().unwrap().creation_logs = logs;
    }

    pub fn set_pool_open(&self, open: bool) {
        self.state.lock().unwrap().pool_open = open;
    }

    pub fn revert_all(&self) {
        self.state.lock().unwrap().revert_all = true;
    }

    pub fn reject_next_submission(&self, message: &str) {
        self.state.lock().unwrap().reject_next = Some(message.to_string());
    }

    /// Every inclusion poll fails with `message`.
    pub fn fail_inclusion_polls(&self, message: &str) {
        self.state.lock().unwrap().failing_polls = Some(message.to_string());
    }

    /// Inclusion polls never answer.
    pub fn stall_inclusion_polls(&self) {
        self.state.lock().unwrap().stall_polls = true;
    }

    /// Transactions get mined but the node has no receipt for them.
    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    /// Creation receipts come back without a contract address.
    pub fn omit_contract_address(&self) {
        self.state.lock().unwrap().omit_contract_address = true;
    }

    /// Every `eth_call` fails with `message`.
    pub fn fail_calls(&self, message: &str) {
        self.state.lock().unwrap().failing_calls = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent().iter().map(|tx| tx.nonce).collect()
    }

    pub fn nonce_reads(&self) -> usize {
        self.state.lock().unwrap().nonce_reads
    }

    pub fn inclusion_polls(&self, hash: TxHash) -> usize {
        self.state
            .lock()
            .unwrap()
            .inclusion_polls
            .get(&hash)
            .copied()
            .unwrap_or(0)
    }

    pub fn receipt_fetches(&self, hash: TxHash) -> usize {
        self.state
            .lock()
            .unwrap()
            .receipt_fetches
            .get(&hash)
            .copied()
            .unwrap_or(0)
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(97)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.nonce_reads += 1;
        Ok(state.account_nonce)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        // Give concurrent submitters a chance to interleave.
        tokio::task::yield_now().await;

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| anyhow!("invalid raw transaction: {}", e))?;
        let tx = match &envelope {
            TxEnvelope::Legacy(signed) => signed.tx().clone(),
            other => return Err(anyhow!("unexpected transaction type {:?}", other.tx_type())),
        };

        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.reject_next.take() {
            return Err(anyhow!("{}", message));
        }
        if state.sent.iter().any(|sent| sent.nonce == tx.nonce) {
            return Err(anyhow!("nonce too low: nonce {} already used", tx.nonce));
        }

        let hash = keccak256(&raw);
        state.account_nonce = state.account_nonce.max(tx.nonce + 1);
        state.sent.push(SentTx {
            hash,
            nonce: tx.nonce,
            to: match tx.to {
                TxKind::Call(to) => Some(to),
                TxKind::Create => None,
            },
            input: tx.input.clone(),
            gas_limit: tx.gas_limit as u64,
            gas_price: tx.gas_price,
        });
        Ok(hash)
    }

    async fn transaction_block(&self, hash: TxHash) -> Result<Option<u64>> {
        let stall = self.state.lock().unwrap().stall_polls;
        if stall {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        if !state.sent.iter().any(|tx| tx.hash == hash) {
            return Ok(None);
        }

        let polls = {
            let polls = state.inclusion_polls.entry(hash).or_insert(0);
            *polls += 1;
            *polls
        };
        if let Some(message) = &state.failing_polls {
            return Err(anyhow!("{}", message));
        }

        // One new block per poll.
        state.head += 1;
        let head = state.head;

        if let Some(block) = state.included_at.get(&hash) {
            return Ok(Some(*block));
        }
        if polls >= state.polls_until_inclusion {
            state.included_at.insert(hash, head);
            return Ok(Some(head));
        }
        Ok(None)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let mut state = self.state.lock().unwrap();
        *state.receipt_fetches.entry(hash).or_insert(0) += 1;

        let Some(block_number) = state.included_at.get(&hash).copied() else {
            return Ok(None);
        };
        if state.withhold_receipts {
            return Ok(None);
        }
        let tx = state
            .sent
            .iter()
            .find(|tx| tx.hash == hash)
            .cloned()
            .ok_or_else(|| anyhow!("unknown transaction"))?;

        let is_stake = tx.input.starts_with(&IDpPool::stakeCall::SELECTOR);
        let success = !state.revert_all && !(is_stake && !state.pool_open);

        let (logs, contract_address) = match tx.to {
            None if state.omit_contract_address => (Vec::new(), None),
            None => (Vec::new(), Some(IMPLEMENTATION)),
            Some(to) if to == FACTORY => (state.creation_logs.clone(), None),
            Some(_) => (Vec::new(), None),
        };

        Ok(Some(Receipt {
            transaction_hash: hash,
            success,
            block_number,
            gas_used: 21_000,
            contract_address: if success { contract_address } else { None },
            logs: if success { logs } else { Vec::new() },
        }))
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(message) = &state.failing_calls {
            return Err(anyhow!("{}", message));
        }

        if data.starts_with(&IDpPool::isOpenCall::SELECTOR) {
            return Ok(state.pool_open.abi_encode().into());
        }
        Err(anyhow!("execution reverted"))
    }
}
