//! In-memory endpoint shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::consensus::{Signed, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, TxKind, B256};
use data_producer::config::DEFAULT_ADMIN_PRIVATE_KEY;
use data_producer::errors::Result;
use data_producer::retry::RetryPolicy;
use data_producer::rpc::{BlockSummary, ChainEndpoint, TransactionReceipt};
use data_producer::{Account, Session};
use parking_lot::Mutex;

pub const CHAIN_ID: u64 = 1337;
pub const ADMIN_PENDING_NONCE: u64 = 40;
pub const ACCOUNT_PENDING_NONCE: u64 = 3;
pub const GAS_PRICE: u128 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub hash: B256,
    pub raw: Vec<u8>,
    pub tx: Signed<TxLegacy>,
}

/// Records every call. Transactions are mined instantly unless their
/// recipient is marked unreachable (no receipt ever appears) or failing
/// (the receipt reports status 0).
pub struct MockEndpoint {
    admin: Address,
    height: u64,
    contract: Address,
    deploys_report_address: bool,
    block_transactions: HashMap<u64, Vec<B256>>,
    unreachable: HashSet<Address>,
    failing: HashSet<Address>,
    sent: Mutex<Vec<SentTransaction>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    receipt_polls: Mutex<HashMap<B256, usize>>,
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self {
            admin: admin().address(),
            height: 100,
            contract: Address::repeat_byte(0xc0),
            deploys_report_address: true,
            block_transactions: HashMap::new(),
            unreachable: HashSet::new(),
            failing: HashSet::new(),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            receipt_polls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn with_block_transactions(mut self, number: u64, txs: Vec<B256>) -> Self {
        self.block_transactions.insert(number, txs);
        self
    }

    pub fn with_unreachable(mut self, address: Address) -> Self {
        self.unreachable.insert(address);
        self
    }

    pub fn with_failing(mut self, address: Address) -> Self {
        self.failing.insert(address);
        self
    }

    /// Deployment receipts come back without a `contractAddress`.
    pub fn without_contract_address(mut self) -> Self {
        self.deploys_report_address = false;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn block_hash(number: u64) -> B256 {
        B256::left_padding_from(&number.to_be_bytes())
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.sent.lock().clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn receipt_polls(&self, hash: B256) -> usize {
        self.receipt_polls.lock().get(&hash).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().entry(method).or_default() += 1;
    }
}

impl ChainEndpoint for MockEndpoint {
    fn pending_nonce_at(&self, address: Address) -> Result<u64> {
        self.record("eth_getTransactionCount");
        Ok(if address == self.admin {
            ADMIN_PENDING_NONCE
        } else {
            ACCOUNT_PENDING_NONCE
        })
    }

    fn gas_price(&self) -> Result<u128> {
        self.record("eth_gasPrice");
        Ok(GAS_PRICE)
    }

    fn chain_id(&self) -> Result<u64> {
        self.record("eth_chainId");
        Ok(CHAIN_ID)
    }

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        self.record("eth_sendRawTransaction");
        let envelope = TxEnvelope::decode_2718(&mut &raw[..]).expect("valid raw transaction");
        let tx = envelope
            .as_legacy()
            .expect("legacy transaction")
            .clone();
        let hash = keccak256(raw);
        self.sent.lock().push(SentTransaction {
            hash,
            raw: raw.to_vec(),
            tx,
        });
        Ok(hash)
    }

    fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.record("eth_getTransactionReceipt");
        *self.receipt_polls.lock().entry(hash).or_default() += 1;

        let sent = self.sent.lock();
        let Some(entry) = sent.iter().find(|s| s.hash == hash) else {
            return Ok(None);
        };
        let (succeeded, contract_address) = match entry.tx.tx().to {
            TxKind::Call(to) if self.unreachable.contains(&to) => return Ok(None),
            TxKind::Call(to) => (!self.failing.contains(&to), None),
            TxKind::Create => (true, self.deploys_report_address.then_some(self.contract)),
        };
        Ok(Some(TransactionReceipt {
            transaction_hash: hash,
            succeeded,
            contract_address,
            block_number: Some(self.height),
        }))
    }

    fn block_number(&self) -> Result<u64> {
        self.record("eth_blockNumber");
        Ok(self.height)
    }

    fn block_by_number(&self, number: u64) -> Result<Option<BlockSummary>> {
        self.record("eth_getBlockByNumber");
        if number == 0 || number > self.height {
            return Ok(None);
        }
        Ok(Some(BlockSummary {
            number,
            hash: Self::block_hash(number),
            transactions: self
                .block_transactions
                .get(&number)
                .cloned()
                .unwrap_or_default(),
        }))
    }
}

pub fn admin() -> Account {
    Account::from_hex(DEFAULT_ADMIN_PRIVATE_KEY).expect("admin key")
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

pub fn session(mock: &Arc<MockEndpoint>) -> Session {
    let endpoint: Arc<dyn ChainEndpoint> = mock.clone();
    Session::connect(endpoint, admin(), fast_retry()).expect("session")
}

pub fn random_accounts(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| Account::random().private_key_hex())
        .collect()
}
