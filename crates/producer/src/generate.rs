//! Request generation: one setup phase per method, then a per-account builder
//! fanned out over the worker pool.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::account::Account;
use crate::contract::{self, CONTRACT_GAS_LIMIT};
use crate::errors::{ProducerError, Result};
use crate::pool::{PoolOutcome, WorkerPool};
use crate::request::{self, RequestRecord};
use crate::rpc::{BlockSummary, ChainEndpoint};
use crate::session::{LegacyRequest, Session};

/// Hard ceiling on records per generation run.
pub const MAX_QUANTITY: usize = 2_000_000;
pub const DEFAULT_TX_LOOKUP_ATTEMPTS: u32 = 64;
pub const DEFAULT_BLOCK_HASH_SAMPLES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum RpcMethod {
    #[value(name = "eth_getBalance")]
    GetBalance,
    #[value(name = "eth_getBlockByNumber")]
    GetBlockByNumber,
    #[value(name = "eth_getBlockByHash")]
    GetBlockByHash,
    #[value(name = "eth_getCode")]
    GetCode,
    #[value(name = "eth_getStorageAt")]
    GetStorageAt,
    #[value(name = "eth_call")]
    Call,
    #[value(name = "eth_estimateGas")]
    EstimateGas,
    #[value(name = "eth_getBlockTransactionCountByNumber")]
    GetBlockTransactionCountByNumber,
    #[value(name = "eth_getBlockTransactionCountByHash")]
    GetBlockTransactionCountByHash,
    #[value(name = "eth_getTransactionByBlockNumberAndIndex")]
    GetTransactionByBlockNumberAndIndex,
    #[value(name = "eth_getTransactionByBlockHashAndIndex")]
    GetTransactionByBlockHashAndIndex,
    #[value(name = "eth_getTransactionCount")]
    GetTransactionCount,
    #[value(name = "eth_getTransactionByHash")]
    GetTransactionByHash,
    #[value(name = "eth_getTransactionReceipt")]
    GetTransactionReceipt,
    #[value(name = "eth_sendRawTransaction")]
    SendRawTransaction,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 15] = [
        RpcMethod::GetBalance,
        RpcMethod::GetBlockByNumber,
        RpcMethod::GetBlockByHash,
        RpcMethod::GetCode,
        RpcMethod::GetStorageAt,
        RpcMethod::Call,
        RpcMethod::EstimateGas,
        RpcMethod::GetBlockTransactionCountByNumber,
        RpcMethod::GetBlockTransactionCountByHash,
        RpcMethod::GetTransactionByBlockNumberAndIndex,
        RpcMethod::GetTransactionByBlockHashAndIndex,
        RpcMethod::GetTransactionCount,
        RpcMethod::GetTransactionByHash,
        RpcMethod::GetTransactionReceipt,
        RpcMethod::SendRawTransaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::GetBalance => "eth_getBalance",
            RpcMethod::GetBlockByNumber => "eth_getBlockByNumber",
            RpcMethod::GetBlockByHash => "eth_getBlockByHash",
            RpcMethod::GetCode => "eth_getCode",
            RpcMethod::GetStorageAt => "eth_getStorageAt",
            RpcMethod::Call => "eth_call",
            RpcMethod::EstimateGas => "eth_estimateGas",
            RpcMethod::GetBlockTransactionCountByNumber => "eth_getBlockTransactionCountByNumber",
            RpcMethod::GetBlockTransactionCountByHash => "eth_getBlockTransactionCountByHash",
            RpcMethod::GetTransactionByBlockNumberAndIndex => {
                "eth_getTransactionByBlockNumberAndIndex"
            }
            RpcMethod::GetTransactionByBlockHashAndIndex => "eth_getTransactionByBlockHashAndIndex",
            RpcMethod::GetTransactionCount => "eth_getTransactionCount",
            RpcMethod::GetTransactionByHash => "eth_getTransactionByHash",
            RpcMethod::GetTransactionReceipt => "eth_getTransactionReceipt",
            RpcMethod::SendRawTransaction => "eth_sendRawTransaction",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcMethod {
    type Err = ProducerError;

    fn from_str(s: &str) -> Result<Self> {
        RpcMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ProducerError::Config(format!("unknown RPC method {s}")))
    }
}

/// Knobs for the setup phase.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    /// Random blocks to inspect before giving up on finding a transaction.
    pub tx_lookup_attempts: u32,
    /// Distinct random block hashes drawn for `eth_getBlockByHash`.
    pub block_hash_samples: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tx_lookup_attempts: DEFAULT_TX_LOOKUP_ATTEMPTS,
            block_hash_samples: DEFAULT_BLOCK_HASH_SAMPLES,
        }
    }
}

/// Per-account record builder produced by a method's setup phase.
type Builder<'s> = Box<dyn Fn(&str) -> Result<RequestRecord> + Sync + 's>;

/// A validated generation request. Construction performs every check that
/// must pass before the endpoint is contacted or a worker starts.
#[derive(Debug)]
pub struct GenerationPlan<'a> {
    method: RpcMethod,
    quantity: usize,
    accounts: &'a [String],
}

impl<'a> GenerationPlan<'a> {
    pub fn new(
        method: RpcMethod,
        quantity: usize,
        accounts: &'a [String],
        max_quantity: usize,
    ) -> Result<Self> {
        if quantity > max_quantity {
            return Err(ProducerError::QuantityExceedsCeiling {
                requested: quantity,
                max: max_quantity,
            });
        }
        if quantity > accounts.len() {
            return Err(ProducerError::QuantityExceedsAccounts {
                requested: quantity,
                available: accounts.len(),
            });
        }
        Ok(Self {
            method,
            quantity,
            accounts,
        })
    }

    pub fn method(&self) -> RpcMethod {
        self.method
    }

    pub fn quantity(&self) -> usize {
        self.quantity
    }

    /// Run the setup phase once, then build one record per account.
    pub fn execute(
        &self,
        session: &Session,
        pool: &WorkerPool,
        settings: &GenerationSettings,
    ) -> Result<PoolOutcome<Vec<RequestRecord>>> {
        info!(method = %self.method, quantity = self.quantity, "preparing request generation");
        let builder = prepare(self.method, session, settings, self.quantity)?;

        let outcome = pool.map(self.quantity, |index| builder(&self.accounts[index]));
        info!(
            method = %self.method,
            requested = outcome.requested,
            generated = outcome.completed,
            failed_partitions = outcome.failures.len(),
            "request generation finished"
        );
        Ok(outcome)
    }
}

fn build<'s, F>(f: F) -> Builder<'s>
where
    F: Fn(&str) -> Result<RequestRecord> + Sync + 's,
{
    Box::new(f)
}

fn address_of(key: &str) -> Result<Address> {
    Ok(Account::from_hex(key)?.address())
}

fn random_number(height: u64) -> u64 {
    rand::thread_rng().gen_range(1..=height)
}

/// The setup phase: every endpoint call a method needs, done once.
fn prepare<'s>(
    method: RpcMethod,
    session: &'s Session,
    settings: &GenerationSettings,
    quantity: usize,
) -> Result<Builder<'s>> {
    let endpoint = session.endpoint();
    let builder: Builder<'s> = match method {
        RpcMethod::GetBalance => build(|key| Ok(request::get_balance(address_of(key)?))),
        RpcMethod::GetStorageAt => build(|key| Ok(request::get_storage_at(address_of(key)?))),
        RpcMethod::GetTransactionCount => {
            build(|key| Ok(request::get_transaction_count(address_of(key)?)))
        }
        RpcMethod::GetBlockByNumber => {
            let height = block_height(endpoint)?;
            build(move |_| Ok(request::get_block_by_number(random_number(height))))
        }
        RpcMethod::GetBlockTransactionCountByNumber => {
            let height = block_height(endpoint)?;
            build(move |_| {
                Ok(request::get_block_transaction_count_by_number(
                    random_number(height),
                ))
            })
        }
        RpcMethod::GetTransactionByBlockNumberAndIndex => {
            let height = block_height(endpoint)?;
            build(move |_| {
                Ok(request::get_transaction_by_block_number_and_index(
                    random_number(height),
                    0,
                ))
            })
        }
        RpcMethod::GetBlockByHash => {
            let samples = settings.block_hash_samples.clamp(1, quantity.max(1));
            let hashes = sample_block_hashes(endpoint, samples)?;
            build(move |_| {
                let hash = hashes
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .ok_or(ProducerError::EmptyChain)?;
                Ok(request::get_block_by_hash(hash))
            })
        }
        RpcMethod::GetBlockTransactionCountByHash => {
            let hash = random_block(endpoint)?.hash;
            build(move |_| Ok(request::get_block_transaction_count_by_hash(hash)))
        }
        RpcMethod::GetTransactionByBlockHashAndIndex => {
            let hash = random_block(endpoint)?.hash;
            build(move |_| Ok(request::get_transaction_by_block_hash_and_index(hash, 0)))
        }
        RpcMethod::GetTransactionByHash => {
            let hash = random_transaction_hash(endpoint, settings.tx_lookup_attempts)?;
            build(move |_| Ok(request::get_transaction_by_hash(hash)))
        }
        RpcMethod::GetTransactionReceipt => {
            let hash = random_transaction_hash(endpoint, settings.tx_lookup_attempts)?;
            build(move |_| Ok(request::get_transaction_receipt(hash)))
        }
        RpcMethod::GetCode => {
            let contract = contract::deploy(session)?;
            build(move |_| Ok(request::get_code(contract)))
        }
        RpcMethod::Call => {
            let contract = contract::deploy(session)?;
            contract::store(session, contract, 1)?;
            build(move |key| {
                let msg = contract::retrieve_call(contract, address_of(key)?)?;
                Ok(request::call(&msg))
            })
        }
        RpcMethod::EstimateGas => {
            let contract = contract::deploy(session)?;
            // Signed by the admin but never submitted: the nonce is stamped, not reserved.
            let tx = session.sign(
                session.admin(),
                LegacyRequest {
                    nonce: session.nonces().current(),
                    to: Some(contract),
                    input: contract::store_calldata(1)?,
                    ..LegacyRequest::default()
                },
            )?;
            let object = tx.rpc_object();
            build(move |_| Ok(request::estimate_gas(object.clone())))
        }
        RpcMethod::SendRawTransaction => {
            let contract = contract::deploy(session)?;
            let gas_price = endpoint.gas_price()?;
            let input = contract::store_calldata(1)?;
            build(move |key| {
                let account = Account::from_hex(key)?;
                // Each account signs its own transaction, so its own nonce applies.
                let nonce = session.endpoint().pending_nonce_at(account.address())?;
                let tx = session.sign(
                    &account,
                    LegacyRequest {
                        nonce,
                        gas_price,
                        gas_limit: CONTRACT_GAS_LIMIT,
                        to: Some(contract),
                        value: U256::ZERO,
                        input: input.clone(),
                    },
                )?;
                Ok(request::send_raw_transaction(&tx.raw))
            })
        }
    };
    Ok(builder)
}

/// Current chain height; an empty chain cannot parameterize block lookups.
pub fn block_height(endpoint: &dyn ChainEndpoint) -> Result<u64> {
    let height = endpoint.block_number()?;
    if height == 0 {
        return Err(ProducerError::EmptyChain);
    }
    Ok(height)
}

/// A block picked uniformly from `[1, height]`.
pub fn random_block(endpoint: &dyn ChainEndpoint) -> Result<BlockSummary> {
    let height = block_height(endpoint)?;
    let number = random_number(height);
    let block = endpoint
        .block_by_number(number)?
        .ok_or(ProducerError::BlockNotFound(number))?;
    debug!(number, hash = %block.hash, "picked random block");
    Ok(block)
}

/// Up to `count` random block hashes (duplicates removed).
pub fn sample_block_hashes(endpoint: &dyn ChainEndpoint, count: usize) -> Result<Vec<B256>> {
    let mut hashes = Vec::with_capacity(count);
    for _ in 0..count.max(1) {
        let hash = random_block(endpoint)?.hash;
        if !hashes.contains(&hash) {
            hashes.push(hash);
        }
    }
    Ok(hashes)
}

/// Hash of the first transaction of a random non-empty block. Empty blocks
/// trigger another draw, up to `attempts` draws in total.
pub fn random_transaction_hash(endpoint: &dyn ChainEndpoint, attempts: u32) -> Result<B256> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let block = random_block(endpoint)?;
        if let Some(hash) = block.transactions.first() {
            return Ok(*hash);
        }
        debug!(attempt, block = block.number, "block has no transactions, drawing again");
    }
    Err(ProducerError::NoTransactionsFound { attempts })
}
