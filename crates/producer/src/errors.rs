use std::path::PathBuf;

use alloy::primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC {method} failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Malformed RPC response for {method}: {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("quantity {requested} is larger than max quantity ({max})")]
    QuantityExceedsCeiling { requested: usize, max: usize },

    #[error("quantity {requested} is larger than account number ({available})")]
    QuantityExceedsAccounts { requested: usize, available: usize },

    #[error("Accounts not initialized at {}; run `init` first", .0.display())]
    AccountsNotInitialized(PathBuf),

    #[error("Receipt for {0} not available yet")]
    ReceiptUnavailable(B256),

    #[error("{what} transaction {hash} failed on-chain")]
    TransactionFailed { what: &'static str, hash: B256 },

    #[error("Receipt for contract deployment {0} carries no contract address")]
    MissingContractAddress(B256),

    #[error("Chain has no blocks beyond genesis")]
    EmptyChain,

    #[error("Block {0} not found")]
    BlockNotFound(u64),

    #[error("No transactions found after sampling {attempts} random blocks")]
    NoTransactionsFound { attempts: u32 },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ProducerError>;
