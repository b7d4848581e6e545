//! Data Producer
//!
//! Builds synthetic JSON-RPC workloads for stress testing Ethereum-compatible
//! endpoints: a persisted pool of funded accounts, a toy storage contract, and
//! one request file per RPC method.

pub mod account;
pub mod cli;
pub mod config;
pub mod contract;
pub mod errors;
pub mod funding;
pub mod generate;
pub mod logging;
pub mod nonce;
pub mod output;
pub mod pool;
pub mod request;
pub mod retry;
pub mod rpc;
pub mod session;

pub use account::{Account, AccountStore, InitOutcome};
pub use config::ProducerConfig;
pub use errors::{ProducerError, Result};
pub use generate::{GenerationPlan, GenerationSettings, RpcMethod};
pub use pool::{PartitionPlan, PoolOutcome, WorkerPool};
pub use request::RequestRecord;
pub use rpc::{BlockSummary, ChainEndpoint, JsonRpcClient, TransactionReceipt};
pub use session::Session;
