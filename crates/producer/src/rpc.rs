//! JSON-RPC access to the chain under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256, U128, U64};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;
use url::Url;

use crate::errors::{ProducerError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The endpoint operations the producer depends on.
///
/// Implementations are shared read-only between worker threads.
pub trait ChainEndpoint: Send + Sync {
    fn pending_nonce_at(&self, address: Address) -> Result<u64>;

    fn gas_price(&self) -> Result<u128>;

    fn chain_id(&self) -> Result<u64>;

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256>;

    /// `Ok(None)` while the transaction is not yet included.
    fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>>;

    fn block_number(&self) -> Result<u64>;

    fn block_by_number(&self, number: u64) -> Result<Option<BlockSummary>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub succeeded: bool,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub hash: B256,
    pub transactions: Vec<B256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    block_number: Option<U64>,
}

impl From<ReceiptResponse> for TransactionReceipt {
    fn from(dto: ReceiptResponse) -> Self {
        Self {
            transaction_hash: dto.transaction_hash,
            succeeded: dto.status.map(|s| s.to::<u64>() == 1).unwrap_or(false),
            contract_address: dto.contract_address,
            block_number: dto.block_number.map(|n| n.to::<u64>()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    number: U64,
    hash: B256,
    #[serde(default)]
    transactions: Vec<B256>,
}

impl From<BlockResponse> for BlockSummary {
    fn from(dto: BlockResponse) -> Self {
        Self {
            number: dto.number.to::<u64>(),
            hash: dto.hash,
            transactions: dto.transactions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Blocking HTTP JSON-RPC 2.0 client.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: reqwest::blocking::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Validate the URL and build the HTTP client. No request is sent.
    pub fn dial(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|err| ProducerError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProducerError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: parsed,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "rpc call");

        let envelope: RpcEnvelope = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        if let Some(err) = envelope.error {
            return Err(ProducerError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|err| ProducerError::MalformedResponse {
            method: method.to_string(),
            reason: err.to_string(),
        })
    }
}

impl ChainEndpoint for JsonRpcClient {
    fn pending_nonce_at(&self, address: Address) -> Result<u64> {
        let nonce: U64 = self.call("eth_getTransactionCount", json!([address, "pending"]))?;
        Ok(nonce.to::<u64>())
    }

    fn gas_price(&self) -> Result<u128> {
        let price: U128 = self.call("eth_gasPrice", json!([]))?;
        Ok(price.to::<u128>())
    }

    fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.call("eth_chainId", json!([]))?;
        Ok(id.to::<u64>())
    }

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        self.call("eth_sendRawTransaction", json!([hex_prefixed(raw)]))
    }

    fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let receipt: Option<ReceiptResponse> =
            self.call("eth_getTransactionReceipt", json!([hash]))?;
        Ok(receipt.map(TransactionReceipt::from))
    }

    fn block_number(&self) -> Result<u64> {
        let number: U64 = self.call("eth_blockNumber", json!([]))?;
        Ok(number.to::<u64>())
    }

    fn block_by_number(&self, number: u64) -> Result<Option<BlockSummary>> {
        let block: Option<BlockResponse> =
            self.call("eth_getBlockByNumber", json!([hex_quantity(number), false]))?;
        Ok(block.map(BlockSummary::from))
    }
}

/// `0x`-prefixed minimal hex quantity, `0x0` for zero.
pub fn hex_quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// `0x`-prefixed hex data.
pub fn hex_prefixed(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
