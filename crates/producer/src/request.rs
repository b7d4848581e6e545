//! JSON-RPC request records replayed later by the stress tester.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::contract::CallMessage;
use crate::rpc::{hex_prefixed, hex_quantity};

pub const JSONRPC_VERSION: &str = "2.0";
pub const REQUEST_ID: u64 = 1;

/// One generated RPC call: `{"id":1,"jsonrpc":"2.0","method":..,"params":[..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl RequestRecord {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            id: REQUEST_ID,
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }

    /// The params array as compact JSON.
    pub fn params_json(&self) -> String {
        Value::Array(self.params.clone()).to_string()
    }
}

fn checksum(address: Address) -> Value {
    Value::String(address.to_checksum(None))
}

fn hash(hash: B256) -> Value {
    Value::String(hex_prefixed(hash.as_slice()))
}

pub fn get_balance(address: Address) -> RequestRecord {
    RequestRecord::new("eth_getBalance", vec![checksum(address)])
}

pub fn get_block_by_number(number: u64) -> RequestRecord {
    RequestRecord::new(
        "eth_getBlockByNumber",
        vec![json!(hex_quantity(number)), json!(true)],
    )
}

pub fn get_block_by_hash(block: B256) -> RequestRecord {
    RequestRecord::new("eth_getBlockByHash", vec![hash(block)])
}

pub fn get_code(contract: Address) -> RequestRecord {
    RequestRecord::new("eth_getCode", vec![checksum(contract), json!("latest")])
}

pub fn get_storage_at(address: Address) -> RequestRecord {
    RequestRecord::new(
        "eth_getStorageAt",
        vec![checksum(address), json!("0x0"), json!("latest")],
    )
}

pub fn call(msg: &CallMessage) -> RequestRecord {
    let mut args = Map::new();
    args.insert("from".into(), json!(hex_prefixed(msg.from.as_slice())));
    args.insert("to".into(), json!(hex_prefixed(msg.to.as_slice())));
    if !msg.data.is_empty() {
        args.insert("data".into(), json!(hex_prefixed(&msg.data)));
    }
    RequestRecord::new("eth_call", vec![Value::Object(args)])
}

/// `tx` is a full transaction object (see `generate`), passed as-is.
pub fn estimate_gas(tx: Value) -> RequestRecord {
    RequestRecord::new("eth_estimateGas", vec![tx, json!("latest")])
}

pub fn get_block_transaction_count_by_number(number: u64) -> RequestRecord {
    RequestRecord::new(
        "eth_getBlockTransactionCountByNumber",
        vec![json!(hex_quantity(number))],
    )
}

pub fn get_block_transaction_count_by_hash(block: B256) -> RequestRecord {
    RequestRecord::new("eth_getBlockTransactionCountByHash", vec![hash(block)])
}

pub fn get_transaction_by_block_number_and_index(number: u64, index: u64) -> RequestRecord {
    RequestRecord::new(
        "eth_getTransactionByBlockNumberAndIndex",
        vec![json!(hex_quantity(number)), json!(hex_quantity(index))],
    )
}

pub fn get_transaction_by_block_hash_and_index(block: B256, index: u64) -> RequestRecord {
    RequestRecord::new(
        "eth_getTransactionByBlockHashAndIndex",
        vec![hash(block), json!(hex_quantity(index))],
    )
}

pub fn get_transaction_count(address: Address) -> RequestRecord {
    RequestRecord::new(
        "eth_getTransactionCount",
        vec![checksum(address), json!("latest")],
    )
}

pub fn get_transaction_by_hash(tx: B256) -> RequestRecord {
    RequestRecord::new("eth_getTransactionByHash", vec![hash(tx)])
}

pub fn get_transaction_receipt(tx: B256) -> RequestRecord {
    RequestRecord::new("eth_getTransactionReceipt", vec![hash(tx)])
}

pub fn send_raw_transaction(raw: &[u8]) -> RequestRecord {
    RequestRecord::new("eth_sendRawTransaction", vec![json!(hex_prefixed(raw))])
}
