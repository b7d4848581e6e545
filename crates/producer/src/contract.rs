//! The store/retrieve toy contract used to parameterize contract requests.

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, U256};
use tracing::info;

use crate::errors::{ProducerError, Result};
use crate::session::Session;

pub const CONTRACT_ABI: &str = r#"[{"inputs":[],"name":"retrieve","outputs":[{"internalType":"uint64","name":"","type":"uint64"}],"stateMutability":"view","type":"function"},{"inputs":[{"internalType":"uint64","name":"num","type":"uint64"}],"name":"store","outputs":[],"stateMutability":"nonpayable","type":"function"}]"#;

pub const CONTRACT_BIN: &str = "608060405234801561001057600080fd5b50610186806100206000396000f3fe608060405234801561001057600080fd5b50600436106100365760003560e01c80631d9a3bdd1461003b5780632e64cec114610057575b600080fd5b610055600480360381019061005091906100d2565b610075565b005b61005f6100a0565b60405161006c919061010a565b60405180910390f35b806000806101000a81548167ffffffffffffffff021916908367ffffffffffffffff16021790555050565b60008060009054906101000a900467ffffffffffffffff16905090565b6000813590506100cc81610139565b92915050565b6000602082840312156100e457600080fd5b60006100f2848285016100bd565b91505092915050565b61010481610125565b82525050565b600060208201905061011f60008301846100fb565b92915050565b600067ffffffffffffffff82169050919050565b61014281610125565b811461014d57600080fd5b5056fea26469706673582212204691849347a2f1bef4241dc7ceacb8f17c8556dad30e2a1f78e8450c908986a764736f6c63430008040033";

/// Gas limit for deployment and `store` calls.
pub const CONTRACT_GAS_LIMIT: u64 = 210_000;

/// Read-only call descriptor, the shape of an `eth_call` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

fn load_abi() -> Result<JsonAbi> {
    serde_json::from_str::<JsonAbi>(CONTRACT_ABI).map_err(|err| ProducerError::Abi(err.to_string()))
}

/// ABI-encode a call (selector + arguments) to `method` of the toy contract.
pub fn encode_call(method: &str, args: &[DynSolValue]) -> Result<Bytes> {
    let abi = load_abi()?;
    let function = abi
        .function(method)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| ProducerError::Abi(format!("method {method} not found in ABI")))?;
    let encoded = function
        .abi_encode_input(args)
        .map_err(|err| ProducerError::Abi(err.to_string()))?;
    Ok(Bytes::from(encoded))
}

pub fn store_calldata(value: u64) -> Result<Bytes> {
    encode_call("store", &[DynSolValue::Uint(U256::from(value), 64)])
}

pub fn retrieve_calldata() -> Result<Bytes> {
    encode_call("retrieve", &[])
}

pub fn bytecode() -> Result<Bytes> {
    hex::decode(CONTRACT_BIN)
        .map(Bytes::from)
        .map_err(|err| ProducerError::Abi(format!("invalid contract bytecode: {err}")))
}

/// Deploy the contract from the admin account and return its address.
pub fn deploy(session: &Session) -> Result<Address> {
    let receipt = session.submit_from_admin(
        "deploy contract",
        None,
        U256::ZERO,
        CONTRACT_GAS_LIMIT,
        bytecode()?,
    )?;
    let address = receipt
        .contract_address
        .ok_or(ProducerError::MissingContractAddress(receipt.transaction_hash))?;
    info!(contract = %address, "contract deployed");
    Ok(address)
}

/// Invoke `store(value)` on a deployed contract and wait for success.
pub fn store(session: &Session, contract: Address, value: u64) -> Result<()> {
    session.submit_from_admin(
        "invoke contract store",
        Some(contract),
        U256::ZERO,
        CONTRACT_GAS_LIMIT,
        store_calldata(value)?,
    )?;
    info!(contract = %contract, value, "contract value stored");
    Ok(())
}

/// Describe a read-only `retrieve()` call without submitting anything.
pub fn retrieve_call(contract: Address, from: Address) -> Result<CallMessage> {
    Ok(CallMessage {
        from,
        to: contract,
        data: retrieve_calldata()?,
    })
}
