//! Per-run context: endpoint handle, admin key, chain id and admin nonces.

use std::sync::Arc;

use alloy::consensus::{SignableTransaction, Signed, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::SignerSync;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::account::Account;
use crate::errors::{ProducerError, Result};
use crate::nonce::NonceSequencer;
use crate::retry::RetryPolicy;
use crate::rpc::{hex_prefixed, hex_quantity, ChainEndpoint, TransactionReceipt};

/// Gas limit of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Wei per native unit.
pub const WEI_PER_UNIT: u128 = 1_000_000_000_000_000_000;

/// Fields of a legacy transaction before signing.
#[derive(Debug, Clone, Default)]
pub struct LegacyRequest {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

/// A signed legacy transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signed: Signed<TxLegacy>,
    pub hash: B256,
    pub raw: Vec<u8>,
}

impl SignedTransaction {
    /// JSON transaction object in the shape nodes return from
    /// `eth_getTransactionByHash`, used as an `eth_estimateGas` argument.
    pub fn rpc_object(&self) -> Value {
        let tx = self.signed.tx();
        let signature = self.signed.signature();
        let chain_id = tx.chain_id.unwrap_or_default();
        let v = eip155_v(chain_id, signature.v());

        let mut object = json!({
            "type": "0x0",
            "chainId": hex_quantity(chain_id),
            "nonce": hex_quantity(tx.nonce),
            "gas": hex_quantity(tx.gas_limit),
            "gasPrice": format!("0x{:x}", tx.gas_price),
            "value": format!("0x{:x}", tx.value),
            "input": hex_prefixed(&tx.input),
            "v": format!("{v:#x}"),
            "r": format!("0x{:x}", signature.r()),
            "s": format!("0x{:x}", signature.s()),
            "hash": hex_prefixed(self.hash.as_slice()),
        });
        if let TxKind::Call(to) = tx.to {
            object["to"] = json!(hex_prefixed(to.as_slice()));
        }
        object
    }
}

/// EIP-155 `v`: `chain_id * 2 + 35 + parity`. Wide enough for any `u64` chain id.
pub fn eip155_v(chain_id: u64, odd_y_parity: bool) -> u128 {
    u128::from(chain_id) * 2 + 35 + u128::from(odd_y_parity)
}

/// Explicit replacement for process-wide client and nonce state: every flow
/// that talks to the chain borrows one `Session`.
pub struct Session {
    endpoint: Arc<dyn ChainEndpoint>,
    admin: Account,
    chain_id: u64,
    nonce: NonceSequencer,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("admin", &self.admin.address())
            .field("chain_id", &self.chain_id)
            .field("nonce", &self.nonce)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Session {
    /// Resolve the chain id and seed the admin nonce sequencer. Must complete
    /// before any admin transaction is built.
    pub fn connect(
        endpoint: Arc<dyn ChainEndpoint>,
        admin: Account,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let chain_id = endpoint.chain_id()?;
        let pending = endpoint.pending_nonce_at(admin.address())?;
        info!(
            admin = %admin.checksum_address(),
            chain_id,
            pending_nonce = pending,
            "session initialized"
        );

        Ok(Self {
            endpoint,
            admin,
            chain_id,
            nonce: NonceSequencer::from_pending(pending),
            retry,
        })
    }

    pub fn endpoint(&self) -> &dyn ChainEndpoint {
        self.endpoint.as_ref()
    }

    pub fn admin(&self) -> &Account {
        &self.admin
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonce
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// EIP-155 sign a legacy transaction under the session chain id.
    pub fn sign(&self, signer: &Account, request: LegacyRequest) -> Result<SignedTransaction> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: request.nonce,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            to: request.to.map(TxKind::Call).unwrap_or(TxKind::Create),
            value: request.value,
            input: request.input,
        };

        let signature = signer
            .signer()
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|err| ProducerError::Signing(err.to_string()))?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::Legacy(signed.clone()).encoded_2718();

        Ok(SignedTransaction { signed, hash, raw })
    }

    /// Build, sign, submit and confirm a transaction from the admin key.
    ///
    /// The nonce is reserved right before signing, after the gas price lookup.
    pub fn submit_from_admin(
        &self,
        what: &'static str,
        to: Option<Address>,
        value: U256,
        gas_limit: u64,
        input: Bytes,
    ) -> Result<TransactionReceipt> {
        let gas_price = self.endpoint.gas_price()?;
        let request = LegacyRequest {
            nonce: self.nonce.next(),
            gas_price,
            gas_limit,
            to,
            value,
            input,
        };
        let nonce = request.nonce;
        let tx = self.sign(&self.admin, request)?;

        let hash = self.endpoint.send_raw_transaction(&tx.raw)?;
        debug!(what, nonce, %hash, "transaction submitted");
        self.confirm(what, hash)
    }

    /// Poll for a successful receipt under the session retry policy.
    pub fn confirm(&self, what: &'static str, hash: B256) -> Result<TransactionReceipt> {
        self.retry.run(|_| {
            let receipt = self
                .endpoint
                .transaction_receipt(hash)?
                .ok_or(ProducerError::ReceiptUnavailable(hash))?;
            if !receipt.succeeded {
                return Err(ProducerError::TransactionFailed { what, hash });
            }
            Ok(receipt)
        })
    }

    /// Send `value` wei from the admin account to `to` and wait for success.
    pub fn transfer_from_admin(&self, to: Address, value: U256) -> Result<B256> {
        let receipt =
            self.submit_from_admin("transfer", Some(to), value, TRANSFER_GAS_LIMIT, Bytes::new())?;
        Ok(receipt.transaction_hash)
    }
}
