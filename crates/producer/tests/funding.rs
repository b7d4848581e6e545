mod common;

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{TxKind, U256};
use common::*;
use data_producer::funding::{fund_accounts, units_to_wei};
use data_producer::session::TRANSFER_GAS_LIMIT;
use data_producer::{Account, ProducerError, WorkerPool};

#[test]
fn funds_every_account_with_unique_contiguous_nonces() {
    let mock = Arc::new(MockEndpoint::new());
    let session = session(&mock);
    let accounts = random_accounts(20);
    let value = units_to_wei(2).unwrap();

    let outcome = fund_accounts(&session, &accounts, value, &WorkerPool::new(8));

    assert!(outcome.is_complete());
    assert_eq!(outcome.output.len(), 20);

    let sent = mock.sent();
    assert_eq!(sent.len(), 20);
    let nonces: HashSet<u64> = sent.iter().map(|s| s.tx.tx().nonce).collect();
    let expected: HashSet<u64> = (ADMIN_PENDING_NONCE..ADMIN_PENDING_NONCE + 20).collect();
    assert_eq!(nonces, expected);

    let recipients: HashSet<_> = sent
        .iter()
        .map(|s| match s.tx.tx().to {
            TxKind::Call(to) => to,
            TxKind::Create => panic!("funding never creates contracts"),
        })
        .collect();
    for key in &accounts {
        assert!(recipients.contains(&Account::from_hex(key).unwrap().address()));
    }

    for s in &sent {
        let tx = s.tx.tx();
        assert_eq!(tx.value, U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(tx.gas_limit, TRANSFER_GAS_LIMIT);
        assert_eq!(tx.gas_price, GAS_PRICE);
        assert_eq!(tx.chain_id, Some(CHAIN_ID));
    }
}

#[test]
fn unconfirmed_transfer_truncates_only_its_partition() {
    let accounts = random_accounts(6);
    let stuck = Account::from_hex(&accounts[2]).unwrap().address();
    let mock = Arc::new(MockEndpoint::new().with_unreachable(stuck));
    let session = session(&mock);

    // Partitions [0,2) [2,4) [4,6): index 2 fails, so index 3 is never attempted.
    let outcome = fund_accounts(&session, &accounts, U256::from(1), &WorkerPool::new(3));

    assert!(!outcome.is_complete());
    assert_eq!(outcome.completed, 4);
    assert_eq!(outcome.missing(), 2);
    assert_eq!(outcome.output.len(), 4);
    assert_eq!(outcome.failures.len(), 1);

    let failure = &outcome.failures[0];
    assert_eq!(failure.partition, 1);
    assert_eq!(failure.index, 2);
    assert_eq!(failure.abandoned(), 2);
    assert!(matches!(failure.error, ProducerError::ReceiptUnavailable(_)));

    let sent = mock.sent();
    assert_eq!(sent.len(), 5);
    let stuck_tx = sent
        .iter()
        .find(|s| s.tx.tx().to == TxKind::Call(stuck))
        .unwrap();
    assert_eq!(mock.receipt_polls(stuck_tx.hash), 3);
    assert!(!outcome.output.contains(&stuck_tx.hash));

    let skipped = Account::from_hex(&accounts[3]).unwrap().address();
    assert!(sent.iter().all(|s| s.tx.tx().to != TxKind::Call(skipped)));
}

#[test]
fn invalid_stored_key_fails_its_item() {
    let mock = Arc::new(MockEndpoint::new());
    let session = session(&mock);
    let mut accounts = random_accounts(2);
    accounts.insert(0, "not-a-key".to_string());

    let outcome = fund_accounts(&session, &accounts, U256::from(1), &WorkerPool::new(1));

    assert_eq!(outcome.completed, 0);
    assert!(matches!(
        outcome.failures[0].error,
        ProducerError::InvalidKey(_)
    ));
    assert!(mock.sent().is_empty());
}

#[test]
fn empty_account_list_sends_nothing() {
    let mock = Arc::new(MockEndpoint::new());
    let session = session(&mock);

    let outcome = fund_accounts(&session, &[], U256::from(1), &WorkerPool::default());

    assert!(outcome.is_complete());
    assert!(outcome.output.is_empty());
    assert_eq!(mock.calls("eth_sendRawTransaction"), 0);
}

#[test]
fn failed_status_truncates_only_its_partition() {
    let accounts = random_accounts(6);
    let reverted = Account::from_hex(&accounts[2]).unwrap().address();
    let mock = Arc::new(MockEndpoint::new().with_failing(reverted));
    let session = session(&mock);

    let outcome = fund_accounts(&session, &accounts, U256::from(1), &WorkerPool::new(3));

    assert_eq!(outcome.completed, 4);
    assert_eq!(outcome.output.len(), 4);
    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.index, 2);
    assert_eq!(failure.abandoned(), 2);
    assert!(matches!(
        failure.error,
        ProducerError::TransactionFailed { what: "transfer", .. }
    ));

    let sent = mock.sent();
    let reverted_tx = sent
        .iter()
        .find(|s| s.tx.tx().to == TxKind::Call(reverted))
        .unwrap();
    assert_eq!(mock.receipt_polls(reverted_tx.hash), 3);
    assert!(!outcome.output.contains(&reverted_tx.hash));

    // Partitions [0,2) and [4,6) are untouched.
    for index in [0, 1, 4, 5] {
        let to = Account::from_hex(&accounts[index]).unwrap().address();
        let tx = sent.iter().find(|s| s.tx.tx().to == TxKind::Call(to)).unwrap();
        assert!(outcome.output.contains(&tx.hash));
        assert_eq!(mock.receipt_polls(tx.hash), 1);
    }
}
