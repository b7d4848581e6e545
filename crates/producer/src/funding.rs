//! Funding flow: one confirmed admin transfer per stored account.

use alloy::primitives::{B256, U256};
use tracing::info;

use crate::account::Account;
use crate::errors::{ProducerError, Result};
use crate::pool::{PoolOutcome, WorkerPool};
use crate::session::{Session, WEI_PER_UNIT};

/// Default amount sent to each account, in native units.
pub const DEFAULT_FUNDING_AMOUNT: u64 = 1;

/// Convert whole native units to wei.
pub fn units_to_wei(amount: u64) -> Result<U256> {
    U256::from(amount)
        .checked_mul(U256::from(WEI_PER_UNIT))
        .ok_or_else(|| ProducerError::Config(format!("funding amount {amount} overflows")))
}

/// Transfer `value_wei` from the admin to every account in `accounts`.
///
/// Each transfer takes its own admin nonce and must be confirmed before the
/// worker moves on. The returned outcome lists the confirmed transaction hashes.
pub fn fund_accounts(
    session: &Session,
    accounts: &[String],
    value_wei: U256,
    pool: &WorkerPool,
) -> PoolOutcome<Vec<B256>> {
    info!(
        accounts = accounts.len(),
        value_wei = %value_wei,
        "funding accounts from admin"
    );

    let outcome = pool.map(accounts.len(), |index| {
        let account = Account::from_hex(&accounts[index])?;
        session.transfer_from_admin(account.address(), value_wei)
    });

    info!(
        requested = outcome.requested,
        funded = outcome.completed,
        failed_partitions = outcome.failures.len(),
        "funding finished"
    );
    outcome
}
