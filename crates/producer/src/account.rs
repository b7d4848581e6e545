//! Generated key-pairs and their on-disk store.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::errors::{ProducerError, Result};
use crate::pool::{PoolOutcome, WorkerPool};

pub const ACCOUNTS_FILE: &str = "accounts";

/// A secp256k1 key-pair used as a workload parameter source.
#[derive(Clone, Debug)]
pub struct Account {
    signer: PrivateKeySigner,
}

impl Account {
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Parse a 32-byte private key given as hex, with or without `0x`.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let normalized = raw.trim().trim_start_matches("0x");
        let bytes = hex::decode(normalized)
            .map_err(|err| ProducerError::InvalidKey(format!("invalid hex: {err}")))?;
        if bytes.len() != 32 {
            return Err(ProducerError::InvalidKey(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
            .map_err(|err| ProducerError::InvalidKey(err.to_string()))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-55 checksummed address string.
    pub fn checksum_address(&self) -> String {
        self.address().to_checksum(None)
    }

    /// Lowercase hex private key without prefix, as stored on disk.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signer.to_bytes())
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

/// What `AccountStore::ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The file already held the requested number of accounts.
    Reused { count: usize },
    /// The file was (re)written; `written` may fall short of `requested`.
    Generated { requested: usize, written: usize },
}

/// Flat file of private keys, one lowercase hex string per line.
#[derive(Debug, Clone)]
pub struct AccountStore {
    dir: PathBuf,
    path: PathBuf,
}

impl AccountStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(ACCOUNTS_FILE);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored private keys. A missing file means `init` never ran.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Err(ProducerError::AccountsNotInitialized(self.path.clone()));
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Make sure exactly `quantity` accounts are on file, regenerating the
    /// whole file when the stored count differs.
    pub fn ensure(&self, quantity: usize, pool: &WorkerPool) -> Result<InitOutcome> {
        if self.path.exists() {
            let stored = self.load()?.len();
            if stored == quantity {
                info!(count = stored, path = %self.path.display(), "accounts already initialized");
                return Ok(InitOutcome::Reused { count: stored });
            }
            info!(stored, requested = quantity, "account count differs, regenerating");
        }

        let outcome = self.generate(quantity, pool)?;
        if !outcome.is_complete() {
            warn!(
                requested = quantity,
                written = outcome.completed,
                "account generation finished with failures"
            );
        }
        Ok(InitOutcome::Generated {
            requested: quantity,
            written: outcome.completed,
        })
    }

    /// Generate `quantity` fresh accounts in parallel and overwrite the file.
    pub fn generate(&self, quantity: usize, pool: &WorkerPool) -> Result<PoolOutcome<()>> {
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.path.with_extension("tmp");
        let writer = Mutex::new(BufWriter::new(fs::File::create(&temp_path)?));

        let outcome = pool.run(
            quantity,
            |_| Ok(Account::random().private_key_hex()),
            |key| {
                let mut writer = writer.lock();
                writer.write_all(key.as_bytes())?;
                writer.write_all(b"\n")?;
                Ok(())
            },
        );

        let mut writer = writer.into_inner();
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, &self.path)?;

        info!(
            written = outcome.completed,
            path = %self.path.display(),
            "accounts written"
        );
        Ok(outcome)
    }
}
