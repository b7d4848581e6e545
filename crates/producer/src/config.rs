//! Layered configuration: defaults, then a TOML file, then environment
//! variables, then command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProducerError, Result};
use crate::generate::{
    GenerationSettings, DEFAULT_BLOCK_HASH_SAMPLES, DEFAULT_TX_LOOKUP_ATTEMPTS, MAX_QUANTITY,
};
use crate::output::OutputFormat;
use crate::pool::{WorkerPool, DEFAULT_PARALLELISM};
use crate::retry::{RetryPolicy, DEFAULT_RECEIPT_ATTEMPTS, DEFAULT_RECEIPT_DELAY};

pub const DEFAULT_URL: &str = "http://localhost:8881";
pub const DEFAULT_DATA_DIR: &str = ".data_producer";
pub const CONFIG_FILE: &str = "config.toml";

/// Well-known development key that funds every generated account.
pub const DEFAULT_ADMIN_PRIVATE_KEY: &str =
    "b6477143e17f889263044f6cf463dc37177ac4526c4c39a7a344198457024a2f";

pub const ENV_URL: &str = "DATA_PRODUCER_URL";
pub const ENV_ADMIN_KEY: &str = "DATA_PRODUCER_ADMIN_KEY";
pub const ENV_PARALLELISM: &str = "DATA_PRODUCER_PARALLELISM";
pub const ENV_DATA_DIR: &str = "DATA_PRODUCER_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// JSON-RPC endpoint
    pub url: String,
    /// Hex private key of the funding account
    pub admin_private_key: String,
    /// Directory holding the account file
    pub data_dir: PathBuf,
    /// Directory generated request files are written to
    pub output_dir: PathBuf,
    pub parallelism: usize,
    pub max_quantity: usize,
    pub receipt_attempts: u32,
    pub receipt_delay_ms: u64,
    pub tx_lookup_attempts: u32,
    pub block_hash_samples: usize,
    pub format: OutputFormat,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            admin_private_key: DEFAULT_ADMIN_PRIVATE_KEY.to_string(),
            data_dir: default_data_dir(),
            output_dir: PathBuf::from("."),
            parallelism: DEFAULT_PARALLELISM,
            max_quantity: MAX_QUANTITY,
            receipt_attempts: DEFAULT_RECEIPT_ATTEMPTS,
            receipt_delay_ms: DEFAULT_RECEIPT_DELAY.as_millis() as u64,
            tx_lookup_attempts: DEFAULT_TX_LOOKUP_ATTEMPTS,
            block_hash_samples: DEFAULT_BLOCK_HASH_SAMPLES,
            format: OutputFormat::Csv,
        }
    }
}

/// `~/.data_producer`, or a relative `.data_producer` when no home is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Flags given on the command line; `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub url: Option<String>,
    pub parallelism: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}

impl ProducerConfig {
    /// Load the full configuration stack.
    ///
    /// With `explicit` set, that file must exist. Otherwise
    /// `<data_dir>/config.toml` is read when present.
    pub fn load(explicit: Option<&Path>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let data_dir = env::var(ENV_DATA_DIR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_data_dir());
                let path = data_dir.join(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.apply_cli_overrides(overrides);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProducerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProducerError::Config(format!("failed to parse configuration: {e}")))
    }

    /// Apply `DATA_PRODUCER_*` variables, read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.url = url;
        }
        if let Some(key) = lookup(ENV_ADMIN_KEY) {
            self.admin_private_key = key;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_PARALLELISM) {
            self.parallelism = raw.trim().parse().map_err(|_| {
                ProducerError::Config(format!("{ENV_PARALLELISM} must be an integer, got {raw}"))
            })?;
        }
        Ok(())
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(url) = &overrides.url {
            self.url = url.clone();
        }
        if let Some(parallelism) = overrides.parallelism {
            self.parallelism = parallelism;
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.receipt_attempts,
            Duration::from_millis(self.receipt_delay_ms),
        )
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            tx_lookup_attempts: self.tx_lookup_attempts,
            block_hash_samples: self.block_hash_samples,
        }
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.parallelism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = ProducerConfig::default();
        assert_eq!(config.url, "http://localhost:8881");
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.max_quantity, 2_000_000);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.data_dir.ends_with(".data_producer"));
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ProducerConfig::from_toml(
            r#"
            url = "http://10.0.0.5:8545"
            parallelism = 32
            format = "jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.url, "http://10.0.0.5:8545");
        assert_eq!(config.parallelism, 32);
        assert_eq!(config.format, OutputFormat::Jsonl);
        assert_eq!(config.receipt_attempts, 3);
        assert_eq!(config.admin_private_key, DEFAULT_ADMIN_PRIVATE_KEY);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ProducerConfig::from_toml("parallelism = \"many\""),
            Err(ProducerError::Config(_))
        ));
    }

    #[test]
    fn env_then_cli_precedence() {
        let vars: HashMap<&str, &str> = [
            (ENV_URL, "http://env:1"),
            (ENV_PARALLELISM, "4"),
            (ENV_DATA_DIR, "/tmp/producer"),
        ]
        .into_iter()
        .collect();

        let mut config = ProducerConfig::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.url, "http://env:1");
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/producer"));

        config.apply_cli_overrides(&CliOverrides {
            url: Some("http://cli:2".into()),
            parallelism: None,
            output_dir: Some(PathBuf::from("out")),
            format: Some(OutputFormat::Jsonl),
        });
        assert_eq!(config.url, "http://cli:2");
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.format, OutputFormat::Jsonl);
    }

    #[test]
    fn bad_parallelism_env_is_an_error() {
        let mut config = ProducerConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == ENV_PARALLELISM).then(|| "eight".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_PARALLELISM));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("producer.toml");
        fs::write(&path, "receipt_attempts = 5\nreceipt_delay_ms = 10\n").unwrap();

        let config = ProducerConfig::from_file(&path).unwrap();
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(5, Duration::from_millis(10))
        );
        assert!(ProducerConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
