use crate::error::Error;
use crate::hash::Algorithm;
use crate::strategy::Partition;
use crate::target::DEFAULT_DIFFICULTY_CEILING;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hashes between two reads of the shared watermark and stop flags.
pub const DEFAULT_CHECK_INTERVAL: u64 = 1024;

/// Worker count used when none is configured: the available hardware parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|nz| nz.get())
        .unwrap_or(1)
}

/// Miner settings shared by every session, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinerConfig {
    pub workers: usize,
    pub partition: Partition,
    pub check_interval: u64,
    pub algorithm: String,
    pub difficulty_ceiling: u32,
    pub deadline_ms: Option<u64>,
    /// Exclusive upper bound on the nonce space; `None` searches up to `u64::MAX`.
    pub nonce_limit: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            partition: Partition::default(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            algorithm: "sha2_256".into(),
            difficulty_ceiling: DEFAULT_DIFFICULTY_CEILING,
            deadline_ms: None,
            nonce_limit: None,
        }
    }
}

impl MinerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        if self.check_interval == 0 {
            return Err(Error::InvalidConfig("check_interval must be >= 1".into()));
        }
        self.partition.validate()?;
        self.algorithm()?;
        Ok(())
    }

    pub fn algorithm(&self) -> Result<Algorithm, Error> {
        Algorithm::from_name(&self.algorithm)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
