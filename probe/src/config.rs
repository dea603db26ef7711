//! Probe configuration: TOML file with serde defaults, flattened into the
//! runtime [`ProbeConfig`].

use crate::error::ProbeError;
use crate::pool::PoolNetwork;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub db_path: PathBuf,
    pub miner_port: u16,
    pub miner_api_token: Option<String>,
    pub miner_timeout_secs: u64,
    pub scan_timeout_secs: u64,
    pub pool_network: PoolNetwork,
    pub pool_timeout_secs: u64,
    pub retention_days: i64,
    pub arp_cooldown_secs: i64,
}

#[derive(Debug, Deserialize, Default)]
struct ProbeConfigFile {
    #[serde(default)]
    store: StoreSection,
    #[serde(default)]
    miner: MinerSection,
    #[serde(default)]
    pool: PoolSection,
    #[serde(default)]
    retention: RetentionSection,
    #[serde(default)]
    watch: WatchSection,
}

#[derive(Debug, Deserialize)]
struct StoreSection {
    db_path: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from("minermon.db")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MinerSection {
    port: Option<u16>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
    scan_timeout_secs: Option<u64>,
}

impl Default for MinerSection {
    fn default() -> Self {
        Self {
            port: Some(8000),
            api_token: None,
            timeout_secs: Some(2),
            scan_timeout_secs: Some(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PoolSection {
    network: Option<PoolNetwork>,
    timeout_secs: Option<u64>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            network: Some(PoolNetwork::Main),
            timeout_secs: Some(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RetentionSection {
    days: Option<i64>,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self { days: Some(30) }
    }
}

#[derive(Debug, Deserialize)]
struct WatchSection {
    cooldown_secs: Option<i64>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            cooldown_secs: Some(arp_watch::DEFAULT_COOLDOWN_SECS),
        }
    }
}

impl ProbeConfig {
    /// Load configuration. A missing path (or an absent default file) means
    /// built-in defaults; a path that exists but cannot be parsed is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ProbeError> {
        let file = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    ProbeError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str::<ProbeConfigFile>(&text)
                    .map_err(|e| ProbeError::Config(format!("{}: {}", path.display(), e)))?
            }
            None => ProbeConfigFile::default(),
        };

        Ok(Self {
            db_path: file
                .store
                .db_path
                .unwrap_or_else(|| PathBuf::from("minermon.db")),
            miner_port: file.miner.port.unwrap_or(8000),
            miner_api_token: file.miner.api_token,
            miner_timeout_secs: file.miner.timeout_secs.unwrap_or(2),
            scan_timeout_secs: file.miner.scan_timeout_secs.unwrap_or(1),
            pool_network: file.pool.network.unwrap_or(PoolNetwork::Main),
            pool_timeout_secs: file.pool.timeout_secs.unwrap_or(5),
            retention_days: file.retention.days.unwrap_or(30),
            arp_cooldown_secs: file
                .watch
                .cooldown_secs
                .unwrap_or(arp_watch::DEFAULT_COOLDOWN_SECS),
        })
    }
}
