//! Probing side of the minermon toolkit: miner status polling, P2Pool
//! share reconciliation, network scanning, and the operator report.

pub mod config;
pub mod error;
pub mod miner;
pub mod pool;
pub mod report;
pub mod scan;

pub use config::ProbeConfig;
pub use error::ProbeError;
pub use miner::MinerApi;
pub use pool::{PoolClient, PoolNetwork, PoolSnapshot};
