//! SQLite-backed metrics store for the minermon toolkit.
//!
//! Holds current miner state, append-only probe history, P2Pool statistic
//! snapshots, acknowledgeable security alerts, and the durable ARP binding
//! log used by the spoof watcher.

pub mod store;
pub mod types;

pub use store::{MetricsStore, StoreError};
pub use types::{
    unix_timestamp, Alert, ArpBinding, MinerRecord, MinerSample, MinerStatus, PoolHistorySample,
    PoolStatRecord, PoolStatUpdate, Severity, StoreTotals,
};
