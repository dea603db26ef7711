//! Record types stored and served by the metrics store.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Online/offline state derived from the last probe result.
///
/// A miner is Online iff the probe returned a hashrate, 0.0 included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinerStatus {
    Online,
    Offline,
}

impl MinerStatus {
    pub fn from_hashrate(hashrate: Option<f64>) -> Self {
        if hashrate.is_some() {
            MinerStatus::Online
        } else {
            MinerStatus::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MinerStatus::Online => "Online",
            MinerStatus::Offline => "Offline",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "Online" => MinerStatus::Online,
            _ => MinerStatus::Offline,
        }
    }
}

/// Current state of a probed miner host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerRecord {
    pub host: String,
    /// Unix timestamp of the last probe, successful or not
    pub last_seen: i64,
    pub hashrate: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub status: MinerStatus,
}

/// One append-only probe sample for a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerSample {
    pub host: String,
    pub timestamp: i64,
    pub hashrate: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub status: MinerStatus,
}

/// Current P2Pool statistics for a wallet address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatRecord {
    pub address: String,
    pub last_seen: i64,
    pub active_shares: i64,
    pub active_uncles: i64,
    pub total_shares: i64,
    /// Secondary observer data; None when the fetch degraded
    pub blocks_found: Option<i64>,
    pub payouts_sent: Option<i64>,
    pub last_payout_amount: Option<f64>,
    pub last_payout_time: Option<i64>,
    pub total_payout_amount: Option<f64>,
}

/// Input for a pool-stats upsert. `last_seen` is stamped by the store.
#[derive(Debug, Clone, Default)]
pub struct PoolStatUpdate {
    pub address: String,
    pub active_shares: i64,
    pub active_uncles: i64,
    pub total_shares: i64,
    pub blocks_found: Option<i64>,
    pub payouts_sent: Option<i64>,
    pub last_payout_amount: Option<f64>,
    pub last_payout_time: Option<i64>,
    pub total_payout_amount: Option<f64>,
}

/// One append-only pool reconciliation sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolHistorySample {
    pub address: String,
    pub timestamp: i64,
    pub active_shares: i64,
    pub total_shares: i64,
}

/// Alert severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

/// A stored security alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub timestamp: i64,
    pub kind: String,
    pub details: String,
    pub severity: Severity,
    pub acknowledged: bool,
    pub source_ip: Option<String>,
    pub source_mac: Option<String>,
}

/// Durable record of an observed ARP binding.
///
/// `alerted_at` is set when a spoofing alert fired for this pair; rows with
/// it unset form the quiet log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArpBinding {
    pub ip: String,
    pub mac: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub alerted_at: Option<i64>,
}

/// Aggregate row counts for the operator report and dashboard sidebar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoreTotals {
    pub miners: i64,
    pub online_miners: i64,
    pub history_rows: i64,
    pub pool_addresses: i64,
    pub unacknowledged_alerts: i64,
}
