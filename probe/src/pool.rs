//! P2Pool observer API client and PPLNS window reconciliation.
//!
//! The observer reports an in-window share count of its own, but that figure
//! is discarded here: the window membership is recomputed from the miner's
//! share list against the network's current side-chain height.

use crate::error::ProbeError;
use metrics_store::{MetricsStore, PoolStatUpdate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Number of side-chain blocks in the PPLNS payout window.
pub const PPLNS_WINDOW: i64 = 2160;

/// Atomic units per XMR.
const ATOMIC_UNITS: f64 = 1e12;

/// Which public observer instance to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolNetwork {
    Main,
    Mini,
    Nano,
}

impl PoolNetwork {
    pub fn base_url(&self) -> &'static str {
        match self {
            PoolNetwork::Main => "https://p2pool.observer/",
            PoolNetwork::Mini => "https://mini.p2pool.observer/",
            PoolNetwork::Nano => "https://nano.p2pool.observer/",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MinerInfo {
    /// Index 0 is the observer's own window count; index 1 the all-time
    /// totals.
    #[serde(default)]
    shares: Vec<ShareCount>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
struct ShareCount {
    #[serde(default)]
    shares: i64,
    #[serde(default)]
    uncles: i64,
}

#[derive(Debug, Deserialize, Clone)]
struct SideChainShare {
    side_height: i64,
    #[serde(default)]
    uncle: bool,
}

#[derive(Debug, Deserialize)]
struct Payout {
    value: u64,
    #[serde(default)]
    timestamp: i64,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSnapshot {
    pub total_shares: i64,
    pub total_uncles: i64,
    pub active_shares: i64,
    pub active_uncles: i64,
    /// Secondary data; None when that fetch degraded
    pub blocks_found: Option<i64>,
    pub payouts_sent: Option<i64>,
    pub last_payout_amount: Option<f64>,
    pub last_payout_time: Option<i64>,
    pub total_payout_amount: Option<f64>,
}

/// Snapshot for a network with no shares at all: nothing can be inside the
/// window, but the all-time totals still stand.
fn empty_network_snapshot(totals: ShareCount) -> PoolSnapshot {
    PoolSnapshot {
        total_shares: totals.shares,
        total_uncles: totals.uncles,
        ..Default::default()
    }
}

/// Count shares and uncles inside the trailing PPLNS window.
///
/// `shares` must be sorted descending by height; the walk stops at the first
/// entry below the window start instead of scanning the full list.
fn window_tally(shares: &[SideChainShare], current_height: i64, window: i64) -> (i64, i64) {
    let window_start = current_height - window;

    let mut active_shares = 0;
    let mut active_uncles = 0;
    for share in shares {
        if share.side_height < window_start {
            break;
        }
        active_shares += 1;
        if share.uncle {
            active_uncles += 1;
        }
    }

    (active_shares, active_uncles)
}

/// Client for one observer instance.
pub struct PoolClient {
    client: reqwest::Client,
    base_url: &'static str,
}

impl PoolClient {
    pub fn new(network: PoolNetwork, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: network.base_url(),
        }
    }

    /// Reconcile a wallet address against the observer's share data.
    ///
    /// Returns `None` when any primary call (miner info, network tip, miner
    /// shares) fails; block and payout fetches degrade to `None` fields
    /// without failing the reconciliation.
    pub async fn reconcile(&self, address: &str) -> Option<PoolSnapshot> {
        let info: MinerInfo = self
            .get_json(&format!("api/miner_info/{}", address))
            .await?;
        let totals = info.shares.get(1).copied().unwrap_or_default();

        let tip: Vec<SideChainShare> = self.get_json("api/shares?limit=1").await?;
        let Some(tip) = tip.first() else {
            return Some(empty_network_snapshot(totals));
        };

        let mut mine: Vec<SideChainShare> = self
            .get_json(&format!("api/shares?miner={}", address))
            .await?;
        // The API serves these newest-first; sort rather than trust it.
        mine.sort_by(|a, b| b.side_height.cmp(&a.side_height));

        let (active_shares, active_uncles) = window_tally(&mine, tip.side_height, PPLNS_WINDOW);

        let blocks_found = self
            .get_json::<Vec<serde_json::Value>>(&format!("api/blocks?miner={}", address))
            .await
            .map(|blocks| blocks.len() as i64);

        let payouts = self
            .get_json::<Vec<Payout>>(&format!("api/payouts?miner={}", address))
            .await;
        let (payouts_sent, last_payout_amount, last_payout_time, total_payout_amount) =
            match payouts {
                Some(payouts) => (
                    Some(payouts.len() as i64),
                    payouts.first().map(|p| p.value as f64 / ATOMIC_UNITS),
                    payouts.first().map(|p| p.timestamp),
                    Some(payouts.iter().map(|p| p.value as f64).sum::<f64>() / ATOMIC_UNITS),
                ),
                None => (None, None, None, None),
            };

        Some(PoolSnapshot {
            total_shares: totals.shares,
            total_uncles: totals.uncles,
            active_shares,
            active_uncles,
            blocks_found,
            payouts_sent,
            last_payout_amount,
            last_payout_time,
            total_payout_amount,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = format!("{}{}", self.base_url, path);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("pool api {}: unexpected payload: {}", path, e);
                    None
                }
            },
            Ok(response) => {
                debug!("pool api {}: status {}", path, response.status());
                None
            }
            Err(e) => {
                debug!("pool api {}: {}", path, e);
                None
            }
        }
    }
}

/// Run a reconciliation and persist the snapshot on success.
pub async fn reconcile_and_store(
    store: &MetricsStore,
    client: &PoolClient,
    address: &str,
) -> Result<Option<PoolSnapshot>, ProbeError> {
    let Some(snapshot) = client.reconcile(address).await else {
        info!("pool reconciliation for {} unavailable", address);
        return Ok(None);
    };

    store
        .upsert_pool_stats(&PoolStatUpdate {
            address: address.to_string(),
            active_shares: snapshot.active_shares,
            active_uncles: snapshot.active_uncles,
            total_shares: snapshot.total_shares,
            blocks_found: snapshot.blocks_found,
            payouts_sent: snapshot.payouts_sent,
            last_payout_amount: snapshot.last_payout_amount,
            last_payout_time: snapshot.last_payout_time,
            total_payout_amount: snapshot.total_payout_amount,
        })
        .await?;

    Ok(Some(snapshot))
}
