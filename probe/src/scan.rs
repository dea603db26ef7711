//! CIDR expansion and bounded-concurrency miner scanning.

use crate::error::ProbeError;
use crate::miner::MinerApi;
use futures::{stream, StreamExt};
use ipnetwork::Ipv4Network;
use metrics_store::MetricsStore;
use std::net::Ipv4Addr;
use tracing::{info, warn};

/// Upper bound on concurrent probes during a scan.
pub const MAX_SCAN_WORKERS: usize = 50;

/// A responding miner found during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit {
    pub addr: Ipv4Addr,
    pub hashrate: f64,
}

/// Expand a CIDR range into probe-able host addresses.
///
/// Malformed input is rejected before any network activity. The network and
/// broadcast addresses are excluded; /31 and /32 ranges reserve neither
/// (RFC 3021) and yield every address they contain.
pub fn host_addresses(cidr: &str) -> Result<Vec<Ipv4Addr>, ProbeError> {
    let network: Ipv4Network = cidr
        .parse()
        .map_err(|_| ProbeError::InvalidCidr(cidr.to_string()))?;

    if network.prefix() >= 31 {
        return Ok(network.iter().collect());
    }

    let reserved = (network.network(), network.broadcast());
    Ok(network
        .iter()
        .filter(|ip| *ip != reserved.0 && *ip != reserved.1)
        .collect())
}

/// Probe every host address in `cidr`, recording each outcome.
///
/// At most `min(range, MAX_SCAN_WORKERS)` probes run at once; the call joins
/// on the whole range before returning. Hits are listed in completion order.
/// A store failure loses that address's result but does not abort the scan.
pub async fn scan(
    store: &MetricsStore,
    api: &MinerApi,
    cidr: &str,
) -> Result<Vec<ScanHit>, ProbeError> {
    let hosts = host_addresses(cidr)?;
    let workers = hosts.len().clamp(1, MAX_SCAN_WORKERS);
    info!("scanning {} ({} hosts, {} workers)", cidr, hosts.len(), workers);

    let results: Vec<(Ipv4Addr, Option<f64>)> = stream::iter(hosts)
        .map(|addr| async move { (addr, api.probe(&addr.to_string()).await) })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut hits = Vec::new();
    for (addr, hashrate) in results {
        if let Err(e) = store
            .upsert_miner(&addr.to_string(), hashrate, None, None)
            .await
        {
            warn!("failed to record scan result for {}: {}", addr, e);
            continue;
        }
        if let Some(hashrate) = hashrate {
            hits.push(ScanHit { addr, hashrate });
        }
    }

    Ok(hits)
}
