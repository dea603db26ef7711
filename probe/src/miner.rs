//! HTTP prober for the miner's status API.

use crate::error::ProbeError;
use metrics_store::MetricsStore;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    hashrate: HashrateSection,
}

#[derive(Debug, Deserialize)]
struct HashrateSection {
    /// Reported averages; index 0 is the most recent window and may be null
    /// right after miner startup.
    #[serde(default)]
    total: Vec<Option<f64>>,
}

/// Client for the `GET /2/summary` miner endpoint.
pub struct MinerApi {
    client: reqwest::Client,
    port: u16,
    token: Option<String>,
}

impl MinerApi {
    pub fn new(port: u16, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            port,
            token,
        }
    }

    /// Query a miner for its current hashrate.
    ///
    /// Every transport failure, non-2xx status, or unexpected payload maps
    /// to `None` (host considered offline); nothing here is fatal.
    pub async fn probe(&self, host: &str) -> Option<f64> {
        let url = format!("http://{}:{}/2/summary", host, self.port);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("probe {}: {}", host, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("probe {}: status {}", host, response.status());
            return None;
        }

        match response.json::<SummaryResponse>().await {
            Ok(summary) => summary.hashrate.total.first().copied().flatten(),
            Err(e) => {
                debug!("probe {}: unexpected payload: {}", host, e);
                None
            }
        }
    }
}

fn is_local(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost" || host == "::1"
}

/// CPU% and RAM% of the machine the probe runs on.
///
/// Two CPU refreshes with a short pause in between are needed for a usable
/// utilization delta.
pub fn local_system_metrics() -> (Option<f64>, Option<f64>) {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let cpu = sys.global_cpu_info().cpu_usage() as f64;
    let ram = if sys.total_memory() > 0 {
        Some(sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0)
    } else {
        None
    };

    (Some(cpu), ram)
}

/// Probe one host and record the outcome (current row + history sample).
///
/// System metrics are only available for the local host; remote hosts store
/// hashrate alone.
pub async fn check_host(
    store: &MetricsStore,
    api: &MinerApi,
    host: &str,
) -> Result<Option<f64>, ProbeError> {
    let hashrate = api.probe(host).await;

    let (cpu, ram) = if is_local(host) {
        local_system_metrics()
    } else {
        (None, None)
    };

    store.upsert_miner(host, hashrate, cpu, ram).await?;
    Ok(hashrate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_parsing() {
        let json = r#"{"hashrate":{"total":[1234.5,1200.0,null],"highest":1500.0},"worker_id":"rig0"}"#;
        let summary: SummaryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(summary.hashrate.total.first().copied().flatten(), Some(1234.5));
    }

    #[test]
    fn test_summary_with_null_first_entry_is_absent() {
        let json = r#"{"hashrate":{"total":[null,null,null]}}"#;
        let summary: SummaryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(summary.hashrate.total.first().copied().flatten(), None);
    }

    #[test]
    fn test_summary_with_empty_total_is_absent() {
        let json = r#"{"hashrate":{"total":[]}}"#;
        let summary: SummaryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(summary.hashrate.total.first().copied().flatten(), None);
    }

    #[test]
    fn test_is_local() {
        assert!(is_local("127.0.0.1"));
        assert!(is_local("localhost"));
        assert!(!is_local("192.168.1.50"));
    }
}
