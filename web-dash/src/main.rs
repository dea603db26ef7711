use std::{sync::Arc, time::Duration};
use tracing::info;

use metrics_store::MetricsStore;
use miner_probe::MinerApi;
use web_dash::{config::Config, web::DashContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_args()?;

    // Setup tracing with optional file output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt().with_env_filter(env_filter);

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| format!("Failed to open log file {}: {}", log_file, e))?;
        fmt_layer.with_writer(std::sync::Arc::new(file)).init();
    } else {
        fmt_layer.init();
    }

    info!("Starting dashboard service");
    info!("HTTP server: {}", config.listen_address);
    info!("Store: {}", config.db_path.display());
    info!(
        "Client polling interval: {} seconds",
        config.client_poll_interval_secs
    );

    let store = MetricsStore::open(&config.db_path).await?;

    let ctx = Arc::new(DashContext {
        store,
        miner_api: MinerApi::new(
            config.miner_port,
            config.miner_api_token.clone(),
            Duration::from_secs(config.miner_timeout_secs),
        ),
        probe_host: config.probe_host.clone(),
        retention_days: config.retention_days,
        client_poll_interval_secs: config.client_poll_interval_secs,
    });

    web_dash::run_http_server(config.listen_address, ctx).await
}
