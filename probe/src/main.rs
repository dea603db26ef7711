mod args;

use args::Args;
use clap::Parser;
use metrics_store::MetricsStore;
use miner_probe::{config::ProbeConfig, miner, pool, report, scan, MinerApi, PoolClient};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup tracing with optional file output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt().with_env_filter(env_filter);

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| format!("Failed to open log file {}: {}", log_file.display(), e))?;
        fmt_layer.with_writer(std::sync::Arc::new(file)).init();
    } else {
        fmt_layer.init();
    }

    let mut config = ProbeConfig::load(args.config_path.as_deref())?;
    if let Some(port) = args.port {
        config.miner_port = port;
    }

    let store = MetricsStore::open(&config.db_path).await?;
    info!("store opened at {}", config.db_path.display());

    if args.watch {
        println!("--- starting ARP watch ---");
        let mut watch = arp_watch::SpoofWatch::new(store.clone(), config.arp_cooldown_secs);
        let handle = tokio::runtime::Handle::current();
        let iface = args.iface.clone();
        // The capture loop blocks until process termination or a fatal
        // capture error.
        tokio::task::block_in_place(move || arp_watch::run(&mut watch, iface.as_deref(), handle))?;
    } else if let Some(cidr) = args.scan.as_deref() {
        println!("--- scanning {} ---", cidr);
        let api = MinerApi::new(
            config.miner_port,
            config.miner_api_token.clone(),
            Duration::from_secs(config.scan_timeout_secs),
        );
        let hits = scan::scan(&store, &api, cidr).await?;
        for hit in &hits {
            println!("{:<18} {:.2} H/s", hit.addr, hit.hashrate);
        }
        println!("--- scan complete: {} miner(s) responding ---", hits.len());
    } else if let Some(host) = args.host.as_deref() {
        println!("--- checking {} ---", host);
        let api = MinerApi::new(
            config.miner_port,
            config.miner_api_token.clone(),
            Duration::from_secs(config.miner_timeout_secs),
        );
        match miner::check_host(&store, &api, host).await? {
            Some(hashrate) => println!("{}: online, {:.2} H/s", host, hashrate),
            None => println!("{}: offline", host),
        }

        if let Some(address) = args.pool_address.as_deref() {
            let client = PoolClient::new(
                config.pool_network,
                Duration::from_secs(config.pool_timeout_secs),
            );
            match pool::reconcile_and_store(&store, &client, address).await? {
                Some(snapshot) => println!(
                    "pool: {} active share(s) (+{} uncles), {} all-time",
                    snapshot.active_shares, snapshot.active_uncles, snapshot.total_shares
                ),
                None => println!("pool: observer unavailable"),
            }
        }
    } else if args.cleanup {
        let deleted = store.purge_older_than(config.retention_days).await?;
        println!(
            "removed {} history rows older than {} days",
            deleted, config.retention_days
        );
    } else if args.report {
        report::print_report(&store).await?;
    } else {
        use clap::CommandFactory;
        Args::command().print_help()?;
        std::process::exit(1);
    }

    Ok(())
}
