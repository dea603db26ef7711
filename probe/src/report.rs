//! Plain-text operator report assembled from the store.

use metrics_store::{MetricsStore, MinerStatus, StoreError};

/// Print the aggregate report: totals, per-miner status, pool stats, and
/// unacknowledged alerts.
pub async fn print_report(store: &MetricsStore) -> Result<(), StoreError> {
    let totals = store.totals().await?;

    println!("=== minermon report ===");
    println!("miners discovered:     {}", totals.miners);
    println!("currently online:      {}", totals.online_miners);
    println!("history rows:          {}", totals.history_rows);
    println!("pool addresses:        {}", totals.pool_addresses);
    println!("unacknowledged alerts: {}", totals.unacknowledged_alerts);

    let miners = store.list_miners(false).await?;
    if !miners.is_empty() {
        println!();
        println!("--- miners ---");
        for miner in miners {
            match miner.status {
                MinerStatus::Online => {
                    let hashrate = miner.hashrate.unwrap_or(0.0);
                    print!("[online]  {:<20} {:.2} H/s", miner.host, hashrate);
                    if let Some(cpu) = miner.cpu_usage {
                        print!("  cpu {:.1}%", cpu);
                    }
                    if let Some(ram) = miner.ram_usage {
                        print!("  ram {:.1}%", ram);
                    }
                    println!();
                }
                MinerStatus::Offline => println!("[offline] {}", miner.host),
            }
        }
    }

    let pool_stats = store.list_pool_stats().await?;
    if !pool_stats.is_empty() {
        println!();
        println!("--- pool ---");
        for stat in pool_stats {
            println!("{}", stat.address);
            println!(
                "  active shares: {} (+{} uncles)  total: {}",
                stat.active_shares, stat.active_uncles, stat.total_shares
            );
            match (stat.payouts_sent, stat.total_payout_amount) {
                (Some(count), Some(total)) => {
                    println!("  payouts: {} ({:.6} XMR total)", count, total)
                }
                (Some(count), None) => println!("  payouts: {}", count),
                _ => println!("  payouts: unavailable"),
            }
            if let Some(blocks) = stat.blocks_found {
                println!("  blocks found: {}", blocks);
            }
        }
    }

    let alerts = store.list_alerts(Some(false), 10).await?;
    if !alerts.is_empty() {
        println!();
        println!("--- unacknowledged alerts ---");
        for alert in alerts {
            println!(
                "#{} [{}] {}{}",
                alert.id,
                alert.severity.as_str(),
                alert.kind,
                alert
                    .source_ip
                    .as_deref()
                    .map(|ip| format!(" ({})", ip))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}
