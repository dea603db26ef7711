//! SQLite storage backend for miner, pool, and alert state.

use crate::types::{
    unix_timestamp, Alert, ArpBinding, MinerRecord, MinerSample, MinerStatus, PoolHistorySample,
    PoolStatRecord, PoolStatUpdate, Severity, StoreTotals,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// How long a writer waits on a locked database before failing the operation.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the metrics database.
///
/// Cheap to clone; constructed once at startup and passed to every component
/// that reads or writes monitoring state.
#[derive(Clone)]
pub struct MetricsStore {
    pool: Pool<Sqlite>,
}

impl MetricsStore {
    /// Open (creating if missing) the database at `db_path`.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // WAL keeps readers from blocking the single writer; the busy
        // timeout bounds how long a contended writer waits.
        let connection_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS miners (
                host TEXT PRIMARY KEY,
                last_seen INTEGER NOT NULL,
                hashrate REAL,
                cpu_usage REAL,
                ram_usage REAL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS miner_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                hashrate REAL,
                cpu_usage REAL,
                ram_usage REAL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pool_stats (
                address TEXT PRIMARY KEY,
                last_seen INTEGER NOT NULL,
                active_shares INTEGER NOT NULL,
                active_uncles INTEGER NOT NULL,
                total_shares INTEGER NOT NULL,
                blocks_found INTEGER,
                payouts_sent INTEGER,
                last_payout_amount REAL,
                last_payout_time INTEGER,
                total_payout_amount REAL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pool_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                active_shares INTEGER NOT NULL,
                total_shares INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL,
                details TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'medium',
                acknowledged INTEGER NOT NULL DEFAULT 0,
                source_ip TEXT,
                source_mac TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS arp_bindings (
                ip TEXT NOT NULL,
                mac TEXT NOT NULL,
                first_seen INTEGER NOT NULL,
                last_seen INTEGER NOT NULL,
                alerted_at INTEGER,
                PRIMARY KEY (ip, mac)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_miner_history_host_time
            ON miner_history(host, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_pool_history_address_time
            ON pool_history(address, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerts_timestamp
            ON alerts(timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerts_acknowledged
            ON alerts(acknowledged, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update a miner's current state and append one history row.
    ///
    /// Both rows carry the same capture instant and are written in a single
    /// transaction. Status is derived: Online iff a hashrate is present.
    pub async fn upsert_miner(
        &self,
        host: &str,
        hashrate: Option<f64>,
        cpu: Option<f64>,
        ram: Option<f64>,
    ) -> Result<()> {
        let now = unix_timestamp();
        let status = MinerStatus::from_hashrate(hashrate);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO miners (host, last_seen, hashrate, cpu_usage, ram_usage, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(host) DO UPDATE SET
                last_seen = excluded.last_seen,
                hashrate = excluded.hashrate,
                cpu_usage = excluded.cpu_usage,
                ram_usage = excluded.ram_usage,
                status = excluded.status
            "#,
        )
        .bind(host)
        .bind(now)
        .bind(hashrate)
        .bind(cpu)
        .bind(ram)
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO miner_history (host, timestamp, hashrate, cpu_usage, ram_usage, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(host)
        .bind(now)
        .bind(hashrate)
        .bind(cpu)
        .bind(ram)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("upserted miner {} ({})", host, status.as_str());
        Ok(())
    }

    /// Insert or update pool stats for an address and append one history row.
    pub async fn upsert_pool_stats(&self, update: &PoolStatUpdate) -> Result<()> {
        let now = unix_timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pool_stats
                (address, last_seen, active_shares, active_uncles, total_shares,
                 blocks_found, payouts_sent, last_payout_amount, last_payout_time,
                 total_payout_amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                last_seen = excluded.last_seen,
                active_shares = excluded.active_shares,
                active_uncles = excluded.active_uncles,
                total_shares = excluded.total_shares,
                blocks_found = excluded.blocks_found,
                payouts_sent = excluded.payouts_sent,
                last_payout_amount = excluded.last_payout_amount,
                last_payout_time = excluded.last_payout_time,
                total_payout_amount = excluded.total_payout_amount
            "#,
        )
        .bind(&update.address)
        .bind(now)
        .bind(update.active_shares)
        .bind(update.active_uncles)
        .bind(update.total_shares)
        .bind(update.blocks_found)
        .bind(update.payouts_sent)
        .bind(update.last_payout_amount)
        .bind(update.last_payout_time)
        .bind(update.total_payout_amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO pool_history (address, timestamp, active_shares, total_shares)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&update.address)
        .bind(now)
        .bind(update.active_shares)
        .bind(update.total_shares)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All current miner rows, most recently seen first.
    pub async fn list_miners(&self, online_only: bool) -> Result<Vec<MinerRecord>> {
        let query = if online_only {
            "SELECT * FROM miners WHERE status = 'Online' ORDER BY last_seen DESC"
        } else {
            "SELECT * FROM miners ORDER BY last_seen DESC"
        };

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(miner_from_row).collect())
    }

    pub async fn get_miner(&self, host: &str) -> Result<Option<MinerRecord>> {
        let row = sqlx::query("SELECT * FROM miners WHERE host = ?")
            .bind(host)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(miner_from_row))
    }

    /// History rows for `host` newer than now − `hours`, ascending by time.
    pub async fn miner_history(&self, host: &str, hours: i64) -> Result<Vec<MinerSample>> {
        let cutoff = unix_timestamp() - hours * 3600;

        let rows = sqlx::query(
            r#"
            SELECT * FROM miner_history
            WHERE host = ? AND timestamp > ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(host)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MinerSample {
                host: row.get("host"),
                timestamp: row.get("timestamp"),
                hashrate: row.get("hashrate"),
                cpu_usage: row.get("cpu_usage"),
                ram_usage: row.get("ram_usage"),
                status: MinerStatus::from_db(row.get::<String, _>("status").as_str()),
            })
            .collect())
    }

    /// Delete a miner and its history rows. Operator action; the cascade is
    /// deliberate so no history row outlives its parent.
    pub async fn delete_miner(&self, host: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM miner_history WHERE host = ?")
            .bind(host)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM miners WHERE host = ?")
            .bind(host)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All current pool-stat rows, most recently seen first.
    pub async fn list_pool_stats(&self) -> Result<Vec<PoolStatRecord>> {
        let rows = sqlx::query("SELECT * FROM pool_stats ORDER BY last_seen DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(pool_stat_from_row).collect())
    }

    pub async fn pool_history(&self, address: &str, hours: i64) -> Result<Vec<PoolHistorySample>> {
        let cutoff = unix_timestamp() - hours * 3600;

        let rows = sqlx::query(
            r#"
            SELECT * FROM pool_history
            WHERE address = ? AND timestamp > ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(address)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PoolHistorySample {
                address: row.get("address"),
                timestamp: row.get("timestamp"),
                active_shares: row.get("active_shares"),
                total_shares: row.get("total_shares"),
            })
            .collect())
    }

    /// Store a security alert. Returns its row id.
    pub async fn add_alert(
        &self,
        kind: &str,
        details: &str,
        severity: Severity,
        source_ip: Option<&str>,
        source_mac: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (timestamp, kind, details, severity, source_ip, source_mac)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(unix_timestamp())
        .bind(kind)
        .bind(details)
        .bind(severity.as_str())
        .bind(source_ip)
        .bind(source_mac)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Alerts newest-first, optionally filtered by acknowledgment, capped at
    /// `limit`.
    pub async fn list_alerts(&self, acknowledged: Option<bool>, limit: i64) -> Result<Vec<Alert>> {
        let rows = match acknowledged {
            Some(flag) => {
                sqlx::query(
                    r#"
                    SELECT * FROM alerts WHERE acknowledged = ?
                    ORDER BY timestamp DESC LIMIT ?
                    "#,
                )
                .bind(flag as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM alerts ORDER BY timestamp DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(alert_from_row).collect())
    }

    /// Mark one alert acknowledged. Unknown ids are a no-op.
    pub async fn acknowledge_alert(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn acknowledge_all(&self) -> Result<()> {
        sqlx::query("UPDATE alerts SET acknowledged = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete one alert. Unknown ids are a no-op.
    pub async fn delete_alert(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove history rows (miner and pool) strictly older than now − `days`.
    ///
    /// Current-state tables and alerts are never touched. Returns the number
    /// of rows removed.
    pub async fn purge_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = unix_timestamp() - days * 86_400;

        let mut tx = self.pool.begin().await?;

        let miners = sqlx::query("DELETE FROM miner_history WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let pool = sqlx::query("DELETE FROM pool_history WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!("purged {} history rows older than {} days", miners + pool, days);
        Ok(miners + pool)
    }

    /// Aggregate row counts for the report and dashboard sidebar.
    pub async fn totals(&self) -> Result<StoreTotals> {
        let miners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM miners")
            .fetch_one(&self.pool)
            .await?;
        let online_miners: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM miners WHERE status = 'Online'")
                .fetch_one(&self.pool)
                .await?;
        let history_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM miner_history")
            .fetch_one(&self.pool)
            .await?;
        let pool_addresses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pool_stats")
            .fetch_one(&self.pool)
            .await?;
        let unacknowledged_alerts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE acknowledged = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreTotals {
            miners,
            online_miners,
            history_rows,
            pool_addresses,
            unacknowledged_alerts,
        })
    }

    /// Record an ARP observation: the durable quiet-log row for (ip, mac),
    /// created on first sight and refreshed on every event.
    pub async fn observe_arp(&self, ip: &str, mac: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO arp_bindings (ip, mac, first_seen, last_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(ip, mac) DO UPDATE SET
                last_seen = excluded.last_seen
            "#,
        )
        .bind(ip)
        .bind(mac)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True when any binding for `ip` raised an alert within the last
    /// `cooldown_secs`. Scoped to the address, not the (ip, mac) pair, so a
    /// flapping binding stays quiet for the whole cooldown.
    pub async fn arp_alerted_within(&self, ip: &str, now: i64, cooldown_secs: i64) -> Result<bool> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(alerted_at) FROM arp_bindings WHERE ip = ?")
                .bind(ip)
                .fetch_one(&self.pool)
                .await?;

        Ok(matches!(last, Some(t) if now - t < cooldown_secs))
    }

    /// Stamp the (ip, mac) binding as having alerted at `now`.
    pub async fn mark_arp_alerted(&self, ip: &str, mac: &str, now: i64) -> Result<()> {
        sqlx::query("UPDATE arp_bindings SET alerted_at = ? WHERE ip = ? AND mac = ?")
            .bind(now)
            .bind(ip)
            .bind(mac)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn arp_binding(&self, ip: &str, mac: &str) -> Result<Option<ArpBinding>> {
        let row = sqlx::query("SELECT * FROM arp_bindings WHERE ip = ? AND mac = ?")
            .bind(ip)
            .bind(mac)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| ArpBinding {
            ip: row.get("ip"),
            mac: row.get("mac"),
            first_seen: row.get("first_seen"),
            last_seen: row.get("last_seen"),
            alerted_at: row.get("alerted_at"),
        }))
    }
}

fn miner_from_row(row: &SqliteRow) -> MinerRecord {
    MinerRecord {
        host: row.get("host"),
        last_seen: row.get("last_seen"),
        hashrate: row.get("hashrate"),
        cpu_usage: row.get("cpu_usage"),
        ram_usage: row.get("ram_usage"),
        status: MinerStatus::from_db(row.get::<String, _>("status").as_str()),
    }
}

fn pool_stat_from_row(row: &SqliteRow) -> PoolStatRecord {
    PoolStatRecord {
        address: row.get("address"),
        last_seen: row.get("last_seen"),
        active_shares: row.get("active_shares"),
        active_uncles: row.get("active_uncles"),
        total_shares: row.get("total_shares"),
        blocks_found: row.get("blocks_found"),
        payouts_sent: row.get("payouts_sent"),
        last_payout_amount: row.get("last_payout_amount"),
        last_payout_time: row.get("last_payout_time"),
        total_payout_amount: row.get("total_payout_amount"),
    }
}

fn alert_from_row(row: &SqliteRow) -> Alert {
    Alert {
        id: row.get("id"),
        timestamp: row.get("timestamp"),
        kind: row.get("kind"),
        details: row.get("details"),
        severity: Severity::from_db(row.get::<String, _>("severity").as_str()),
        acknowledged: row.get::<i64, _>("acknowledged") != 0,
        source_ip: row.get("source_ip"),
        source_mac: row.get("source_mac"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> MetricsStore {
        MetricsStore::open(dir.path().join("test.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='miners'",
        )
        .fetch_one(&store.pool)
        .await
        .unwrap();

        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_status_derived_from_hashrate() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.1", None, None, None)
            .await
            .unwrap();
        let miner = store.get_miner("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(miner.status, MinerStatus::Offline);
        assert_eq!(miner.hashrate, None);

        // 0.0 H/s is still a successful probe
        store
            .upsert_miner("10.0.0.1", Some(0.0), None, None)
            .await
            .unwrap();
        let miner = store.get_miner("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(miner.status, MinerStatus::Online);
        assert_eq!(miner.hashrate, Some(0.0));
    }

    #[tokio::test]
    async fn test_upsert_appends_history_on_update_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.2", Some(1200.0), Some(55.0), Some(40.0))
            .await
            .unwrap();
        store
            .upsert_miner("10.0.0.2", Some(1300.0), None, None)
            .await
            .unwrap();
        store.upsert_miner("10.0.0.2", None, None, None).await.unwrap();

        let miners = store.list_miners(false).await.unwrap();
        assert_eq!(miners.len(), 1);

        let history = store.miner_history("10.0.0.2", 24).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].hashrate, Some(1200.0));
        assert_eq!(history[2].status, MinerStatus::Offline);
    }

    #[tokio::test]
    async fn test_list_miners_online_filter_and_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.1", Some(500.0), None, None)
            .await
            .unwrap();
        store.upsert_miner("10.0.0.2", None, None, None).await.unwrap();
        store
            .upsert_miner("10.0.0.3", Some(900.0), None, None)
            .await
            .unwrap();

        let all = store.list_miners(false).await.unwrap();
        assert_eq!(all.len(), 3);

        let online = store.list_miners(true).await.unwrap();
        assert_eq!(online.len(), 2);
        assert!(online.iter().all(|m| m.status == MinerStatus::Online));
    }

    #[tokio::test]
    async fn test_purge_removes_only_old_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.4", Some(100.0), None, None)
            .await
            .unwrap();
        store
            .upsert_pool_stats(&PoolStatUpdate {
                address: "4AdUndX".to_string(),
                active_shares: 3,
                total_shares: 12,
                ..Default::default()
            })
            .await
            .unwrap();

        // Backdate rows past the retention cutoff.
        let old = unix_timestamp() - 40 * 86_400;
        sqlx::query(
            "INSERT INTO miner_history (host, timestamp, status) VALUES ('10.0.0.4', ?, 'Online')",
        )
        .bind(old)
        .execute(&store.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO pool_history (address, timestamp, active_shares, total_shares) \
             VALUES ('4AdUndX', ?, 1, 1)",
        )
        .bind(old)
        .execute(&store.pool)
        .await
        .unwrap();

        let deleted = store.purge_older_than(30).await.unwrap();
        assert_eq!(deleted, 2);

        // Current-state tables untouched, fresh history kept.
        let totals = store.totals().await.unwrap();
        assert_eq!(totals.miners, 1);
        assert_eq!(totals.pool_addresses, 1);
        assert_eq!(store.miner_history("10.0.0.4", 24).await.unwrap().len(), 1);
        assert_eq!(store.pool_history("4AdUndX", 24).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pool_upsert_and_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let mut update = PoolStatUpdate {
            address: "4B1xF".to_string(),
            active_shares: 5,
            active_uncles: 1,
            total_shares: 40,
            blocks_found: Some(2),
            payouts_sent: Some(7),
            last_payout_amount: Some(0.0031),
            last_payout_time: Some(1_700_000_000),
            total_payout_amount: Some(0.2),
        };
        store.upsert_pool_stats(&update).await.unwrap();

        update.active_shares = 6;
        update.blocks_found = None; // secondary fetch degraded this cycle
        store.upsert_pool_stats(&update).await.unwrap();

        let stats = store.list_pool_stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].active_shares, 6);
        assert_eq!(stats[0].blocks_found, None);
        assert_eq!(stats[0].payouts_sent, Some(7));

        let history = store.pool_history("4B1xF", 24).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_alert_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let id = store
            .add_alert("ARP spoofing", "details", Severity::High, None, None)
            .await
            .unwrap();

        store.acknowledge_alert(id + 999).await.unwrap();
        store.delete_alert(id + 999).await.unwrap();

        let alerts = store.list_alerts(None, 100).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(!alerts[0].acknowledged);
    }

    #[tokio::test]
    async fn test_alert_filtering_and_ack_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let first = store
            .add_alert(
                "ARP spoofing",
                "binding change",
                Severity::High,
                Some("192.168.1.20"),
                Some("aa:bb:cc:dd:ee:ff"),
            )
            .await
            .unwrap();
        store
            .add_alert("ARP spoofing", "another", Severity::High, None, None)
            .await
            .unwrap();

        store.acknowledge_alert(first).await.unwrap();

        let unacked = store.list_alerts(Some(false), 100).await.unwrap();
        assert_eq!(unacked.len(), 1);
        let acked = store.list_alerts(Some(true), 100).await.unwrap();
        assert_eq!(acked.len(), 1);
        assert_eq!(acked[0].id, first);
        assert_eq!(acked[0].source_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(acked[0].severity, Severity::High);

        store.acknowledge_all().await.unwrap();
        assert!(store.list_alerts(Some(false), 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_miner_cascades_to_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.9", Some(250.0), None, None)
            .await
            .unwrap();
        store
            .upsert_miner("10.0.0.9", Some(260.0), None, None)
            .await
            .unwrap();

        store.delete_miner("10.0.0.9").await.unwrap();

        assert!(store.get_miner("10.0.0.9").await.unwrap().is_none());
        assert!(store.miner_history("10.0.0.9", 24).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arp_binding_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .observe_arp("192.168.1.5", "aa:aa:aa:aa:aa:aa", 1_000)
            .await
            .unwrap();
        store
            .observe_arp("192.168.1.5", "aa:aa:aa:aa:aa:aa", 2_000)
            .await
            .unwrap();

        let binding = store
            .arp_binding("192.168.1.5", "aa:aa:aa:aa:aa:aa")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding.first_seen, 1_000);
        assert_eq!(binding.last_seen, 2_000);
        assert_eq!(binding.alerted_at, None);

        assert!(!store
            .arp_alerted_within("192.168.1.5", 2_000, 86_400)
            .await
            .unwrap());

        store
            .mark_arp_alerted("192.168.1.5", "aa:aa:aa:aa:aa:aa", 2_000)
            .await
            .unwrap();

        // Within cooldown, for any mac on that ip.
        assert!(store
            .arp_alerted_within("192.168.1.5", 3_000, 86_400)
            .await
            .unwrap());
        // Expired.
        assert!(!store
            .arp_alerted_within("192.168.1.5", 2_000 + 86_401, 86_400)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_totals() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_miner("10.0.0.1", Some(100.0), None, None)
            .await
            .unwrap();
        store.upsert_miner("10.0.0.2", None, None, None).await.unwrap();
        store
            .upsert_pool_stats(&PoolStatUpdate {
                address: "4Xyz".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .add_alert("ARP spoofing", "x", Severity::High, None, None)
            .await
            .unwrap();

        let totals = store.totals().await.unwrap();
        assert_eq!(totals.miners, 2);
        assert_eq!(totals.online_miners, 1);
        assert_eq!(totals.history_rows, 2);
        assert_eq!(totals.pool_addresses, 1);
        assert_eq!(totals.unacknowledged_alerts, 1);
    }
}
