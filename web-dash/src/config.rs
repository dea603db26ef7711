use serde::Deserialize;
use std::{env, fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: String,
    pub db_path: PathBuf,
    pub client_poll_interval_secs: u64,
    pub probe_host: String,
    pub miner_port: u16,
    pub miner_api_token: Option<String>,
    pub miner_timeout_secs: u64,
    pub retention_days: i64,
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WebDashConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    probe: ProbeConfig,
    #[serde(default)]
    retention: RetentionConfig,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    listen_address: Option<String>,
    client_poll_interval_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: Some("127.0.0.1:8501".to_string()),
            client_poll_interval_secs: Some(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreConfig {
    db_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from("minermon.db")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeConfig {
    host: Option<String>,
    port: Option<u16>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: Some("127.0.0.1".to_string()),
            port: Some(8000),
            api_token: None,
            timeout_secs: Some(2),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RetentionConfig {
    days: Option<i64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: Some(30) }
    }
}

impl Config {
    pub fn from_args() -> Result<Self, Box<dyn std::error::Error>> {
        let args: Vec<String> = env::args().collect();

        // Extract log file if provided (for tracing setup in main)
        let log_file = args
            .iter()
            .position(|arg| arg == "-f" || arg == "--log-file")
            .and_then(|i| args.get(i + 1))
            .cloned();

        // Load config file (path can be overridden via CLI); a missing file
        // falls back to defaults, a malformed one is an error.
        let config_path = args
            .iter()
            .position(|arg| arg == "--config" || arg == "-c")
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
            .unwrap_or("web-dash.config.toml");

        let config_str = fs::read_to_string(config_path).unwrap_or_default();
        let file: WebDashConfig = if config_str.is_empty() {
            WebDashConfig::default()
        } else {
            toml::from_str(&config_str)?
        };

        let defaults = WebDashConfig::default();

        let listen_address = args
            .iter()
            .position(|arg| arg == "--listen-address" || arg == "-l")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .or(file.server.listen_address)
            .or(defaults.server.listen_address)
            .ok_or("Missing required config: server.listen_address")?;

        let db_path = args
            .iter()
            .position(|arg| arg == "--db-path" || arg == "-d")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .map(PathBuf::from)
            .or(file.store.db_path)
            .or(defaults.store.db_path)
            .ok_or("Missing required config: store.db_path")?;

        Ok(Config {
            listen_address,
            db_path,
            client_poll_interval_secs: file
                .server
                .client_poll_interval_secs
                .unwrap_or(30),
            probe_host: file
                .probe
                .host
                .or(defaults.probe.host)
                .unwrap_or_default(),
            miner_port: file.probe.port.or(defaults.probe.port).unwrap_or(8000),
            miner_api_token: file.probe.api_token,
            miner_timeout_secs: file.probe.timeout_secs.unwrap_or(2),
            retention_days: file.retention.days.or(defaults.retention.days).unwrap_or(30),
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_deserialization() {
        let toml_str = r#"
            [server]
            listen_address = "0.0.0.0:9000"
            client_poll_interval_secs = 10

            [store]
            db_path = "/tmp/minermon.db"

            [probe]
            host = "192.168.1.50"
            port = 18000
            api_token = "secret"
            timeout_secs = 4

            [retention]
            days = 7
        "#;
        let config: WebDashConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.server.listen_address,
            Some("0.0.0.0:9000".to_string())
        );
        assert_eq!(config.server.client_poll_interval_secs, Some(10));
        assert_eq!(config.store.db_path, Some(PathBuf::from("/tmp/minermon.db")));
        assert_eq!(config.probe.host, Some("192.168.1.50".to_string()));
        assert_eq!(config.probe.port, Some(18000));
        assert_eq!(config.retention.days, Some(7));
    }

    #[test]
    fn test_empty_sections_get_defaults() {
        let config: WebDashConfig = toml::from_str("[server]\n").unwrap();
        assert_eq!(config.server.listen_address, None);
        assert_eq!(
            config.store.db_path,
            Some(PathBuf::from("minermon.db"))
        );
    }
}
