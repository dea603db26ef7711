use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid network range {0:?}: use CIDR notation, e.g. 192.168.1.0/24")]
    InvalidCidr(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] metrics_store::StoreError),

    #[error(transparent)]
    Watch(#[from] arp_watch::WatchError),
}
