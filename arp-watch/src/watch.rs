//! Capture loop and alert persistence for the ARP watcher.

use crate::detector::ArpTable;
use metrics_store::{unix_timestamp, MetricsStore, Severity, StoreError};
use pnet::datalink::{self, Channel, NetworkInterface};
use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Suppress repeat alerts for the same address for this long.
pub const DEFAULT_COOLDOWN_SECS: i64 = 24 * 3600;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("packet capture requires elevated privileges (run as root or grant CAP_NET_RAW)")]
    CapturePermission,

    #[error("no such interface: {0}")]
    NoSuchInterface(String),

    #[error("no usable capture interface found")]
    NoUsableInterface,

    #[error("unsupported datalink channel type")]
    UnsupportedChannel,

    #[error("capture error: {0}")]
    Capture(#[from] std::io::Error),
}

/// Reactive spoof detector: compares each observed binding against the last
/// one and persists an alert when it changed, subject to the cooldown.
pub struct SpoofWatch {
    store: MetricsStore,
    table: ArpTable,
    cooldown_secs: i64,
}

impl SpoofWatch {
    pub fn new(store: MetricsStore, cooldown_secs: i64) -> Self {
        Self {
            store,
            table: ArpTable::new(),
            cooldown_secs,
        }
    }

    /// Process one ARP observation. Returns true when an alert was persisted.
    ///
    /// The quiet-log row is written for every event; the in-memory table is
    /// updated in every branch so the next change is judged against the most
    /// recent binding.
    pub async fn handle_event(
        &mut self,
        ip: Ipv4Addr,
        mac: MacAddr,
        now: i64,
    ) -> Result<bool, StoreError> {
        let previous = self.table.observe(ip, mac);

        let ip_text = ip.to_string();
        let mac_text = mac.to_string();
        self.store.observe_arp(&ip_text, &mac_text, now).await?;

        let Some(previous) = previous else {
            return Ok(false);
        };

        if self
            .store
            .arp_alerted_within(&ip_text, now, self.cooldown_secs)
            .await?
        {
            debug!("suppressing repeat alert for {} -> {}", ip, mac);
            return Ok(false);
        }

        warn!("ARP binding change for {}: {} -> {}", ip, previous, mac);
        let details = format!(
            "Potential ARP spoofing detected.\n\
             IP address: {ip}\n\
             Original MAC: {previous}\n\
             New (suspicious) MAC: {mac}\n\
             Verify whether this host legitimately changed hardware before trusting the network."
        );
        self.store
            .add_alert(
                "ARP spoofing",
                &details,
                Severity::High,
                Some(&ip_text),
                Some(&mac_text),
            )
            .await?;
        self.store.mark_arp_alerted(&ip_text, &mac_text, now).await?;

        Ok(true)
    }
}

/// Run the capture loop until process termination or an unrecoverable
/// capture error.
///
/// Blocking; per-event persistence is bridged onto `handle`. Call from a
/// blocking context (e.g. `tokio::task::block_in_place`).
pub fn run(
    watch: &mut SpoofWatch,
    interface: Option<&str>,
    handle: Handle,
) -> Result<(), WatchError> {
    let iface = select_interface(interface)?;
    info!("watching ARP traffic on {}", iface.name);

    let mut rx = match datalink::channel(&iface, Default::default()) {
        Ok(Channel::Ethernet(_tx, rx)) => rx,
        Ok(_) => return Err(WatchError::UnsupportedChannel),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(WatchError::CapturePermission)
        }
        Err(e) => return Err(WatchError::Capture(e)),
    };

    loop {
        let frame = rx.next()?;
        let Some((ip, mac)) = parse_arp(frame) else {
            continue;
        };

        // One event at a time, in arrival order; a store failure drops this
        // event only.
        if let Err(e) = handle.block_on(watch.handle_event(ip, mac, unix_timestamp())) {
            warn!("failed to persist ARP observation for {}: {}", ip, e);
        }
    }
}

fn select_interface(name: Option<&str>) -> Result<NetworkInterface, WatchError> {
    let interfaces = datalink::interfaces();
    match name {
        Some(name) => interfaces
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| WatchError::NoSuchInterface(name.to_string())),
        None => interfaces
            .into_iter()
            .find(|i| i.is_up() && !i.is_loopback() && !i.ips.is_empty())
            .ok_or(WatchError::NoUsableInterface),
    }
}

/// Extract the sender ip/mac from an ARP request or reply frame.
fn parse_arp(frame: &[u8]) -> Option<(Ipv4Addr, MacAddr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    let op = arp.get_operation();
    if op != ArpOperations::Request && op != ArpOperations::Reply {
        return None;
    }

    Some((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::arp::{ArpHardwareTypes, ArpOperation, MutableArpPacket};
    use pnet::packet::ethernet::MutableEthernetPacket;
    use tempfile::TempDir;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, last)
    }

    fn arp_frame(op: ArpOperation, sender_ip: Ipv4Addr, sender_mac: MacAddr) -> Vec<u8> {
        let mut buf = vec![0u8; 42];
        {
            let mut arp = MutableArpPacket::new(&mut buf[14..]).unwrap();
            arp.set_hardware_type(ArpHardwareTypes::Ethernet);
            arp.set_protocol_type(EtherTypes::Ipv4);
            arp.set_hw_addr_len(6);
            arp.set_proto_addr_len(4);
            arp.set_operation(op);
            arp.set_sender_hw_addr(sender_mac);
            arp.set_sender_proto_addr(sender_ip);
            arp.set_target_hw_addr(MacAddr::broadcast());
            arp.set_target_proto_addr(Ipv4Addr::new(192, 168, 1, 1));
        }
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_destination(MacAddr::broadcast());
            eth.set_source(sender_mac);
            eth.set_ethertype(EtherTypes::Arp);
        }
        buf
    }

    #[test]
    fn parse_arp_accepts_requests_and_replies() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);

        let frame = arp_frame(ArpOperations::Request, ip, mac(1));
        assert_eq!(parse_arp(&frame), Some((ip, mac(1))));

        let frame = arp_frame(ArpOperations::Reply, ip, mac(2));
        assert_eq!(parse_arp(&frame), Some((ip, mac(2))));
    }

    #[test]
    fn parse_arp_ignores_other_operations_and_frames() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);

        let frame = arp_frame(ArpOperation::new(3), ip, mac(1));
        assert_eq!(parse_arp(&frame), None);

        let mut not_arp = arp_frame(ArpOperations::Request, ip, mac(1));
        {
            let mut eth = MutableEthernetPacket::new(&mut not_arp).unwrap();
            eth.set_ethertype(EtherTypes::Ipv4);
        }
        assert_eq!(parse_arp(&not_arp), None);

        assert_eq!(parse_arp(&[0u8; 4]), None);
    }

    async fn open_watch(dir: &TempDir, cooldown_secs: i64) -> SpoofWatch {
        let store = MetricsStore::open(dir.path().join("test.db")).await.unwrap();
        SpoofWatch::new(store, cooldown_secs)
    }

    #[tokio::test]
    async fn test_binding_change_raises_one_alert() {
        let temp_dir = TempDir::new().unwrap();
        let mut watch = open_watch(&temp_dir, DEFAULT_COOLDOWN_SECS).await;
        let ip = Ipv4Addr::new(192, 168, 1, 30);

        assert!(!watch.handle_event(ip, mac(1), 1_000).await.unwrap());
        assert!(watch.handle_event(ip, mac(2), 1_010).await.unwrap());

        let alerts = watch.store.list_alerts(None, 100).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].source_ip.as_deref(), Some("192.168.1.30"));
        assert_eq!(
            alerts[0].source_mac.as_deref(),
            Some(mac(2).to_string().as_str())
        );
        assert!(alerts[0].details.contains(&mac(1).to_string()));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_but_tracks_binding() {
        let temp_dir = TempDir::new().unwrap();
        let mut watch = open_watch(&temp_dir, DEFAULT_COOLDOWN_SECS).await;
        let ip = Ipv4Addr::new(192, 168, 1, 31);

        watch.handle_event(ip, mac(1), 1_000).await.unwrap();
        assert!(watch.handle_event(ip, mac(2), 1_010).await.unwrap());

        // Within the cooldown: no new alert, but the table moved on...
        assert!(!watch.handle_event(ip, mac(3), 1_020).await.unwrap());
        assert_eq!(watch.store.list_alerts(None, 100).await.unwrap().len(), 1);

        // ...so the quiet log still recorded the suppressed binding.
        let binding = watch
            .store
            .arp_binding("192.168.1.31", &mac(3).to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding.last_seen, 1_020);
        assert_eq!(binding.alerted_at, None);
    }

    #[tokio::test]
    async fn test_alerts_resume_after_cooldown_expires() {
        let temp_dir = TempDir::new().unwrap();
        let mut watch = open_watch(&temp_dir, DEFAULT_COOLDOWN_SECS).await;
        let ip = Ipv4Addr::new(192, 168, 1, 32);

        watch.handle_event(ip, mac(1), 1_000).await.unwrap();
        assert!(watch.handle_event(ip, mac(2), 1_010).await.unwrap());
        assert!(!watch.handle_event(ip, mac(1), 1_020).await.unwrap());

        let later = 1_010 + DEFAULT_COOLDOWN_SECS + 1;
        assert!(watch.handle_event(ip, mac(2), later).await.unwrap());
        assert_eq!(watch.store.list_alerts(None, 100).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stable_binding_never_alerts() {
        let temp_dir = TempDir::new().unwrap();
        let mut watch = open_watch(&temp_dir, DEFAULT_COOLDOWN_SECS).await;
        let ip = Ipv4Addr::new(192, 168, 1, 33);

        for now in [1_000, 1_060, 1_120] {
            assert!(!watch.handle_event(ip, mac(7), now).await.unwrap());
        }
        assert!(watch.store.list_alerts(None, 100).await.unwrap().is_empty());
    }
}
