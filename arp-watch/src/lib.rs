//! ARP spoof detection.
//!
//! A passive watcher over address-resolution broadcasts: an in-memory table
//! of last-seen bindings, alert persistence with a per-address cooldown, and
//! a capture loop that feeds sender ip/mac pairs through one at a time.

pub mod detector;
pub mod watch;

pub use detector::ArpTable;
pub use watch::{run, SpoofWatch, WatchError, DEFAULT_COOLDOWN_SECS};
