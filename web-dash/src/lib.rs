//! Operator dashboard: an HTML page with client-side polling plus the JSON
//! API it is built on (miners, history, pool stats, alerts, actions).

pub mod config;
pub mod fmt;
pub mod web;

pub use config::Config;
pub use web::{run_http_server, DashContext};
