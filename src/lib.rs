//! Library crate for host-recon-rs: connect-scan engine, service classification,
//! GeoIP enrichment and result export.
pub mod aggregate;
pub mod config;
pub mod connector;
pub mod error;
pub mod export;
pub mod geoip;
pub mod ports;
pub mod scanner;
pub mod server;
pub mod services;
pub mod session;
pub mod target;
pub mod types;

pub use error::{ReconError, Result};
