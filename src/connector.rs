//! Single-port TCP connect probe with passive banner capture.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::trace;

use crate::config::ScanConfig;
use crate::error::{ReconError, Result};
use crate::services;
use crate::types::{PortResult, PortStatus};

/// Anything that can turn a port number into exactly one outcome.
///
/// Implementations must never panic or error: every failure becomes a
/// non-open `PortResult`.
#[async_trait]
pub trait PortProbe: Send + Sync + 'static {
    async fn probe(&self, port: u16) -> PortResult;
}

/// Connect-scan probe against one address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    ip: IpAddr,
    connect_timeout: Duration,
    banner_timeout: Duration,
    banner_max_bytes: usize,
}

impl TcpConnector {
    pub fn new(ip: IpAddr, cfg: &ScanConfig) -> Self {
        Self {
            ip,
            connect_timeout: cfg.connect_timeout,
            banner_timeout: cfg.banner_timeout,
            banner_max_bytes: cfg.banner_max_bytes,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Bounded connect. Refusal and timeout are reported as distinct errors.
    async fn connect(&self, port: u16) -> Result<TcpStream> {
        let addr = SocketAddr::new(self.ip, port);
        match time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ReconError::Connect { port, source }),
            Err(_) => Err(ReconError::ConnectorTimeout { port }),
        }
    }

    /// Read whatever the service volunteers within the banner timeout.
    ///
    /// Silence, EOF and read errors all yield an empty banner.
    async fn read_banner(&self, stream: &mut TcpStream) -> String {
        let mut buf = vec![0u8; self.banner_max_bytes];
        match time::timeout(self.banner_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => sanitize_banner(&buf[..n]),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl PortProbe for TcpConnector {
    async fn probe(&self, port: u16) -> PortResult {
        let start = Instant::now();
        match self.connect(port).await {
            Ok(mut stream) => {
                let response_time_ms = start.elapsed().as_millis() as u64;
                let banner = self.read_banner(&mut stream).await;
                // Stream is dropped (closed) here on every path.
                drop(stream);
                let service = services::classify(port, &banner).map(str::to_string);
                trace!(port, response_time_ms, banner_len = banner.len(), "open");
                PortResult::open(port, response_time_ms, banner, service)
            }
            Err(ReconError::Connect { source, .. })
                if source.kind() == ErrorKind::ConnectionRefused =>
            {
                PortResult::unreachable(port, PortStatus::Closed)
            }
            Err(e) => {
                trace!(port, error = %e, "no answer");
                PortResult::unreachable(port, PortStatus::Filtered)
            }
        }
    }
}

/// Decode banner bytes as text that is safe to embed in any export format.
///
/// Invalid UTF-8 is replaced; CR, LF and TAB become `\r`, `\n`, `\t`;
/// other control characters become `\xNN`.
pub fn sanitize_banner(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
