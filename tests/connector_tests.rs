use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use host_recon_rs::config::ScanConfig;
use host_recon_rs::connector::{PortProbe, TcpConnector};
use host_recon_rs::types::PortStatus;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn config() -> ScanConfig {
    ScanConfig {
        connect_timeout: Duration::from_millis(500),
        banner_timeout: Duration::from_millis(300),
        ..ScanConfig::default()
    }
}

/// Listener that greets every client with `greeting` (or stays silent).
async fn spawn_listener(greeting: Option<&'static [u8]>) -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                if let Some(g) = greeting {
                    let _ = sock.write_all(g).await;
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
            });
        }
    });
    port
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn open_port_with_ssh_banner() {
    let port = spawn_listener(Some(b"SSH-2.0-OpenSSH_8.9\r\n")).await;
    let probe = TcpConnector::new(LOCALHOST, &config());
    let r = probe.probe(port).await;
    assert_eq!(r.status, PortStatus::Open);
    assert_eq!(r.banner, "SSH-2.0-OpenSSH_8.9\\r\\n");
    assert_eq!(r.service.as_deref(), Some("SSH"));
}

#[tokio::test]
async fn silent_service_is_open_with_empty_banner() {
    let port = spawn_listener(None).await;
    let probe = TcpConnector::new(LOCALHOST, &config());
    let started = std::time::Instant::now();
    let r = probe.probe(port).await;
    assert_eq!(r.status, PortStatus::Open);
    assert!(r.banner.is_empty());
    // Banner wait is bounded by the banner timeout, not the connect timeout.
    assert!(started.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test]
async fn long_banner_truncated_to_limit() {
    let port = spawn_listener(Some(&[b'A'; 1024])).await;
    let cfg = ScanConfig {
        banner_max_bytes: 16,
        ..config()
    };
    let r = TcpConnector::new(LOCALHOST, &cfg).probe(port).await;
    assert!(!r.banner.is_empty() && r.banner.len() <= 16);
}

#[tokio::test]
async fn refused_port_is_closed() {
    let port = free_port().await;
    let r = TcpConnector::new(LOCALHOST, &config()).probe(port).await;
    assert_eq!(r.status, PortStatus::Closed);
    assert!(r.service.is_none());
    assert!(r.banner.is_empty());
}

#[tokio::test]
async fn unanswered_connect_is_never_open() {
    // Non-routable documentation address: either times out or fails fast.
    let cfg = ScanConfig {
        connect_timeout: Duration::from_millis(100),
        banner_timeout: Duration::from_millis(50),
        ..ScanConfig::default()
    };
    let ip: IpAddr = "192.0.2.1".parse().unwrap();
    let started = std::time::Instant::now();
    let r = TcpConnector::new(ip, &cfg).probe(9).await;
    assert_ne!(r.status, PortStatus::Open);
    assert!(started.elapsed() < Duration::from_secs(2));
}
