//! GeoIP enrichment collaborator.

use std::net::IpAddr;
use std::sync::OnceLock;

use async_trait::async_trait;
use ipnet::IpNet;
use serde::Deserialize;
use tracing::debug;

use crate::config::GeoConfig;
use crate::error::{ReconError, Result};
use crate::types::GeoRecord;

/// Source of location/ISP metadata for an address.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoRecord>;
}

/// Lookup that is switched off; always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeo;

#[async_trait]
impl GeoLookup for DisabledGeo {
    async fn lookup(&self, _ip: IpAddr) -> Result<GeoRecord> {
        Err(ReconError::GeoLookupUnavailable("geoip disabled".into()))
    }
}

/// Client for the ip-api.com JSON endpoint.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    http: reqwest::Client,
    endpoint: String,
}

/// ip-api.com answer: the record fields plus a status envelope.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    record: GeoRecord,
}

impl IpApiClient {
    pub fn new(cfg: &GeoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ReconError::Config(format!("geoip http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoRecord> {
        if !is_globally_routable(ip) {
            return Err(ReconError::GeoLookupUnavailable(format!(
                "{ip} is not a public address"
            )));
        }
        let url = format!("{}/{}", self.endpoint, ip);
        debug!(%url, "geoip lookup");
        let unavailable = |e: reqwest::Error| ReconError::GeoLookupUnavailable(e.to_string());
        let body: IpApiResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;
        into_record(body, ip)
    }
}

fn into_record(body: IpApiResponse, ip: IpAddr) -> Result<GeoRecord> {
    if !body.status.is_empty() && body.status != "success" {
        return Err(ReconError::GeoLookupUnavailable(
            body.message.unwrap_or_else(|| format!("provider answered {}", body.status)),
        ));
    }
    let mut record = body.record;
    if record.ip.is_empty() {
        record.ip = ip.to_string();
    }
    Ok(record)
}

fn reserved_networks() -> &'static [IpNet] {
    static NETS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETS.get_or_init(|| {
        [
            "0.0.0.0/8",
            "10.0.0.0/8",
            "100.64.0.0/10",
            "127.0.0.0/8",
            "169.254.0.0/16",
            "172.16.0.0/12",
            "192.0.0.0/24",
            "192.0.2.0/24",
            "192.168.0.0/16",
            "198.18.0.0/15",
            "198.51.100.0/24",
            "203.0.113.0/24",
            "224.0.0.0/3",
            "::/128",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
            "ff00::/8",
            "2001:db8::/32",
        ]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
    })
}

/// False for private, loopback, link-local, documentation, multicast and other
/// special-purpose addresses that a public GeoIP provider cannot locate.
pub fn is_globally_routable(ip: IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };
    !reserved_networks().iter().any(|net| net.contains(&ip))
}
