use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Incoming scan request: `{ "target": "...", "start": 1, "end": 1024 }`.
///
/// Bounds are signed so that out-of-range values reach range validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: String,
    pub start: i64,
    pub end: i64,
}

/// Liveness of one scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    /// TCP handshake completed.
    Open,
    /// Connection actively refused.
    Closed,
    /// No answer before the connect timeout, or the attempt was abandoned.
    Filtered,
    /// Never attempted because the scan deadline elapsed first.
    NotScanned,
}

/// Outcome for one port. Created once by the dispatcher, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    pub port: u16,
    pub status: PortStatus,
    pub service: Option<String>,
    #[serde(rename = "response_ms")]
    pub response_time_ms: u64,
    pub banner: String,
}

impl PortResult {
    pub fn open(port: u16, response_time_ms: u64, banner: String, service: Option<String>) -> Self {
        Self {
            port,
            status: PortStatus::Open,
            service,
            response_time_ms,
            banner,
        }
    }

    /// Non-open outcome; latency and banner carry no meaning.
    pub fn unreachable(port: u16, status: PortStatus) -> Self {
        Self {
            port,
            status,
            service: None,
            response_time_ms: 0,
            banner: String::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Geolocation/ISP metadata for the target address.
///
/// Field names on the wire follow the ip-api.com response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoRecord {
    #[serde(rename = "query", default)]
    pub ip: String,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "regionName", default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub org: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// Inclusive range actually swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEcho {
    pub start: u16,
    pub end: u16,
}

/// Per-status counters over every port in the range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scanned: u64,
    pub open: u64,
    pub closed: u64,
    pub filtered: u64,
    pub not_scanned: u64,
    pub elapsed_ms: u64,
    /// False when the deadline or a cancellation cut the sweep short.
    pub complete: bool,
}

/// Final, immutable result of one scan: open ports ascending plus optional geo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub ip: IpAddr,
    pub range: RangeEcho,
    pub ports: Vec<PortResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoip: Option<GeoRecord>,
    pub summary: ScanSummary,
    pub finished_at: String,
}

/// Reduced response shape: `{ "open_ports": [22, 80] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyScanResult {
    pub open_ports: Vec<u16>,
}

impl From<&ScanResult> for LegacyScanResult {
    fn from(result: &ScanResult) -> Self {
        Self {
            open_ports: result.ports.iter().map(|p| p.port).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_result_uses_response_ms_on_the_wire() {
        let p = PortResult::open(22, 3, "SSH-2.0-x".into(), Some("SSH".into()));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["response_ms"], 3);
        assert_eq!(v["status"], "open");
        assert_eq!(v["service"], "SSH");
    }

    #[test]
    fn geo_record_reads_ip_api_fields() {
        let body = r#"{"status":"success","query":"8.8.8.8","country":"United States",
            "regionName":"Virginia","city":"Ashburn","isp":"Google LLC","org":"Google Public DNS",
            "lat":39.03,"lon":-77.5}"#;
        let g: GeoRecord = serde_json::from_str(body).unwrap();
        assert_eq!(g.ip, "8.8.8.8");
        assert_eq!(g.region, "Virginia");
        assert_eq!(g.lat, Some(39.03));
    }
}
