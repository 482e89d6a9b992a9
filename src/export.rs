//! JSON and CSV projections of a completed scan.
//!
//! CSV layout: one row per open port, with the GeoIP fields repeated on every
//! row (left empty when no record is available).

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};
use crate::types::{GeoRecord, PortResult, ScanResult};

pub const CSV_HEADER: [&str; 11] = [
    "Target",
    "IP",
    "Country",
    "Region",
    "City",
    "ISP",
    "Organization",
    "Port",
    "Service",
    "ResponseMs",
    "Banner",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "scan_result.json",
            ExportFormat::Csv => "scan_result.csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ReconError::Config(format!("unknown export format: {other}"))),
        }
    }
}

/// A rendered export, regenerated on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub body: String,
}

impl ExportDocument {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn file_name(&self) -> &'static str {
        self.format.file_name()
    }
}

/// JSON export shape. `geoip` is always present, `null` when absent.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonExport {
    pub target: String,
    pub ip: IpAddr,
    pub ports: Vec<PortResult>,
    pub geoip: Option<GeoRecord>,
}

/// Render `result` in the requested format.
pub fn render(result: &ScanResult, format: ExportFormat) -> Result<ExportDocument> {
    let body = match format {
        ExportFormat::Json => to_json(result)?,
        ExportFormat::Csv => to_csv(result)?,
    };
    Ok(ExportDocument { format, body })
}

pub fn to_json(result: &ScanResult) -> Result<String> {
    let doc = JsonExport {
        target: result.target.clone(),
        ip: result.ip,
        ports: result.ports.clone(),
        geoip: result.geoip.clone(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn to_csv(result: &ScanResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;

    let empty = GeoRecord::default();
    let geo = result.geoip.as_ref().unwrap_or(&empty);
    let ip = result.ip.to_string();
    for p in &result.ports {
        let port = p.port.to_string();
        let response_ms = p.response_time_ms.to_string();
        wtr.write_record([
            result.target.as_str(),
            ip.as_str(),
            geo.country.as_str(),
            geo.region.as_str(),
            geo.city.as_str(),
            geo.isp.as_str(),
            geo.org.as_str(),
            port.as_str(),
            p.service.as_deref().unwrap_or(""),
            response_ms.as_str(),
            p.banner.as_str(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ReconError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Export(e.to_string()))
}

/// One CSV data row, as read back by consumers of the export.
#[derive(Debug, Deserialize, PartialEq)]
pub struct CsvRow {
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "ISP")]
    pub isp: String,
    #[serde(rename = "Organization")]
    pub org: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "ResponseMs")]
    pub response_ms: u64,
    #[serde(rename = "Banner")]
    pub banner: String,
}

/// Parse a CSV export back into rows.
pub fn parse_csv(body: &str) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<CsvRow>, _>>()?;
    Ok(rows)
}
