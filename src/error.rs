//! Error types for the host-recon-rs library.

use thiserror::Error;

/// Result type alias for recon operations.
pub type Result<T> = std::result::Result<T, ReconError>;

/// Errors surfaced by target validation, scanning, enrichment and export.
#[derive(Error, Debug)]
pub enum ReconError {
    /// Target string is empty or not a valid IP literal / hostname.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Request body is missing, malformed or has fields of the wrong type.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Hostname lookup produced no usable address.
    #[error("failed to resolve {host}: {reason}")]
    ResolutionFailure { host: String, reason: String },

    /// Port range is out of bounds, inverted or too wide.
    #[error("invalid port range: {0}")]
    InvalidRange(String),

    /// A single connect attempt did not finish in time. Never fatal for a sweep.
    #[error("connect to port {port} timed out")]
    ConnectorTimeout { port: u16 },

    /// A single connect attempt failed outright. Never fatal for a sweep.
    #[error("connect to port {port} failed: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Export was requested before any scan completed.
    #[error("no scan result available")]
    NoResultAvailable,

    /// Geolocation enrichment could not be obtained.
    #[error("geoip lookup unavailable: {0}")]
    GeoLookupUnavailable(String),

    /// Invalid scan configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Export serialization failed.
    #[error("export failed: {0}")]
    Export(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconError::InvalidTarget(_) => "invalid_target",
            ReconError::InvalidRequest(_) => "invalid_request",
            ReconError::ResolutionFailure { .. } => "resolution_failure",
            ReconError::InvalidRange(_) => "invalid_range",
            ReconError::ConnectorTimeout { .. } => "connector_timeout",
            ReconError::Connect { .. } => "connect_failed",
            ReconError::NoResultAvailable => "no_result_available",
            ReconError::GeoLookupUnavailable(_) => "geo_lookup_unavailable",
            ReconError::Config(_) => "config",
            ReconError::Export(_) => "export",
            ReconError::Io(_) => "io",
        }
    }

    /// Whether the error rejects the request before any network activity.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReconError::InvalidTarget(_)
                | ReconError::InvalidRequest(_)
                | ReconError::InvalidRange(_)
                | ReconError::Config(_)
        )
    }
}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        ReconError::Export(e.to_string())
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(e: serde_json::Error) -> Self {
        ReconError::Export(e.to_string())
    }
}
