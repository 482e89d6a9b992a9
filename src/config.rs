use std::time::Duration;

use crate::error::{ReconError, Result};

/// Upper bound on the worker pool regardless of what was requested.
pub const MAX_WORKERS: usize = 5_000;

/// Tunables for a scan session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Per-port TCP connect timeout.
    pub connect_timeout: Duration,
    /// How long to wait for an unprompted greeting after connecting.
    pub banner_timeout: Duration,
    /// Maximum number of banner bytes kept.
    pub banner_max_bytes: usize,
    /// Size of the worker pool.
    pub workers: usize,
    /// Widest inclusive range a single request may sweep.
    pub max_range_width: u32,
    /// Wall-clock budget for the whole sweep.
    pub scan_deadline: Duration,
    /// Geolocation settings.
    pub geoip: GeoConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoConfig {
    pub enabled: bool,
    /// Base URL; the IP is appended as the last path segment.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://ip-api.com/json".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(400),
            banner_timeout: Duration::from_millis(200),
            banner_max_bytes: 256,
            workers: 100,
            max_range_width: 10_000,
            scan_deadline: Duration::from_secs(30),
            geoip: GeoConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Check internal consistency and clamp the pool size.
    pub fn validate(mut self) -> Result<Self> {
        if self.connect_timeout.is_zero() {
            return Err(ReconError::Config("connect timeout must be > 0".into()));
        }
        if self.banner_timeout.is_zero() {
            return Err(ReconError::Config("banner timeout must be > 0".into()));
        }
        if self.banner_timeout > self.connect_timeout {
            return Err(ReconError::Config(format!(
                "banner timeout ({} ms) must not exceed connect timeout ({} ms)",
                self.banner_timeout.as_millis(),
                self.connect_timeout.as_millis()
            )));
        }
        if self.banner_max_bytes == 0 {
            return Err(ReconError::Config("banner size must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(ReconError::Config("worker pool size must be > 0".into()));
        }
        if self.max_range_width == 0 {
            return Err(ReconError::Config("maximum range width must be > 0".into()));
        }
        if self.scan_deadline.is_zero() {
            return Err(ReconError::Config("scan deadline must be > 0".into()));
        }
        self.workers = self.workers.min(MAX_WORKERS);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScanConfig::default().validate().unwrap();
        assert_eq!(cfg.workers, 100);
        assert!(cfg.banner_timeout < cfg.connect_timeout);
    }

    #[test]
    fn banner_timeout_longer_than_connect_rejected() {
        let cfg = ScanConfig {
            banner_timeout: Duration::from_secs(2),
            ..ScanConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ReconError::Config(_))));
    }

    #[test]
    fn workers_clamped() {
        let cfg = ScanConfig {
            workers: 1_000_000,
            ..ScanConfig::default()
        };
        assert_eq!(cfg.validate().unwrap().workers, MAX_WORKERS);
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = ScanConfig {
            workers: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
