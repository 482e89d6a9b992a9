//! Scan session: runs the pipeline and owns the most recent result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::connector::TcpConnector;
use crate::error::{ReconError, Result};
use crate::export::{self, ExportDocument, ExportFormat};
use crate::geoip::{DisabledGeo, GeoLookup, IpApiClient};
use crate::ports::validate_range;
use crate::scanner::{self, SharedProgress, SweepOptions};
use crate::target::resolve_target;
use crate::types::{ScanRequest, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    Done,
}

/// Pollable progress of the latest scan.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct ScanStatus {
    pub state: ScanState,
    pub total: u64,
    pub scanned: u64,
    pub open: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Generation of the scan whose result is published.
    published_generation: u64,
    last: Option<Arc<ScanResult>>,
}

type RunningSlot = Mutex<Option<(u64, SharedProgress)>>;

/// Clears the running slot when the scan that owns it ends, including when
/// its future is dropped mid-sweep.
struct RunningGuard<'a> {
    slot: &'a RunningSlot,
    generation: u64,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*running, Some((g, _)) if g == self.generation) {
            *running = None;
        }
    }
}

/// Session-scoped scanner: configuration, GeoIP collaborator and the
/// "last result" slot that exports read from.
pub struct ScanSession {
    config: ScanConfig,
    geo: Arc<dyn GeoLookup>,
    state: RwLock<SessionState>,
    /// Generation handed to the next scan.
    next_generation: AtomicU64,
    /// Progress of the most recently started scan still in flight.
    running: RunningSlot,
}

impl ScanSession {
    pub fn new(config: ScanConfig, geo: Arc<dyn GeoLookup>) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
            geo,
            state: RwLock::new(SessionState::default()),
            next_generation: AtomicU64::new(0),
            running: Mutex::new(None),
        })
    }

    /// Session using ip-api.com, or no enrichment when geoip is disabled.
    pub fn from_config(config: ScanConfig) -> Result<Self> {
        let geo: Arc<dyn GeoLookup> = if config.geoip.enabled {
            Arc::new(IpApiClient::new(&config.geoip)?)
        } else {
            Arc::new(DisabledGeo)
        };
        Self::new(config, geo)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn scan(&self, req: &ScanRequest) -> Result<Arc<ScanResult>> {
        self.scan_with_cancel(req, CancellationToken::new()).await
    }

    /// Validate, resolve, sweep, enrich and publish.
    ///
    /// Range and target syntax are checked before any network activity. A scan
    /// with no open ports is a successful, empty result.
    pub async fn scan_with_cancel(
        &self,
        req: &ScanRequest,
        cancel: CancellationToken,
    ) -> Result<Arc<ScanResult>> {
        let range = validate_range(req.start, req.end, self.config.max_range_width)?;
        let target = resolve_target(&req.target).await?;

        let progress = SharedProgress::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        *self.running.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((generation, progress.clone()));
        let _running = RunningGuard {
            slot: &self.running,
            generation,
        };
        info!(
            host = %target.input,
            ip = %target.ip,
            start = range.start(),
            end = range.end(),
            generation,
            "scan started"
        );

        let probe = Arc::new(TcpConnector::new(target.ip, &self.config));
        let opts = SweepOptions {
            workers: self.config.workers,
            deadline: self.config.scan_deadline,
        };
        let (sweep, geo) = tokio::join!(
            scanner::sweep(probe, range, opts, cancel, progress),
            self.geo.lookup(target.ip)
        );
        let geo = match geo {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(ip = %target.ip, error = %e, "geoip enrichment skipped");
                None
            }
        };

        let result = Arc::new(
            sweep
                .aggregator
                .finish(&target, geo, sweep.elapsed, sweep.cut_short),
        );
        info!(
            host = %result.target,
            open = result.ports.len(),
            elapsed_ms = result.summary.elapsed_ms,
            complete = result.summary.complete,
            "scan finished"
        );

        let mut s = self.state.write().await;
        if generation > s.published_generation {
            s.published_generation = generation;
            s.last = Some(result.clone());
        }
        Ok(result)
    }

    /// Most recently published result, if any.
    pub async fn last_result(&self) -> Option<Arc<ScanResult>> {
        self.state.read().await.last.clone()
    }

    /// Render the last result. Fails with `NoResultAvailable` before the first scan.
    pub async fn export(&self, format: ExportFormat) -> Result<ExportDocument> {
        let result = self
            .last_result()
            .await
            .ok_or(ReconError::NoResultAvailable)?;
        export::render(&result, format)
    }

    pub async fn status(&self) -> ScanStatus {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, p)| p.clone());
        if let Some(p) = running {
            return ScanStatus {
                state: ScanState::Running,
                total: p.total.load(Ordering::Relaxed),
                scanned: p.scanned_done.load(Ordering::Relaxed),
                open: p.open_count.load(Ordering::Relaxed),
            };
        }
        let s = self.state.read().await;
        match s.last.as_ref() {
            Some(r) => ScanStatus {
                state: ScanState::Done,
                total: r.summary.scanned,
                scanned: r.summary.scanned - r.summary.not_scanned,
                open: r.ports.len() as u64,
            },
            None => ScanStatus::default(),
        }
    }
}
