use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::config::MAX_WORKERS;
use crate::connector::PortProbe;
use crate::ports::PortRange;
use crate::types::{PortResult, PortStatus};

/// Live counters a caller can poll while a sweep runs.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub total: Arc<AtomicU64>,
    pub scanned_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            total: Arc::new(AtomicU64::new(0)),
            scanned_done: Arc::new(AtomicU64::new(0)),
            open_count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn record(&self, result: &PortResult) {
        self.scanned_done.fetch_add(1, Ordering::Relaxed);
        if result.is_open() {
            self.open_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Aborts the wrapped task when dropped, so an abandoned sweep leaves no timer behind.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Pool size and wall-clock budget for one sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub workers: usize,
    pub deadline: Duration,
}

/// Aggregated outcomes of a sweep plus how it ended.
#[derive(Debug)]
pub struct Sweep {
    pub aggregator: Aggregator,
    pub elapsed: Duration,
    /// Deadline elapsed or external cancellation fired before the queue drained.
    pub cut_short: bool,
}

/// Sweep every port of `range` through `probe` using a fixed pool of workers.
///
/// - Workers pull the next port from a shared atomic cursor, so each port is
///   handed out exactly once and a slow port only occupies its own worker.
/// - Outcomes flow through an unbounded channel into the aggregator as they
///   complete; no lock is held across network I/O.
/// - When the deadline elapses or `cancel` fires, in-flight probes are dropped
///   (closing their sockets) and reported `Filtered`; ports never started are
///   reported `NotScanned`.
pub async fn sweep<P: PortProbe>(
    probe: Arc<P>,
    range: PortRange,
    opts: SweepOptions,
    cancel: CancellationToken,
    progress: SharedProgress,
) -> Sweep {
    let started = Instant::now();
    let total = range.len();
    progress.total.store(total as u64, Ordering::Relaxed);

    // Child token: the deadline must not cancel the caller's token.
    let stop = cancel.child_token();
    let deadline_guard = {
        let stop = stop.clone();
        let deadline = opts.deadline;
        AbortOnDrop(tokio::spawn(async move {
            time::sleep(deadline).await;
            stop.cancel();
        }))
    };

    let cursor = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel::<PortResult>();
    let workers = opts.workers.clamp(1, MAX_WORKERS).min(total);
    let mut pool = JoinSet::new();

    debug!(
        start = range.start(),
        end = range.end(),
        workers,
        deadline_ms = opts.deadline.as_millis() as u64,
        "sweep started"
    );

    for _ in 0..workers {
        let probe = probe.clone();
        let cursor = cursor.clone();
        let tx = tx.clone();
        let stop = stop.clone();
        pool.spawn(async move {
            while let Some(port) = range.nth(cursor.fetch_add(1, Ordering::Relaxed)) {
                let result = if stop.is_cancelled() {
                    PortResult::unreachable(port, PortStatus::NotScanned)
                } else {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => PortResult::unreachable(port, PortStatus::Filtered),
                        r = probe.probe(port) => r,
                    }
                };
                if tx.send(result).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut aggregator = Aggregator::new(range);
    while let Some(result) = rx.recv().await {
        progress.record(&result);
        aggregator.record(result);
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "scan worker ended abnormally");
        }
    }
    drop(deadline_guard);

    let cut_short = stop.is_cancelled();
    let elapsed = started.elapsed();
    if aggregator.recorded() != total {
        warn!(
            recorded = aggregator.recorded(),
            total, "sweep missed ports; they are reported as not scanned"
        );
    }
    info!(
        ports = total,
        open = progress.open_count.load(Ordering::Relaxed),
        elapsed_ms = elapsed.as_millis() as u64,
        cut_short,
        "sweep finished"
    );

    Sweep {
        aggregator,
        elapsed,
        cut_short,
    }
}
