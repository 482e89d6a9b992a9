use std::collections::BTreeMap;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use tracing::warn;

use crate::ports::PortRange;
use crate::target::ResolvedTarget;
use crate::types::{GeoRecord, PortResult, PortStatus, ScanResult, ScanSummary};

/// Collects per-port outcomes in arrival order and shapes the final `ScanResult`.
#[derive(Debug)]
pub struct Aggregator {
    range: PortRange,
    outcomes: BTreeMap<u16, PortResult>,
    duplicates: u64,
}

impl Aggregator {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            outcomes: BTreeMap::new(),
            duplicates: 0,
        }
    }

    /// Record one outcome. The first outcome for a port wins; later ones and
    /// ports outside the range are dropped.
    pub fn record(&mut self, result: PortResult) {
        if !self.range.contains(result.port) {
            warn!(port = result.port, "outcome outside scanned range ignored");
            return;
        }
        if self.outcomes.contains_key(&result.port) {
            self.duplicates += 1;
            warn!(port = result.port, "duplicate outcome ignored");
            return;
        }
        self.outcomes.insert(result.port, result);
    }

    /// Number of distinct ports that have an outcome.
    pub fn recorded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Every port of the range, exactly once, ascending. Ports that never
    /// produced an outcome are reported as `NotScanned`.
    pub fn outcomes(&self) -> Vec<PortResult> {
        self.range
            .iter()
            .map(|port| {
                self.outcomes
                    .get(&port)
                    .cloned()
                    .unwrap_or_else(|| PortResult::unreachable(port, PortStatus::NotScanned))
            })
            .collect()
    }

    /// Open ports only, ascending by port number.
    pub fn open_ports(&self) -> Vec<PortResult> {
        self.outcomes
            .values()
            .filter(|r| r.is_open())
            .cloned()
            .collect()
    }

    pub fn summary(&self, elapsed: Duration) -> ScanSummary {
        let mut s = ScanSummary {
            scanned: self.range.len() as u64,
            elapsed_ms: elapsed.as_millis() as u64,
            ..ScanSummary::default()
        };
        for port in self.range.iter() {
            match self.outcomes.get(&port).map(|r| r.status) {
                Some(PortStatus::Open) => s.open += 1,
                Some(PortStatus::Closed) => s.closed += 1,
                Some(PortStatus::Filtered) => s.filtered += 1,
                Some(PortStatus::NotScanned) | None => s.not_scanned += 1,
            }
        }
        s.complete = s.not_scanned == 0;
        s
    }

    /// Assemble the immutable scan result.
    ///
    /// `cut_short` marks a sweep that hit its deadline or was cancelled even
    /// if every port still ended up with an outcome.
    pub fn finish(
        self,
        target: &ResolvedTarget,
        geoip: Option<GeoRecord>,
        elapsed: Duration,
        cut_short: bool,
    ) -> ScanResult {
        let mut summary = self.summary(elapsed);
        summary.complete &= !cut_short;
        ScanResult {
            target: target.input.clone(),
            ip: target.ip,
            range: self.range.into(),
            ports: self.open_ports(),
            geoip,
            summary,
            finished_at: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::validate_range;
    use std::net::{IpAddr, Ipv4Addr};

    fn target() -> ResolvedTarget {
        ResolvedTarget {
            input: "example.test".into(),
            ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
        }
    }

    fn open(port: u16) -> PortResult {
        PortResult::open(port, 1, String::new(), None)
    }

    #[test]
    fn sorts_regardless_of_arrival_order() {
        let mut agg = Aggregator::new(validate_range(1, 100, 1000).unwrap());
        for p in [80, 22, 99, 1, 53] {
            agg.record(open(p));
        }
        agg.record(PortResult::unreachable(23, PortStatus::Closed));
        let ports: Vec<u16> = agg.open_ports().iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![1, 22, 53, 80, 99]);
    }

    #[test]
    fn first_outcome_wins_and_duplicates_are_counted() {
        let mut agg = Aggregator::new(validate_range(20, 30, 1000).unwrap());
        agg.record(open(22));
        agg.record(PortResult::unreachable(22, PortStatus::Closed));
        assert_eq!(agg.duplicates(), 1);
        assert_eq!(agg.recorded(), 1);
        assert!(agg.open_ports()[0].is_open());
    }

    #[test]
    fn out_of_range_outcome_ignored() {
        let mut agg = Aggregator::new(validate_range(20, 30, 1000).unwrap());
        agg.record(open(8080));
        assert_eq!(agg.recorded(), 0);
    }

    #[test]
    fn missing_ports_become_not_scanned() {
        let mut agg = Aggregator::new(validate_range(1, 5, 1000).unwrap());
        agg.record(open(2));
        agg.record(PortResult::unreachable(4, PortStatus::Filtered));
        let all = agg.outcomes();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].status, PortStatus::NotScanned);
        let s = agg.summary(Duration::from_millis(5));
        assert_eq!((s.open, s.filtered, s.not_scanned), (1, 1, 3));
        assert!(!s.complete);
    }

    #[test]
    fn finish_keeps_only_open_ports() {
        let mut agg = Aggregator::new(validate_range(1, 3, 1000).unwrap());
        agg.record(PortResult::unreachable(1, PortStatus::Closed));
        agg.record(open(3));
        agg.record(PortResult::unreachable(2, PortStatus::Filtered));
        let result = agg.finish(&target(), None, Duration::from_millis(10), false);
        assert_eq!(result.ports.len(), 1);
        assert_eq!(result.ports[0].port, 3);
        assert_eq!(result.summary.scanned, 3);
        assert!(result.summary.complete);
        assert_eq!(result.target, "example.test");
    }

    #[test]
    fn no_open_ports_is_an_empty_result() {
        let mut agg = Aggregator::new(validate_range(1, 2, 1000).unwrap());
        agg.record(PortResult::unreachable(1, PortStatus::Closed));
        agg.record(PortResult::unreachable(2, PortStatus::Closed));
        let result = agg.finish(&target(), None, Duration::ZERO, false);
        assert!(result.ports.is_empty());
        assert!(result.summary.complete);
    }
}
