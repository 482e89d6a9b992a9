use std::ops::RangeInclusive;

use crate::error::{ReconError, Result};
use crate::types::RangeEcho;

/// A validated, inclusive TCP port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range; never zero.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    /// Port at `idx` (0-based), if inside the range.
    pub fn nth(&self, idx: usize) -> Option<u16> {
        if idx < self.len() {
            Some(self.start + idx as u16)
        } else {
            None
        }
    }
}

impl From<PortRange> for RangeEcho {
    fn from(r: PortRange) -> Self {
        RangeEcho {
            start: r.start,
            end: r.end,
        }
    }
}

/// Validate a requested `[start, end]` pair against port bounds and the sweep ceiling.
///
/// Pure; performs no I/O.
pub fn validate_range(start: i64, end: i64, max_width: u32) -> Result<PortRange> {
    let start = parse_port(start).map_err(|e| ReconError::InvalidRange(format!("start: {e}")))?;
    let end = parse_port(end).map_err(|e| ReconError::InvalidRange(format!("end: {e}")))?;
    if start > end {
        return Err(ReconError::InvalidRange(format!(
            "start {start} is greater than end {end}"
        )));
    }
    let width = u32::from(end - start) + 1;
    if width > max_width {
        return Err(ReconError::InvalidRange(format!(
            "{width} ports requested, at most {max_width} allowed per scan"
        )));
    }
    Ok(PortRange { start, end })
}

fn parse_port(val: i64) -> std::result::Result<u16, String> {
    if !(1..=65_535).contains(&val) {
        return Err(format!("port out of range: {val}"));
    }
    Ok(val as u16)
}
