//! Target validation and resolution.

use std::net::IpAddr;

use tokio::net::lookup_host;
use tracing::debug;

use crate::error::{ReconError, Result};

/// A connectable address plus the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Trimmed user input, echoed back for display.
    pub input: String,
    pub ip: IpAddr,
}

/// Parse an IP literal (bracketed IPv6 accepted) or resolve a hostname.
///
/// IPv4 addresses are preferred when a hostname resolves to both families.
/// Resolution failure is terminal; there are no retries.
pub async fn resolve_target(raw: &str) -> Result<ResolvedTarget> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ReconError::InvalidTarget("target is empty".into()));
    }

    let unbracketed = input
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(input);
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return Ok(ResolvedTarget {
            input: input.to_string(),
            ip,
        });
    }

    validate_hostname(input)?;

    let addrs: Vec<IpAddr> = lookup_host((input, 0))
        .await
        .map_err(|e| ReconError::ResolutionFailure {
            host: input.to_string(),
            reason: e.to_string(),
        })?
        .map(|sa| sa.ip())
        .collect();

    let ip = addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
        .ok_or_else(|| ReconError::ResolutionFailure {
            host: input.to_string(),
            reason: "no addresses returned".into(),
        })?;
    debug!(host = input, %ip, candidates = addrs.len(), "resolved target");

    Ok(ResolvedTarget {
        input: input.to_string(),
        ip,
    })
}

/// Hostname syntax: dot-separated labels of letters, digits, hyphens and
/// underscores (common in internal DNS and service records).
pub fn validate_hostname(host: &str) -> Result<()> {
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.is_empty() || name.len() > 253 {
        return Err(ReconError::InvalidTarget(format!(
            "hostname length must be 1..=253: {host}"
        )));
    }
    for label in name.split('.') {
        let ok = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !ok {
            return Err(ReconError::InvalidTarget(format!(
                "malformed hostname label {label:?} in {host}"
            )));
        }
    }
    // An all-numeric dotted name that failed IP parsing is a malformed address.
    if name.split('.').all(|l| l.bytes().all(|b| b.is_ascii_digit())) {
        return Err(ReconError::InvalidTarget(format!("malformed IP address: {host}")));
    }
    Ok(())
}
