//! Target address handling.

use crate::error::{GnmiError, Result};

/// Port used when the target address carries none.
pub const DEFAULT_PORT: u16 = 57400;

/// Resolve `host` or `host:port` into a dialable `host:port`.
///
/// An address containing `:` is taken verbatim, so IPv6 literals must be
/// written with an explicit port (`[2001:db8::1]:57400`).
pub fn resolve_target(addr: &str) -> Result<String> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(GnmiError::usage("addr is mandatory to provide"));
    }
    if addr.contains(':') {
        Ok(addr.to_string())
    } else {
        Ok(format!("{}:{}", addr, DEFAULT_PORT))
    }
}

/// Host part of a resolved `host:port` address, without IPv6 brackets.
pub fn target_host(addr: &str) -> &str {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => addr,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}
