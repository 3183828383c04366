//! Validation helpers and parsing utilities for configuration values.

use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Parse a listen port in `1..=65535`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` when the value is not a valid port.
pub fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, value, "must be an integer between 1 and 65535"))?;
    if port == 0 {
        return Err(ConfigError::invalid(
            field,
            value,
            "must be an integer between 1 and 65535",
        ));
    }
    Ok(port)
}

/// Parse a bind address.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` when the value is not an IP address.
pub fn parse_bind_addr(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid(field, value, "must be an IPv4 or IPv6 address"))
}

/// Normalise the public base URL, appending a trailing `/` when missing.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` unless the value is an absolute http(s) URL.
pub fn parse_base_url(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|_| ConfigError::invalid(field, value, "must be an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            field,
            value,
            "must use the http or https scheme",
        ));
    }
    let mut normalised = trimmed.to_string();
    if !normalised.ends_with('/') {
        normalised.push('/');
    }
    Ok(normalised)
}

/// Parse a strictly positive count.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for non-numeric or zero values.
pub fn parse_positive_usize(field: &'static str, value: &str) -> ConfigResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::invalid(
            field,
            value,
            "must be a positive integer",
        )),
    }
}

/// Parse a strictly positive number of milliseconds.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for non-numeric or zero values.
pub fn parse_millis(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_positive_u64(field, value).map(Duration::from_millis)
}

/// Parse a strictly positive number of seconds.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for non-numeric or zero values.
pub fn parse_secs(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_positive_u64(field, value).map(Duration::from_secs)
}

/// Parse a retention window in seconds where `0` disables expiry.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for non-numeric values.
pub fn parse_retention(field: &'static str, value: &str) -> ConfigResult<Option<Duration>> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "must be a non-negative integer"))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

fn parse_positive_u64(field: &'static str, value: &str) -> ConfigResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::invalid(
            field,
            value,
            "must be a positive integer",
        )),
    }
}

/// Reject blank values for fields that name executables or paths.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` when the value is empty after trimming.
pub fn parse_non_empty(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, value, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
