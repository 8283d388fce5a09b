//! Timeout enforcement.
//!
//! # Responsibilities
//! - Parse gRPC timeout values (`Grpc-Timeout` / `grpc-timeout`)
//! - Bound client-requested deadlines by configured limits
//!
//! # Design Decisions
//! - gRPC syntax: at most 8 ASCII digits followed by one unit
//!   (`H` hours, `M` minutes, `S` seconds, `m` millis, `u` micros, `n` nanos)
//! - A zero timeout is valid and expires immediately

use std::time::Duration;

/// Header/metadata key carrying a relative deadline.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

const MAX_TIMEOUT_DIGITS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("timeout value is empty")]
    Empty,
    #[error("timeout value `{0}` has more than 8 digits")]
    TooLong(String),
    #[error("timeout value `{0}` is not in gRPC timeout format")]
    Malformed(String),
}

/// Parse a gRPC timeout string such as `100m` or `2S`.
pub fn parse_grpc_timeout(value: &str) -> Result<Duration, TimeoutError> {
    let value = value.trim();
    let Some((split, _)) = value.char_indices().last() else {
        return Err(TimeoutError::Empty);
    };
    let (digits, unit) = value.split_at(split);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeoutError::Malformed(value.to_string()));
    }
    if digits.len() > MAX_TIMEOUT_DIGITS {
        return Err(TimeoutError::TooLong(value.to_string()));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|_| TimeoutError::Malformed(value.to_string()))?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return Err(TimeoutError::Malformed(value.to_string())),
    };
    Ok(timeout)
}

/// Pick the effective deadline for a request.
///
/// A client-requested timeout is honoured up to `max`; without one the
/// configured `default` applies.
pub fn effective_timeout(requested: Option<Duration>, default: Duration, max: Duration) -> Duration {
    match requested {
        Some(requested) => requested.min(max),
        None => default.min(max),
    }
}
