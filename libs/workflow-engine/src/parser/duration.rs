//! Timeout literal parsing: `"30s"` | `"5m"` | `"2h"` | `"1d"` | a positive
//! integer count of seconds (§6.1).

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::ParseError;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhd])$").expect("valid regex"));

/// Parse a `timeout` field value. Accepts a duration string or a positive
/// integer (interpreted as seconds). Rejects `0` and a bare numeric string
/// with no unit suffix (e.g. `"30"`), per §8's boundary behaviors.
pub fn parse_timeout(value: &Value) -> Result<Duration, ParseError> {
    match value {
        Value::String(s) => parse_duration_string(s),
        Value::Number(n) => {
            let seconds = n
                .as_u64()
                .ok_or_else(|| ParseError::InvalidTimeout(value.to_string()))?;
            if seconds == 0 {
                return Err(ParseError::InvalidTimeout(value.to_string()));
            }
            Ok(Duration::from_secs(seconds))
        }
        other => Err(ParseError::InvalidTimeout(other.to_string())),
    }
}

fn parse_duration_string(s: &str) -> Result<Duration, ParseError> {
    let caps = DURATION_PATTERN
        .captures(s)
        .ok_or_else(|| ParseError::InvalidTimeout(s.to_string()))?;
    let amount: u64 = caps[1].parse().map_err(|_| ParseError::InvalidTimeout(s.to_string()))?;
    if amount == 0 {
        return Err(ParseError::InvalidTimeout(s.to_string()));
    }
    let seconds = match &caps[2] {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86400,
        _ => unreachable!("pattern only captures s|m|h|d"),
    };
    Ok(Duration::from_secs(seconds))
}
