use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IntervalError {
    #[error("empty interval")]
    Empty,
    /// A number without a unit, or an unknown unit
    #[error("invalid interval {input:?}: {reason}")]
    Invalid { input: String, reason: String },
    /// Zero or negative
    #[error("interval must be greater than zero, got {0:?}")]
    NotPositive(String),
}

/// Parses a polling interval such as `30s`, `1m`, `1h30m` or `1.5h`.
///
/// Accepted units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. Components may
/// carry a decimal fraction and can be chained; the result must be strictly
/// positive. A leading `-` is parsed so it can be reported as non-positive
/// rather than as a syntax error.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let trimmed = input.trim();
    let invalid = |reason: &str| IntervalError::Invalid {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let (negative, mut rest) = match trimmed.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if rest.is_empty() {
        return Err(IntervalError::Empty);
    }
    // A bare zero is the only unitless value allowed
    if rest == "0" {
        return Err(IntervalError::NotPositive(input.to_string()));
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(invalid("expected a number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid(&format!("unknown unit {unit:?}"))),
        };
        rest = &rest[unit_len..];

        total_nanos += value * nanos_per_unit;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(invalid("interval too large"));
    }
    let duration = Duration::from_nanos(total_nanos.round() as u64);
    if negative || duration.is_zero() {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    Ok(duration)
}
