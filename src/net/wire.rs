//! Text payload carried in each datagram: `total,core0,core1,...` with two
//! decimals per value and no trailing newline.

use crate::error::{MonitorError, Result};
use crate::monitor::UsageResult;
use std::fmt::Write;

/// Largest payload the emitter will produce.
pub const MAX_PAYLOAD: usize = 1024;

/// Well-known listener port.
pub const DEFAULT_PORT: u16 = 1234;

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Encode a result. Cores that would push the payload past
/// [`MAX_PAYLOAD`] are left off.
pub fn encode(result: &UsageResult) -> String {
    let mut payload = format!("{:.2}", clamp_percent(result.total_usage));
    let mut field = String::with_capacity(8);
    for &usage in &result.per_core_usage {
        field.clear();
        let _ = write!(field, ",{:.2}", clamp_percent(usage));
        if payload.len() + field.len() > MAX_PAYLOAD {
            break;
        }
        payload.push_str(&field);
    }
    payload
}

/// A decoded datagram as a receiver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct WireSample {
    pub total_usage: f64,
    pub per_core_usage: Vec<f64>,
}

impl WireSample {
    pub fn core_count(&self) -> usize {
        self.per_core_usage.len()
    }
}

fn parse_percent(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| (0.0..=100.0).contains(v))
}

/// Decode a payload. The whole datagram is rejected if the total is missing
/// or out of range; bad per-core fields are skipped.
pub fn decode(payload: &str) -> Result<WireSample> {
    let mut fields = payload.split(',');
    let total_usage = fields
        .next()
        .and_then(parse_percent)
        .ok_or_else(|| MonitorError::MalformedDatagram(payload.chars().take(64).collect()))?;

    Ok(WireSample {
        total_usage,
        per_core_usage: fields.filter_map(parse_percent).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(total: f64, cores: &[f64]) -> UsageResult {
        UsageResult {
            total_usage: total,
            per_core_usage: cores.to_vec(),
            core_count: cores.len(),
        }
    }

    #[test]
    fn encodes_two_decimals_without_newline() {
        let payload = encode(&result(12.345, &[0.0, 100.0, 7.5]));
        assert_eq!(payload, "12.35,0.00,100.00,7.50");
    }

    #[test]
    fn encodes_total_only_when_no_cores() {
        assert_eq!(encode(&result(3.0, &[])), "3.00");
    }

    #[test]
    fn clamps_out_of_range_values() {
        let payload = encode(&result(f64::NAN, &[-4.0, 250.0]));
        assert_eq!(payload, "0.00,0.00,100.00");
    }

    #[test]
    fn truncates_at_payload_limit() {
        let cores = vec![100.0; 400];
        let payload = encode(&result(50.0, &cores));
        assert!(payload.len() <= MAX_PAYLOAD);
        assert!(!payload.ends_with(','));
        assert!(decode(&payload).unwrap().core_count() < 400);
    }

    #[test]
    fn round_trip_within_rounding() {
        let original = result(33.333, &[1.005, 99.994, 50.0, 0.126]);
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded.core_count(), original.core_count);
        assert!((decoded.total_usage - original.total_usage).abs() <= 0.01);
        for (a, b) in decoded.per_core_usage.iter().zip(&original.per_core_usage) {
            assert!((a - b).abs() <= 0.01, "{a} vs {b}");
        }
    }

    #[test]
    fn rejects_bad_total() {
        assert!(matches!(decode(""), Err(MonitorError::MalformedDatagram(_))));
        assert!(decode("abc,1.00").is_err());
        assert!(decode("101.00,1.00").is_err());
        assert!(decode("-1,1.00").is_err());
    }

    #[test]
    fn skips_bad_core_fields() {
        let sample = decode("10.00,5.00,oops,120.00, 7.25 ").unwrap();
        assert_eq!(sample.total_usage, 10.0);
        assert_eq!(sample.per_core_usage, vec![5.0, 7.25]);
    }
}
