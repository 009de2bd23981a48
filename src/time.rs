//! Timestamp helpers.
//!
//! All timestamps in the data model are ISO-8601 with explicit UTC (§3).

use chrono::{DateTime, Utc};

/// The current instant, formatted as ISO-8601 UTC (e.g.
/// `2026-07-30T12:00:00.000Z`).
#[must_use]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Milliseconds elapsed between two ISO-8601 timestamps, used for the
/// messaging bus's delivery-latency warning (§4.9 `get_messages`).
/// Unparseable input yields `0.0` rather than panicking.
#[must_use]
pub fn duration_ms(earlier: &str, later: &str) -> f64 {
    let (Ok(earlier), Ok(later)) = (
        DateTime::parse_from_rfc3339(earlier),
        DateTime::parse_from_rfc3339(later),
    ) else {
        return 0.0;
    };
    (later.with_timezone(&Utc) - earlier.with_timezone(&Utc)).num_milliseconds() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_parseable_and_utc() {
        let ts = now_iso8601();
        let parsed = DateTime::parse_from_rfc3339(&ts).expect("parseable");
        assert_eq!(parsed.offset().utc_minus_local(), 0);
    }

    #[test]
    fn duration_ms_computes_elapsed_time() {
        let start = "2026-07-30T12:00:00.000Z";
        let end = "2026-07-30T12:00:00.250Z";
        assert!((duration_ms(start, end) - 250.0).abs() < f64::EPSILON);
    }
}
