// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Spin-model time axis.
//!
//! Every time in this crate is a plain `f64` count of SI seconds since
//! 1970-01-01T00:00:00 UTC (leap seconds ignored, as in POSIX time). This is
//! the axis sun-pulse telemetry is delivered on, so no scale conversion is
//! performed inside the engine; these helpers only bridge to `chrono`.

use chrono::{DateTime, Utc};

/// Seconds since the Unix epoch for a UTC timestamp, with sub-second precision.
pub fn unix_seconds(datetime: DateTime<Utc>) -> f64 {
    datetime.timestamp() as f64 + datetime.timestamp_subsec_nanos() as f64 / 1e9
}

/// Convert Unix seconds to a `chrono::DateTime<Utc>`.
///
/// Returns `None` for non-finite input or values outside chrono's range.
pub fn to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let nanos = ((seconds - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
}
