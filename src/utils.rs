//! Utility functions for the feedflow crate.

use chrono::{NaiveDate, NaiveDateTime};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Round a value to two decimal places.
///
/// # Example
///
/// ```
/// use feedflow::round_to_hundredths;
///
/// assert_eq!(round_to_hundredths(1.234), 1.23);
/// assert_eq!(round_to_hundredths(1.235), 1.24);
/// ```
#[inline]
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sleep for `duration`, returning early with [`Error::Cancelled`] if `cancel` fires first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled),
    }
}

/// Time remaining from `now` until the next local midnight.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use feedflow::utils::duration_until_midnight;
/// use std::time::Duration;
///
/// let now = NaiveDate::from_ymd_opt(2024, 6, 1)
///     .unwrap()
///     .and_hms_opt(23, 59, 30)
///     .unwrap();
/// assert_eq!(duration_until_midnight(now), Duration::from_secs(30));
/// ```
pub fn duration_until_midnight(now: NaiveDateTime) -> Duration {
    let next_midnight = now
        .date()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0));

    match next_midnight {
        Some(midnight) => (midnight - now).to_std().unwrap_or_default(),
        None => Duration::ZERO,
    }
}

/// Format a date the way dedupe keys and records expect (`YYYY-MM-DD`).
#[inline]
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
