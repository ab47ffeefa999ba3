//! Estimated-wait countdown shown after a prescription is sent to the pharmacy.
//!
//! The countdown is anchored to an absolute deadline rather than decremented
//! per tick, so a late or skipped redraw never makes it drift.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A display-only countdown to `deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    issued_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

impl Countdown {
    /// Start a countdown of `est_secs` seconds at `now`.
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>, est_secs: u64) -> Self {
        let secs = i64::try_from(est_secs).unwrap_or(i64::MAX);
        let deadline = Duration::try_seconds(secs)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            issued_at: now,
            deadline,
        }
    }

    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub const fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Whole seconds left at `now`, rounded up, never negative.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        let left = self.deadline.signed_duration_since(now);
        if left <= Duration::zero() {
            return 0;
        }
        let whole = left.num_seconds();
        let partial = left.subsec_nanos() > 0;
        u64::try_from(whole).unwrap_or(0) + u64::from(partial)
    }

    #[must_use]
    pub fn is_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// `mm:ss` (or `h:mm:ss` past an hour) for `now`.
    #[must_use]
    pub fn display_at(&self, now: DateTime<Utc>) -> String {
        format_clock(self.remaining_at(now))
    }
}

/// Format seconds as `mm:ss`, or `h:mm:ss` when an hour or more.
#[must_use]
pub fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_743_580_800, 0).unwrap_or_default()
    }

    #[test]
    fn test_remaining_is_anchored_to_deadline() {
        let countdown = Countdown::starting_at(t0(), 90);
        assert_eq!(countdown.remaining_at(t0()), 90);
        // Skipped redraws do not accumulate error.
        assert_eq!(countdown.remaining_at(t0() + Duration::seconds(61)), 29);
        assert_eq!(countdown.remaining_at(t0() + Duration::milliseconds(500)), 90);
    }

    #[test]
    fn test_elapsed_clamps_to_zero() {
        let countdown = Countdown::starting_at(t0(), 5);
        let later = t0() + Duration::seconds(30);
        assert_eq!(countdown.remaining_at(later), 0);
        assert!(countdown.is_elapsed_at(later));
        assert!(!countdown.is_elapsed_at(t0()));
    }

    #[test]
    fn test_zero_wait_is_immediately_elapsed() {
        let countdown = Countdown::starting_at(t0(), 0);
        assert!(countdown.is_elapsed_at(t0()));
        assert_eq!(countdown.display_at(t0()), "00:00");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(83), "01:23");
        assert_eq!(format_clock(3_725), "1:02:05");
    }
}
