//! Once-a-second countdown stream for the estimated-wait display.

use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use mediplus_core::Countdown;
use tokio::time::MissedTickBehavior;

const TICK: Duration = Duration::from_secs(1);

/// Remaining seconds, once per second, against the wall clock. Ends after
/// yielding `0`.
pub fn ticks(countdown: Countdown) -> impl Stream<Item = u64> {
    ticks_with_clock(countdown, Utc::now)
}

/// [`ticks`] with an injected clock.
///
/// Each value is computed from the deadline, so a delayed tick shows the
/// true remaining time rather than one second less than the last value.
pub fn ticks_with_clock<C>(countdown: Countdown, clock: C) -> impl Stream<Item = u64>
where
    C: Fn() -> DateTime<Utc>,
{
    stream! {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let remaining = countdown.remaining_at(clock());
            yield remaining;
            if remaining == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use futures::StreamExt;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_743_580_800, 0).unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_to_zero_and_ends() {
        let countdown = Countdown::starting_at(t0(), 3);
        let elapsed = AtomicI64::new(0);
        let clock = || t0() + chrono::Duration::seconds(elapsed.fetch_add(1, Ordering::SeqCst));

        let seen: Vec<u64> = ticks_with_clock(countdown, clock).collect().await;
        assert_eq!(seen, vec![3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ticks_do_not_drift() {
        let countdown = Countdown::starting_at(t0(), 10);
        let elapsed = AtomicI64::new(0);
        // The display falls three seconds behind per tick.
        let clock = || t0() + chrono::Duration::seconds(elapsed.fetch_add(3, Ordering::SeqCst));

        let seen: Vec<u64> = ticks_with_clock(countdown, clock).collect().await;
        assert_eq!(seen, vec![10, 7, 4, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_countdown_yields_zero_once() {
        let countdown = Countdown::starting_at(t0(), 0);
        let seen: Vec<u64> = ticks_with_clock(countdown, t0).collect().await;
        assert_eq!(seen, vec![0]);
    }
}
