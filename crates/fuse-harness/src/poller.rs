//! Bounded readiness polling.
//!
//! [`poll_until`] evaluates a predicate against a wall-clock deadline measured
//! from loop entry. Predicate errors count as "not ready yet"; the most recent
//! one is kept so a timeout can explain what was last observed.

use std::thread;
use std::time::{Duration, Instant};

/// Result of a bounded poll.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum PollOutcome<E> {
    /// The predicate reported ready.
    Success { attempts: u32, elapsed: Duration },
    /// The deadline passed before the predicate reported ready.
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        /// Error returned by the most recent failing attempt, if any.
        last_error: Option<E>,
    },
}

impl<E> PollOutcome<E> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Number of predicate evaluations performed.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Success { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Repeatedly evaluates `predicate` until it returns `Ok(true)` or `timeout`
/// elapses, sleeping `interval` between attempts.
///
/// The final sleep is clipped to the time left before the deadline, so a
/// predicate that never succeeds yields [`PollOutcome::TimedOut`] after
/// `timeout` and before `timeout + interval`. A zero `timeout` performs a
/// single attempt without sleeping.
pub fn poll_until<E, F>(mut predicate: F, timeout: Duration, interval: Duration) -> PollOutcome<E>
where
    F: FnMut() -> Result<bool, E>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let mut attempts = 0u32;
    let mut last_error = None;
    loop {
        attempts = attempts.saturating_add(1);
        match predicate() {
            Ok(true) => {
                return PollOutcome::Success {
                    attempts,
                    elapsed: started.elapsed(),
                };
            }
            Ok(false) => {}
            Err(error) => last_error = Some(error),
        }
        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut {
                attempts,
                elapsed: started.elapsed(),
                last_error,
            };
        }
        thread::sleep(interval.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn returns_success_on_first_ready_attempt() {
        let outcome: PollOutcome<()> =
            poll_until(|| Ok(true), Duration::from_secs(5), Duration::from_secs(1));
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn always_false_predicate_times_out_within_one_interval() {
        let timeout = Duration::from_millis(200);
        let interval = Duration::from_millis(50);
        let outcome: PollOutcome<()> = poll_until(|| Ok(false), timeout, interval);
        let PollOutcome::TimedOut {
            elapsed,
            last_error,
            ..
        } = outcome
        else {
            panic!("expected the poll to time out");
        };
        assert!(elapsed >= timeout, "returned early after {elapsed:?}");
        // Scheduling jitter on loaded CI hosts gets a small allowance.
        assert!(
            elapsed < timeout + interval + Duration::from_millis(100),
            "overran deadline: {elapsed:?}"
        );
        assert!(last_error.is_none());
    }

    #[test]
    fn transient_errors_do_not_abort_polling() {
        let calls = Cell::new(0);
        let outcome = poll_until(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("connection refused")
                } else {
                    Ok(true)
                }
            },
            Duration::from_secs(5),
            Duration::from_millis(10),
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
    }

    #[test]
    fn timeout_surfaces_last_error() {
        let calls = Cell::new(0);
        let outcome = poll_until(
            || {
                calls.set(calls.get() + 1);
                Err::<bool, _>(format!("attempt {}", calls.get()))
            },
            Duration::from_millis(60),
            Duration::from_millis(20),
        );
        match outcome {
            PollOutcome::TimedOut {
                attempts,
                last_error,
                ..
            } => assert_eq!(last_error, Some(format!("attempt {attempts}"))),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_evaluates_exactly_once() {
        let calls = Cell::new(0);
        let started = Instant::now();
        let outcome: PollOutcome<()> = poll_until(
            || {
                calls.set(calls.get() + 1);
                Ok(false)
            },
            Duration::ZERO,
            Duration::from_secs(10),
        );
        assert_eq!(calls.get(), 1);
        assert!(!outcome.is_success());
        assert!(started.elapsed() < Duration::from_secs(1), "poller slept");
    }
}
