//! Bounded polling.
//!
//! A timed loop calls a check until it returns something other than the
//! "keep going" value, sleeping between attempts and giving up once the
//! deadline has passed.
//!
//! The deadline uses whole seconds measured from the first attempt: an
//! attempt made when exactly `max_seconds` have elapsed is still allowed,
//! only `elapsed.as_secs() > max_seconds` times out.

use std::convert::Infallible;
use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

/// The polled condition was not met before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("condition not met within {max_seconds} seconds ({attempts} attempts)")]
pub struct LoopTimeout {
    pub max_seconds: u64,
    pub attempts: u64,
}

/// Settings for a bounded polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedLoop {
    max_seconds: u64,
    retry_interval: Duration,
}

impl Default for TimedLoop {
    fn default() -> Self {
        Self {
            max_seconds: 60,
            retry_interval: Duration::from_micros(50_000),
        }
    }
}

impl TimedLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_maximum_seconds(mut self, max_seconds: u64) -> Self {
        self.max_seconds = max_seconds;
        self
    }

    /// Sleep between attempts. A zero interval is raised to one microsecond
    /// so the loop always yields.
    pub fn retry_after_micros(mut self, micros: u64) -> Self {
        self.retry_interval = Duration::from_micros(micros.max(1));
        self
    }

    pub fn max_seconds(&self) -> u64 {
        self.max_seconds
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Poll `check` until it returns a value different from `continue_value`.
    pub async fn run<T, F, Fut>(&self, continue_value: T, mut check: F) -> Result<T, LoopTimeout>
    where
        T: PartialEq,
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = self
            .try_run::<T, Infallible, _, _>(continue_value, || {
                let attempt = check();
                async move { Ok(attempt.await) }
            })
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(TimedLoopError::Timeout(timeout)) => Err(timeout),
            Err(TimedLoopError::Check(never)) => match never {},
        }
    }

    /// Like [`TimedLoop::run`], but a failing check ends the loop immediately.
    pub async fn try_run<T, E, F, Fut>(
        &self,
        continue_value: T,
        mut check: F,
    ) -> Result<T, TimedLoopError<E>>
    where
        T: PartialEq,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempts = 0u64;

        loop {
            attempts += 1;
            let value = check().await.map_err(TimedLoopError::Check)?;
            if value != continue_value {
                tracing::trace!(attempts, "Timed loop condition met");
                return Ok(value);
            }

            if start.elapsed().as_secs() > self.max_seconds {
                tracing::debug!(attempts, max_seconds = self.max_seconds, "Timed loop gave up");
                return Err(TimedLoopError::Timeout(LoopTimeout {
                    max_seconds: self.max_seconds,
                    attempts,
                }));
            }

            tokio::time::sleep(self.retry_interval).await;
        }
    }
}

/// Outcome of a fallible timed loop that did not produce a value.
#[derive(Debug, Error)]
pub enum TimedLoopError<E> {
    #[error(transparent)]
    Timeout(LoopTimeout),

    #[error("check failed: {0}")]
    Check(E),
}

/// Poll `check` until its result differs from `continue_value`.
pub async fn timed_loop<T, F, Fut>(
    check: F,
    continue_value: T,
    max_seconds: u64,
    retry_interval_micros: u64,
) -> Result<T, LoopTimeout>
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    TimedLoop::new()
        .for_maximum_seconds(max_seconds)
        .retry_after_micros(retry_interval_micros)
        .run(continue_value, check)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_first_differing_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let value = timed_loop(
            move || {
                let c = c.clone();
                async move { c.fetch_add(1, Ordering::SeqCst) + 1 >= 3 }
            },
            false,
            5,
            1_000,
        )
        .await
        .unwrap();

        assert!(value);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let start = Instant::now();
        let value = TimedLoop::new()
            .retry_after_micros(5_000_000)
            .run(None, || async { Some("ready") })
            .await
            .unwrap();

        assert_eq!(value, Some("ready"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_seconds_tolerates_attempts_within_first_second() {
        let start = Instant::now();
        let err = TimedLoop::new()
            .for_maximum_seconds(0)
            .retry_after_micros(100_000)
            .run(0u8, || async { 0u8 })
            .await
            .unwrap_err();

        // Gives up only once a whole second has elapsed.
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(err.max_seconds, 0);
        assert!(err.attempts >= 2);
    }

    #[tokio::test]
    async fn test_sleeps_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let _ = TimedLoop::new()
            .for_maximum_seconds(0)
            .retry_after_micros(200_000)
            .run(true, move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { true }
            })
            .await;

        // Roughly one attempt per 200ms over one to two seconds, never thousands.
        let attempts = calls.load(Ordering::SeqCst);
        assert!(attempts >= 5, "too few attempts: {attempts}");
        assert!(attempts <= 12, "loop spun: {attempts}");
    }

    #[tokio::test]
    async fn test_failing_check_stops_the_loop() {
        let outcome = TimedLoop::new()
            .for_maximum_seconds(5)
            .try_run(0u32, || async { Err::<u32, _>("listener died") })
            .await;

        assert!(matches!(outcome, Err(TimedLoopError::Check("listener died"))));
    }
}
