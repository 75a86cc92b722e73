use super::classify::{classify, ErrorClass};
use super::sanitize::sanitize;
use crate::driver::DriverError;
use crate::error::{ErrorContext, MigrateError, Result};
use rand::Rng;
use std::time::Duration;

/// Function used to wait between attempts.
pub type Sleeper = fn(Duration);

/// Exponential backoff with symmetric jitter.
///
/// `delay(n) = min(initial_delay * backoff_factor^(n-1), max_delay) * (1 ± jitter_factor)`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    sleeper: Sleeper,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.2,
            sleeper: may::coroutine::sleep,
        }
    }
}

enum RetryState<T> {
    Attempting(u32),
    Backoff { attempt: u32, delay: Duration },
    Succeeded(T),
    Exhausted { attempts: u32, class: ErrorClass, error: DriverError },
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_factor: f64,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_factor: if backoff_factor.is_finite() && backoff_factor >= 1.0 {
                backoff_factor
            } else {
                1.0
            },
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Replace the sleep function (tests use a no-op).
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let initial = self.initial_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let delay = (initial * self.backoff_factor.powi(exponent)).min(max);
        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Delay before retry number `attempt` with random jitter applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        if self.jitter_factor <= 0.0 || base <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        Duration::from_secs_f64((base * (1.0 + jitter)).max(0.0))
    }

    /// Largest delay `delay` can ever return.
    pub fn delay_ceiling(&self) -> Duration {
        self.max_delay.mul_f64(1.0 + self.jitter_factor)
    }

    /// Run `op` until it succeeds, fails fatally or runs out of attempts.
    ///
    /// Failures leave as sanitized [`MigrateError::Transient`] (retries
    /// exhausted) or [`MigrateError::Driver`] (fatal).
    pub fn run<T, F>(&self, context: &ErrorContext, mut op: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, DriverError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut state = RetryState::Attempting(1);
        loop {
            state = match state {
                RetryState::Attempting(attempt) => match op() {
                    Ok(value) => RetryState::Succeeded(value),
                    Err(error) => {
                        let class = classify(&error);
                        if class == ErrorClass::Transient && attempt < max_attempts {
                            let delay = self.delay(attempt);
                            log::warn!(
                                target: "schemaguard",
                                "{} transient failure on attempt {attempt}/{max_attempts}, retrying in {delay:?}",
                                context.tags()
                            );
                            RetryState::Backoff { attempt, delay }
                        } else {
                            RetryState::Exhausted {
                                attempts: attempt,
                                class,
                                error,
                            }
                        }
                    }
                },
                RetryState::Backoff { attempt, delay } => {
                    (self.sleeper)(delay);
                    RetryState::Attempting(attempt + 1)
                }
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Exhausted {
                    attempts,
                    class,
                    error,
                } => {
                    let sanitized = sanitize(&error, context).with_attempts(attempts);
                    return Err(match class {
                        ErrorClass::Transient => MigrateError::Transient(sanitized),
                        ErrorClass::Fatal => MigrateError::Driver(sanitized),
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use std::cell::Cell;

    fn no_sleep(_: Duration) {}

    fn policy() -> RetryPolicy {
        RetryPolicy::default().with_sleeper(no_sleep)
    }

    fn ctx() -> ErrorContext {
        ErrorContext::new(Engine::Postgres, "execute").table("users")
    }

    #[test]
    fn test_base_delay_grows_and_caps() {
        let p = policy();
        assert_eq!(p.base_delay(1), Duration::from_millis(100));
        assert_eq!(p.base_delay(2), Duration::from_millis(200));
        assert_eq!(p.base_delay(3), Duration::from_millis(400));
        assert_eq!(p.base_delay(20), Duration::from_secs(5));
        let mut previous = Duration::ZERO;
        for attempt in 1..40 {
            let delay = p.base_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= p.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn test_jittered_delay_stays_within_bounds() {
        let p = policy();
        for attempt in 1..30 {
            for _ in 0..20 {
                let delay = p.delay(attempt);
                let base = p.base_delay(attempt).as_secs_f64();
                assert!(delay.as_secs_f64() >= base * 0.8 - 1e-9);
                assert!(delay.as_secs_f64() <= base * 1.2 + 1e-9);
                assert!(delay <= p.delay_ceiling());
            }
        }
    }

    #[test]
    fn test_transient_then_success() {
        let calls = Cell::new(0);
        let result = policy().run(&ctx(), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(DriverError::with_code("ECONNRESET", "socket hang up"))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhaustion_surfaces_transient_with_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = policy().run(&ctx(), || {
            calls.set(calls.get() + 1);
            Err(DriverError::new("connection timeout, password=s3cret"))
        });
        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.get(), 3);
        let text = err.to_string();
        assert!(text.contains("after 3 attempt(s)"));
        assert!(text.contains("[engine=postgres][op=execute][table=users]"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn test_fatal_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = policy().run(&ctx(), || {
            calls.set(calls.get() + 1);
            Err(DriverError::new("Invalid SQL syntax"))
        });
        assert!(matches!(result, Err(MigrateError::Driver(ref e)) if e.attempts == 1));
        assert_eq!(calls.get(), 1);
    }
}
