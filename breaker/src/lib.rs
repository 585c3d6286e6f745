//! Circuit breaker for isolating failing dependencies.
//!
//! Every outbound dependency in Tixie (databases, sibling services, the
//! payment provider, the QR decoder) is called through one of these so that
//! a sick dependency fails fast instead of tying up request handlers.
//!
//! # States
//!
//! - **Closed**: requests pass through; failures are counted.
//! - **Open**: requests are rejected immediately until the cooldown lapses.
//! - **HalfOpen**: a bounded number of probes are admitted; one failure
//!   reopens the breaker, enough successes close it.
//!
//! # Example
//!
//! ```rust
//! use tixie_breaker::{BreakerConfig, CircuitBreaker};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(BreakerConfig::new("user-service"));
//!
//! let result = breaker
//!     .call(|| async { Ok::<_, String>(42) })
//!     .await;
//! assert_eq!(result.unwrap(), 42);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Requests pass through; failures are counted.
    Closed,
    /// Requests fail fast until the cooldown expires.
    Open,
    /// Limited probes are admitted to test recovery.
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Request counts for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Requests admitted in this generation.
    pub requests: u32,
    /// Failures across all generations.
    pub total_failures: u32,
    /// Failures in this generation.
    pub failures: u32,
    /// Successes in this generation.
    pub successes: u32,
}

impl Counts {
    /// Failure ratio of the current generation; 0.0 when no requests yet.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.failures) / f64::from(self.requests)
    }
}

/// Trip policy: decides, from the current counts, whether to open.
pub type TripFn = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Breaker configuration.
///
/// The defaults match the platform-wide policy: trip when at least three
/// requests have been seen and 60% of them failed, stay open for 60 seconds,
/// admit five probes in half-open.
#[derive(Clone)]
pub struct BreakerConfig {
    /// Dependency name, used in logs.
    pub name: String,
    /// Probes admitted in half-open; also the successes needed to close.
    pub max_requests: u32,
    /// Closed-state counting window; counts reset when it lapses.
    pub interval: Duration,
    /// How long an open breaker rejects before probing.
    pub cooldown: Duration,
    trip: TripFn,
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl BreakerConfig {
    /// Default configuration for a named dependency.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_requests: 5,
            interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
            trip: Arc::new(|counts| counts.requests >= 3 && counts.failure_ratio() >= 0.6),
        }
    }

    /// Set how many probes half-open admits.
    #[must_use]
    pub const fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the closed-state counting window.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the open-state cooldown.
    #[must_use]
    pub const fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Replace the trip policy.
    #[must_use]
    pub fn trip_when(mut self, trip: impl Fn(&Counts) -> bool + Send + Sync + 'static) -> Self {
        self.trip = Arc::new(trip);
        self
    }
}

/// Errors surfaced by [`CircuitBreaker::call`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// Half-open probe budget exhausted; the operation was not attempted.
    #[error("too many requests")]
    TooManyRequests,
    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// True when the breaker rejected the call without running it.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Open | Self::TooManyRequests)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: State,
    generation: u64,
    counts: Counts,
    /// Start of the closed-state counting window.
    window_start: Instant,
    /// When the open state lapses; meaningful only in `Open`.
    open_until: Option<Instant>,
}

/// Circuit breaker guarding a single named dependency.
///
/// All state transitions are serialized behind an async `RwLock`; observation
/// ([`state`](Self::state), [`counts`](Self::counts)) takes the read half.
/// Every transition bumps a generation counter, and completions whose
/// generation no longer matches are discarded, so a slow in-flight request
/// can never trip a breaker that has already moved on.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<BreakerConfig>,
    state: Arc<RwLock<BreakerState>>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(BreakerState {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                window_start: Instant::now(),
                open_until: None,
            })),
        }
    }

    /// Breaker with default settings for a named dependency.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(BreakerConfig::new(name))
    }

    /// Dependency name this breaker guards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current state.
    pub async fn state(&self) -> State {
        self.state.read().await.state
    }

    /// Counts for the current generation.
    pub async fn counts(&self) -> Counts {
        self.state.read().await.counts
    }

    /// Run `op` through the breaker.
    ///
    /// If the operation panics, the panic is recorded as a failure and then
    /// resumed on the caller.
    ///
    /// # Errors
    ///
    /// - [`BreakerError::Open`] when the breaker is open.
    /// - [`BreakerError::TooManyRequests`] when half-open probes are exhausted.
    /// - [`BreakerError::Inner`] carrying the operation's own error.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.before_request().await?;

        match AssertUnwindSafe(op()).catch_unwind().await {
            Ok(Ok(value)) => {
                self.after_request(generation, true).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.after_request(generation, false).await;
                Err(BreakerError::Inner(err))
            }
            Err(panic) => {
                self.after_request(generation, false).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Force the breaker back to closed. Intended for tests and operators.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        let now = Instant::now();
        Self::set_state(&self.config, &mut state, State::Closed, now);
    }

    async fn before_request<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut state = self.state.write().await;
        let now = Instant::now();

        match state.state {
            State::Closed => {
                // Roll the counting window so stale failures age out.
                if now.duration_since(state.window_start) >= self.config.interval {
                    Self::new_generation(&mut state, now);
                }
                state.counts.requests += 1;
                Ok(state.generation)
            }
            State::Open => {
                if state.open_until.is_some_and(|until| now >= until) {
                    Self::set_state(&self.config, &mut state, State::HalfOpen, now);
                    state.counts.requests += 1;
                    Ok(state.generation)
                } else {
                    Err(BreakerError::Open)
                }
            }
            State::HalfOpen => {
                if state.counts.requests >= self.config.max_requests {
                    return Err(BreakerError::TooManyRequests);
                }
                state.counts.requests += 1;
                Ok(state.generation)
            }
        }
    }

    async fn after_request(&self, generation: u64, success: bool) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            // The breaker has moved on; this completion belongs to a
            // previous generation and must not influence the current one.
            return;
        }

        let now = Instant::now();
        if success {
            self.on_success(&mut state, now);
        } else {
            self.on_failure(&mut state, now);
        }
    }

    fn on_success(&self, state: &mut BreakerState, now: Instant) {
        match state.state {
            State::Closed => {
                state.counts.successes += 1;
                state.counts.failures = state.counts.failures.saturating_sub(1);
            }
            State::HalfOpen => {
                state.counts.successes += 1;
                if state.counts.successes >= self.config.max_requests {
                    Self::set_state(&self.config, state, State::Closed, now);
                }
            }
            State::Open => {}
        }
    }

    fn on_failure(&self, state: &mut BreakerState, now: Instant) {
        match state.state {
            State::Closed => {
                state.counts.failures += 1;
                state.counts.total_failures += 1;
                if (self.config.trip)(&state.counts) {
                    Self::set_state(&self.config, state, State::Open, now);
                }
            }
            State::HalfOpen => {
                Self::set_state(&self.config, state, State::Open, now);
            }
            State::Open => {
                state.counts.failures += 1;
                state.counts.total_failures += 1;
            }
        }
    }

    fn set_state(config: &BreakerConfig, state: &mut BreakerState, to: State, now: Instant) {
        if state.state == to {
            return;
        }

        let from = state.state;
        state.state = to;
        Self::new_generation(state, now);
        state.open_until = match to {
            State::Open => Some(now + config.cooldown),
            State::Closed | State::HalfOpen => None,
        };

        tracing::info!(
            breaker = %config.name,
            from = %from,
            to = %to,
            "circuit breaker state changed"
        );
    }

    fn new_generation(state: &mut BreakerState, now: Instant) {
        let total_failures = state.counts.total_failures;
        state.generation += 1;
        state.counts = Counts {
            total_failures,
            ..Counts::default()
        };
        state.window_start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig::new("test").cooldown(Duration::from_millis(100))
    }

    async fn trip(breaker: &CircuitBreaker) {
        // Three failures: requests >= 3 and ratio 1.0 >= 0.6.
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
    }

    #[tokio::test]
    async fn stays_closed_on_success() {
        let breaker = CircuitBreaker::new(fast_config());

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn opens_when_failure_ratio_reached() {
        let breaker = CircuitBreaker::new(fast_config());

        trip(&breaker).await;

        assert_eq!(breaker.state().await, State::Open);
    }

    #[tokio::test]
    async fn does_not_trip_below_minimum_requests() {
        let breaker = CircuitBreaker::new(fast_config());

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }

        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn rejects_without_running_when_open() {
        let breaker = CircuitBreaker::new(fast_config());
        trip(&breaker).await;

        let mut ran = false;
        let result = breaker
            .call(|| {
                ran = true;
                async { Ok::<_, String>(1) }
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert!(!ran);
    }

    #[tokio::test]
    async fn probes_after_cooldown_and_recloses() {
        let breaker = CircuitBreaker::new(fast_config().max_requests(2));
        trip(&breaker).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        for _ in 0..2 {
            let result = breaker.call(|| async { Ok::<_, String>(1) }).await;
            assert!(result.is_ok());
        }

        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_for_full_cooldown() {
        let breaker = CircuitBreaker::new(fast_config());
        trip(&breaker).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let _ = breaker.call(|| async { Err::<i32, _>("still down") }).await;

        assert_eq!(breaker.state().await, State::Open);
        // Immediately after reopening, calls are rejected again.
        let result = breaker.call(|| async { Ok::<_, String>(1) }).await;
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn half_open_admits_at_most_max_requests() {
        let breaker = CircuitBreaker::new(fast_config().max_requests(2));
        trip(&breaker).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Hold two probes in flight, then a third must be shed.
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut probes = Vec::new();
        for _ in 0..2 {
            let breaker = breaker.clone();
            let gate = Arc::clone(&gate);
            probes.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        gate.notified().await;
                        Ok::<_, String>(1)
                    })
                    .await
            }));
        }
        // Let both probes register with the breaker.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let shed = breaker.call(|| async { Ok::<_, String>(1) }).await;
        assert!(matches!(shed, Err(BreakerError::TooManyRequests)));

        gate.notify_waiters();
        for probe in probes {
            assert!(probe.await.unwrap().is_ok());
        }
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn closed_successes_never_push_failures_negative() {
        let breaker = CircuitBreaker::new(fast_config());

        for _ in 0..5 {
            let _ = breaker.call(|| async { Ok::<_, String>(1) }).await;
        }

        let counts = breaker.counts().await;
        assert_eq!(counts.failures, 0);
        assert_eq!(counts.successes, 5);
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let breaker = CircuitBreaker::new(fast_config());
        let gate = Arc::new(tokio::sync::Notify::new());

        // A slow request registers under generation N...
        let slow = {
            let breaker = breaker.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        gate.notified().await;
                        Err::<i32, _>("late failure")
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // ...the breaker trips and resets, advancing the generation...
        trip(&breaker).await;
        breaker.reset().await;
        let before = breaker.counts().await;

        // ...so the late failure must not count against the new generation.
        gate.notify_waiters();
        let _ = slow.await.unwrap();
        assert_eq!(breaker.counts().await, before);
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn panic_counts_as_failure_and_resumes() {
        let breaker = CircuitBreaker::new(fast_config());

        let task = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call::<_, _, i32, String>(|| async { panic!("kaboom") })
                    .await
            })
        };

        assert!(task.await.is_err());
        assert_eq!(breaker.counts().await.failures, 1);
    }

    #[tokio::test]
    async fn closed_window_rollover_resets_counts() {
        let breaker =
            CircuitBreaker::new(fast_config().interval(Duration::from_millis(50)));

        let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = breaker.call(|| async { Ok::<_, String>(1) }).await;

        let counts = breaker.counts().await;
        assert_eq!(counts.failures, 0);
        assert_eq!(counts.requests, 1);
    }

    #[tokio::test]
    async fn concurrent_successes_all_admitted_when_closed() {
        let breaker = Arc::new(CircuitBreaker::new(fast_config()));
        let mut handles = Vec::new();

        for _ in 0..50 {
            let breaker = Arc::clone(&breaker);
            handles.push(tokio::spawn(async move {
                breaker.call(|| async { Ok::<_, String>(()) }).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(breaker.counts().await.successes, 50);
    }
}
