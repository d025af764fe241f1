use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Thresholds for a single breaker.
///
/// The breaker trips on consecutive failures: `failure_threshold` failures in a
/// row while closed open the circuit, and any success while closed resets the
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
    /// Probes allowed in flight at once while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

/// Point-in-time view of a breaker, for observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    /// Bumped on every state change; outcomes of calls admitted under an older
    /// generation are ignored.
    generation: u64,
    probes_in_flight: u32,
}

/// Three-state circuit breaker guarding one logical dependency.
///
/// All state lives behind one mutex and is never held across an await, so the
/// dependency call itself runs outside the critical section.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

/// Admission ticket for a single call.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                last_failure: None,
                last_failure_at: None,
                generation: 0,
                probes_in_flight: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state and counters. Reading never moves the breaker: an open
    /// circuit whose reset timeout has elapsed still reports `Open` until the
    /// next call attempt probes it.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures,
            success_count: inner.successes,
            last_failure_at: inner.last_failure_at,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Force the breaker closed and clear its counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
        inner.probes_in_flight = 0;
        inner.generation += 1;
        tracing::info!(breaker = %self.name, "circuit breaker manually reset");
    }

    /// Runs `call` if the breaker admits it and records the outcome.
    ///
    /// When the breaker rejects, `call` is dropped without being polled, so nothing
    /// reaches the dependency.
    pub async fn call<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let permit = self.acquire()?;
        let result = call.await;
        permit.settle(result.is_ok());
        result
    }

    fn acquire(&self) -> Result<Permit<'_>, GatewayError> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure
                .is_none_or(|at| at.elapsed() >= self.config.reset_timeout);
            if !cooled_down {
                return Err(GatewayError::CircuitOpen(self.name.clone()));
            }
            self.transition(&mut inner, CircuitState::HalfOpen);
        }

        let probe = inner.state == CircuitState::HalfOpen;
        if probe {
            if inner.probes_in_flight >= self.config.half_open_max_calls {
                return Err(GatewayError::CircuitOpen(self.name.clone()));
            }
            inner.probes_in_flight += 1;
        }

        Ok(Permit {
            breaker: self,
            generation: inner.generation,
            probe,
            settled: false,
        })
    }

    fn record(&self, generation: u64, probe: bool, outcome: Option<bool>) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }

        match (inner.state, outcome) {
            (_, None) => {}
            (CircuitState::Closed, Some(true)) => inner.failures = 0,
            (CircuitState::Closed, Some(false)) => {
                inner.failures += 1;
                self.mark_failure(&mut inner);
                if inner.failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            (CircuitState::HalfOpen, Some(true)) => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, Some(false)) => {
                inner.failures += 1;
                self.mark_failure(&mut inner);
                self.transition(&mut inner, CircuitState::Open);
            }
            (CircuitState::Open, Some(_)) => {}
        }
    }

    fn mark_failure(&self, inner: &mut Inner) {
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.successes = 0;
        inner.probes_in_flight = 0;
        if to == CircuitState::Closed {
            inner.failures = 0;
        }

        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                ?from,
                failures = inner.failures,
                "circuit breaker opened"
            ),
            _ => tracing::info!(breaker = %self.name, ?from, ?to, "circuit breaker state changed"),
        }
    }
}

impl Permit<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.generation, self.probe, Some(success));
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // Cancelled before completion: free the probe slot, count nothing.
        if !self.settled && self.probe {
            self.breaker.record(self.generation, true, None);
        }
    }
}
