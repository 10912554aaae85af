use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker Pattern Implementation
// ============================================================================
//
// Protects calls to an unreliable dependency by tracking the failure rate
// over a sliding window of recent call outcomes and temporarily blocking
// requests once that rate crosses a threshold.
//
// States:
// - Closed: Normal operation, requests pass through
// - Open: Failure rate too high, requests blocked immediately
// - HalfOpen: Testing if the dependency recovered, limited trial calls
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of recent call outcomes kept in the sliding window
    pub window_size: usize,
    /// Failure rate (0.0..=1.0) over a full window that opens the circuit
    pub failure_rate_threshold: f64,
    /// Time to wait in Open before admitting trial calls
    pub wait_duration: Duration,
    /// Trial calls admitted while HalfOpen
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            failure_rate_threshold: 0.5,
            wait_duration: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    /// Recent outcomes, `true` = failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

impl BreakerState {
    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|f| **f).count();
        failures as f64 / self.window.len() as f64
    }

    fn record_outcome(&mut self, failed: bool, window_size: usize) {
        self.window.push_back(failed);
        while self.window.len() > window_size {
            self.window.pop_front();
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_in_flight: 0,
            })),
            config,
        }
    }

    /// Execute an operation under circuit breaker protection.
    ///
    /// An open circuit rejects the call without awaiting the operation, so
    /// no network attempt is ever made while the circuit is open.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().await;

            match state.state {
                CircuitState::Open => {
                    let waited = state
                        .opened_at
                        .map(|at| at.elapsed() >= self.config.wait_duration)
                        .unwrap_or(true);
                    if waited {
                        tracing::info!(breaker = %self.name, "Circuit breaker transitioning to HalfOpen");
                        state.state = CircuitState::HalfOpen;
                        state.half_open_in_flight = 1;
                    } else {
                        return Err(CircuitBreakerError::CircuitOpen);
                    }
                }
                CircuitState::HalfOpen => {
                    if state.half_open_in_flight >= self.config.half_open_max_calls {
                        return Err(CircuitBreakerError::CircuitOpen);
                    }
                    state.half_open_in_flight += 1;
                }
                CircuitState::Closed => {}
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Trial call succeeded, closing circuit");
                state.state = CircuitState::Closed;
                state.window.clear();
                state.opened_at = None;
                state.half_open_in_flight = 0;
            }
            CircuitState::Closed => {
                state.record_outcome(false, self.config.window_size);
            }
            CircuitState::Open => {
                // A call admitted just before the state flipped; nothing to do
            }
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed => {
                state.record_outcome(true, self.config.window_size);
                let rate = state.failure_rate();
                if state.window.len() >= self.config.window_size
                    && rate >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        breaker = %self.name,
                        failure_rate = rate,
                        "Circuit breaker opening"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "Trial call failed, reopening circuit");
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.window.clear();
                state.half_open_in_flight = 0;
            }
            CircuitState::Open => {
                state.opened_at = Some(Instant::now());
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        let state = self.state.lock().await;
        state.state
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "Circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}
