use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, IsTransient,
    RetryConfig, RetryResult,
};

// ============================================================================
// Catalog Client - remote product lookup with resilience decorators
// ============================================================================
//
// The raw HTTP client only classifies outcomes; the breaker + retry +
// fallback composition lives in ResilientCatalogClient. The circuit breaker
// is evaluated before retry: an open circuit short-circuits all remaining
// attempts, and retry only governs calls the breaker admitted.
//
// ============================================================================

/// Fixed connect/read timeouts, independent of retry and breaker settings.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request timed out")]
    Timeout,

    #[error("failed to connect to catalog service")]
    Connect,

    #[error("catalog service returned status {0}")]
    Status(u16),

    #[error("failed to decode catalog response: {0}")]
    Decode(String),
}

impl IsTransient for CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            CatalogError::Timeout | CatalogError::Connect => true,
            CatalogError::Status(status) => *status >= 500,
            CatalogError::Decode(_) => false,
        }
    }
}

/// Product lookup contract. `Ok(None)` means the catalog definitively does
/// not know the code.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_product(&self, code: &str) -> Result<Option<Product>, CatalogError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

fn classify_request_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else if err.is_connect() {
        CatalogError::Connect
    } else {
        CatalogError::Decode(err.to_string())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_product(&self, code: &str) -> Result<Option<Product>, CatalogError> {
        let url = format!(
            "{}/api/products/{}",
            self.base_url.trim_end_matches('/'),
            code
        );

        tracing::debug!(code = %code, "Fetching product from catalog");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(classify_request_error)?;

        match response.status() {
            status if status.is_success() => {
                let product = response
                    .json::<Product>()
                    .await
                    .map_err(|e| CatalogError::Decode(e.to_string()))?;
                Ok(Some(product))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(CatalogError::Status(status.as_u16())),
        }
    }
}

// ============================================================================
// Resilience wrapper: circuit breaker, then retry, then empty fallback
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum LookupFailure {
    #[error("circuit breaker is open for the catalog service")]
    CircuitOpen,

    #[error(transparent)]
    Source(CatalogError),
}

impl IsTransient for LookupFailure {
    fn is_transient(&self) -> bool {
        match self {
            // An open circuit must short-circuit the remaining attempts
            LookupFailure::CircuitOpen => false,
            LookupFailure::Source(e) => e.is_transient(),
        }
    }
}

pub struct ResilientCatalogClient {
    inner: Arc<dyn CatalogClient>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl ResilientCatalogClient {
    pub fn new(
        inner: Arc<dyn CatalogClient>,
        breaker_config: CircuitBreakerConfig,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("catalog-service", breaker_config),
            retry,
            metrics,
        }
    }

    /// Look up a product, degrading to `None` when the dependency is
    /// unavailable. Callers cannot distinguish an invalid product code from
    /// an exhausted dependency through this return value; the distinction is
    /// kept observable in logs and the fallback metric.
    pub async fn lookup(&self, code: &str) -> Option<Product> {
        let result = retry_on_transient(self.retry.clone(), |_attempt| {
            let inner = self.inner.clone();
            let breaker = self.breaker.clone();
            let code = code.to_string();
            async move {
                match breaker.call(inner.get_product(&code)).await {
                    Ok(product) => Ok(product),
                    Err(CircuitBreakerError::CircuitOpen) => Err(LookupFailure::CircuitOpen),
                    Err(CircuitBreakerError::OperationFailed(e)) => Err(LookupFailure::Source(e)),
                }
            }
        })
        .await;

        self.metrics.record_breaker_state(self.breaker.state().await);

        match result {
            RetryResult::Success(product) => {
                let outcome = if product.is_some() { "found" } else { "not_found" };
                self.metrics.catalog_requests.with_label_values(&[outcome]).inc();
                product
            }
            RetryResult::Failed(error) => self.fallback(code, "retries_exhausted", &error),
            RetryResult::PermanentFailure(LookupFailure::CircuitOpen) => {
                self.fallback(code, "circuit_open", &LookupFailure::CircuitOpen)
            }
            RetryResult::PermanentFailure(error) => self.fallback(code, "permanent_error", &error),
        }
    }

    fn fallback(&self, code: &str, reason: &str, error: &LookupFailure) -> Option<Product> {
        tracing::warn!(
            code = %code,
            reason = %reason,
            error = %error,
            "Catalog lookup degraded to empty result"
        );
        self.metrics.catalog_requests.with_label_values(&["fallback"]).inc();
        self.metrics.catalog_fallbacks.with_label_values(&[reason]).inc();
        None
    }
}

// ============================================================================
// Test doubles
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::StaticCatalog;
    use super::*;
    use crate::utils::CircuitState;
    use std::sync::atomic::Ordering;

    fn resilient(
        catalog: Arc<StaticCatalog>,
        breaker: CircuitBreakerConfig,
        max_attempts: u32,
    ) -> ResilientCatalogClient {
        ResilientCatalogClient::new(
            catalog,
            breaker,
            RetryConfig {
                max_attempts,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn returns_product_when_catalog_healthy() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let client = resilient(catalog, CircuitBreakerConfig::default(), 3);

        let product = client.lookup("P100").await.unwrap();
        assert_eq!(product.code, "P100");
        assert_eq!(product.price, "25.50".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn unknown_code_is_definitive_and_not_retried() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let client = resilient(catalog.clone(), CircuitBreakerConfig::default(), 3);

        assert!(client.lookup("ABCD").await.is_none());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_when_transient_failure_clears_within_retry_budget() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        catalog.fail_next(vec![CatalogError::Timeout, CatalogError::Status(503)]);
        let client = resilient(catalog.clone(), CircuitBreakerConfig::default(), 3);

        let product = client.lookup("P100").await;
        assert!(product.is_some());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn falls_back_to_empty_after_retries_exhaust() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        catalog.fail_next(vec![
            CatalogError::Timeout,
            CatalogError::Timeout,
            CatalogError::Timeout,
        ]);
        let client = resilient(catalog.clone(), CircuitBreakerConfig::default(), 3);

        assert!(client.lookup("P100").await.is_none());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            client
                .metrics
                .catalog_fallbacks
                .with_label_values(&["retries_exhausted"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_retry_attempts() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let breaker_config = CircuitBreakerConfig {
            window_size: 2,
            failure_rate_threshold: 0.5,
            wait_duration: Duration::from_secs(60),
            half_open_max_calls: 1,
        };
        let client = resilient(catalog.clone(), breaker_config, 2);

        // Two timeouts exhaust the retry budget and fill the breaker window
        catalog.fail_next(vec![CatalogError::Timeout, CatalogError::Timeout]);
        assert!(client.lookup("P100").await.is_none());
        let calls_after_open = catalog.calls.load(Ordering::SeqCst);
        assert_eq!(calls_after_open, 2);

        // Circuit is open: no network attempt at all, immediate fallback
        assert!(client.lookup("P100").await.is_none());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), calls_after_open);
        assert_eq!(
            client
                .metrics
                .catalog_fallbacks
                .with_label_values(&["circuit_open"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn half_open_success_restores_normal_lookups() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let breaker_config = CircuitBreakerConfig {
            window_size: 2,
            failure_rate_threshold: 0.5,
            wait_duration: Duration::from_millis(50),
            half_open_max_calls: 1,
        };
        let client = resilient(catalog.clone(), breaker_config, 3);

        catalog.fail_next(vec![CatalogError::Timeout, CatalogError::Timeout]);
        assert!(client.lookup("P100").await.is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Trial call succeeds, breaker closes, lookups flow again
        assert!(client.lookup("P100").await.is_some());
        assert_eq!(client.breaker.state().await, CircuitState::Closed);
    }
}
