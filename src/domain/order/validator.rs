use std::collections::HashSet;
use std::sync::Arc;

use super::errors::OrderError;
use super::value_objects::OrderRequest;
use crate::clients::ResilientCatalogClient;

// ============================================================================
// Order Validator
// ============================================================================
//
// Validation is all-or-nothing: the first failing item aborts the order.
// Catalog lookups go through the resilience wrapper, so an unavailable
// catalog surfaces here as a missing product.
//
// ============================================================================

pub struct OrderValidator {
    catalog: Arc<ResilientCatalogClient>,
}

impl OrderValidator {
    pub fn new(catalog: Arc<ResilientCatalogClient>) -> Self {
        Self { catalog }
    }

    pub async fn validate(&self, request: &OrderRequest) -> Result<(), OrderError> {
        if request.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        // Line items are a set keyed by product code
        let mut seen = HashSet::new();
        for item in &request.items {
            if !seen.insert(item.code.as_str()) {
                return Err(OrderError::DuplicateProduct(item.code.clone()));
            }
        }

        for item in &request.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    code: item.code.clone(),
                    quantity: item.quantity,
                });
            }

            let product = self
                .catalog
                .lookup(&item.code)
                .await
                .ok_or_else(|| OrderError::InvalidProduct(item.code.clone()))?;

            // Exact decimal equality, no tolerance
            if item.price != product.price {
                tracing::error!(
                    code = %item.code,
                    catalog_price = %product.price,
                    received_price = %item.price,
                    "Product price not matching"
                );
                return Err(OrderError::PriceMismatch {
                    code: item.code.clone(),
                    expected: product.price,
                    submitted: item.price,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::catalog::testing::StaticCatalog;
    use crate::metrics::Metrics;
    use crate::utils::{CircuitBreakerConfig, RetryConfig};
    use rust_decimal::Decimal;

    pub(crate) fn test_validator(catalog: Arc<StaticCatalog>) -> OrderValidator {
        OrderValidator::new(Arc::new(ResilientCatalogClient::new(
            catalog,
            CircuitBreakerConfig::default(),
            RetryConfig {
                max_attempts: 2,
                initial_delay: std::time::Duration::from_millis(5),
                max_delay: std::time::Duration::from_millis(20),
                multiplier: 2.0,
            },
            Arc::new(Metrics::new().unwrap()),
        )))
    }

    fn request(code: &str, price: &str, quantity: u32) -> OrderRequest {
        use crate::domain::order::{Address, Customer, OrderItem};
        OrderRequest {
            customer: Customer {
                name: "John".to_string(),
                email: "john@gmail.com".to_string(),
                phone: "999999999".to_string(),
            },
            delivery_address: Address {
                address_line1: "616 rue des melezes".to_string(),
                address_line2: None,
                city: "Quebec".to_string(),
                state: "Quebec".to_string(),
                zip_code: "G1X3C5".to_string(),
                country: "Canada".to_string(),
            },
            items: vec![OrderItem {
                code: code.to_string(),
                name: "Mouse Logitech".to_string(),
                price: price.parse().unwrap(),
                quantity,
            }],
            comments: None,
        }
    }

    #[tokio::test]
    async fn accepts_order_matching_catalog_exactly() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let validator = test_validator(catalog);

        assert!(validator.validate(&request("P100", "25.50", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_unknown_product_code() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let validator = test_validator(catalog);

        let err = validator
            .validate(&request("ABCD", "25.50", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidProduct(code) if code == "ABCD"));
    }

    #[tokio::test]
    async fn rejects_price_mismatch() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let validator = test_validator(catalog);

        let err = validator
            .validate(&request("P100", "25.49", 1))
            .await
            .unwrap_err();
        match err {
            OrderError::PriceMismatch {
                code,
                expected,
                submitted,
            } => {
                assert_eq!(code, "P100");
                assert_eq!(expected, "25.50".parse::<Decimal>().unwrap());
                assert_eq!(submitted, "25.49".parse::<Decimal>().unwrap());
            }
            other => panic!("expected PriceMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_repeated_product_code() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let validator = test_validator(catalog);

        let mut req = request("P100", "25.50", 1);
        let duplicate = req.items[0].clone();
        req.items.push(duplicate);

        let err = validator.validate(&req).await.unwrap_err();
        assert!(matches!(err, OrderError::DuplicateProduct(code) if code == "P100"));
    }

    #[tokio::test]
    async fn rejects_empty_item_set_and_zero_quantity() {
        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        let validator = test_validator(catalog);

        let mut empty = request("P100", "25.50", 1);
        empty.items.clear();
        assert!(matches!(
            validator.validate(&empty).await.unwrap_err(),
            OrderError::EmptyItems
        ));

        assert!(matches!(
            validator.validate(&request("P100", "25.50", 0)).await.unwrap_err(),
            OrderError::InvalidQuantity { .. }
        ));
    }

    #[tokio::test]
    async fn catalog_outage_is_surfaced_as_invalid_product() {
        use crate::clients::CatalogError;

        let catalog = Arc::new(StaticCatalog::with_product("P100", "Mouse Logitech", "25.50"));
        catalog.fail_next(vec![CatalogError::Timeout, CatalogError::Timeout]);
        let validator = test_validator(catalog);

        // Documented limitation: infrastructure failure degrades to "no
        // product found" and is indistinguishable at this boundary.
        let err = validator
            .validate(&request("P100", "25.50", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidProduct(_)));
    }
}
