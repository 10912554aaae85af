use rust_decimal::Decimal;

use crate::store::StoreError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid quantity {quantity} for product {code}")]
    InvalidQuantity { code: String, quantity: u32 },

    #[error("Invalid Product code: {0}")]
    InvalidProduct(String),

    #[error("Duplicate product code: {0}")]
    DuplicateProduct(String),

    #[error("Product price not matching for {code}: catalog price {expected}, received {submitted}")]
    PriceMismatch {
        code: String,
        expected: Decimal,
        submitted: Decimal,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
