// ============================================================================
// Order Domain - Business Logic for the Order Lifecycle
// ============================================================================
//
// This module contains ALL order-specific code:
// - Value objects (Order, OrderItem, Customer, Address, OrderStatus)
// - Events (OrderEvent: Created, Delivered, Cancelled, Error)
// - Errors (OrderError enum)
// - Validator (catalog-backed request validation)
// - Service (order lifecycle engine: create, read, batch advancement)
//
// Persistence and messaging live behind traits in `store` and `messaging`.
//
// ============================================================================

pub mod errors;
pub mod events;
pub mod service;
pub mod validator;
pub mod value_objects;

pub use errors::*;
pub use events::*;
pub use service::*;
pub use validator::*;
pub use value_objects::*;
