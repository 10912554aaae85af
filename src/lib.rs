//! Order lifecycle orchestration engine.
//!
//! Orders are created against a remote product catalog (behind a circuit
//! breaker + retry + fallback wrapper), persisted together with their domain
//! events through a transactional outbox, and asynchronously advanced to a
//! terminal state by scheduled jobs serialized across service instances with
//! a database-backed distributed lock.

pub mod clients;
pub mod config;
pub mod domain;
pub mod jobs;
pub mod lock;
pub mod messaging;
pub mod metrics;
pub mod outbox;
pub mod store;
pub mod utils;
