use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Distributed Lock - serializes scheduled jobs across service instances
// ============================================================================
//
// One named lock per job type, backed by an atomic conditional upsert
// against the shared database. A lease auto-expires at its max-hold bound,
// so a crashed holder blocks future runs only until the expiry. The lock is
// a mutual-exclusion gate, not a queue: losing an acquisition is a normal
// no-op, never an error.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// A held lease. Release it when the job body finishes; an unreleased lease
/// simply expires at its max-hold bound.
#[derive(Debug, Clone)]
pub struct LockLease {
    pub name: String,
    pub holder: String,
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try to acquire the named lock for at most `max_hold`. Returns `None`
    /// without blocking when another holder has an unexpired lease.
    async fn try_acquire(
        &self,
        name: &str,
        max_hold: Duration,
    ) -> Result<Option<LockLease>, LockError>;

    /// Expire the lease now. Releasing a lease that already expired is fine.
    async fn release(&self, lease: &LockLease) -> Result<(), LockError>;
}

// ============================================================================
// Postgres implementation
// ============================================================================

pub struct PostgresLockProvider {
    pool: PgPool,
    holder: String,
}

impl PostgresLockProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            // One holder identity per process instance
            holder: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl LockProvider for PostgresLockProvider {
    async fn try_acquire(
        &self,
        name: &str,
        max_hold: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        let lock_until = Utc::now()
            + chrono::Duration::from_std(max_hold).unwrap_or_else(|_| chrono::Duration::seconds(60));

        // Single conditional upsert: the row is taken over only when the
        // previous lease has expired. At most one statement wins per key.
        let result = sqlx::query(
            "INSERT INTO job_locks (name, locked_by, locked_at, lock_until) \
             VALUES ($1, $2, now(), $3) \
             ON CONFLICT (name) DO UPDATE \
             SET locked_by = EXCLUDED.locked_by, \
                 locked_at = EXCLUDED.locked_at, \
                 lock_until = EXCLUDED.lock_until \
             WHERE job_locks.lock_until <= now()",
        )
        .bind(name)
        .bind(&self.holder)
        .bind(lock_until)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::debug!(lock = %name, holder = %self.holder, "Acquired job lock");
            Ok(Some(LockLease {
                name: name.to_string(),
                holder: self.holder.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        sqlx::query(
            "UPDATE job_locks SET lock_until = now() WHERE name = $1 AND locked_by = $2",
        )
        .bind(&lease.name)
        .bind(&lease.holder)
        .execute(&self.pool)
        .await?;

        tracing::debug!(lock = %lease.name, holder = %lease.holder, "Released job lock");
        Ok(())
    }
}

// ============================================================================
// In-memory implementation for unit tests
// ============================================================================

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    struct Lease {
        holder: String,
        expires_at: Instant,
    }

    #[derive(Default)]
    pub struct InMemoryLockProvider {
        leases: Mutex<HashMap<String, Lease>>,
    }

    impl InMemoryLockProvider {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl LockProvider for InMemoryLockProvider {
        async fn try_acquire(
            &self,
            name: &str,
            max_hold: Duration,
        ) -> Result<Option<LockLease>, LockError> {
            let mut leases = self.leases.lock().unwrap();
            let now = Instant::now();

            if let Some(existing) = leases.get(name) {
                if existing.expires_at > now {
                    return Ok(None);
                }
            }

            let holder = Uuid::new_v4().to_string();
            leases.insert(
                name.to_string(),
                Lease {
                    holder: holder.clone(),
                    expires_at: now + max_hold,
                },
            );
            Ok(Some(LockLease {
                name: name.to_string(),
                holder,
            }))
        }

        async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
            let mut leases = self.leases.lock().unwrap();
            if let Some(existing) = leases.get(&lease.name) {
                if existing.holder == lease.holder {
                    leases.remove(&lease.name);
                }
            }
            Ok(())
        }
    }
}
