//! Strategy resolution and memoization.
//!
//! Resolution picks the first strategy of the connection's family whose
//! required capability probe succeeds, falling back to the family's
//! unconditional strategy. The result is kept in a [`StrategyCache`] so the
//! probes run at most once per cache in the steady state.
//!
//! ## Concurrency
//!
//! The cache is a single atomic slot. Callers racing on a cold cache may each
//! probe and publish; resolution is a pure function of the backend's
//! capabilities, so every racer publishes the same strategy and the last
//! write wins. Nobody waits on a lock during cold start.

use std::sync::atomic::{AtomicU8, Ordering};

use revalid_core::{CancellationToken, Connection, FreshnessError};
use tracing::{debug, warn};

use crate::Strategy;
use crate::execute::{ConnectionScope, cancellable};
use crate::probe::probe_open;

const UNSET: u8 = 0;

/// Memoized strategy for one application root.
///
/// Create one per application (or per database the application talks to)
/// and share it by reference; there is no global instance.
///
/// # Example
/// ```
/// use revalid_backend::{Strategy, StrategyCache};
///
/// let cache = StrategyCache::new();
/// assert_eq!(cache.get(), None);
///
/// cache.set(Strategy::PostgresCommitCounter);
/// assert_eq!(cache.get(), Some(Strategy::PostgresCommitCounter));
///
/// cache.reset();
/// assert_eq!(cache.get(), None);
/// ```
#[derive(Debug, Default)]
pub struct StrategyCache {
    slot: AtomicU8,
}

impl StrategyCache {
    /// Creates an empty cache.
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(UNSET),
        }
    }

    /// Returns the memoized strategy, if any.
    #[inline]
    pub fn get(&self) -> Option<Strategy> {
        Strategy::from_u8(self.slot.load(Ordering::Acquire))
    }

    /// Publishes `strategy`, replacing any previous value.
    #[inline]
    pub fn set(&self, strategy: Strategy) {
        self.slot.store(strategy.to_u8(), Ordering::Release);
    }

    /// Forgets the memoized strategy; the next caller resolves again.
    ///
    /// Use it when the application switches databases (tests reusing one
    /// process across differently configured servers, hot reloads).
    #[inline]
    pub fn reset(&self) {
        self.slot.store(UNSET, Ordering::Release);
    }

    /// Returns the memoized strategy, resolving and publishing it first when
    /// the cache is empty.
    ///
    /// Opens the connection for the duration of the call when it is closed.
    ///
    /// # Errors
    ///
    /// - [`FreshnessError::UnsupportedBackend`] for a family without strategies.
    /// - [`FreshnessError::CapabilityCheck`] when the connection drops while
    ///   resolving; the cache stays empty.
    /// - [`FreshnessError::Cancelled`] when `cancel` fires.
    pub async fn resolve<C>(
        &self,
        conn: &mut C,
        transaction: Option<&C::Transaction>,
        cancel: &CancellationToken,
    ) -> Result<Strategy, FreshnessError>
    where
        C: Connection,
    {
        let mut scope = ConnectionScope::enter(conn, cancel).await?;
        let result = cancellable(cancel, self.resolve_open(scope.connection(), transaction)).await;
        scope.exit().await;
        result
    }

    pub(crate) async fn resolve_open<C>(
        &self,
        conn: &mut C,
        transaction: Option<&C::Transaction>,
    ) -> Result<Strategy, FreshnessError>
    where
        C: Connection + ?Sized,
    {
        let family = conn.family();
        if let Some(strategy) = self.get() {
            if strategy.family() == family {
                return Ok(strategy);
            }
            warn!(
                cached = strategy.name(),
                family = %family,
                "cached freshness strategy targets another backend family, resolving again"
            );
        }

        let strategy = select_strategy(conn, transaction).await?;
        self.set(strategy);
        debug!(strategy = strategy.name(), family = %family, "resolved freshness strategy");
        Ok(strategy)
    }
}

/// Probes the connection and picks its strategy without consulting or
/// updating any cache. The connection must be open.
///
/// # Errors
///
/// - [`FreshnessError::UnsupportedBackend`] for a family without strategies.
/// - [`FreshnessError::CapabilityCheck`] when the connection drops.
pub async fn select_strategy<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
) -> Result<Strategy, FreshnessError>
where
    C: Connection + ?Sized,
{
    let family = conn.family();
    for &strategy in Strategy::catalog(&family)? {
        match strategy.requires() {
            None => return Ok(strategy),
            Some(capability) if probe_open(conn, transaction, capability).await? => {
                return Ok(strategy);
            }
            Some(capability) => {
                debug!(
                    strategy = strategy.name(),
                    capability = capability.name(),
                    "skipping freshness strategy, capability absent"
                );
            }
        }
    }

    Err(FreshnessError::UnsupportedBackend {
        family: family.as_str().into(),
    })
}
