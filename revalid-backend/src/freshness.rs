use std::sync::Arc;

use revalid_core::{CancellationToken, Connection, FreshnessError, FreshnessToken};
use tracing::instrument;

use crate::StrategyCache;
use crate::execute::{ConnectionScope, cancellable, read};

/// Reads freshness tokens through a shared [`StrategyCache`].
///
/// Cheap to clone; clones share the cache.
///
/// # Example
///
/// ```ignore
/// use revalid_backend::Freshness;
/// use revalid_core::CancellationToken;
///
/// let freshness = Freshness::new();
/// let token = freshness
///     .token(&mut session, None, &CancellationToken::new())
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Freshness {
    cache: Arc<StrategyCache>,
}

impl Freshness {
    /// Creates a facade with its own empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a facade over an existing cache.
    pub fn with_cache(cache: Arc<StrategyCache>) -> Self {
        Self { cache }
    }

    /// The cache backing this facade.
    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.cache
    }

    /// Forgets the memoized strategy.
    pub fn reset(&self) {
        self.cache.reset();
    }

    /// Resolves the strategy (once per cache) and reads the current token.
    ///
    /// Opens `conn` when it is closed and closes it again before returning,
    /// whatever the outcome. Runs inside `transaction` when one is given.
    ///
    /// # Errors
    ///
    /// - [`FreshnessError::UnsupportedBackend`] for a family without strategies.
    /// - [`FreshnessError::QueryExecution`] when the backend fails.
    /// - [`FreshnessError::CapabilityCheck`] when the connection drops while
    ///   resolving; the cache stays empty.
    /// - [`FreshnessError::Cancelled`] when `cancel` fires first.
    #[instrument(name = "revalid.freshness", skip_all, fields(family = %conn.family()))]
    pub async fn token<C>(
        &self,
        conn: &mut C,
        transaction: Option<&C::Transaction>,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError>
    where
        C: Connection,
    {
        let mut scope = ConnectionScope::enter(conn, cancel).await?;
        let result = cancellable(cancel, self.resolve_and_read(scope.connection(), transaction)).await;
        scope.exit().await;
        result
    }

    async fn resolve_and_read<C>(
        &self,
        conn: &mut C,
        transaction: Option<&C::Transaction>,
    ) -> Result<FreshnessToken, FreshnessError>
    where
        C: Connection + ?Sized,
    {
        let strategy = self.cache.resolve_open(conn, transaction).await?;
        read(conn, transaction, strategy).await
    }
}
