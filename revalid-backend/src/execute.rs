//! Scoped execution of freshness queries.
//!
//! The connection belongs to the caller. When a call finds it closed, it
//! opens it, and closes it again before returning on every path: success,
//! backend failure and cancellation. An already open connection is left
//! open.

use std::future::Future;

use revalid_core::{CancellationToken, Connection, FreshnessError, FreshnessToken};
use tracing::{trace, warn};

use crate::Strategy;

/// Borrow of a connection that remembers whether it opened it.
pub(crate) struct ConnectionScope<'c, C>
where
    C: Connection,
{
    conn: &'c mut C,
    opened: bool,
}

impl<'c, C> ConnectionScope<'c, C>
where
    C: Connection,
{
    /// Opens `conn` when it is closed.
    pub(crate) async fn enter(
        conn: &'c mut C,
        cancel: &CancellationToken,
    ) -> Result<Self, FreshnessError> {
        if conn.is_open() {
            return Ok(Self {
                conn,
                opened: false,
            });
        }

        let family = conn.family();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FreshnessError::Cancelled),
            result = conn.open() => result.map_err(|source| FreshnessError::QueryExecution {
                strategy: "open",
                message: format!("could not open {family} connection: {source}"),
                source,
            }),
        };

        // a cancelled open may have left a half-open connection behind
        if opened.is_err() && conn.is_open() {
            if let Err(error) = conn.close().await {
                warn!(%error, "failed to close connection after aborted open");
            }
        }
        opened?;

        trace!(family = %family, "opened connection for freshness query");
        Ok(Self { conn, opened: true })
    }

    pub(crate) fn connection(&mut self) -> &mut C {
        &mut *self.conn
    }

    /// Restores the connection state found on entry.
    ///
    /// A failed close is logged; it never replaces the result of the query.
    pub(crate) async fn exit(self) {
        if !self.opened {
            return;
        }
        if let Err(error) = self.conn.close().await {
            warn!(family = %self.conn.family(), %error, "failed to close connection");
        }
    }
}

/// Races `future` against `cancel`.
pub(crate) async fn cancellable<F, T>(
    cancel: &CancellationToken,
    future: F,
) -> Result<T, FreshnessError>
where
    F: Future<Output = Result<T, FreshnessError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FreshnessError::Cancelled),
        result = future => result,
    }
}

/// Runs `strategy` on `conn`, enlisted in `transaction` when given.
///
/// Opens the connection if it is closed and closes it again before
/// returning.
///
/// # Errors
///
/// - [`FreshnessError::QueryExecution`] when the backend fails. A denied
///   permission on the transaction-log strategy is explained in the message.
/// - [`FreshnessError::Cancelled`] when `cancel` fires first.
pub async fn execute<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
    strategy: Strategy,
    cancel: &CancellationToken,
) -> Result<FreshnessToken, FreshnessError>
where
    C: Connection,
{
    let mut scope = ConnectionScope::enter(conn, cancel).await?;
    let result = cancellable(cancel, read(scope.connection(), transaction, strategy)).await;
    scope.exit().await;
    result
}

pub(crate) async fn read<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
    strategy: Strategy,
) -> Result<FreshnessToken, FreshnessError>
where
    C: Connection + ?Sized,
{
    let token = strategy
        .read(conn, transaction)
        .await
        .map_err(|source| strategy.query_error(source))?;
    trace!(strategy = strategy.name(), token = token.as_str(), "read freshness token");
    Ok(token)
}
