//! Backend-independent session and supplier over a sqlx connection.

use std::convert::Infallible;
use std::fmt;

use async_trait::async_trait;
use http::request::Parts;
use revalid_backend::Freshness;
use revalid_core::{
    BackendError, BackendFamily, CancellationToken, Command, Connection, FreshnessError,
    FreshnessToken, Row, TokenSupplier,
};
use sqlx::error::DatabaseError;
use sqlx::pool::PoolConnection;
use sqlx::{Database, Pool};
use tracing::trace;

use crate::error::{classify, closed};

type ConnectOptions<DB> = <<DB as Database>::Connection as sqlx::Connection>::Options;

/// A sqlx backend revalid can read freshness tokens from.
///
/// Implemented for [`Postgres`](sqlx::Postgres) and [`MySql`](sqlx::MySql)
/// when their features are enabled. Columns come back as text.
#[async_trait]
pub trait Dialect: Database {
    /// Family reported by sessions of this backend.
    fn family() -> BackendFamily;

    /// Recognizes the backend's privilege errors.
    fn is_denied(err: &dyn DatabaseError) -> bool;

    /// Runs `sql` and returns its first row.
    async fn fetch_optional(
        conn: &mut Self::Connection,
        sql: &str,
    ) -> Result<Option<Row>, sqlx::Error>;

    /// Runs `sql` and returns every row.
    async fn fetch_all(conn: &mut Self::Connection, sql: &str) -> Result<Vec<Row>, sqlx::Error>;

    /// Runs `sql` and returns the number of affected rows.
    async fn execute(conn: &mut Self::Connection, sql: &str) -> Result<u64, sqlx::Error>;
}

/// Implements [`Dialect`] for a sqlx database over [`sqlx::raw_sql`].
macro_rules! dialect {
    ($db:ty, $family:expr, $denied:path) => {
        fn to_row(row: &<$db as sqlx::Database>::Row) -> Result<revalid_core::Row, sqlx::Error> {
            (0..sqlx::Row::len(row))
                .map(|index| sqlx::Row::try_get_unchecked::<Option<String>, _>(row, index))
                .collect()
        }

        #[async_trait::async_trait]
        impl $crate::session::Dialect for $db {
            fn family() -> revalid_core::BackendFamily {
                $family
            }

            fn is_denied(err: &dyn sqlx::error::DatabaseError) -> bool {
                $denied(err)
            }

            async fn fetch_optional(
                conn: &mut <Self as sqlx::Database>::Connection,
                sql: &str,
            ) -> Result<Option<revalid_core::Row>, sqlx::Error> {
                let row = sqlx::Executor::fetch_optional(conn, sqlx::raw_sql(sql)).await?;
                row.as_ref().map(to_row).transpose()
            }

            async fn fetch_all(
                conn: &mut <Self as sqlx::Database>::Connection,
                sql: &str,
            ) -> Result<Vec<revalid_core::Row>, sqlx::Error> {
                let rows = sqlx::Executor::fetch_all(conn, sqlx::raw_sql(sql)).await?;
                rows.iter().map(to_row).collect()
            }

            async fn execute(
                conn: &mut <Self as sqlx::Database>::Connection,
                sql: &str,
            ) -> Result<u64, sqlx::Error> {
                let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?;
                Ok(result.rows_affected())
            }
        }
    };
}

pub(crate) use dialect;

enum Slot<'c, DB: Database> {
    Detached {
        options: ConnectOptions<DB>,
        conn: Option<DB::Connection>,
    },
    Borrowed(&'c mut DB::Connection),
    Pooled {
        pool: Pool<DB>,
        conn: Option<PoolConnection<DB>>,
    },
}

/// A [`Connection`] over a sqlx connection of backend `DB`.
///
/// - [`detached`](Session::detached) connects on open and disconnects on
///   close.
/// - [`pooled`](Session::pooled) acquires from a pool on open and releases
///   on close.
/// - [`borrowed`](Session::borrowed) wraps a connection the caller keeps
///   open, for example the one behind a `sqlx::Transaction`: commands then
///   run inside that transaction.
///
/// Commands never carry a separate transaction handle, so
/// [`Connection::Transaction`] is uninhabited.
pub struct Session<'c, DB: Dialect> {
    slot: Slot<'c, DB>,
}

impl<DB: Dialect> Session<'static, DB> {
    /// A closed session that connects with `options` when opened.
    pub fn detached(options: ConnectOptions<DB>) -> Self {
        Self {
            slot: Slot::Detached {
                options,
                conn: None,
            },
        }
    }

    /// A closed session that acquires from `pool` when opened.
    pub fn pooled(pool: Pool<DB>) -> Self {
        Self {
            slot: Slot::Pooled { pool, conn: None },
        }
    }
}

impl<'c, DB: Dialect> Session<'c, DB> {
    /// An open session over a caller-owned connection.
    pub fn borrowed(conn: &'c mut DB::Connection) -> Self {
        Self {
            slot: Slot::Borrowed(conn),
        }
    }

    fn executor(&mut self) -> Result<&mut DB::Connection, BackendError> {
        match &mut self.slot {
            Slot::Detached { conn: Some(conn), .. } => Ok(conn),
            Slot::Pooled { conn: Some(conn), .. } => Ok(&mut **conn),
            Slot::Borrowed(conn) => Ok(&mut **conn),
            Slot::Detached { conn: None, .. } | Slot::Pooled { conn: None, .. } => Err(closed()),
        }
    }
}

fn driver_error<DB: Dialect>(err: sqlx::Error) -> BackendError {
    classify(err, DB::is_denied)
}

#[async_trait]
impl<'c, DB: Dialect> Connection for Session<'c, DB> {
    type Transaction = Infallible;

    fn family(&self) -> BackendFamily {
        DB::family()
    }

    fn is_open(&self) -> bool {
        match &self.slot {
            Slot::Detached { conn, .. } => conn.is_some(),
            Slot::Pooled { conn, .. } => conn.is_some(),
            Slot::Borrowed(_) => true,
        }
    }

    async fn open(&mut self) -> Result<(), BackendError> {
        match &mut self.slot {
            Slot::Detached { options, conn } if conn.is_none() => {
                let connected = <DB::Connection as sqlx::Connection>::connect_with(options)
                    .await
                    .map_err(driver_error::<DB>)?;
                *conn = Some(connected);
            }
            Slot::Pooled { pool, conn } if conn.is_none() => {
                let acquired = pool.acquire().await.map_err(driver_error::<DB>)?;
                *conn = Some(acquired);
            }
            _ => {}
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        match &mut self.slot {
            Slot::Detached { conn, .. } => {
                if let Some(conn) = conn.take() {
                    sqlx::Connection::close(conn)
                        .await
                        .map_err(driver_error::<DB>)?;
                }
            }
            Slot::Pooled { conn, .. } => {
                // dropping returns it to the pool
                conn.take();
            }
            Slot::Borrowed(_) => {}
        }
        Ok(())
    }

    async fn execute_scalar(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Option<String>, BackendError> {
        let conn = self.executor()?;
        trace!(backend = DB::NAME, sql = command.text, "scalar command");
        let row = DB::fetch_optional(conn, command.text)
            .await
            .map_err(driver_error::<DB>)?;
        Ok(row.and_then(|row| row.get(0).map(str::to_owned)))
    }

    async fn execute_reader(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Vec<Row>, BackendError> {
        let conn = self.executor()?;
        trace!(backend = DB::NAME, sql = command.text, "reader command");
        DB::fetch_all(conn, command.text)
            .await
            .map_err(driver_error::<DB>)
    }

    async fn execute_non_query(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<u64, BackendError> {
        let conn = self.executor()?;
        trace!(backend = DB::NAME, sql = command.text, "non-query command");
        DB::execute(conn, command.text)
            .await
            .map_err(driver_error::<DB>)
    }
}

/// [`TokenSupplier`] reading tokens through a pooled connection per request.
pub struct PoolSupplier<DB: Dialect> {
    pool: Pool<DB>,
    freshness: Freshness,
}

impl<DB: Dialect> PoolSupplier<DB> {
    /// Creates a supplier with its own strategy cache.
    pub fn new(pool: Pool<DB>) -> Self {
        Self::with_freshness(pool, Freshness::new())
    }

    /// Creates a supplier sharing `freshness` (and its strategy cache).
    pub fn with_freshness(pool: Pool<DB>, freshness: Freshness) -> Self {
        Self { pool, freshness }
    }

    /// The facade used to read tokens.
    pub fn freshness(&self) -> &Freshness {
        &self.freshness
    }
}

impl<DB: Dialect> Clone for PoolSupplier<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            freshness: self.freshness.clone(),
        }
    }
}

impl<DB: Dialect> fmt::Debug for PoolSupplier<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSupplier")
            .field("backend", &DB::NAME)
            .field("pool", &self.pool)
            .field("freshness", &self.freshness)
            .finish()
    }
}

#[async_trait]
impl<DB: Dialect> TokenSupplier for PoolSupplier<DB> {
    async fn token(
        &self,
        _request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError> {
        let mut session = Session::<DB>::pooled(self.pool.clone());
        self.freshness.token(&mut session, None, cancel).await
    }
}
