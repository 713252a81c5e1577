//! The relational driver boundary.
//!
//! Strategies and probes never see a concrete driver. They run against
//! [`Connection`], the minimal surface every relational driver offers:
//! open/close, run a command returning a scalar, rows, or an affected-row
//! count, optionally inside a transaction.
//!
//! Each adapter tags itself with a [`BackendFamily`], so strategy selection
//! switches on an explicit value instead of inspecting driver types.
//!
//! Values cross the boundary as text. Adapters convert whatever their driver
//! returns into `Option<String>` per column, `None` standing for SQL `NULL`.

use std::fmt;

use async_trait::async_trait;
use smol_str::SmolStr;

use crate::BackendError;

/// The family of relational backend a connection talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendFamily {
    /// Microsoft SQL Server.
    SqlServer,
    /// PostgreSQL.
    Postgres,
    /// MySQL and compatible servers.
    MySql,
    /// Any other backend, named by its adapter.
    Other(SmolStr),
}

impl BackendFamily {
    /// Returns the family name.
    pub fn as_str(&self) -> &str {
        match self {
            BackendFamily::SqlServer => "sqlserver",
            BackendFamily::Postgres => "postgres",
            BackendFamily::MySql => "mysql",
            BackendFamily::Other(name) => name,
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single command to run on a connection.
///
/// Borrowing the transaction keeps its lifetime with the caller; the
/// command only attaches it for the duration of one execution.
#[derive(Debug)]
pub struct Command<'a, T> {
    /// Command text.
    pub text: &'a str,
    /// Transaction to enlist the command in.
    pub transaction: Option<&'a T>,
}

impl<'a, T> Command<'a, T> {
    /// Creates a command outside any transaction.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            transaction: None,
        }
    }

    /// Enlists the command in `transaction` when one is given.
    pub fn with_transaction(mut self, transaction: Option<&'a T>) -> Self {
        self.transaction = transaction;
        self
    }
}

impl<T> Clone for Command<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Command<'_, T> {}

/// One result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<Option<String>>);

impl Row {
    /// Creates a row from its column values.
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self(columns)
    }

    /// Returns column `index`, `None` when the column is absent or `NULL`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|value| value.as_deref())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a row without columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Self(iter.into_iter().map(|value| value.map(Into::into)).collect())
    }
}

/// A borrowed relational connection.
///
/// Callers own the connection; `revalid` only borrows it for one call and
/// restores its open/closed state before returning.
#[async_trait]
pub trait Connection: Send {
    /// Transaction handle commands can be enlisted in.
    type Transaction: Send + Sync;

    /// Backend family of this connection.
    fn family(&self) -> BackendFamily;

    /// Returns `true` when the connection is open.
    fn is_open(&self) -> bool;

    /// Opens the connection.
    async fn open(&mut self) -> Result<(), BackendError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Runs `command` and returns the first column of the first row.
    ///
    /// `Ok(None)` covers both "no rows" and a `NULL` value.
    async fn execute_scalar(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Option<String>, BackendError>;

    /// Runs `command` and returns every row.
    async fn execute_reader(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Vec<Row>, BackendError>;

    /// Runs `command` for its side effects and returns the affected-row count.
    async fn execute_non_query(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<u64, BackendError>;
}
