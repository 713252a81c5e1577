//! SQL Server change-tracking administration.
//!
//! Change tracking is what makes the
//! [`SqlServerRowVersion`](crate::Strategy::SqlServerRowVersion) strategy
//! available: once enabled on the database, its version counter moves on
//! every tracked insert, update and delete. These helpers enable it, pick the
//! tracked tables, and switch it off again.
//!
//! All functions run on an open connection, outside any transaction
//! (`alter database` cannot run inside one).

use std::collections::HashSet;
use std::fmt::Write;

use revalid_core::{BackendError, BackendFamily, Command, Connection, SmolStr};
use thiserror::Error;
use tracing::info;

/// Error returned by change-tracking administration.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Change tracking only exists on SQL Server.
    #[error("change tracking is not available on backend family `{family}`")]
    UnsupportedBackend {
        /// The connection's family.
        family: SmolStr,
    },

    /// The backend rejected a command.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

const IS_TRACKING_ENABLED: &str = "
select cast(count(d.name) as varchar)
from sys.databases as d inner join
  sys.change_tracking_databases as t on
  t.database_id = d.database_id
where d.name = db_name();";

const TRACKED_TABLES: &str = "
select t.name
from sys.tables as t inner join
  sys.change_tracking_tables as c on t.[object_id] = c.[object_id];";

const TRACKED_DATABASES: &str = "
select d.name
from sys.databases as d inner join
  sys.change_tracking_databases as t on
  t.database_id = d.database_id;";

const DISABLE_DATABASE: &str = "
declare @sql nvarchar(max) =
  N'alter database ' + quotename(db_name()) + N' set change_tracking = off;';
exec sp_executesql @sql;";

fn ensure_sql_server<C>(conn: &C) -> Result<(), TrackingError>
where
    C: Connection + ?Sized,
{
    match conn.family() {
        BackendFamily::SqlServer => Ok(()),
        family => Err(TrackingError::UnsupportedBackend {
            family: family.as_str().into(),
        }),
    }
}

/// Bracket-quotes a table name for T-SQL.
fn quote(table: &str) -> String {
    format!("[{}]", table.replace(']', "]]"))
}

async fn names<C>(conn: &mut C, query: &str) -> Result<Vec<String>, TrackingError>
where
    C: Connection + ?Sized,
{
    let rows = conn.execute_reader(Command::new(query)).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get(0).map(str::to_owned))
        .collect())
}

/// Returns `true` when change tracking is enabled on the current database.
pub async fn is_tracking_enabled<C>(conn: &mut C) -> Result<bool, TrackingError>
where
    C: Connection + ?Sized,
{
    ensure_sql_server(conn)?;
    let count = conn
        .execute_scalar(Command::new(IS_TRACKING_ENABLED))
        .await?;
    Ok(count.as_deref().map(str::trim) == Some("1"))
}

/// Enables change tracking on the current database, keeping changes for
/// `retention_days`. Does nothing when it is already enabled.
pub async fn enable_tracking<C>(conn: &mut C, retention_days: u32) -> Result<(), TrackingError>
where
    C: Connection + ?Sized,
{
    if is_tracking_enabled(conn).await? {
        return Ok(());
    }

    let command = format!(
        "
declare @sql nvarchar(max) =
  N'alter database ' + quotename(db_name()) + N' set change_tracking = on
  (
    change_retention = {retention_days} days,
    auto_cleanup = on
  );';
exec sp_executesql @sql;"
    );
    conn.execute_non_query(Command::new(&command)).await?;
    info!(retention_days, "enabled change tracking");
    Ok(())
}

/// Disables change tracking on every tracked table and then on the current
/// database. Does nothing when it is not enabled.
pub async fn disable_tracking<C>(conn: &mut C) -> Result<(), TrackingError>
where
    C: Connection + ?Sized,
{
    if !is_tracking_enabled(conn).await? {
        return Ok(());
    }

    let mut batch = String::new();
    for table in names(conn, TRACKED_TABLES).await? {
        let _ = writeln!(batch, "alter table {} disable change_tracking;", quote(&table));
    }
    batch.push_str(DISABLE_DATABASE);

    conn.execute_non_query(Command::new(&batch)).await?;
    info!("disabled change tracking");
    Ok(())
}

/// Tables of the current database with change tracking enabled.
pub async fn tracked_tables<C>(conn: &mut C) -> Result<Vec<String>, TrackingError>
where
    C: Connection + ?Sized,
{
    ensure_sql_server(conn)?;
    names(conn, TRACKED_TABLES).await
}

/// Databases of the server with change tracking enabled.
pub async fn tracked_databases<C>(conn: &mut C) -> Result<Vec<String>, TrackingError>
where
    C: Connection + ?Sized,
{
    ensure_sql_server(conn)?;
    names(conn, TRACKED_DATABASES).await
}

/// Makes `tables` exactly the set of tracked tables.
///
/// Enables tracking on the database first, then enables it on listed tables
/// that lack it and disables it on tracked tables no longer listed. Table
/// names compare case-insensitively.
pub async fn set_tracked_tables<C, I, S>(
    conn: &mut C,
    tables: I,
    retention_days: u32,
) -> Result<(), TrackingError>
where
    C: Connection + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    enable_tracking(conn, retention_days).await?;

    let tracked = names(conn, TRACKED_TABLES).await?;
    let tracked_lower: HashSet<String> = tracked.iter().map(|t| t.to_lowercase()).collect();

    let wanted: Vec<String> = tables.into_iter().map(|t| t.as_ref().to_owned()).collect();
    let wanted_lower: HashSet<String> = wanted.iter().map(|t| t.to_lowercase()).collect();

    let mut batch = String::new();
    for table in &wanted {
        if !tracked_lower.contains(&table.to_lowercase()) {
            let _ = writeln!(batch, "alter table {} enable change_tracking;", quote(table));
        }
    }
    for table in &tracked {
        if !wanted_lower.contains(&table.to_lowercase()) {
            let _ = writeln!(batch, "alter table {} disable change_tracking;", quote(table));
        }
    }

    if batch.is_empty() {
        return Ok(());
    }

    conn.execute_non_query(Command::new(&batch)).await?;
    info!(tables = wanted.len(), "updated tracked tables");
    Ok(())
}
