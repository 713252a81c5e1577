//! Backend capability probes.
//!
//! A probe runs one read-only query and answers whether a [`Capability`] is
//! present. A query the server rejects (a denied permission, a missing system
//! view, an old server version) counts as "not present", since the fallback
//! strategy is always available. A lost connection says nothing about the
//! server and is propagated, together with cancellation, so that no strategy
//! is memoized from it.

use revalid_core::{
    BackendError, Capability, CancellationToken, Command, Connection, FreshnessError,
};
use tracing::debug;

use crate::execute::{ConnectionScope, cancellable};

const SERVER_STATE_PERMISSION: &str =
    "select cast(has_perms_by_name(null, null, 'VIEW SERVER STATE') as varchar);";

const CHANGE_TRACKING: &str = "
select cast(count(d.name) as varchar)
from sys.databases as d inner join
  sys.change_tracking_databases as t on
  t.database_id = d.database_id
where d.name = db_name();";

const COMMIT_TIMESTAMPS: &str = "select current_setting('track_commit_timestamp');";

// Also needs REPLICATION CLIENT; without it the statement fails.
const BINARY_LOG: &str = "show master status;";

/// Probes `capability`, opening the connection for the duration of the call
/// when it is closed.
///
/// A capability of another backend family is reported absent without running
/// a query.
///
/// # Errors
///
/// - [`FreshnessError::Cancelled`] when `cancel` fires.
/// - [`FreshnessError::QueryExecution`] when a closed connection cannot be
///   opened.
/// - [`FreshnessError::CapabilityCheck`] when the connection fails while the
///   query runs.
pub async fn probe<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
    capability: Capability,
    cancel: &CancellationToken,
) -> Result<bool, FreshnessError>
where
    C: Connection,
{
    let mut scope = ConnectionScope::enter(conn, cancel).await?;
    let result = cancellable(cancel, probe_open(scope.connection(), transaction, capability)).await;
    scope.exit().await;
    result
}

/// Probes `capability` on an already open connection.
pub(crate) async fn probe_open<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
    capability: Capability,
) -> Result<bool, FreshnessError>
where
    C: Connection + ?Sized,
{
    if capability.family() != conn.family() {
        return Ok(false);
    }

    let answer = match capability {
        Capability::ServerStatePermission => {
            scalar_equals(conn, transaction, SERVER_STATE_PERMISSION, "1").await
        }
        Capability::ChangeTracking => scalar_equals(conn, transaction, CHANGE_TRACKING, "1").await,
        Capability::CommitTimestamps => {
            scalar_equals(conn, transaction, COMMIT_TIMESTAMPS, "on").await
        }
        Capability::BinaryLog => {
            let command = Command::new(BINARY_LOG).with_transaction(transaction);
            conn.execute_reader(command).await.map(|rows| {
                rows.first()
                    .and_then(|row| row.get(0))
                    .is_some_and(|file| !file.is_empty())
            })
        }
    };

    match answer {
        Ok(present) => {
            debug!(capability = capability.name(), present, "capability probed");
            Ok(present)
        }
        Err(source @ BackendError::ConnectionError(_)) => {
            Err(FreshnessError::CapabilityCheck { capability, source })
        }
        Err(error) => {
            debug!(
                capability = capability.name(),
                %error,
                "capability probe failed, treating as absent"
            );
            Ok(false)
        }
    }
}

async fn scalar_equals<C>(
    conn: &mut C,
    transaction: Option<&C::Transaction>,
    query: &str,
    expected: &str,
) -> Result<bool, BackendError>
where
    C: Connection + ?Sized,
{
    let command = Command::new(query).with_transaction(transaction);
    let value = conn.execute_scalar(command).await?;
    Ok(value.is_some_and(|value| value.trim().eq_ignore_ascii_case(expected)))
}
