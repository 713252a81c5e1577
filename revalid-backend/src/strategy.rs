//! Freshness strategy catalog.
//!
//! Every [`Strategy`] runs exactly one command and turns its result into a
//! [`FreshnessToken`]. Strategies are stateless; the catalog is fixed at
//! compile time and a family's entries are listed from most to least
//! precise, the last one needing no capability at all.
//!
//! | strategy | kind | requires |
//! |----------|------|----------|
//! | [`SqlServerLogSequence`](Strategy::SqlServerLogSequence) | log sequence | [`ServerStatePermission`](Capability::ServerStatePermission) |
//! | [`SqlServerRowVersion`](Strategy::SqlServerRowVersion) | row version | [`ChangeTracking`](Capability::ChangeTracking) |
//! | [`SqlServerCommitCounter`](Strategy::SqlServerCommitCounter) | commit counter | - |
//! | [`PostgresCommittedXact`](Strategy::PostgresCommittedXact) | commit counter | [`CommitTimestamps`](Capability::CommitTimestamps) |
//! | [`PostgresCommitCounter`](Strategy::PostgresCommitCounter) | commit counter | - |
//! | [`MySqlReplicationPosition`](Strategy::MySqlReplicationPosition) | replication position | [`BinaryLog`](Capability::BinaryLog) |
//! | [`MySqlCommitCounter`](Strategy::MySqlCommitCounter) | commit counter | - |

use std::fmt;

use revalid_core::{
    BackendError, BackendFamily, Capability, Command, Connection, FreshnessError, FreshnessToken,
};

/// How a strategy observes writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// End position of the write-ahead/transaction log.
    LogSequence,
    /// Database-wide commit or write counter.
    CommitCounter,
    /// Storage-engine row-version counter combined with change tracking.
    RowVersion,
    /// Binary replication log file and offset.
    ReplicationPosition,
}

/// One concrete way of reading a freshness token.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Newest commit record in the SQL Server transaction log.
    SqlServerLogSequence = 1,
    /// `@@dbts` combined with the change-tracking version.
    SqlServerRowVersion = 2,
    /// `@@dbts` alone.
    SqlServerCommitCounter = 3,
    /// Transaction id of the last commit, from commit timestamps.
    PostgresCommittedXact = 4,
    /// The current snapshot, `xmin:xmax:xip_list`.
    ///
    /// `xmax` alone only moves when a transaction with a higher id finishes,
    /// so a write committing behind a newer one would go unnoticed; the
    /// in-progress list changes when any writer finishes.
    PostgresCommitCounter = 5,
    /// Current binary log file and position.
    MySqlReplicationPosition = 6,
    /// InnoDB inserted, updated and deleted row counters.
    ///
    /// The counters live in memory: they restart at zero with the server, so
    /// a token handed out before a restart can be produced again for
    /// different data. `TRUNCATE` and DDL do not move them. Enable binary
    /// logging to get [`MySqlReplicationPosition`](Strategy::MySqlReplicationPosition)
    /// instead.
    MySqlCommitCounter = 7,
}

const SQL_SERVER: &[Strategy] = &[
    Strategy::SqlServerLogSequence,
    Strategy::SqlServerRowVersion,
    Strategy::SqlServerCommitCounter,
];

const POSTGRES: &[Strategy] = &[
    Strategy::PostgresCommittedXact,
    Strategy::PostgresCommitCounter,
];

const MYSQL: &[Strategy] = &[
    Strategy::MySqlReplicationPosition,
    Strategy::MySqlCommitCounter,
];

const SQL_SERVER_LOG_SEQUENCE: &str = "
select top 1 [End Time]
from fn_dblog(null, null)
where Operation = 'LOP_COMMIT_XACT'
order by [End Time] desc;";

const SQL_SERVER_ROW_VERSION: &str = "
declare @changeTracking bigint = change_tracking_current_version();
declare @timeStamp bigint = convert(bigint, @@dbts);

if (@changeTracking is null)
  select cast(@timeStamp as varchar)
else
  select cast(@timeStamp as varchar) + '-' + cast(@changeTracking as varchar);";

const SQL_SERVER_COMMIT_COUNTER: &str = "select cast(convert(bigint, @@dbts) as varchar);";

const POSTGRES_COMMITTED_XACT: &str = "select (pg_last_committed_xact()).xid::text;";

const POSTGRES_COMMIT_COUNTER: &str = "select pg_current_snapshot()::text;";

const MYSQL_REPLICATION_POSITION: &str = "show master status;";

const MYSQL_COMMIT_COUNTER: &str = "
select cast(coalesce(sum(cast(variable_value as unsigned)), 0) as char)
from performance_schema.global_status
where variable_name in ('Innodb_rows_inserted', 'Innodb_rows_updated', 'Innodb_rows_deleted');";

impl Strategy {
    /// Strategies offered for `family`, most precise first.
    ///
    /// # Errors
    ///
    /// Returns [`FreshnessError::UnsupportedBackend`] for a family with no
    /// registered strategy.
    pub fn catalog(family: &BackendFamily) -> Result<&'static [Strategy], FreshnessError> {
        match family {
            BackendFamily::SqlServer => Ok(SQL_SERVER),
            BackendFamily::Postgres => Ok(POSTGRES),
            BackendFamily::MySql => Ok(MYSQL),
            BackendFamily::Other(name) => Err(FreshnessError::UnsupportedBackend {
                family: name.clone(),
            }),
        }
    }

    /// Backend family this strategy targets.
    pub const fn family(&self) -> BackendFamily {
        match self {
            Strategy::SqlServerLogSequence
            | Strategy::SqlServerRowVersion
            | Strategy::SqlServerCommitCounter => BackendFamily::SqlServer,
            Strategy::PostgresCommittedXact | Strategy::PostgresCommitCounter => {
                BackendFamily::Postgres
            }
            Strategy::MySqlReplicationPosition | Strategy::MySqlCommitCounter => {
                BackendFamily::MySql
            }
        }
    }

    /// How this strategy observes writes.
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SqlServerLogSequence => StrategyKind::LogSequence,
            Strategy::SqlServerRowVersion => StrategyKind::RowVersion,
            Strategy::SqlServerCommitCounter
            | Strategy::PostgresCommittedXact
            | Strategy::PostgresCommitCounter
            | Strategy::MySqlCommitCounter => StrategyKind::CommitCounter,
            Strategy::MySqlReplicationPosition => StrategyKind::ReplicationPosition,
        }
    }

    /// Capability that must be present before this strategy is offered.
    pub const fn requires(&self) -> Option<Capability> {
        match self {
            Strategy::SqlServerLogSequence => Some(Capability::ServerStatePermission),
            Strategy::SqlServerRowVersion => Some(Capability::ChangeTracking),
            Strategy::PostgresCommittedXact => Some(Capability::CommitTimestamps),
            Strategy::MySqlReplicationPosition => Some(Capability::BinaryLog),
            Strategy::SqlServerCommitCounter
            | Strategy::PostgresCommitCounter
            | Strategy::MySqlCommitCounter => None,
        }
    }

    /// Stable name used in logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Strategy::SqlServerLogSequence => "sqlserver.log_sequence",
            Strategy::SqlServerRowVersion => "sqlserver.row_version",
            Strategy::SqlServerCommitCounter => "sqlserver.commit_counter",
            Strategy::PostgresCommittedXact => "postgres.committed_xact",
            Strategy::PostgresCommitCounter => "postgres.commit_counter",
            Strategy::MySqlReplicationPosition => "mysql.replication_position",
            Strategy::MySqlCommitCounter => "mysql.commit_counter",
        }
    }

    /// The command text this strategy runs.
    pub const fn query(&self) -> &'static str {
        match self {
            Strategy::SqlServerLogSequence => SQL_SERVER_LOG_SEQUENCE,
            Strategy::SqlServerRowVersion => SQL_SERVER_ROW_VERSION,
            Strategy::SqlServerCommitCounter => SQL_SERVER_COMMIT_COUNTER,
            Strategy::PostgresCommittedXact => POSTGRES_COMMITTED_XACT,
            Strategy::PostgresCommitCounter => POSTGRES_COMMIT_COUNTER,
            Strategy::MySqlReplicationPosition => MYSQL_REPLICATION_POSITION,
            Strategy::MySqlCommitCounter => MYSQL_COMMIT_COUNTER,
        }
    }

    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(value: u8) -> Option<Strategy> {
        match value {
            1 => Some(Strategy::SqlServerLogSequence),
            2 => Some(Strategy::SqlServerRowVersion),
            3 => Some(Strategy::SqlServerCommitCounter),
            4 => Some(Strategy::PostgresCommittedXact),
            5 => Some(Strategy::PostgresCommitCounter),
            6 => Some(Strategy::MySqlReplicationPosition),
            7 => Some(Strategy::MySqlCommitCounter),
            _ => None,
        }
    }

    /// Runs the strategy's command on an open connection.
    pub(crate) async fn read<C>(
        self,
        conn: &mut C,
        transaction: Option<&C::Transaction>,
    ) -> Result<FreshnessToken, BackendError>
    where
        C: Connection + ?Sized,
    {
        let command = Command::new(self.query()).with_transaction(transaction);
        match self {
            Strategy::SqlServerLogSequence => {
                let rows = conn.execute_reader(command).await?;
                // fn_dblog has no commit record on a fresh database
                Ok(rows
                    .first()
                    .and_then(|row| row.get(0))
                    .map(log_time_token)
                    .unwrap_or_default())
            }
            Strategy::MySqlReplicationPosition => {
                let rows = conn.execute_reader(command).await?;
                Ok(match rows.first() {
                    None => FreshnessToken::unavailable(),
                    Some(row) => match (row.get(0), row.get(1)) {
                        (Some(file), Some(position)) if !file.is_empty() => {
                            FreshnessToken::new(format!("{file}-{position}"))
                        }
                        _ => FreshnessToken::empty(),
                    },
                })
            }
            Strategy::SqlServerRowVersion
            | Strategy::SqlServerCommitCounter
            | Strategy::PostgresCommittedXact
            | Strategy::PostgresCommitCounter
            | Strategy::MySqlCommitCounter => {
                // pg_last_committed_xact is null until the first tracked commit
                let value = conn.execute_scalar(command).await?;
                Ok(value.map(FreshnessToken::from).unwrap_or_default())
            }
        }
    }

    /// Builds the error for a failed read, naming the missing privilege when
    /// the transaction log was not readable.
    pub(crate) fn query_error(self, source: BackendError) -> FreshnessError {
        if self == Strategy::SqlServerLogSequence && source.is_permission_denied() {
            return FreshnessError::QueryExecution {
                strategy: self.name(),
                message: format!(
                    "reading the transaction log requires the {} permission; grant it to the \
                     connecting login, or enable {} on the database so the row-version \
                     strategy is used instead",
                    Capability::ServerStatePermission,
                    Capability::ChangeTracking,
                ),
                source,
            };
        }
        FreshnessError::query(self.name(), source)
    }
}

/// `[End Time]` reads like `2026/10/19 10:00:00:123`; entity tags cannot
/// carry spaces.
fn log_time_token(end_time: &str) -> FreshnessToken {
    FreshnessToken::new(end_time.trim().replace(' ', "T"))
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
