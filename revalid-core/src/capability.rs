//! Optional backend capabilities.

use std::fmt;

use crate::BackendFamily;

/// An optional backend feature or privilege that unlocks a more precise
/// freshness strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// SQL Server `VIEW SERVER STATE`, needed to read the transaction log.
    ServerStatePermission,
    /// SQL Server change tracking enabled on the current database.
    ChangeTracking,
    /// PostgreSQL `track_commit_timestamp = on`.
    CommitTimestamps,
    /// MySQL binary logging enabled.
    BinaryLog,
}

impl Capability {
    /// Stable name used in logs and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Capability::ServerStatePermission => "VIEW SERVER STATE",
            Capability::ChangeTracking => "change tracking",
            Capability::CommitTimestamps => "track_commit_timestamp",
            Capability::BinaryLog => "log_bin",
        }
    }

    /// The backend family this capability can exist on.
    pub const fn family(&self) -> BackendFamily {
        match self {
            Capability::ServerStatePermission | Capability::ChangeTracking => {
                BackendFamily::SqlServer
            }
            Capability::CommitTimestamps => BackendFamily::Postgres,
            Capability::BinaryLog => BackendFamily::MySql,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
