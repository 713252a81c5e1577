use revalid_core::BackendError;
use sqlx::error::DatabaseError;

/// Classifies a driver error.
///
/// `denied` recognizes the backend's privilege errors; everything the pool
/// or socket layer reports is a connection error.
pub(crate) fn classify(err: sqlx::Error, denied: fn(&dyn DatabaseError) -> bool) -> BackendError {
    match &err {
        sqlx::Error::Database(db) if denied(db.as_ref()) => {
            BackendError::PermissionDenied(Box::new(err))
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => BackendError::ConnectionError(Box::new(err)),
        _ => BackendError::InternalError(Box::new(err)),
    }
}

pub(crate) fn closed() -> BackendError {
    BackendError::ConnectionError("connection is not open".into())
}

/// SQLSTATE `42501`, insufficient_privilege.
#[cfg(feature = "postgres")]
pub(crate) fn postgres_denied(err: &dyn DatabaseError) -> bool {
    is_insufficient_privilege(err.code().as_deref())
}

#[cfg(feature = "postgres")]
fn is_insufficient_privilege(code: Option<&str>) -> bool {
    code == Some("42501")
}

/// `ER_SPECIFIC_ACCESS_DENIED_ERROR`, `ER_TABLEACCESS_DENIED_ERROR` and
/// `ER_DBACCESS_DENIED_ERROR`.
#[cfg(feature = "mysql")]
pub(crate) fn mysql_denied(err: &dyn DatabaseError) -> bool {
    err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
        .is_some_and(|err| is_access_denied(err.number()))
}

#[cfg(feature = "mysql")]
fn is_access_denied(number: u16) -> bool {
    matches!(number, 1227 | 1142 | 1044)
}
