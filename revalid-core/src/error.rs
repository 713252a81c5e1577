//! Error types for freshness-token computation.

use smol_str::SmolStr;
use thiserror::Error;

use crate::Capability;

/// Boxed driver error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error reported by a [`Connection`](crate::Connection) adapter.
///
/// Adapters sort their driver's failures into these groups so strategies can
/// react to a missing privilege without knowing the driver.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The connected principal lacks a permission the command needs.
    #[error("permission denied: {0}")]
    PermissionDenied(BoxError),

    /// Network or connection-level failure.
    #[error(transparent)]
    ConnectionError(BoxError),

    /// Any other failure while running a command.
    #[error(transparent)]
    InternalError(BoxError),
}

impl BackendError {
    /// Returns `true` for [`BackendError::PermissionDenied`].
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, BackendError::PermissionDenied(_))
    }
}

/// Error returned while resolving a strategy or reading a freshness token.
///
/// None of these are retried. A failed token read fails the request: serving
/// a 304 or skipping the check on a failed read would both be wrong.
#[derive(Debug, Error)]
pub enum FreshnessError {
    /// No strategy is registered for the connection's backend family.
    #[error("no freshness strategy is registered for backend family `{family}`")]
    UnsupportedBackend {
        /// The offending family.
        family: SmolStr,
    },

    /// The backend failed while running the freshness query.
    #[error("freshness query `{strategy}` failed: {message}")]
    QueryExecution {
        /// Name of the strategy whose query failed.
        strategy: &'static str,
        /// Human-readable explanation.
        message: String,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },

    /// The connection failed while checking whether a capability is present.
    ///
    /// Nothing is memoized: the next request detects the capabilities again.
    #[error("lost the connection while checking capability `{capability}`")]
    CapabilityCheck {
        /// The capability being checked.
        capability: Capability,
        /// Underlying connection error.
        #[source]
        source: BackendError,
    },

    /// The caller cancelled the operation.
    #[error("freshness query cancelled")]
    Cancelled,
}

impl FreshnessError {
    /// Wraps a backend failure of `strategy`, keeping the backend message.
    pub fn query(strategy: &'static str, source: BackendError) -> Self {
        FreshnessError::QueryExecution {
            strategy,
            message: source.to_string(),
            source,
        }
    }
}
