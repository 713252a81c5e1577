use http::header::InvalidHeaderValue;
use revalid_core::FreshnessError;
use thiserror::Error;

/// Error returned by [`Evaluator::evaluate`](crate::Evaluator::evaluate).
///
/// None of these is a cache decision; the enclosing pipeline should fail the
/// request.
#[derive(Debug, Error)]
pub enum EvaluateError {
    /// A per-request suffix is configured but the request has no verified
    /// identity, so every anonymous caller would share one validator.
    #[error(
        "request to `{path}` has no authenticated identity but an ETag suffix is configured; \
         authenticate the request or allow anonymous requests explicitly"
    )]
    AuthenticationRequired {
        /// Request path.
        path: String,
    },

    /// Reading the freshness token failed.
    #[error(transparent)]
    Freshness(#[from] FreshnessError),

    /// The computed tag cannot be sent as a header.
    #[error("computed ETag `{etag}` is not a valid header value")]
    InvalidEtag {
        /// The computed tag.
        etag: String,
        /// Underlying error.
        #[source]
        source: InvalidHeaderValue,
    },
}
