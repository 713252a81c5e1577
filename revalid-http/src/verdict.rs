use std::fmt;

use http::Method;
use revalid_core::ETag;

/// Why an evaluation let the request through instead of answering 304.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Only `GET` is revalidated.
    Method(Method),
    /// The handler already set its own validator.
    ExistingEtag,
    /// The response is cached forever and never revalidated.
    Immutable,
    /// The caller's policy hook declined the request.
    PolicyDeclined,
    /// The request carried no `If-None-Match`.
    NoValidator {
        /// The request's `Cache-Control`, when it sent one.
        cache_control: Option<String>,
    },
    /// `If-None-Match` differed from the computed tag.
    ValidatorMismatch {
        /// The raw validator the client sent.
        received: String,
    },
}

impl Reason {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Reason::Method(_) => "method",
            Reason::ExistingEtag => "existing-etag",
            Reason::Immutable => "immutable",
            Reason::PolicyDeclined => "policy-declined",
            Reason::NoValidator { .. } => "no-validator",
            Reason::ValidatorMismatch { .. } => "validator-mismatch",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Method(method) => write!(f, "Method={method}"),
            Reason::ExistingEtag => f.write_str("Existing ETag"),
            Reason::Immutable => f.write_str("CacheControl=immutable"),
            Reason::PolicyDeclined => f.write_str("shouldExecute=false"),
            Reason::NoValidator {
                cache_control: Some(cache_control),
            } => write!(f, "missing If-None-Match, request CacheControl={cache_control}"),
            Reason::NoValidator { cache_control: None } => f.write_str("missing If-None-Match"),
            Reason::ValidatorMismatch { .. } => f.write_str("If-None-Match != ETag"),
        }
    }
}

/// Terminal state of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Answer `304 Not Modified`; the downstream handler must not run.
    NotModified,
    /// Run the downstream handler.
    PassThrough(Reason),
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The decision.
    pub outcome: Outcome,
    /// The tag written onto the response, once a token was read.
    pub etag: Option<ETag>,
}

impl Verdict {
    /// Returns `true` when the evaluation produced a 304.
    #[inline]
    pub fn is_not_modified(&self) -> bool {
        matches!(self.outcome, Outcome::NotModified)
    }

    /// The pass-through reason, `None` for a 304.
    pub fn reason(&self) -> Option<&Reason> {
        match &self.outcome {
            Outcome::NotModified => None,
            Outcome::PassThrough(reason) => Some(reason),
        }
    }
}
