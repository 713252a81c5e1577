//! Conditional GET evaluation.
//!
//! [`Evaluator::evaluate`] walks a fixed sequence of checks, cheapest first,
//! and stops at the first one that decides:
//!
//! 1. method is not `GET` -> pass through (`method`)
//! 2. response already has an `ETag` -> pass through (`existing-etag`)
//! 3. response is `immutable` -> pass through (`immutable`)
//! 4. policy hook returns `false` -> pass through (`policy-declined`)
//! 5. suffix configured, anonymous not allowed, no [`Principal`] -> error
//! 6. read the token, build the tag, write `ETag` onto the response
//! 7. no `If-None-Match` -> pass through (`no-validator`)
//! 8. `If-None-Match` differs -> pass through (`validator-mismatch`)
//! 9. otherwise -> `304 Not Modified` with `Cache-Control: no-cache`
//!
//! Step 6 is the only one that performs I/O. The tag written there stays on
//! the response in steps 7 and 8 so the client has a validator for its next
//! request.

use std::fmt;
use std::sync::Arc;

use http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use http::{HeaderValue, Method, StatusCode, request, response};
use revalid_core::{BuildId, CancellationToken, ETag, TokenSupplier};
use tracing::instrument;

use crate::{
    CacheControlExt, EvaluateError, EvaluatorConfig, LogLevel, Outcome, Principal, Reason, Verdict,
};

/// Logs at a level chosen at runtime.
macro_rules! decision {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)+),
            LogLevel::Debug => tracing::debug!($($arg)+),
            LogLevel::Info => tracing::info!($($arg)+),
            LogLevel::Warn => tracing::warn!($($arg)+),
            LogLevel::Error => tracing::error!($($arg)+),
        }
    };
}

type SuffixFn = dyn Fn(&request::Parts) -> Option<String> + Send + Sync;
type PolicyFn = dyn Fn(&request::Parts) -> bool + Send + Sync;

/// Decides between `304 Not Modified` and running the handler.
///
/// Cheap to clone; build one per application and share it.
///
/// # Example
/// ```ignore
/// use revalid_core::{BuildId, CancellationToken};
/// use revalid_http::{Evaluator, Outcome};
///
/// let evaluator = Evaluator::builder(BuildId::from_executable()?)
///     .should_execute(|request| !request.uri.path().starts_with("/admin"))
///     .build();
///
/// let verdict = evaluator
///     .evaluate(&request, &mut response, &supplier, &CancellationToken::new())
///     .await?;
/// if verdict.is_not_modified() {
///     // respond with `response` and an empty body
/// }
/// ```
#[derive(Clone)]
pub struct Evaluator {
    build_id: BuildId,
    config: EvaluatorConfig,
    suffix: Option<Arc<SuffixFn>>,
    should_execute: Option<Arc<PolicyFn>>,
    allow_anonymous: bool,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("build_id", &self.build_id)
            .field("config", &self.config)
            .field("suffix", &self.suffix.is_some())
            .field("should_execute", &self.should_execute.is_some())
            .field("allow_anonymous", &self.allow_anonymous)
            .finish()
    }
}

impl Evaluator {
    /// Starts a builder for tags of the given build.
    pub fn builder(build_id: impl Into<BuildId>) -> EvaluatorBuilder {
        EvaluatorBuilder::new(build_id.into())
    }

    /// Build id embedded in every tag.
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Observability settings.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluates one request against the response head produced so far.
    ///
    /// On [`Outcome::NotModified`] the response status is set to 304 and the
    /// caller must not run its handler. On [`Outcome::PassThrough`] the
    /// caller runs the handler and keeps the headers written here.
    ///
    /// # Errors
    ///
    /// - [`EvaluateError::AuthenticationRequired`] when a suffix is
    ///   configured, anonymous requests are not allowed and `request` has no
    ///   [`Principal`].
    /// - [`EvaluateError::Freshness`] when the supplier fails or is cancelled.
    /// - [`EvaluateError::InvalidEtag`] when the token or suffix cannot be
    ///   sent in a header.
    #[instrument(
        name = "revalid.evaluate",
        skip_all,
        fields(method = %request.method, path = request.uri.path())
    )]
    pub async fn evaluate<S>(
        &self,
        request: &request::Parts,
        response: &mut response::Parts,
        supplier: &S,
        cancel: &CancellationToken,
    ) -> Result<Verdict, EvaluateError>
    where
        S: TokenSupplier + ?Sized,
    {
        let path = request.uri.path();

        if request.method != Method::GET {
            let reason = Reason::Method(request.method.clone());
            return Ok(self.pass_through(path, response, reason, None));
        }

        if response.headers.contains_key(ETAG) {
            return Ok(self.pass_through(path, response, Reason::ExistingEtag, None));
        }

        if response.headers.is_immutable() {
            return Ok(self.pass_through(path, response, Reason::Immutable, None));
        }

        if let Some(should_execute) = &self.should_execute {
            if !should_execute(request) {
                return Ok(self.pass_through(path, response, Reason::PolicyDeclined, None));
            }
        }

        if self.suffix.is_some()
            && !self.allow_anonymous
            && Principal::from_request(request).is_none()
        {
            return Err(EvaluateError::AuthenticationRequired {
                path: path.to_owned(),
            });
        }

        let token = supplier.token(request, cancel).await?;
        let suffix = self.suffix.as_ref().and_then(|suffix| suffix(request));
        let etag = ETag::build(&self.build_id, &token, suffix.as_deref());
        let value = etag
            .to_header_value()
            .map_err(|source| EvaluateError::InvalidEtag {
                etag: etag.to_string(),
                source,
            })?;
        response.headers.insert(ETAG, value);
        decision!(self.config.log_level, path, etag = etag.as_str(), "computed ETag");

        let Some(validator) = request.headers.get(IF_NONE_MATCH) else {
            let cache_control = request
                .headers
                .get(CACHE_CONTROL)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let reason = Reason::NoValidator { cache_control };
            return Ok(self.pass_through(path, response, reason, Some(etag)));
        };

        if !validator.to_str().is_ok_and(|validator| etag.matches(validator)) {
            let received = String::from_utf8_lossy(validator.as_bytes()).into_owned();
            decision!(
                self.config.log_level,
                path,
                if_none_match = received.as_str(),
                etag = etag.as_str(),
                "validator does not match"
            );
            return Ok(self.pass_through(
                path,
                response,
                Reason::ValidatorMismatch { received },
                Some(etag),
            ));
        }

        response.status = StatusCode::NOT_MODIFIED;
        response.headers.no_cache();
        decision!(self.config.log_level, path, etag = etag.as_str(), "304 not modified");

        Ok(Verdict {
            outcome: Outcome::NotModified,
            etag: Some(etag),
        })
    }

    fn pass_through(
        &self,
        path: &str,
        response: &mut response::Parts,
        reason: Reason,
        etag: Option<ETag>,
    ) -> Verdict {
        let message = reason.to_string();
        decision!(
            self.config.log_level,
            path,
            reason = reason.code(),
            "no 304: {message}"
        );

        if self.config.diagnostics {
            match HeaderValue::from_str(&message) {
                Ok(value) => {
                    response
                        .headers
                        .insert(self.config.diagnostics_header.clone(), value);
                }
                Err(_) => {
                    tracing::debug!(reason = reason.code(), "reason is not a valid header value");
                }
            }
        }

        Verdict {
            outcome: Outcome::PassThrough(reason),
            etag,
        }
    }
}

/// Builder for [`Evaluator`].
pub struct EvaluatorBuilder {
    build_id: BuildId,
    config: EvaluatorConfig,
    suffix: Option<Arc<SuffixFn>>,
    should_execute: Option<Arc<PolicyFn>>,
    allow_anonymous: bool,
}

impl EvaluatorBuilder {
    fn new(build_id: BuildId) -> Self {
        Self {
            build_id,
            config: EvaluatorConfig::default(),
            suffix: None,
            should_execute: None,
            allow_anonymous: false,
        }
    }

    /// Sets the observability settings.
    pub fn config(self, config: EvaluatorConfig) -> Self {
        Self { config, ..self }
    }

    /// Sets a per-request suffix appended to the tag, typically derived from
    /// the caller's [`Principal`]. Returning `None` omits the segment.
    pub fn suffix<F>(self, suffix: F) -> Self
    where
        F: Fn(&request::Parts) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            suffix: Some(Arc::new(suffix)),
            ..self
        }
    }

    /// Sets the policy hook; requests it returns `false` for are never
    /// revalidated.
    pub fn should_execute<F>(self, should_execute: F) -> Self
    where
        F: Fn(&request::Parts) -> bool + Send + Sync + 'static,
    {
        Self {
            should_execute: Some(Arc::new(should_execute)),
            ..self
        }
    }

    /// Lets requests without a [`Principal`] use the suffix hook.
    ///
    /// Only enable this when the suffix does not depend on identity;
    /// otherwise every anonymous caller shares one validator.
    pub fn allow_anonymous(self, allow_anonymous: bool) -> Self {
        Self {
            allow_anonymous,
            ..self
        }
    }

    /// Builds the evaluator.
    pub fn build(self) -> Evaluator {
        Evaluator {
            build_id: self.build_id,
            config: self.config,
            suffix: self.suffix,
            should_execute: self.should_execute,
            allow_anonymous: self.allow_anonymous,
        }
    }
}
