//! Freshness-token suppliers.
//!
//! The evaluator does not know where tokens come from. It asks a
//! [`TokenSupplier`] once per request, after every cheap check has passed.
//! That call is the only place an evaluation may wait on I/O.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use tokio_util::sync::CancellationToken;

use crate::{FreshnessError, FreshnessToken};

/// Produces the freshness token for a request.
///
/// Implementations usually acquire a connection for the request and delegate
/// to `revalid_backend::Freshness`.
///
/// # Cancellation
///
/// Implementations must stop promptly once `cancel` fires and return
/// [`FreshnessError::Cancelled`].
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Reads the current freshness token.
    async fn token(
        &self,
        request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError>;
}

#[async_trait]
impl<T> TokenSupplier for Arc<T>
where
    T: TokenSupplier + ?Sized,
{
    async fn token(
        &self,
        request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError> {
        self.as_ref().token(request, cancel).await
    }
}

#[async_trait]
impl<T> TokenSupplier for &T
where
    T: TokenSupplier + ?Sized,
{
    async fn token(
        &self,
        request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError> {
        (**self).token(request, cancel).await
    }
}

/// Supplier backed by an async closure. Created by [`supplier_fn`].
#[derive(Clone)]
pub struct FnSupplier<F> {
    f: F,
}

/// Wraps a closure returning a token future as a [`TokenSupplier`].
///
/// The closure receives the request head; cancellation is handled by the
/// wrapper, which drops the closure's future when `cancel` fires.
///
/// # Example
/// ```
/// use revalid_core::{FreshnessError, FreshnessToken, supplier_fn};
///
/// let supplier = supplier_fn(|_request| async { Ok::<_, FreshnessError>(FreshnessToken::new("42")) });
/// # let _ = supplier;
/// ```
pub fn supplier_fn<F, Fut>(f: F) -> FnSupplier<F>
where
    F: Fn(&Parts) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FreshnessToken, FreshnessError>> + Send + 'static,
{
    FnSupplier { f }
}

#[async_trait]
impl<F, Fut> TokenSupplier for FnSupplier<F>
where
    F: Fn(&Parts) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FreshnessToken, FreshnessError>> + Send + 'static,
{
    async fn token(
        &self,
        request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError> {
        let future = (self.f)(request);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FreshnessError::Cancelled),
            result = future => result,
        }
    }
}
