use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::header::ETAG;
use http::{Request, Response, StatusCode, response};
use revalid_core::{CancellationToken, TokenSupplier};
use revalid_http::{EvaluateError, Evaluator};
use tower::Service;
use tracing::{debug, error};

use crate::ConditionalBody;

/// The Tower service produced by [`ConditionalGet`](crate::ConditionalGet).
///
/// Per request:
///
/// - 304: answers with the evaluator's headers and an empty body, without
///   calling the wrapped service;
/// - pass-through: calls the wrapped service and adds the computed `ETag`
///   and diagnostic header, unless the service set its own `ETag`;
/// - evaluation error: answers `500 Internal Server Error`.
///
/// Dropping the response future cancels an in-flight freshness query.
pub struct ConditionalGetService<S, P> {
    inner: S,
    evaluator: Evaluator,
    supplier: Arc<P>,
}

impl<S, P> ConditionalGetService<S, P> {
    /// Wraps `inner`.
    pub fn new(inner: S, evaluator: Evaluator, supplier: Arc<P>) -> Self {
        Self {
            inner,
            evaluator,
            supplier,
        }
    }
}

impl<S, P> Clone for ConditionalGetService<S, P>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            evaluator: self.evaluator.clone(),
            supplier: Arc::clone(&self.supplier),
        }
    }
}

impl<S, P, ReqBody, ResBody> Service<Request<ReqBody>> for ConditionalGetService<S, P>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    P: TokenSupplier + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ConditionalBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // the clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let evaluator = self.evaluator.clone();
        let supplier = Arc::clone(&self.supplier);

        Box::pin(async move {
            let cancel = CancellationToken::new();
            let _cancel_on_drop = cancel.clone().drop_guard();

            let (parts, body) = request.into_parts();
            let (mut head, ()) = Response::new(()).into_parts();

            match evaluator
                .evaluate(&parts, &mut head, supplier.as_ref(), &cancel)
                .await
            {
                Ok(verdict) if verdict.is_not_modified() => {
                    Ok(Response::from_parts(head, ConditionalBody::Empty))
                }
                Ok(_) => {
                    let response = inner.call(Request::from_parts(parts, body)).await?;
                    Ok(merge(head, response))
                }
                Err(err) => Ok(failure(parts.uri.path(), err)),
            }
        })
    }
}

/// Copies the evaluator's headers onto the downstream response.
fn merge<B>(head: response::Parts, response: Response<B>) -> Response<ConditionalBody<B>> {
    let (mut parts, body) = response.into_parts();
    if parts.headers.contains_key(ETAG) {
        debug!("downstream response carries its own ETag, keeping it");
    } else {
        for (name, value) in &head.headers {
            parts.headers.insert(name.clone(), value.clone());
        }
    }
    Response::from_parts(parts, ConditionalBody::Inner(body))
}

fn failure<B>(path: &str, err: EvaluateError) -> Response<ConditionalBody<B>> {
    error!(path, error = %err, "conditional GET evaluation failed");
    let mut response = Response::new(ConditionalBody::Empty);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
