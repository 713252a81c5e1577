//! Response body of the conditional GET service.

use std::pin::Pin;
use std::task::{Context, Poll};

use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project::pin_project;

/// Either the downstream body or nothing.
///
/// `Empty` is used for `304 Not Modified` and for the `500` returned when
/// evaluation fails; neither may carry a payload.
#[pin_project(project = ConditionalBodyProj)]
#[derive(Debug)]
pub enum ConditionalBody<B> {
    /// No payload.
    Empty,
    /// The downstream service's body, untouched.
    Inner(#[pin] B),
}

impl<B> ConditionalBody<B> {
    /// Returns the downstream body, if this is not an empty body.
    pub fn into_inner(self) -> Option<B> {
        match self {
            ConditionalBody::Empty => None,
            ConditionalBody::Inner(body) => Some(body),
        }
    }
}

impl<B> HttpBody for ConditionalBody<B>
where
    B: HttpBody,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            ConditionalBodyProj::Empty => Poll::Ready(None),
            ConditionalBodyProj::Inner(body) => body.poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            ConditionalBody::Empty => true,
            ConditionalBody::Inner(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            ConditionalBody::Empty => SizeHint::with_exact(0),
            ConditionalBody::Inner(body) => body.size_hint(),
        }
    }
}
