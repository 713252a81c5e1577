use std::sync::Arc;

use revalid_core::TokenSupplier;
use revalid_http::Evaluator;
use tower::Layer;

use crate::service::ConditionalGetService;

/// Tower [`Layer`] answering conditional GETs before the wrapped service
/// runs.
///
/// Use [`ConditionalGet::builder()`] to construct it.
#[derive(Debug)]
pub struct ConditionalGet<P> {
    evaluator: Evaluator,
    supplier: Arc<P>,
}

impl<P> Clone for ConditionalGet<P> {
    fn clone(&self) -> Self {
        Self {
            evaluator: self.evaluator.clone(),
            supplier: Arc::clone(&self.supplier),
        }
    }
}

impl<P> ConditionalGet<P>
where
    P: TokenSupplier,
{
    /// Creates the layer directly.
    pub fn new(evaluator: Evaluator, supplier: P) -> Self {
        Self {
            evaluator,
            supplier: Arc::new(supplier),
        }
    }
}

impl ConditionalGet<NotSet> {
    /// Creates a new [`ConditionalGetBuilder`].
    pub fn builder() -> ConditionalGetBuilder<NotSet, NotSet> {
        ConditionalGetBuilder::new()
    }
}

impl<S, P> Layer<S> for ConditionalGet<P> {
    type Service = ConditionalGetService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        ConditionalGetService::new(inner, self.evaluator.clone(), Arc::clone(&self.supplier))
    }
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, the corresponding builder
/// method has not been called yet.
#[derive(Debug, Clone, Copy)]
pub struct NotSet;

/// Builder for [`ConditionalGet`].
pub struct ConditionalGetBuilder<E, P> {
    evaluator: E,
    supplier: P,
}

impl ConditionalGetBuilder<NotSet, NotSet> {
    /// Creates a new builder with no fields set.
    pub fn new() -> Self {
        Self {
            evaluator: NotSet,
            supplier: NotSet,
        }
    }
}

impl Default for ConditionalGetBuilder<NotSet, NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, P> ConditionalGetBuilder<E, P> {
    /// Sets the evaluator.
    pub fn evaluator(self, evaluator: Evaluator) -> ConditionalGetBuilder<Evaluator, P> {
        ConditionalGetBuilder {
            evaluator,
            supplier: self.supplier,
        }
    }

    /// Sets the freshness-token supplier.
    pub fn supplier<NP>(self, supplier: NP) -> ConditionalGetBuilder<E, NP>
    where
        NP: TokenSupplier,
    {
        ConditionalGetBuilder {
            evaluator: self.evaluator,
            supplier,
        }
    }
}

impl<P> ConditionalGetBuilder<Evaluator, P>
where
    P: TokenSupplier,
{
    /// Builds the layer.
    pub fn build(self) -> ConditionalGet<P> {
        ConditionalGet::new(self.evaluator, self.supplier)
    }
}
