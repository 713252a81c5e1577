//! Tower middleware for database-driven conditional GET.
//!
//! [`ConditionalGet`] is a Tower [`Layer`](tower::Layer) that runs a
//! [`revalid_http::Evaluator`] in front of any `http` service. When the
//! client's `If-None-Match` still matches the database's freshness, it
//! answers `304 Not Modified` without calling the service at all.
//!
//! # Quick Start
//!
//! ```ignore
//! use revalid_core::BuildId;
//! use revalid_http::Evaluator;
//! use revalid_sqlx::PgPoolSupplier;
//! use revalid_tower::ConditionalGet;
//! use tower::{ServiceBuilder, service_fn};
//!
//! let layer = ConditionalGet::builder()
//!     .evaluator(Evaluator::builder(BuildId::from_executable()?).build())
//!     .supplier(PgPoolSupplier::new(pool))
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(|_req| async {
//!         Ok::<_, std::convert::Infallible>(http::Response::new("companies"))
//!     }));
//! ```
//!
//! # Response Headers
//!
//! | Header | When |
//! |--------|------|
//! | `ETag` | a freshness token was read |
//! | `Cache-Control: no-cache` | on 304 responses |
//! | `x-no-304-reason` | pass-through, unless diagnostics are disabled |
//!
//! The evaluator runs before the wrapped service, so the "existing ETag" and
//! "immutable" checks only see headers set by outer layers. A downstream
//! response with its own `ETag` is returned unchanged.

#![warn(missing_docs)]

/// Response body type.
pub mod body;
/// Tower layer and builder.
pub mod layer;
/// The Tower service.
pub mod service;

pub use body::ConditionalBody;
pub use layer::{ConditionalGet, ConditionalGetBuilder, NotSet};
pub use service::ConditionalGetService;
