//! Conditional GET driven by database write activity.
//!
//! [`Evaluator`] decides, per request, whether a `304 Not Modified` can be
//! answered without running the handler. The validator it compares is an
//! [`ETag`](revalid_core::ETag) built from the application's build id and a
//! freshness token read from the database, so any committed write
//! invalidates every client's cached copy at once.
//!
//! The evaluator works on [`http::request::Parts`] and
//! [`http::response::Parts`] only; wiring it into a server is the job of a
//! thin adapter such as `revalid-tower`.
//!
//! # Main Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Evaluator`] | The decision procedure |
//! | [`Verdict`] | 304 or pass-through, with the written tag |
//! | [`Reason`] | Why a request was passed through |
//! | [`EvaluatorConfig`] | Diagnostics header and log level, loadable from YAML |
//! | [`Principal`] | Verified identity read from request extensions |
//! | [`CacheControlExt`] | `no-store`, `no-cache` and cache-forever helpers |

#![warn(missing_docs)]

mod cache_control;
pub mod config;
mod error;
mod evaluator;
mod identity;
mod verdict;

pub use cache_control::{CACHE_FOREVER, CacheControlExt, NO_CACHE, NO_STORE};
pub use config::{ConfigError, DEFAULT_DIAGNOSTICS_HEADER, EvaluatorConfig, LogLevel};
pub use error::EvaluateError;
pub use evaluator::{Evaluator, EvaluatorBuilder};
pub use identity::Principal;
pub use verdict::{Outcome, Reason, Verdict};
