#![warn(missing_docs)]
//! # revalid-core
//!
//! Core types and traits for answering HTTP conditional GET requests from a
//! database's write-activity marker.
//!
//! This crate holds the pieces every other `revalid` crate agrees on:
//!
//! - **Tokens** - [`FreshnessToken`], the opaque "last write" marker read from a backend
//! - **Validators** - [`ETag`] and [`BuildId`], the composite validator written to responses
//! - **Connections** - [`Connection`], the minimal relational driver surface strategies run against
//! - **Capabilities** - [`Capability`], optional backend features that unlock better strategies
//! - **Suppliers** - [`TokenSupplier`], how the HTTP evaluator obtains a token per request
//! - **Errors** - [`BackendError`] and [`FreshnessError`]
//!
//! Backend strategies live in `revalid-backend`, the request evaluator in
//! `revalid-http`.

pub mod build;
pub mod capability;
pub mod connection;
pub mod error;
pub mod etag;
pub mod supplier;
pub mod token;

pub use build::BuildId;
pub use capability::Capability;
pub use connection::{BackendFamily, Command, Connection, Row};
pub use error::{BackendError, FreshnessError};
pub use etag::ETag;
pub use supplier::{FnSupplier, TokenSupplier, supplier_fn};
pub use token::FreshnessToken;
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use tokio_util::sync::CancellationToken;
