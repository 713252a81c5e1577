//! [`sqlx`] adapters for revalid.
//!
//! [`Session`] implements [`revalid_core::Connection`] and [`PoolSupplier`]
//! a pool-backed [`revalid_core::TokenSupplier`] for any [`Dialect`]. Each
//! backend module names them for its database:
//!
//! | feature | session | supplier |
//! |---------|---------|----------|
//! | `postgres` | [`PgSession`] | [`PgPoolSupplier`] |
//! | `mysql` | [`MySqlSession`] | [`MySqlPoolSupplier`] |
//!
//! Commands are sent with [`sqlx::raw_sql`] over the text protocol, and
//! every column is read back as text.
//!
//! Both features are enabled by default.

#![warn(missing_docs)]

mod error;
mod session;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use session::{Dialect, PoolSupplier, Session};

#[cfg(feature = "mysql")]
pub use mysql::{MySqlPoolSupplier, MySqlSession};
#[cfg(feature = "postgres")]
pub use postgres::{PgPoolSupplier, PgSession};
