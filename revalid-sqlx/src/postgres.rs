//! PostgreSQL adapter.

use sqlx::postgres::Postgres;

use crate::error::postgres_denied;
use crate::session::{PoolSupplier, Session, dialect};

dialect!(Postgres, revalid_core::BackendFamily::Postgres, postgres_denied);

/// A PostgreSQL [`Connection`](revalid_core::Connection).
pub type PgSession<'c> = Session<'c, Postgres>;

/// [`TokenSupplier`](revalid_core::TokenSupplier) over a
/// [`PgPool`](sqlx::PgPool).
pub type PgPoolSupplier = PoolSupplier<Postgres>;
