//! MySQL adapter.

use sqlx::mysql::MySql;

use crate::error::mysql_denied;
use crate::session::{PoolSupplier, Session, dialect};

dialect!(MySql, revalid_core::BackendFamily::MySql, mysql_denied);

/// A MySQL [`Connection`](revalid_core::Connection).
pub type MySqlSession<'c> = Session<'c, MySql>;

/// [`TokenSupplier`](revalid_core::TokenSupplier) over a
/// [`MySqlPool`](sqlx::MySqlPool).
pub type MySqlPoolSupplier = PoolSupplier<MySql>;
