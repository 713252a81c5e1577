//! Test fixtures shared by the revalid end-to-end tests.
//!
//! - [`mock_database`] - an in-memory database answering every family's
//!   strategy and probe queries, with capability toggles and counters
//! - [`tracing`](mod@tracing) - capture of `revalid.*` spans and events

pub mod mock_database;
pub mod tracing;

pub use mock_database::{DatabaseCounters, MockConnection, MockDatabase, MockSupplier};
