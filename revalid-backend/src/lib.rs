//! Freshness strategies for relational backends.
//!
//! This crate turns a borrowed [`Connection`](revalid_core::Connection) into a
//! [`FreshnessToken`](revalid_core::FreshnessToken):
//!
//! - [`Strategy`] - the fixed catalog of token queries, per backend family
//! - [`probe`] - capability probes deciding which strategies are usable
//! - [`StrategyCache`] - memoizes the resolved strategy, with an explicit reset
//! - [`execute()`] - runs one strategy with scoped connection handling
//! - [`Freshness`] - resolve-then-execute facade used by token suppliers
//! - [`tracking`] - SQL Server change-tracking administration
//!
//! ## Resolution order
//!
//! For each family the catalog lists strategies from most to least precise.
//! The first whose capability probe succeeds wins; the family's last
//! strategy needs no capability, so resolution only fails for an unknown
//! family.
mod execute;
mod freshness;
pub mod probe;
mod resolver;
mod strategy;
pub mod tracking;

pub use execute::execute;
pub use freshness::Freshness;
pub use probe::probe;
pub use resolver::{StrategyCache, select_strategy};
pub use strategy::{Strategy, StrategyKind};
