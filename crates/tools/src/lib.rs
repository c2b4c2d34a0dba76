//! Collaborator adapters for aegent.
//!
//! The agent core talks to the outside world through two traits:
//! `SearchProvider` (documentation retrieval) and `ActionExecutor` (the
//! host scripting bridge). This crate provides the HTTP implementations,
//! a dry-run executor, and tool catalog loading.

pub mod bridge;
pub mod catalog;
pub mod dry_run;
pub mod search;

pub use bridge::HttpActionExecutor;
pub use catalog::{CatalogError, default_catalog, load_catalog, resolve_catalog};
pub use dry_run::DryRunExecutor;
pub use search::HttpSearchProvider;
