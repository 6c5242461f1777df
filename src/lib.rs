//! Module Registry - write path
//!
//! Library-level contract for publishing modules into a relational registry.
//! A submitted module aggregate (bug tracker, keywords, authors, versions)
//! is reconciled against the store so that the record identified by its
//! (name, team) key is either created whole or merged in a single
//! transaction.

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::RegistryConfig;
pub use domain::{
    Author, BugTracker, BugTrackerFields, DomainError, Keyword, Module, ModuleFields, ModuleKey,
    ModuleStore, ModuleSubmission, ModuleTx, ModuleVersion,
};
pub use infrastructure::module::{InMemoryModuleStore, ModuleService, PostgresModuleStore};
