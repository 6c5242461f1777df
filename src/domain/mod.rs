//! Domain layer - entities and store contracts for the registry write path

pub mod error;
pub mod module;

pub use error::DomainError;
pub use module::{
    Author, BugTracker, BugTrackerFields, Keyword, Module, ModuleFields, ModuleKey, ModuleStore,
    ModuleSubmission, ModuleTx, ModuleVersion,
};
