//! Module domain
//!
//! A module is the registry's aggregate root: the module row itself, its
//! owned bug tracker, shared author and keyword associations, and an
//! append-only version history. A module is uniquely identified by its
//! (name, team) pair.

mod entity;
mod store;
mod validation;

pub use entity::{
    Author, BugTracker, BugTrackerFields, Keyword, Module, ModuleFields, ModuleKey,
    ModuleSubmission, ModuleVersion,
};
pub use store::{ModuleStore, ModuleTx};
pub use validation::{validate_submission, ModuleValidationError, MAX_NAME_LENGTH};
