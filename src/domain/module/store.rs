//! Store boundary for the module write path
//!
//! The upsert runs against these traits rather than a concrete database
//! handle, so the core stays free of any process-wide connection state.
//! All primitives live on the transaction handle: one upsert performs its
//! whole multi-step sequence inside a single transactional scope, and a
//! mid-sequence failure (dropping the handle without commit) leaves the
//! store unchanged.

use async_trait::async_trait;

use super::entity::{
    Author, BugTrackerFields, Keyword, Module, ModuleFields, ModuleKey, ModuleSubmission,
    ModuleVersion,
};
use crate::domain::DomainError;

/// Entry point into the module store. Injected by the caller; implementations
/// wrap a connection pool or an in-memory state.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Begin a transaction scoping one upsert
    async fn begin(&self) -> Result<Box<dyn ModuleTx>, DomainError>;
}

/// One transaction against the module store.
///
/// Dropping the handle without calling [`commit`](ModuleTx::commit) rolls
/// back every change made through it.
#[async_trait]
pub trait ModuleTx: Send {
    /// Look up a module by its unique (name, team) key and lock the matched
    /// row for the remainder of the transaction. Associations are not
    /// loaded; the result carries scalar fields only.
    async fn find_by_key(&mut self, key: &ModuleKey) -> Result<Option<Module>, DomainError>;

    /// Persist a full candidate aggregate: the module row, its bug tracker,
    /// its author and keyword associations, and the initial version record.
    async fn create_aggregate(
        &mut self,
        submission: &ModuleSubmission,
    ) -> Result<Module, DomainError>;

    /// Load a module together with all of its associations
    async fn reload_with_associations(&mut self, module_id: i64) -> Result<Module, DomainError>;

    /// Return the canonical author for a name, creating it if absent.
    /// Never mutates an existing match.
    async fn find_or_create_author(&mut self, name: &str) -> Result<Author, DomainError>;

    /// Return the canonical keyword for a name, creating it if absent.
    /// Never mutates an existing match.
    async fn find_or_create_keyword(&mut self, name: &str) -> Result<Keyword, DomainError>;

    /// Replace the module's author set with exactly `authors`. Entities
    /// dropped from the set are disassociated, not deleted.
    async fn replace_authors(
        &mut self,
        module_id: i64,
        authors: &[Author],
    ) -> Result<(), DomainError>;

    /// Replace the module's keyword set with exactly `keywords`. Entities
    /// dropped from the set are disassociated, not deleted.
    async fn replace_keywords(
        &mut self,
        module_id: i64,
        keywords: &[Keyword],
    ) -> Result<(), DomainError>;

    /// Update the module's bug tracker row in place
    async fn update_bug_tracker(
        &mut self,
        module_id: i64,
        fields: &BugTrackerFields,
    ) -> Result<(), DomainError>;

    /// Whether a version record exists for (module_id, version)
    async fn version_exists(&mut self, module_id: i64, version: &str)
        -> Result<bool, DomainError>;

    /// Append a new version record. Version history is append-only.
    async fn append_version(
        &mut self,
        module_id: i64,
        version: &str,
    ) -> Result<ModuleVersion, DomainError>;

    /// Update the mutable scalar fields of an existing module. The name is
    /// part of the lookup key and is never touched.
    async fn update_scalar_fields(
        &mut self,
        module_id: i64,
        fields: &ModuleFields,
    ) -> Result<(), DomainError>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
