//! Module service - the aggregate upsert
//!
//! A submitted module is reconciled against the store so that the record
//! identified by (name, team) is either created whole or merged: shared
//! associations are resolved and fully replaced, the bug tracker is updated
//! in place, the version history grows append-only, and the mutable scalars
//! are overwritten. The whole sequence runs in one store transaction; the
//! first failing phase aborts the operation and rolls everything back.

use std::sync::Arc;

use tracing::{debug, info};

use super::resolver::{resolve_authors, resolve_keywords};
use crate::domain::module::{validate_submission, Module, ModuleStore, ModuleSubmission};
use crate::domain::DomainError;

/// Service owning the module write path
#[derive(Debug)]
pub struct ModuleService<S: ModuleStore> {
    store: Arc<S>,
}

impl<S: ModuleStore> ModuleService<S> {
    /// Create a new module service over an injected store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create or merge a module record.
    ///
    /// A record is unique by its (name, team) key. When no record exists the
    /// full aggregate is persisted, which requires a non-empty version and at
    /// least one author. When a record exists, its author and keyword sets
    /// are replaced with the submitted sets (resolved with find-or-create
    /// semantics), the bug tracker and mutable scalars are updated, and the
    /// submitted version is appended unless already recorded. Returns the
    /// stored record as of the end of the transaction.
    pub async fn upsert(&self, submission: ModuleSubmission) -> Result<Module, DomainError> {
        validate_submission(&submission).map_err(|e| DomainError::validation(e.to_string()))?;

        let key = submission.key();
        let mut tx = self.store.begin().await?;

        let existing = tx.find_by_key(&key).await?;

        let Some(existing) = existing else {
            if submission.version.is_empty() {
                return Err(DomainError::validation("empty module version"));
            }
            if submission.authors.is_empty() {
                return Err(DomainError::validation("empty module authors"));
            }

            info!(module = %key, version = %submission.version, "Creating module");

            let created = tx.create_aggregate(&submission).await?;
            tx.commit().await?;

            return Ok(created);
        };

        info!(module = %key, id = existing.id, "Merging module");

        let record = tx.reload_with_associations(existing.id).await?;

        let authors = resolve_authors(tx.as_mut(), &submission.authors).await?;
        tx.replace_authors(record.id, &authors)
            .await
            .map_err(|e| DomainError::association("authors", e.to_string()))?;

        let keywords = resolve_keywords(tx.as_mut(), &submission.keywords).await?;
        tx.replace_keywords(record.id, &keywords)
            .await
            .map_err(|e| DomainError::association("keywords", e.to_string()))?;

        tx.update_bug_tracker(record.id, &submission.bug_tracker)
            .await
            .map_err(|e| DomainError::update("bug tracker", e.to_string()))?;

        if submission.version.is_empty() {
            debug!(module = %key, "No version submitted; keeping history as-is");
        } else if tx.version_exists(record.id, &submission.version).await? {
            debug!(module = %key, version = %submission.version, "Version already recorded");
        } else {
            tx.append_version(record.id, &submission.version)
                .await
                .map_err(|e| DomainError::update("version", e.to_string()))?;
        }

        tx.update_scalar_fields(record.id, &submission.scalar_fields())
            .await
            .map_err(|e| DomainError::update("fields", e.to_string()))?;

        let updated = tx.reload_with_associations(record.id).await?;
        tx.commit().await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{BugTrackerFields, ModuleKey, ModuleTx};
    use crate::infrastructure::module::InMemoryModuleStore;

    fn create_service() -> (ModuleService<InMemoryModuleStore>, Arc<InMemoryModuleStore>) {
        let store = Arc::new(InMemoryModuleStore::new());
        (ModuleService::new(store.clone()), store)
    }

    fn submission() -> ModuleSubmission {
        ModuleSubmission {
            name: "bank".to_string(),
            team: "cosmos-sdk".to_string(),
            description: "Token transfer functionality".to_string(),
            documentation: "https://docs.example.com/bank".to_string(),
            homepage: "https://example.com".to_string(),
            repo: "https://github.com/cosmos/cosmos-sdk".to_string(),
            bug_tracker: BugTrackerFields {
                url: Some("https://github.com/cosmos/cosmos-sdk/issues".to_string()),
                contact: Some("dev@example.com".to_string()),
            },
            keywords: vec!["tokens".to_string(), "transfer".to_string()],
            authors: vec!["alice".to_string()],
            version: "v1.0.0".to_string(),
        }
    }

    async fn stored(store: &InMemoryModuleStore, name: &str, team: &str) -> Option<Module> {
        let mut tx = store.begin().await.unwrap();
        let key = ModuleKey::new(name, team);
        match tx.find_by_key(&key).await.unwrap() {
            Some(m) => Some(tx.reload_with_associations(m.id).await.unwrap()),
            None => None,
        }
    }

    #[tokio::test]
    async fn test_create_fresh_module() {
        let (service, _store) = create_service();

        let created = service.upsert(submission()).await.unwrap();

        assert_eq!(created.name, "bank");
        assert_eq!(created.team, "cosmos-sdk");
        assert_eq!(created.versions.len(), 1);
        assert_eq!(created.versions[0].version, "v1.0.0");
        assert_eq!(created.authors.len(), 1);
        assert_eq!(created.authors[0].name, "alice");
        assert_eq!(created.keywords.len(), 2);

        let tracker = created.bug_tracker.unwrap();
        assert_eq!(
            tracker.url.as_deref(),
            Some("https://github.com/cosmos/cosmos-sdk/issues")
        );
    }

    #[tokio::test]
    async fn test_create_rejects_empty_version() {
        let (service, store) = create_service();

        let mut s = submission();
        s.version = String::new();

        let err = service.upsert(s).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("empty module version"));

        // no writes were issued
        assert!(stored(&store, "bank", "cosmos-sdk").await.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_authors() {
        let (service, store) = create_service();

        let mut s = submission();
        s.authors.clear();

        let err = service.upsert(s).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("empty module authors"));
        assert!(stored(&store, "bank", "cosmos-sdk").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_missing_name() {
        let (service, _store) = create_service();

        let mut s = submission();
        s.name = String::new();

        let err = service.upsert(s).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();
        let merged = service.upsert(submission()).await.unwrap();

        assert_eq!(merged.versions.len(), 1);
        assert_eq!(merged.authors.len(), 1);
        assert_eq!(merged.keywords.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_appends_new_version() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.version = "v1.1.0".to_string();
        let merged = service.upsert(s).await.unwrap();

        let versions: Vec<&str> = merged.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["v1.0.0", "v1.1.0"]);
    }

    #[tokio::test]
    async fn test_merge_with_known_version_appends_none() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.description = "Updated description".to_string();
        let merged = service.upsert(s).await.unwrap();

        assert_eq!(merged.versions.len(), 1);
        assert_eq!(merged.description, "Updated description");
    }

    #[tokio::test]
    async fn test_merge_with_empty_version_keeps_history() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.version = String::new();
        let merged = service.upsert(s).await.unwrap();

        assert_eq!(merged.versions.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_replaces_keyword_set() {
        let (service, store) = create_service();

        let mut s = submission();
        s.keywords = vec!["a".to_string(), "c".to_string()];
        service.upsert(s).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let c_before = tx.find_or_create_keyword("c").await.unwrap();
        tx.commit().await.unwrap();

        let mut s = submission();
        s.keywords = vec!["a".to_string(), "b".to_string()];
        let merged = service.upsert(s).await.unwrap();

        let names: Vec<&str> = merged.keywords.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        // "c" was disassociated but remains a stored entity
        let mut tx = store.begin().await.unwrap();
        let c_after = tx.find_or_create_keyword("c").await.unwrap();
        assert_eq!(c_before.id, c_after.id);
    }

    #[tokio::test]
    async fn test_merge_replaces_author_set() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.authors = vec!["bob".to_string()];
        let merged = service.upsert(s).await.unwrap();

        assert_eq!(merged.authors.len(), 1);
        assert_eq!(merged.authors[0].name, "bob");
    }

    #[tokio::test]
    async fn test_merge_with_empty_authors_clears_association() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.authors.clear();
        let merged = service.upsert(s).await.unwrap();

        assert!(merged.authors.is_empty());
    }

    #[tokio::test]
    async fn test_merge_updates_scalars_but_never_name() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.description = "New description".to_string();
        s.homepage = "https://new.example.com".to_string();
        s.repo = "https://github.com/cosmos/fork".to_string();
        let merged = service.upsert(s).await.unwrap();

        assert_eq!(merged.name, "bank");
        assert_eq!(merged.description, "New description");
        assert_eq!(merged.homepage, "https://new.example.com");
        assert_eq!(merged.repo, "https://github.com/cosmos/fork");
        assert_eq!(merged.versions.len(), 1);
        assert_eq!(merged.versions[0].version, "v1.0.0");
    }

    #[tokio::test]
    async fn test_merge_updates_bug_tracker_in_place() {
        let (service, store) = create_service();

        let created = service.upsert(submission()).await.unwrap();
        let tracker_id = created.bug_tracker.unwrap().id;

        let mut s = submission();
        s.bug_tracker = BugTrackerFields {
            url: Some("https://bugs.example.com".to_string()),
            contact: None,
        };
        let merged = service.upsert(s).await.unwrap();

        let tracker = merged.bug_tracker.unwrap();
        assert_eq!(tracker.id, tracker_id);
        assert_eq!(tracker.url.as_deref(), Some("https://bugs.example.com"));
        assert_eq!(tracker.contact, None);

        let reloaded = stored(&store, "bank", "cosmos-sdk").await.unwrap();
        assert_eq!(reloaded.bug_tracker.unwrap().id, tracker_id);
    }

    #[tokio::test]
    async fn test_returned_record_reflects_scalar_update() {
        let (service, store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.documentation = "https://docs.example.com/bank/v2".to_string();
        let merged = service.upsert(s).await.unwrap();

        assert_eq!(merged.documentation, "https://docs.example.com/bank/v2");

        let reloaded = stored(&store, "bank", "cosmos-sdk").await.unwrap();
        assert_eq!(reloaded.documentation, merged.documentation);
    }

    #[tokio::test]
    async fn test_publish_then_republish_scenario() {
        let (service, _store) = create_service();

        let created = service.upsert(submission()).await.unwrap();
        assert_eq!(created.versions.len(), 1);
        assert_eq!(created.authors.len(), 1);

        let mut s = submission();
        s.version = "v1.1.0".to_string();
        s.authors = vec!["alice".to_string(), "bob".to_string()];
        let merged = service.upsert(s).await.unwrap();

        let versions: Vec<&str> = merged.versions.iter().map(|v| v.version.as_str()).collect();
        let authors: Vec<&str> = merged.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(versions, vec!["v1.0.0", "v1.1.0"]);
        assert_eq!(authors, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_modules_with_same_name_different_teams_are_distinct() {
        let (service, _store) = create_service();

        service.upsert(submission()).await.unwrap();

        let mut s = submission();
        s.team = "other-team".to_string();
        let other = service.upsert(s).await.unwrap();

        assert_eq!(other.versions.len(), 1);
        assert_eq!(other.team, "other-team");
    }
}
