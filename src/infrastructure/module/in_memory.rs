//! In-memory module store
//!
//! Backs the tests and any storage-free setup. Transactions take a copy of
//! the shared state at `begin` and publish it back on `commit`, so dropping
//! an uncommitted transaction discards every change made through it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::module::{
    Author, BugTracker, BugTrackerFields, Keyword, Module, ModuleFields, ModuleKey,
    ModuleStore, ModuleSubmission, ModuleTx, ModuleVersion,
};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct ModuleRow {
    id: i64,
    name: String,
    team: String,
    description: String,
    documentation: String,
    homepage: String,
    repo: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    modules: BTreeMap<i64, ModuleRow>,
    /// keyed by module id; a module owns exactly one tracker
    bug_trackers: BTreeMap<i64, BugTracker>,
    authors: BTreeMap<i64, String>,
    keywords: BTreeMap<i64, String>,
    module_authors: BTreeMap<i64, Vec<i64>>,
    module_keywords: BTreeMap<i64, Vec<i64>>,
    versions: Vec<ModuleVersion>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of [`ModuleStore`]
#[derive(Debug, Default)]
pub struct InMemoryModuleStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryModuleStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn begin(&self) -> Result<Box<dyn ModuleTx>, DomainError> {
        let working = self
            .state
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?
            .clone();

        Ok(Box::new(InMemoryModuleTx {
            shared: self.state.clone(),
            working,
        }))
    }
}

struct InMemoryModuleTx {
    shared: Arc<RwLock<State>>,
    working: State,
}

impl InMemoryModuleTx {
    fn module(&self, module_id: i64) -> Result<&ModuleRow, DomainError> {
        self.working
            .modules
            .get(&module_id)
            .ok_or_else(|| DomainError::not_found(format!("Module {} not found", module_id)))
    }

    fn to_bare_module(&self, row: &ModuleRow) -> Module {
        Module {
            id: row.id,
            name: row.name.clone(),
            team: row.team.clone(),
            description: row.description.clone(),
            documentation: row.documentation.clone(),
            homepage: row.homepage.clone(),
            repo: row.repo.clone(),
            bug_tracker: None,
            keywords: Vec::new(),
            authors: Vec::new(),
            versions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ModuleTx for InMemoryModuleTx {
    async fn find_by_key(&mut self, key: &ModuleKey) -> Result<Option<Module>, DomainError> {
        let row = self
            .working
            .modules
            .values()
            .find(|m| m.name == key.name && m.team == key.team)
            .cloned();

        Ok(row.map(|r| self.to_bare_module(&r)))
    }

    async fn create_aggregate(
        &mut self,
        submission: &ModuleSubmission,
    ) -> Result<Module, DomainError> {
        let key = submission.key();

        if self.find_by_key(&key).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "Module '{}' already exists",
                key
            )));
        }

        let now = Utc::now();
        let module_id = self.working.next_id();

        self.working.modules.insert(
            module_id,
            ModuleRow {
                id: module_id,
                name: submission.name.clone(),
                team: submission.team.clone(),
                description: submission.description.clone(),
                documentation: submission.documentation.clone(),
                homepage: submission.homepage.clone(),
                repo: submission.repo.clone(),
                created_at: now,
                updated_at: now,
            },
        );

        let tracker_id = self.working.next_id();
        self.working.bug_trackers.insert(
            module_id,
            BugTracker {
                id: tracker_id,
                module_id,
                url: submission.bug_tracker.url.clone(),
                contact: submission.bug_tracker.contact.clone(),
            },
        );

        let mut author_ids = Vec::new();
        for name in &submission.authors {
            let author = self.find_or_create_author(name).await?;
            if !author_ids.contains(&author.id) {
                author_ids.push(author.id);
            }
        }
        self.working.module_authors.insert(module_id, author_ids);

        let mut keyword_ids = Vec::new();
        for name in &submission.keywords {
            let keyword = self.find_or_create_keyword(name).await?;
            if !keyword_ids.contains(&keyword.id) {
                keyword_ids.push(keyword.id);
            }
        }
        self.working.module_keywords.insert(module_id, keyword_ids);

        self.append_version(module_id, &submission.version).await?;

        self.reload_with_associations(module_id).await
    }

    async fn reload_with_associations(&mut self, module_id: i64) -> Result<Module, DomainError> {
        let row = self.module(module_id)?.clone();
        let mut module = self.to_bare_module(&row);

        module.bug_tracker = self.working.bug_trackers.get(&module_id).cloned();

        if let Some(ids) = self.working.module_authors.get(&module_id) {
            module.authors = ids
                .iter()
                .filter_map(|id| {
                    self.working.authors.get(id).map(|name| Author {
                        id: *id,
                        name: name.clone(),
                    })
                })
                .collect();
        }

        if let Some(ids) = self.working.module_keywords.get(&module_id) {
            module.keywords = ids
                .iter()
                .filter_map(|id| {
                    self.working.keywords.get(id).map(|name| Keyword {
                        id: *id,
                        name: name.clone(),
                    })
                })
                .collect();
        }

        module.versions = self
            .working
            .versions
            .iter()
            .filter(|v| v.module_id == module_id)
            .cloned()
            .collect();

        Ok(module)
    }

    async fn find_or_create_author(&mut self, name: &str) -> Result<Author, DomainError> {
        if let Some((id, stored)) = self.working.authors.iter().find(|(_, n)| *n == name) {
            return Ok(Author {
                id: *id,
                name: stored.clone(),
            });
        }

        let id = self.working.next_id();
        self.working.authors.insert(id, name.to_string());

        Ok(Author {
            id,
            name: name.to_string(),
        })
    }

    async fn find_or_create_keyword(&mut self, name: &str) -> Result<Keyword, DomainError> {
        if let Some((id, stored)) = self.working.keywords.iter().find(|(_, n)| *n == name) {
            return Ok(Keyword {
                id: *id,
                name: stored.clone(),
            });
        }

        let id = self.working.next_id();
        self.working.keywords.insert(id, name.to_string());

        Ok(Keyword {
            id,
            name: name.to_string(),
        })
    }

    async fn replace_authors(
        &mut self,
        module_id: i64,
        authors: &[Author],
    ) -> Result<(), DomainError> {
        self.module(module_id)?;
        self.working
            .module_authors
            .insert(module_id, authors.iter().map(|a| a.id).collect());
        Ok(())
    }

    async fn replace_keywords(
        &mut self,
        module_id: i64,
        keywords: &[Keyword],
    ) -> Result<(), DomainError> {
        self.module(module_id)?;
        self.working
            .module_keywords
            .insert(module_id, keywords.iter().map(|k| k.id).collect());
        Ok(())
    }

    async fn update_bug_tracker(
        &mut self,
        module_id: i64,
        fields: &BugTrackerFields,
    ) -> Result<(), DomainError> {
        let tracker = self
            .working
            .bug_trackers
            .get_mut(&module_id)
            .ok_or_else(|| {
                DomainError::not_found(format!("Bug tracker for module {} not found", module_id))
            })?;

        tracker.url = fields.url.clone();
        tracker.contact = fields.contact.clone();
        Ok(())
    }

    async fn version_exists(
        &mut self,
        module_id: i64,
        version: &str,
    ) -> Result<bool, DomainError> {
        Ok(self
            .working
            .versions
            .iter()
            .any(|v| v.module_id == module_id && v.version == version))
    }

    async fn append_version(
        &mut self,
        module_id: i64,
        version: &str,
    ) -> Result<ModuleVersion, DomainError> {
        self.module(module_id)?;

        if self.version_exists(module_id, version).await? {
            return Err(DomainError::conflict(format!(
                "Version '{}' already recorded for module {}",
                version, module_id
            )));
        }

        let record = ModuleVersion {
            id: self.working.next_id(),
            module_id,
            version: version.to_string(),
            published_at: Utc::now(),
        };
        self.working.versions.push(record.clone());

        Ok(record)
    }

    async fn update_scalar_fields(
        &mut self,
        module_id: i64,
        fields: &ModuleFields,
    ) -> Result<(), DomainError> {
        let row = self
            .working
            .modules
            .get_mut(&module_id)
            .ok_or_else(|| DomainError::not_found(format!("Module {} not found", module_id)))?;

        row.team = fields.team.clone();
        row.description = fields.description.clone();
        row.documentation = fields.documentation.clone();
        row.homepage = fields.homepage.clone();
        row.repo = fields.repo.clone();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let mut shared = self
            .shared
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        *shared = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ModuleSubmission {
        ModuleSubmission {
            name: "bank".to_string(),
            team: "cosmos-sdk".to_string(),
            repo: "https://github.com/cosmos/cosmos-sdk".to_string(),
            authors: vec!["alice".to_string()],
            keywords: vec!["tokens".to_string()],
            version: "v1.0.0".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemoryModuleStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_aggregate(&submission()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx
            .find_by_key(&ModuleKey::new("bank", "cosmos-sdk"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = InMemoryModuleStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_aggregate(&submission()).await.unwrap();
            // dropped uncommitted
        }

        let mut tx = store.begin().await.unwrap();
        let found = tx
            .find_by_key(&ModuleKey::new("bank", "cosmos-sdk"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_aggregate_rejects_duplicate_key() {
        let store = InMemoryModuleStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_aggregate(&submission()).await.unwrap();
        let err = tx.create_aggregate(&submission()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_find_or_create_author_reuses_existing() {
        let store = InMemoryModuleStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = tx.find_or_create_author("alice").await.unwrap();
        let second = tx.find_or_create_author("alice").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_version_exists_and_append() {
        let store = InMemoryModuleStore::new();
        let mut tx = store.begin().await.unwrap();

        let created = tx.create_aggregate(&submission()).await.unwrap();

        assert!(tx.version_exists(created.id, "v1.0.0").await.unwrap());
        assert!(!tx.version_exists(created.id, "v2.0.0").await.unwrap());

        tx.append_version(created.id, "v2.0.0").await.unwrap();
        assert!(tx.version_exists(created.id, "v2.0.0").await.unwrap());

        let err = tx.append_version(created.id, "v2.0.0").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_reload_unknown_module_is_not_found() {
        let store = InMemoryModuleStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.reload_with_associations(42).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_replace_keeps_entities_alive() {
        let store = InMemoryModuleStore::new();
        let mut tx = store.begin().await.unwrap();

        let created = tx.create_aggregate(&submission()).await.unwrap();
        let original_keyword = created.keywords[0].clone();

        tx.replace_keywords(created.id, &[]).await.unwrap();

        let reloaded = tx.reload_with_associations(created.id).await.unwrap();
        assert!(reloaded.keywords.is_empty());

        // the entity itself is still stored
        let again = tx.find_or_create_keyword("tokens").await.unwrap();
        assert_eq!(again.id, original_keyword.id);
    }
}
