//! Module aggregate and related entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compound key uniquely identifying a module: (name, team)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    pub name: String,
    pub team: String,
}

impl ModuleKey {
    pub fn new(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
        }
    }
}

impl std::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.team)
    }
}

/// Candidate module aggregate submitted for publication.
///
/// `version` names the version being published by this request; it is not
/// stored as a scalar but drives [`ModuleVersion`] creation. `authors` and
/// `keywords` are name-identified lookup values resolved against the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSubmission {
    pub name: String,
    pub team: String,
    pub description: String,
    pub documentation: String,
    pub homepage: String,
    pub repo: String,
    pub bug_tracker: BugTrackerFields,
    pub keywords: Vec<String>,
    pub authors: Vec<String>,
    pub version: String,
}

impl ModuleSubmission {
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(&self.name, &self.team)
    }

    /// The mutable scalar payload applied on a merge. `name` is part of the
    /// lookup key and never changes through an upsert.
    pub fn scalar_fields(&self) -> ModuleFields {
        ModuleFields {
            team: self.team.clone(),
            description: self.description.clone(),
            documentation: self.documentation.clone(),
            homepage: self.homepage.clone(),
            repo: self.repo.clone(),
        }
    }
}

/// Stored module aggregate.
///
/// Associations are only populated by a load that asked for them;
/// `bug_tracker` is `None` on a bare key lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub name: String,
    pub team: String,
    pub description: String,
    pub documentation: String,
    pub homepage: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug_tracker: Option<BugTracker>,
    pub keywords: Vec<Keyword>,
    pub authors: Vec<Author>,
    pub versions: Vec<ModuleVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(&self.name, &self.team)
    }

    /// Latest published version, if any
    pub fn latest_version(&self) -> Option<&ModuleVersion> {
        self.versions.last()
    }
}

/// Bug tracker owned by exactly one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugTracker {
    pub id: i64,
    pub module_id: i64,
    pub url: Option<String>,
    pub contact: Option<String>,
}

/// Bug tracker payload carried by a submission and applied on update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugTrackerFields {
    pub url: Option<String>,
    pub contact: Option<String>,
}

/// Mutable scalar fields applied to an existing module on a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFields {
    pub team: String,
    pub description: String,
    pub documentation: String,
    pub homepage: String,
    pub repo: String,
}

/// Module author. Independent entity identified by name; shared by any
/// number of modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

/// Search keyword. Independent entity identified by name; shared by any
/// number of modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
}

/// A published version of a module, identified by (module_id, version).
/// Version history is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersion {
    pub id: i64,
    pub module_id: i64,
    pub version: String,
    pub published_at: DateTime<Utc>,
}
