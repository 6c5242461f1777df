//! PostgreSQL module store implementation

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::config::DatabaseConfig;
use crate::domain::module::{
    Author, BugTracker, BugTrackerFields, Keyword, Module, ModuleFields, ModuleKey,
    ModuleStore, ModuleSubmission, ModuleTx, ModuleVersion,
};
use crate::domain::DomainError;

/// PostgreSQL implementation of [`ModuleStore`]
#[derive(Debug, Clone)]
pub struct PostgresModuleStore {
    pool: PgPool,
}

impl PostgresModuleStore {
    /// Create a new store over an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and wrap it
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to database: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ModuleStore for PostgresModuleStore {
    async fn begin(&self) -> Result<Box<dyn ModuleTx>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresModuleTx { tx }))
    }
}

/// One transaction against the Postgres store. Rolls back on drop unless
/// committed, which sqlx guarantees for an open `Transaction`.
struct PostgresModuleTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ModuleTx for PostgresModuleTx {
    async fn find_by_key(&mut self, key: &ModuleKey) -> Result<Option<Module>, DomainError> {
        // FOR UPDATE holds the row for the rest of the merge so two upserts
        // for the same key cannot interleave.
        let row = sqlx::query(
            r#"
            SELECT id, name, team, description, documentation, homepage, repo,
                   created_at, updated_at
            FROM modules
            WHERE name = $1 AND team = $2
            FOR UPDATE
            "#,
        )
        .bind(&key.name)
        .bind(&key.team)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to look up module: {}", e)))?;

        Ok(row.map(|row| row_to_module(&row)))
    }

    async fn create_aggregate(
        &mut self,
        submission: &ModuleSubmission,
    ) -> Result<Module, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO modules (name, team, description, documentation, homepage, repo)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&submission.name)
        .bind(&submission.team)
        .bind(&submission.description)
        .bind(&submission.documentation)
        .bind(&submission.homepage)
        .bind(&submission.repo)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e.to_string()) {
                DomainError::conflict(format!("Module '{}' already exists", submission.key()))
            } else {
                DomainError::storage(format!("Failed to create module: {}", e))
            }
        })?;

        let module_id: i64 = row.get("id");

        sqlx::query("INSERT INTO bug_trackers (module_id, url, contact) VALUES ($1, $2, $3)")
            .bind(module_id)
            .bind(&submission.bug_tracker.url)
            .bind(&submission.bug_tracker.contact)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create bug tracker: {}", e)))?;

        for name in &submission.authors {
            let author = self.find_or_create_author(name).await?;
            link_entity(&mut self.tx, "module_authors", "author_id", module_id, author.id)
                .await?;
        }

        for name in &submission.keywords {
            let keyword = self.find_or_create_keyword(name).await?;
            link_entity(&mut self.tx, "module_keywords", "keyword_id", module_id, keyword.id)
                .await?;
        }

        self.append_version(module_id, &submission.version).await?;

        self.reload_with_associations(module_id).await
    }

    async fn reload_with_associations(&mut self, module_id: i64) -> Result<Module, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, team, description, documentation, homepage, repo,
                   created_at, updated_at
            FROM modules
            WHERE id = $1
            "#,
        )
        .bind(module_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load module: {}", e)))?
        .ok_or_else(|| DomainError::not_found(format!("Module {} not found", module_id)))?;

        let mut module = row_to_module(&row);

        let tracker = sqlx::query(
            "SELECT id, module_id, url, contact FROM bug_trackers WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load bug tracker: {}", e)))?;

        module.bug_tracker = tracker.map(|row| BugTracker {
            id: row.get("id"),
            module_id: row.get("module_id"),
            url: row.get("url"),
            contact: row.get("contact"),
        });

        let author_rows = sqlx::query(
            r#"
            SELECT a.id, a.name
            FROM authors a
            JOIN module_authors ma ON ma.author_id = a.id
            WHERE ma.module_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load authors: {}", e)))?;

        module.authors = author_rows
            .iter()
            .map(|row| Author {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect();

        let keyword_rows = sqlx::query(
            r#"
            SELECT k.id, k.name
            FROM keywords k
            JOIN module_keywords mk ON mk.keyword_id = k.id
            WHERE mk.module_id = $1
            ORDER BY k.id
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load keywords: {}", e)))?;

        module.keywords = keyword_rows
            .iter()
            .map(|row| Keyword {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect();

        let version_rows = sqlx::query(
            r#"
            SELECT id, module_id, version, published_at
            FROM module_versions
            WHERE module_id = $1
            ORDER BY id
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load versions: {}", e)))?;

        module.versions = version_rows.iter().map(row_to_version).collect();

        Ok(module)
    }

    async fn find_or_create_author(&mut self, name: &str) -> Result<Author, DomainError> {
        // The insert races with concurrent resolution of the same name; the
        // uniqueness constraint coalesces both writers onto one row.
        sqlx::query("INSERT INTO authors (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create author: {}", e)))?;

        let row = sqlx::query("SELECT id, name FROM authors WHERE name = $1")
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch author: {}", e)))?;

        Ok(Author {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn find_or_create_keyword(&mut self, name: &str) -> Result<Keyword, DomainError> {
        sqlx::query("INSERT INTO keywords (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create keyword: {}", e)))?;

        let row = sqlx::query("SELECT id, name FROM keywords WHERE name = $1")
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch keyword: {}", e)))?;

        Ok(Keyword {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn replace_authors(
        &mut self,
        module_id: i64,
        authors: &[Author],
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM module_authors WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to clear authors: {}", e)))?;

        for author in authors {
            link_entity(&mut self.tx, "module_authors", "author_id", module_id, author.id)
                .await?;
        }

        Ok(())
    }

    async fn replace_keywords(
        &mut self,
        module_id: i64,
        keywords: &[Keyword],
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM module_keywords WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to clear keywords: {}", e)))?;

        for keyword in keywords {
            link_entity(&mut self.tx, "module_keywords", "keyword_id", module_id, keyword.id)
                .await?;
        }

        Ok(())
    }

    async fn update_bug_tracker(
        &mut self,
        module_id: i64,
        fields: &BugTrackerFields,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE bug_trackers SET url = $2, contact = $3 WHERE module_id = $1",
        )
        .bind(module_id)
        .bind(&fields.url)
        .bind(&fields.contact)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update bug tracker: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Bug tracker for module {} not found",
                module_id
            )));
        }

        Ok(())
    }

    async fn version_exists(
        &mut self,
        module_id: i64,
        version: &str,
    ) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM module_versions WHERE module_id = $1 AND version = $2)",
        )
        .bind(module_id)
        .bind(version)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check version: {}", e)))?;

        Ok(exists)
    }

    async fn append_version(
        &mut self,
        module_id: i64,
        version: &str,
    ) -> Result<ModuleVersion, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO module_versions (module_id, version)
            VALUES ($1, $2)
            RETURNING id, module_id, version, published_at
            "#,
        )
        .bind(module_id)
        .bind(version)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e.to_string()) {
                DomainError::conflict(format!(
                    "Version '{}' already recorded for module {}",
                    version, module_id
                ))
            } else {
                DomainError::storage(format!("Failed to append version: {}", e))
            }
        })?;

        Ok(row_to_version(&row))
    }

    async fn update_scalar_fields(
        &mut self,
        module_id: i64,
        fields: &ModuleFields,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE modules
            SET team = $2, description = $3, documentation = $4, homepage = $5,
                repo = $6, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(module_id)
        .bind(&fields.team)
        .bind(&fields.description)
        .bind(&fields.documentation)
        .bind(&fields.homepage)
        .bind(&fields.repo)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update module: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Module {} not found",
                module_id
            )));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))
    }
}

async fn link_entity(
    tx: &mut Transaction<'static, Postgres>,
    table: &str,
    column: &str,
    module_id: i64,
    entity_id: i64,
) -> Result<(), DomainError> {
    // table/column come from the two fixed association tables above
    let query = format!(
        "INSERT INTO {table} (module_id, {column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    );

    sqlx::query(&query)
        .bind(module_id)
        .bind(entity_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to link {}: {}", column, e)))?;

    Ok(())
}

fn row_to_module(row: &sqlx::postgres::PgRow) -> Module {
    Module {
        id: row.get("id"),
        name: row.get("name"),
        team: row.get("team"),
        description: row.get("description"),
        documentation: row.get("documentation"),
        homepage: row.get("homepage"),
        repo: row.get("repo"),
        bug_tracker: None,
        keywords: Vec::new(),
        authors: Vec::new(),
        versions: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_version(row: &sqlx::postgres::PgRow) -> ModuleVersion {
    ModuleVersion {
        id: row.get("id"),
        module_id: row.get("module_id"),
        version: row.get("version"),
        published_at: row.get("published_at"),
    }
}

fn is_unique_violation(message: &str) -> bool {
    message.contains("duplicate key") || message.contains("unique constraint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        assert!(is_unique_violation(
            "error returned from database: duplicate key value violates unique constraint \
             \"modules_name_team_key\""
        ));
        assert!(!is_unique_violation("connection reset by peer"));
    }
}
