//! Name-to-entity resolution for shared associations
//!
//! Authors and keywords are submitted as bare names. Each name is resolved
//! to its canonical stored entity with find-or-create semantics; an existing
//! match is reused untouched. Concurrent resolution of the same name is
//! settled by the store's uniqueness constraint.

use crate::domain::module::{Author, Keyword, ModuleTx};
use crate::domain::DomainError;

/// Resolve every submitted author name to its canonical stored entity
pub async fn resolve_authors(
    tx: &mut dyn ModuleTx,
    names: &[String],
) -> Result<Vec<Author>, DomainError> {
    let mut authors = Vec::with_capacity(names.len());

    for name in dedupe(names) {
        let author = tx
            .find_or_create_author(name)
            .await
            .map_err(|e| DomainError::resolution("author", e.to_string()))?;
        authors.push(author);
    }

    Ok(authors)
}

/// Resolve every submitted keyword name to its canonical stored entity
pub async fn resolve_keywords(
    tx: &mut dyn ModuleTx,
    names: &[String],
) -> Result<Vec<Keyword>, DomainError> {
    let mut keywords = Vec::with_capacity(names.len());

    for name in dedupe(names) {
        let keyword = tx
            .find_or_create_keyword(name)
            .await
            .map_err(|e| DomainError::resolution("keyword", e.to_string()))?;
        keywords.push(keyword);
    }

    Ok(keywords)
}

/// Order-preserving dedupe; association sets are membership, not sequence,
/// but a stable order keeps the replaced rows deterministic.
fn dedupe(names: &[String]) -> Vec<&String> {
    let mut seen = std::collections::HashSet::new();
    names.iter().filter(|n| seen.insert(n.as_str())).collect()
}
