use thiserror::Error;

/// Core domain errors
///
/// Store-originated failures are wrapped into the variant naming the phase
/// that failed (author/keyword resolution, association replace, bug-tracker
/// or version or scalar update), so callers can tell how far an upsert got.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Failed to fetch or create {entity}: {message}")]
    Resolution { entity: String, message: String },

    #[error("Failed to replace module {relation}: {message}")]
    Association { relation: String, message: String },

    #[error("Failed to update module {phase}: {message}")]
    Update { phase: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn resolution(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn association(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Association {
            relation: relation.into(),
            message: message.into(),
        }
    }

    pub fn update(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update {
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
