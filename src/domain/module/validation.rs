//! Submission validation helpers

use thiserror::Error;

use super::entity::ModuleSubmission;

/// Maximum length accepted for module and team names
pub const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleValidationError {
    #[error("empty module name")]
    EmptyName,

    #[error("empty module team")]
    EmptyTeam,

    #[error("empty module repo")]
    EmptyRepo,

    #[error("module {field} exceeds the maximum length")]
    TooLong { field: &'static str },
}

/// Validate the fields required to locate or create a module record.
///
/// Version and author requirements are create-path rules and are checked by
/// the upsert itself, not here.
pub fn validate_submission(submission: &ModuleSubmission) -> Result<(), ModuleValidationError> {
    if submission.name.trim().is_empty() {
        return Err(ModuleValidationError::EmptyName);
    }
    if submission.name.len() > MAX_NAME_LENGTH {
        return Err(ModuleValidationError::TooLong { field: "name" });
    }
    if submission.team.trim().is_empty() {
        return Err(ModuleValidationError::EmptyTeam);
    }
    if submission.team.len() > MAX_NAME_LENGTH {
        return Err(ModuleValidationError::TooLong { field: "team" });
    }
    if submission.repo.trim().is_empty() {
        return Err(ModuleValidationError::EmptyRepo);
    }

    Ok(())
}
