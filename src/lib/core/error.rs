use thiserror::Error;

use crate::core::todo::Todo;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidBody(String),
    #[error("invalid id format")]
    InvalidIdFormat,
    #[error("invalid id: id must be greater than 0")]
    InvalidId,
    #[error("title is required and cannot be empty")]
    TitleRequired,
    #[error("title cannot exceed 255 characters")]
    TitleTooLong,
    #[error("invalid category: {0}, must be one of: work, study, life")]
    InvalidCategory(String),
    #[error("priority must be between 0 and 5")]
    InvalidPriority,
    #[error("invalid version: version must be non-negative")]
    InvalidVersion,
    #[error("invalid sort parameter: {0}, must be: priority or created_at")]
    InvalidSort(String),
}

/// The closed set of outcomes a mutation or query can fail with. The
/// transport adapter maps each variant to exactly one HTTP status.
#[derive(Error, Debug)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("todo not found with id {0}")]
    NotFound(i64),
    /// Version mismatch. Carries the latest persisted row so the caller can
    /// re-apply their intent; no merge or retry is attempted server-side.
    #[error("version conflict: data has been modified by another user")]
    Conflict {
        current_version: i64,
        provided_version: i64,
        latest: Box<Todo>,
    },
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
