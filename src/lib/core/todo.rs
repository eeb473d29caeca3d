use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::ValidationError;

pub const TITLE_MAX_CHARS: usize = 255;
pub const PRIORITY_MIN: i64 = 0;
pub const PRIORITY_MAX: i64 = 5;

/// The fixed set of categories a todo can belong to. Persisted rows always
/// carry one of these; an empty category on create is coerced to `Life`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Category {
    Work,
    Study,
    Life,
}

impl Category {
    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "work" => Some(Category::Work),
            "study" => Some(Category::Study),
            "life" => Some(Category::Life),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Study => "study",
            Category::Life => "life",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: i64,
    pub completed: bool,
    /// Monotonic counter, +1 on every successful mutation. Callers must send
    /// the version they last observed when mutating.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTodoInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTodoInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: i64,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusInput {
    pub completed: bool,
    pub version: i64,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Create-side validation. An empty category is tolerated here and defaulted
/// to `life` by the service; on update the category is mandatory.
pub fn validate_create(input: &CreateTodoInput) -> Result<(), ValidationError> {
    validate_title(&input.title)?;

    if !input.category.is_empty() && Category::parse(&input.category).is_none() {
        return Err(ValidationError::InvalidCategory(input.category.clone()));
    }

    if input.priority < PRIORITY_MIN || input.priority > PRIORITY_MAX {
        return Err(ValidationError::InvalidPriority);
    }

    Ok(())
}

pub fn validate_update(input: &UpdateTodoInput) -> Result<(), ValidationError> {
    validate_title(&input.title)?;

    if Category::parse(&input.category).is_none() {
        return Err(ValidationError::InvalidCategory(input.category.clone()));
    }

    if input.priority < PRIORITY_MIN || input.priority > PRIORITY_MAX {
        return Err(ValidationError::InvalidPriority);
    }

    if input.version < 0 {
        return Err(ValidationError::InvalidVersion);
    }

    Ok(())
}

pub fn validate_list_query(category: &str, sort_by: &str) -> Result<(), ValidationError> {
    if !category.is_empty() && category != "all" && Category::parse(category).is_none() {
        return Err(ValidationError::InvalidCategory(category.to_string()));
    }

    if !sort_by.is_empty() && sort_by != "priority" && sort_by != "created_at" {
        return Err(ValidationError::InvalidSort(sort_by.to_string()));
    }

    Ok(())
}
