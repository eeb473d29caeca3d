pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::core::todo::{Category, Todo};

/// Ordering applied to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// priority DESC, created_at DESC as tie-break
    Priority,
    /// created_at DESC
    CreatedAt,
}

/// A row as handed to `insert`, before the store assigns an id and
/// timestamps. Values are already normalized (trimmed, defaulted, clamped).
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: i64,
}

/// The fields written by a conditional full update.
#[derive(Debug, Clone)]
pub struct FieldUpdate {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: i64,
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Inserts a new row with version 0 and completed false. Returns the
    /// persisted row including its assigned id.
    async fn insert(&self, new: NewTodo) -> anyhow::Result<Todo>;

    async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Todo>>;

    async fn list(&self, category: Option<Category>, sort: SortKey) -> anyhow::Result<Vec<Todo>>;

    /// Conditional full update: writes the fields, bumps the version and
    /// updated_at in a single atomic statement scoped by `id AND version`.
    /// Returns rows affected: 0 when the id is missing or the version is
    /// stale, 1 on success. Never partially applies fields.
    async fn update_fields(&self, id: i64, version: i64, fields: &FieldUpdate)
    -> anyhow::Result<u64>;

    /// Conditional status update; same contract as [`update_fields`]
    /// but only the completed flag is written.
    ///
    /// [`update_fields`]: TodoStore::update_fields
    async fn update_status(&self, id: i64, version: i64, completed: bool) -> anyhow::Result<u64>;

    /// Hard delete, unconditional on version. Returns rows affected.
    async fn delete(&self, id: i64) -> anyhow::Result<u64>;
}
