use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::core::todo::{Category, Todo};
use crate::storage::{FieldUpdate, NewTodo, SortKey, TodoStore};

/// In-memory store with the same observable semantics as the SQLite store.
/// Used to unit-test the service without a database file.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Todo>,
    last_id: i64,
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn insert(&self, new: NewTodo) -> Result<Todo> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let now = Utc::now();
        let todo = Todo {
            id: inner.last_id,
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.priority,
            completed: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(todo.clone());
        Ok(todo)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Todo>> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|t| t.id == id).cloned())
    }

    async fn list(&self, category: Option<Category>, sort: SortKey) -> Result<Vec<Todo>> {
        let inner = self.inner.lock().await;
        let mut todos: Vec<Todo> = inner
            .rows
            .iter()
            .filter(|t| category.is_none_or(|c| t.category == c))
            .cloned()
            .collect();
        match sort {
            SortKey::Priority => {
                todos.sort_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then(b.created_at.cmp(&a.created_at))
                });
            }
            SortKey::CreatedAt => todos.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        Ok(todos)
    }

    async fn update_fields(
        &self,
        id: i64,
        version: i64,
        fields: &FieldUpdate,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        match inner
            .rows
            .iter_mut()
            .find(|t| t.id == id && t.version == version)
        {
            Some(row) => {
                row.title = fields.title.clone();
                row.description = fields.description.clone();
                row.category = fields.category;
                row.priority = fields.priority;
                row.version += 1;
                row.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_status(&self, id: i64, version: i64, completed: bool) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        match inner
            .rows
            .iter_mut()
            .find(|t| t.id == id && t.version == version)
        {
            Some(row) => {
                row.completed = completed;
                row.version += 1;
                row.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|t| t.id != id);
        Ok((before - inner.rows.len()) as u64)
    }
}
