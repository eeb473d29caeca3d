use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::core::todo::{Category, Todo};
use crate::storage::{FieldUpdate, NewTodo, SortKey, TodoStore};

/// SQLite-backed store. All requests share one connection pool; conflicting
/// writers to the same row are serialized solely by the conditional UPDATE.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to database {url}"))?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// AUTOINCREMENT keeps ids of deleted rows from being reused.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'life',
                priority INTEGER NOT NULL DEFAULT 0,
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("failed to initialize database")?;
        Ok(())
    }
}

#[async_trait]
impl TodoStore for SqliteStore {
    async fn insert(&self, new: NewTodo) -> Result<Todo> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO todos
                (title, description, category, priority, completed, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, FALSE, 0, ?, ?)",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category)
        .bind(new.priority)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to create todo")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .context("failed to read back created todo")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Todo>> {
        sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to get todo")
    }

    async fn list(&self, category: Option<Category>, sort: SortKey) -> Result<Vec<Todo>> {
        let order = match sort {
            SortKey::Priority => "priority DESC, created_at DESC",
            SortKey::CreatedAt => "created_at DESC",
        };

        let todos = match category {
            Some(category) => {
                sqlx::query_as::<_, Todo>(&format!(
                    "SELECT * FROM todos WHERE category = ? ORDER BY {order}"
                ))
                .bind(category)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Todo>(&format!("SELECT * FROM todos ORDER BY {order}"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("failed to query todos")?;

        Ok(todos)
    }

    async fn update_fields(
        &self,
        id: i64,
        version: i64,
        fields: &FieldUpdate,
    ) -> Result<u64> {
        // Single atomic statement; the version predicate is what prevents
        // lost updates between two writers that both read the same row.
        let result = sqlx::query(
            "UPDATE todos
             SET title = ?, description = ?, category = ?, priority = ?,
                 version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.category)
        .bind(fields.priority)
        .bind(Utc::now())
        .bind(id)
        .bind(version)
        .execute(&self.pool)
        .await
        .context("failed to update todo")?;

        Ok(result.rows_affected())
    }

    async fn update_status(&self, id: i64, version: i64, completed: bool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE todos
             SET completed = ?, version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(completed)
        .bind(Utc::now())
        .bind(id)
        .bind(version)
        .execute(&self.pool)
        .await
        .context("failed to update todo status")?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete todo")?;

        Ok(result.rows_affected())
    }
}
