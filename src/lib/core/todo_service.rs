use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::error::{TodoError, ValidationError};
use crate::core::todo::{
    Category, CreateTodoInput, PRIORITY_MAX, PRIORITY_MIN, Todo, UpdateStatusInput,
    UpdateTodoInput, validate_create, validate_list_query, validate_update,
};
use crate::storage::{FieldUpdate, NewTodo, SortKey, TodoStore};

/// Coordinates mutations against the store with optimistic concurrency
/// control. Every mutation carries the version the caller last observed; a
/// mismatch is surfaced as [`TodoError::Conflict`] together with the latest
/// persisted row.
///
/// The coordinator holds no locks. The pre-check against a fresh read gives
/// fast, informative rejection; the store's conditional update (scoped by
/// `id AND version`) is the step that actually prevents lost updates.
pub struct TodoService<S: TodoStore> {
    store: Arc<S>,
}

fn check_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidId);
    }
    Ok(())
}

fn conflict(provided_version: i64, latest: Todo) -> TodoError {
    TodoError::Conflict {
        current_version: latest.version,
        provided_version,
        latest: Box::new(latest),
    }
}

impl<S: TodoStore> TodoService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: CreateTodoInput) -> Result<Todo, TodoError> {
        validate_create(&input)?;

        let category = if input.category.is_empty() {
            Category::Life
        } else {
            Category::parse(&input.category)
                .ok_or_else(|| ValidationError::InvalidCategory(input.category.clone()))?
        };

        let todo = self
            .store
            .insert(NewTodo {
                title: input.title.trim().to_string(),
                description: input.description.trim().to_string(),
                category,
                priority: input.priority.clamp(PRIORITY_MIN, PRIORITY_MAX),
            })
            .await?;

        debug!(id = todo.id, "created todo");
        Ok(todo)
    }

    pub async fn get_all(&self, category: &str, sort_by: &str) -> Result<Vec<Todo>, TodoError> {
        validate_list_query(category, sort_by)?;

        let filter = match category {
            "" | "all" => None,
            other => Category::parse(other),
        };
        let sort = match sort_by {
            "priority" => SortKey::Priority,
            _ => SortKey::CreatedAt,
        };

        Ok(self.store.list(filter, sort).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Todo, TodoError> {
        check_id(id)?;
        self.store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))
    }

    /// Full update of title, description, category and priority.
    pub async fn update(&self, id: i64, input: UpdateTodoInput) -> Result<Todo, TodoError> {
        check_id(id)?;
        validate_update(&input)?;

        let current = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))?;

        if current.version != input.version {
            return Err(conflict(input.version, current));
        }

        let category = Category::parse(&input.category)
            .ok_or_else(|| ValidationError::InvalidCategory(input.category.clone()))?;
        let fields = FieldUpdate {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            category,
            priority: input.priority,
        };

        let rows = self.store.update_fields(id, input.version, &fields).await?;
        if rows == 0 {
            return Err(self.lost_update(id, input.version).await?);
        }

        self.store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))
    }

    /// Toggles the completed flag, under the same versioned protocol as
    /// [`update`](TodoService::update).
    pub async fn update_status(
        &self,
        id: i64,
        input: UpdateStatusInput,
    ) -> Result<Todo, TodoError> {
        check_id(id)?;
        if input.version < 0 {
            return Err(ValidationError::InvalidVersion.into());
        }

        let current = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))?;

        if current.version != input.version {
            return Err(conflict(input.version, current));
        }

        let rows = self
            .store
            .update_status(id, input.version, input.completed)
            .await?;
        if rows == 0 {
            return Err(self.lost_update(id, input.version).await?);
        }

        self.store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), TodoError> {
        check_id(id)?;
        self.store
            .get_by_id(id)
            .await?
            .ok_or(TodoError::NotFound(id))?;

        let rows = self.store.delete(id).await?;
        if rows == 0 {
            // A concurrent delete won between the existence check and ours.
            return Err(TodoError::NotFound(id));
        }

        debug!(id, "deleted todo");
        Ok(())
    }

    /// Classifies a conditional update that affected no rows: another writer
    /// committed between the pre-check read and the write. The conflict must
    /// report versions from a fresh read, not the one the pre-check saw.
    async fn lost_update(&self, id: i64, provided_version: i64) -> Result<TodoError, TodoError> {
        warn!(id, provided_version, "conditional update affected no rows");
        match self.store.get_by_id(id).await? {
            Some(latest) => Ok(conflict(provided_version, latest)),
            // The row vanished in the window; a concurrent delete won.
            None => Ok(TodoError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use async_trait::async_trait;

    fn service() -> TodoService<MemoryStore> {
        TodoService::new(Arc::new(MemoryStore::default()))
    }

    fn create_input(title: &str) -> CreateTodoInput {
        CreateTodoInput {
            title: title.to_string(),
            description: String::new(),
            category: String::new(),
            priority: 0,
        }
    }

    fn update_input(title: &str, category: &str, priority: i64, version: i64) -> UpdateTodoInput {
        UpdateTodoInput {
            title: title.to_string(),
            description: "desc".to_string(),
            category: category.to_string(),
            priority,
            version,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let svc = service();
        let todo = svc.create(create_input("  buy milk  ")).await.unwrap();

        assert!(todo.id > 0);
        assert_eq!(todo.title, "buy milk");
        assert_eq!(todo.category, Category::Life);
        assert_eq!(todo.priority, 0);
        assert_eq!(todo.version, 0);
        assert!(!todo.completed);
    }

    #[tokio::test]
    async fn create_keeps_explicit_category() {
        let svc = service();
        let todo = svc
            .create(CreateTodoInput {
                title: "report".to_string(),
                description: "  quarterly  ".to_string(),
                category: "work".to_string(),
                priority: 5,
            })
            .await
            .unwrap();

        assert_eq!(todo.category, Category::Work);
        assert_eq!(todo.priority, 5);
        assert_eq!(todo.description, "quarterly");
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let svc = service();
        let err = svc.create(create_input("   ")).await.unwrap_err();
        assert!(matches!(
            err,
            TodoError::Validation(ValidationError::TitleRequired)
        ));
    }

    #[tokio::test]
    async fn update_bumps_version_by_one() {
        let svc = service();
        let todo = svc.create(create_input("a")).await.unwrap();

        let updated = svc
            .update(todo.id, update_input("b", "study", 2, 0))
            .await
            .unwrap();

        assert_eq!(updated.version, 1);
        assert_eq!(updated.title, "b");
        assert_eq!(updated.category, Category::Study);
        assert!(updated.updated_at >= todo.updated_at);
    }

    #[tokio::test]
    async fn stale_update_conflicts_and_leaves_row_unmodified() {
        let svc = service();
        let todo = svc.create(create_input("a")).await.unwrap();
        svc.update(todo.id, update_input("b", "study", 2, 0))
            .await
            .unwrap();

        let err = svc
            .update(todo.id, update_input("c", "work", 1, 0))
            .await
            .unwrap_err();

        match err {
            TodoError::Conflict {
                current_version,
                provided_version,
                latest,
            } => {
                assert_eq!(current_version, 1);
                assert_eq!(provided_version, 0);
                assert_eq!(latest.title, "b");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let stored = svc.get_by_id(todo.id).await.unwrap();
        assert_eq!(stored.title, "b");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn status_update_follows_same_protocol() {
        let svc = service();
        let todo = svc.create(create_input("a")).await.unwrap();

        let done = svc
            .update_status(
                todo.id,
                UpdateStatusInput {
                    completed: true,
                    version: 0,
                },
            )
            .await
            .unwrap();
        assert!(done.completed);
        assert_eq!(done.version, 1);

        let err = svc
            .update_status(
                todo.id,
                UpdateStatusInput {
                    completed: false,
                    version: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TodoError::Conflict {
                current_version: 1,
                provided_version: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let svc = service();
        let err = svc
            .update(42, update_input("b", "work", 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::NotFound(42)));
    }

    #[tokio::test]
    async fn non_positive_id_is_rejected() {
        let svc = service();
        let err = svc.get_by_id(0).await.unwrap_err();
        assert!(matches!(
            err,
            TodoError::Validation(ValidationError::InvalidId)
        ));
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let svc = service();
        let todo = svc.create(create_input("a")).await.unwrap();

        svc.delete(todo.id).await.unwrap();
        let err = svc.delete(todo.id).await.unwrap_err();
        assert!(matches!(err, TodoError::NotFound(_)));

        let err = svc.get_by_id(todo.id).await.unwrap_err();
        assert!(matches!(err, TodoError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_all_validates_filters() {
        let svc = service();
        assert!(matches!(
            svc.get_all("bogus", "").await.unwrap_err(),
            TodoError::Validation(ValidationError::InvalidCategory(_))
        ));
        assert!(matches!(
            svc.get_all("", "title").await.unwrap_err(),
            TodoError::Validation(ValidationError::InvalidSort(_))
        ));
    }

    /// Store wrapper that simulates a writer sneaking in between the
    /// coordinator's pre-check and its conditional write: the conditional
    /// update reports zero rows while a competing status write lands.
    struct RacingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl TodoStore for RacingStore {
        async fn insert(&self, new: NewTodo) -> anyhow::Result<Todo> {
            self.inner.insert(new).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Todo>> {
            self.inner.get_by_id(id).await
        }

        async fn list(
            &self,
            category: Option<Category>,
            sort: SortKey,
        ) -> anyhow::Result<Vec<Todo>> {
            self.inner.list(category, sort).await
        }

        async fn update_fields(
            &self,
            id: i64,
            version: i64,
            _fields: &FieldUpdate,
        ) -> anyhow::Result<u64> {
            self.inner.update_status(id, version, true).await?;
            Ok(0)
        }

        async fn update_status(
            &self,
            id: i64,
            version: i64,
            completed: bool,
        ) -> anyhow::Result<u64> {
            self.inner.update_status(id, version, completed).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<u64> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn lost_race_after_precheck_reports_fresh_conflict() {
        let svc = TodoService::new(Arc::new(RacingStore {
            inner: MemoryStore::default(),
        }));
        let todo = svc.create(create_input("a")).await.unwrap();

        let err = svc
            .update(todo.id, update_input("b", "work", 1, 0))
            .await
            .unwrap_err();

        match err {
            TodoError::Conflict {
                current_version,
                provided_version,
                latest,
            } => {
                // The competing write bumped the version after our pre-check
                // passed; the conflict must carry the fresh state.
                assert_eq!(current_version, 1);
                assert_eq!(provided_version, 0);
                assert!(latest.completed);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_version_writers_have_exactly_one_winner() {
        let svc = service();
        let todo = svc.create(create_input("a")).await.unwrap();

        let first = svc.update(todo.id, update_input("first", "work", 1, 0));
        let second = svc.update(todo.id, update_input("second", "study", 2, 0));
        let (first, second) = tokio::join!(first, second);

        assert_eq!(
            first.is_ok() as u8 + second.is_ok() as u8,
            1,
            "exactly one writer must win"
        );

        let stored = svc.get_by_id(todo.id).await.unwrap();
        assert_eq!(stored.version, 1);
        let winner = if first.is_ok() { "first" } else { "second" };
        assert_eq!(stored.title, winner);
    }
}
