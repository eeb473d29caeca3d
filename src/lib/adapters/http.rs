use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::error::{TodoError, ValidationError};
use crate::core::todo::{CreateTodoInput, Todo, UpdateStatusInput, UpdateTodoInput};
use crate::core::todo_service::TodoService;
use crate::storage::TodoStore;

/// Uniform response envelope: `code` 0 on success, the HTTP status otherwise.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        message: "success".to_string(),
        data: Some(data),
    })
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ApiResponse::<()> {
        code: i64::from(status.as_u16()),
        message,
        data: None,
    };
    (status, Json(body)).into_response()
}

/// The single place where coordinator outcomes become HTTP statuses.
impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        match self {
            TodoError::Validation(err) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
            TodoError::NotFound(id) => {
                error_response(StatusCode::NOT_FOUND, format!("todo not found with id {id}"))
            }
            TodoError::Conflict {
                current_version,
                provided_version,
                latest,
            } => (
                StatusCode::CONFLICT,
                Json(json!({
                    "code": StatusCode::CONFLICT.as_u16(),
                    "message": "version conflict: data has been modified by another user",
                    "current_version": current_version,
                    "provided_version": provided_version,
                    "latest_data": *latest,
                })),
            )
                .into_response(),
            TodoError::Storage(err) => {
                tracing::error!(error = %err, "request failed on storage");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

pub struct AppState<S: TodoStore> {
    pub todo_service: Arc<TodoService<S>>,
}

impl<S: TodoStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            todo_service: Arc::clone(&self.todo_service),
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, TodoError> {
    raw.parse::<i64>()
        .map_err(|_| ValidationError::InvalidIdFormat.into())
}

/// Malformed bodies surface as the enveloped 400, not axum's bare rejection.
fn decode_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, TodoError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ValidationError::InvalidBody(rejection.body_text()).into()),
    }
}

pub async fn create_todo<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    body: Result<Json<CreateTodoInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Todo>>, TodoError> {
    let todo = state.todo_service.create(decode_body(body)?).await?;
    Ok(success(todo))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "sort")]
    pub sort_by: String,
}

pub async fn get_todos<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Todo>>>, TodoError> {
    let todos = state
        .todo_service
        .get_all(&params.category, &params.sort_by)
        .await?;
    Ok(success(todos))
}

pub async fn get_todo_by_id<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Todo>>, TodoError> {
    let todo = state.todo_service.get_by_id(parse_id(&id)?).await?;
    Ok(success(todo))
}

pub async fn update_todo<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateTodoInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Todo>>, TodoError> {
    let todo = state
        .todo_service
        .update(parse_id(&id)?, decode_body(body)?)
        .await?;
    Ok(success(todo))
}

pub async fn update_todo_status<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Todo>>, TodoError> {
    let todo = state
        .todo_service
        .update_status(parse_id(&id)?, decode_body(body)?)
        .await?;
    Ok(success(todo))
}

pub async fn delete_todo<S: TodoStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Todo>>, TodoError> {
    state.todo_service.delete(parse_id(&id)?).await?;
    Ok(Json(ApiResponse {
        code: 0,
        message: "Todo deleted successfully".to_string(),
        data: None,
    }))
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

fn api_routes<S: TodoStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/todos", post(create_todo::<S>).get(get_todos::<S>))
        .route(
            "/todos/{id}",
            get(get_todo_by_id::<S>)
                .put(update_todo::<S>)
                .delete(delete_todo::<S>),
        )
        .route("/todos/{id}/status", put(update_todo_status::<S>))
}

/// Builds the full application router with tracing and CORS layers applied.
pub fn app<S: TodoStore + 'static>(todo_service: Arc<TodoService<S>>) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("http_request", method = ?request.method(), uri)
        });

    Router::new()
        .route("/ping", get(ping))
        .nest("/api", api_routes::<S>())
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(AppState { todo_service })
}

pub struct HttpServer {
    router: Router,
    listener: net::TcpListener,
}

impl HttpServer {
    pub async fn new<S: TodoStore + 'static>(
        todo_service: TodoService<S>,
        bind_addr: &str,
    ) -> anyhow::Result<Self> {
        let router = app(Arc::new(todo_service));
        let listener = net::TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to listen on {bind_addr}"))?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router)
            .await
            .context("received error from running server")?;
        Ok(())
    }
}
