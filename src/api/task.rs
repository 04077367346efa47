use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::{
    errors::AppError,
    middleware::auth::CurrentUser,
    models::{
        category::Category,
        task::{end_of_month, NewTask, Task, TaskChanges, TaskStatistics, TaskStatus},
    },
    AppState,
};

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    categories: Vec<i64>,
}

/// Partial update; used for both `PUT` and `PATCH`.
#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    deadline: Option<DateTime<Utc>>,
    categories: Option<Vec<i64>>,
}

pub(crate) fn required_title(title: &str) -> Result<&str, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required"));
    }
    Ok(title)
}

async fn ensure_categories_exist(state: &AppState, ids: &[i64]) -> Result<(), AppError> {
    if Category::missing(&state.db, ids).await?.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest("Unknown category"))
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = required_title(&payload.title)?;
    ensure_categories_exist(&state, &payload.categories).await?;

    let task = Task::create(
        &state.db,
        NewTask {
            title,
            description: payload.description.as_deref(),
            status: payload.status.unwrap_or(TaskStatus::New),
            deadline: payload.deadline.unwrap_or_else(|| end_of_month(Utc::now())),
            owner: owner.id,
            categories: &payload.categories,
        },
    )
    .await?;

    info!(task_id = task.id, owner = owner.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Task>, AppError> {
    Task::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn update_task(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = Task::find_by_id(&state.db, id).await?.ok_or(AppError::NotFound)?;
    caller.ensure_owns(task.owner)?;

    let title = payload.title.as_deref().map(required_title).transpose()?;
    if let Some(categories) = &payload.categories {
        ensure_categories_exist(&state, categories).await?;
    }

    let changes = TaskChanges {
        title,
        description: payload.description.as_deref(),
        status: payload.status,
        deadline: payload.deadline,
        categories: payload.categories.as_deref(),
    };

    Task::update(&state.db, id, changes)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// Anyone may read a task; only its owner may change or delete it.
pub async fn delete_task(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let task = Task::find_by_id(&state.db, id).await?.ok_or(AppError::NotFound)?;
    caller.ensure_owns(task.owner)?;

    Task::delete(&state.db, id).await?;
    info!(task_id = id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_tasks(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(Task::list_by_owner(&state.db, caller.id).await?))
}

pub async fn statistics(State(state): State<AppState>) -> Result<Json<TaskStatistics>, AppError> {
    Ok(Json(Task::statistics(&state.db, Utc::now()).await?))
}
