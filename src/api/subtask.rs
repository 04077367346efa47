use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    api::task::required_title,
    errors::AppError,
    middleware::auth::CurrentUser,
    models::{
        subtask::{NewSubTask, SubTask, SubTaskChanges},
        task::{end_of_month, Task, TaskStatus},
    },
    AppState,
};

#[derive(Deserialize)]
pub struct CreateSubTaskRequest {
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    deadline: Option<DateTime<Utc>>,
    task: i64,
}

#[derive(Deserialize)]
pub struct UpdateSubTaskRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    deadline: Option<DateTime<Utc>>,
}

pub async fn create_subtask(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Json(payload): Json<CreateSubTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = required_title(&payload.title)?;
    if !Task::exists(&state.db, payload.task).await? {
        return Err(AppError::BadRequest("Unknown task"));
    }

    let subtask = SubTask::create(
        &state.db,
        NewSubTask {
            title,
            description: payload.description.as_deref(),
            status: payload.status.unwrap_or(TaskStatus::New),
            deadline: payload.deadline.unwrap_or_else(|| end_of_month(Utc::now())),
            task: payload.task,
            owner: owner.id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(subtask)))
}

pub async fn get_subtask(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SubTask>, AppError> {
    SubTask::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn update_subtask(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubTaskRequest>,
) -> Result<Json<SubTask>, AppError> {
    let subtask = SubTask::find_by_id(&state.db, id).await?.ok_or(AppError::NotFound)?;
    caller.ensure_owns(subtask.owner)?;

    let changes = SubTaskChanges {
        title: payload.title.as_deref().map(required_title).transpose()?,
        description: payload.description.as_deref(),
        status: payload.status,
        deadline: payload.deadline,
    };

    SubTask::update(&state.db, id, changes)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let subtask = SubTask::find_by_id(&state.db, id).await?.ok_or(AppError::NotFound)?;
    caller.ensure_owns(subtask.owner)?;

    SubTask::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_subtasks(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<SubTask>>, AppError> {
    Ok(Json(SubTask::list_by_owner(&state.db, caller.id).await?))
}
