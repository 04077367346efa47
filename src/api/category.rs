use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    errors::AppError,
    middleware::auth::CurrentUser,
    models::category::{Category, CategoryTaskCount},
    AppState,
};

#[derive(Deserialize)]
pub struct CategoryRequest {
    name: String,
}

impl CategoryRequest {
    fn name(&self) -> Result<&str, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required"));
        }
        Ok(name)
    }
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::BadRequest("A category with this name already exists")
        }
        other => other.into(),
    }
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(Category::list(&state.db).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    Category::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn create_category(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = Category::create(&state.db, payload.name()?)
        .await
        .map_err(duplicate_name)?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    Category::rename(&state.db, id, payload.name()?)
        .await
        .map_err(duplicate_name)?
        .map(Json)
        .ok_or(AppError::NotFound)
}

pub async fn delete_category(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if Category::delete(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// Every category with how many tasks carry it.
pub async fn count_tasks(State(state): State<AppState>) -> Result<Json<Vec<CategoryTaskCount>>, AppError> {
    Ok(Json(Category::count_tasks(&state.db).await?))
}
