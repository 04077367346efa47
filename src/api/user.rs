use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    errors::AppError,
    middleware::auth::{CurrentUser, MaybeUser},
    AppState,
};

#[derive(Serialize)]
pub struct UserResponse {
    id: i64,
    username: String,
    email: String,
}

#[derive(Serialize)]
pub struct Message {
    message: String,
}

pub async fn hello(MaybeUser(identity): MaybeUser) -> Json<Message> {
    let name = identity.map_or_else(|| "World".to_string(), |identity| identity.username);
    Json(Message {
        message: format!("Hello, {name}!"),
    })
}

pub async fn get_current_user(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    // the account may have been removed after the token was issued
    let user = state
        .auth
        .find_identity(current_user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}
