use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod tests;

use config::AppConfig;
use middleware::cookie_auth::jwt_cookie_interceptor;
use services::{
    auth_service::{AuthError, AuthService},
    cookie_service::CookieService,
    jwt_service::JwtService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub cookies: CookieService,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &AppConfig) -> Result<Self, AuthError> {
        Ok(Self {
            jwt: JwtService::new(&config.secret_key, config.lifetimes),
            auth: AuthService::new(db.clone(), config.bcrypt_cost)?,
            cookies: CookieService::new(config.secure_cookies),
            db,
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    // Create a CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The cookie interceptor sits inside the cookie manager so the rotated
    // access cookie is flushed into the response.
    Router::new()
        .route("/", get(api::user::hello))
        .route("/api/signup", post(api::auth::signup))
        .route("/api/signin", post(api::auth::signin))
        .route("/api/signout", get(api::auth::signout).post(api::auth::signout))
        .route("/api/me", get(api::user::get_current_user))
        .route("/api/tasks", post(api::task::create_task))
        .route("/api/tasks/mine", get(api::task::my_tasks))
        .route("/api/tasks/statistics", get(api::task::statistics))
        .route(
            "/api/tasks/{id}",
            get(api::task::get_task)
                .put(api::task::update_task)
                .patch(api::task::update_task)
                .delete(api::task::delete_task),
        )
        .route("/api/subtasks", post(api::subtask::create_subtask))
        .route("/api/subtasks/mine", get(api::subtask::my_subtasks))
        .route(
            "/api/subtasks/{id}",
            get(api::subtask::get_subtask)
                .put(api::subtask::update_subtask)
                .patch(api::subtask::update_subtask)
                .delete(api::subtask::delete_subtask),
        )
        .route(
            "/api/categories",
            get(api::category::list_categories).post(api::category::create_category),
        )
        .route("/api/categories/count_tasks", get(api::category::count_tasks))
        .route(
            "/api/categories/{id}",
            get(api::category::get_category)
                .put(api::category::update_category)
                .patch(api::category::update_category)
                .delete(api::category::delete_category),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_cookie_interceptor,
        ))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskboard=debug,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;

    // Initialize database
    let pool = db::create_db_pool(&config.database_url).await?;

    // Create the router
    let state = AppState::new(pool, &config)?;
    let app = create_router(state);

    // run it with hyper
    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
