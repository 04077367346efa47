use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

pub async fn create_db_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // In-memory databases are per connection, so they get exactly one.
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        MAX_CONNECTIONS
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("database ready");
    Ok(pool)
}
