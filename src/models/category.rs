use serde::Serialize;
use sqlx::SqlitePool;

/// A tag that tasks can carry. Names are unique regardless of case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CategoryTaskCount {
    pub category_id: i64,
    pub category_name: String,
    pub task_count: i64,
}

impl Category {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name, id")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A name already taken (ignoring case) surfaces as a unique-constraint violation.
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name) VALUES (?) RETURNING id, name")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("UPDATE categories SET name = ? WHERE id = ? RETURNING id, name")
            .bind(name)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Returns whether a row was removed. Task links go with it.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The ids in `ids` that name no category.
    pub async fn missing(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        let mut missing = Vec::new();
        for &id in ids {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)")
                .bind(id)
                .fetch_one(pool)
                .await?;
            if !exists {
                missing.push(id);
            }
        }
        Ok(missing)
    }

    /// Every category with the number of tasks tagged with it, zero included.
    pub async fn count_tasks(pool: &SqlitePool) -> Result<Vec<CategoryTaskCount>, sqlx::Error> {
        sqlx::query_as::<_, CategoryTaskCount>(
            r#"
            SELECT c.id AS category_id, c.name AS category_name, COUNT(tc.task_id) AS task_count
            FROM categories c
            LEFT JOIN task_categories tc ON tc.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.name, c.id
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
