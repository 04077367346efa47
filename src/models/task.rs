use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TaskStatus {
    New = 1,
    InProgress = 2,
    Pending = 3,
    Blocked = 4,
    Done = 5,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::New => "New",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Pending => "Pending",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Done => "Done",
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TaskStatus::New),
            2 => Ok(TaskStatus::InProgress),
            3 => Ok(TaskStatus::Pending),
            4 => Ok(TaskStatus::Blocked),
            5 => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status {other}")),
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> Self {
        status as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub owner: i64,
    pub categories: Vec<i64>,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    status: i64,
    deadline: i64,
    created_at: i64,
    owner_id: i64,
}

impl TaskRow {
    fn into_task(self, categories: Vec<i64>) -> Result<Task, sqlx::Error> {
        Ok(Task {
            status: decode_status("task", self.id, self.status)?,
            id: self.id,
            title: self.title,
            description: self.description,
            deadline: timestamp(self.deadline),
            created_at: timestamp(self.created_at),
            owner: self.owner_id,
            categories,
        })
    }
}

pub struct NewTask<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub owner: i64,
    pub categories: &'a [i64],
}

/// Fields left as `None` keep their stored value.
#[derive(Default)]
pub struct TaskChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
    /// Replaces the whole category set when present.
    pub categories: Option<&'a [i64]>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub tasks_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskStatistics {
    pub tasks: i64,
    pub tasks_by_status: Vec<StatusCount>,
    pub tasks_lt_now: i64,
}

/// Stored status codes outside 1..=5 fail the read instead of being guessed.
pub(crate) fn decode_status(kind: &'static str, id: i64, raw: i64) -> Result<TaskStatus, sqlx::Error> {
    TaskStatus::try_from(raw).map_err(|reason| {
        warn!(kind, id, %reason, "stored row has an unknown status");
        sqlx::Error::Decode(reason.into())
    })
}

pub(crate) fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Midnight (UTC) at the start of the last day of the month containing `now`.
pub fn end_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or_default();
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    Utc.from_utc_datetime(&last.and_hms_opt(0, 0, 0).unwrap_or_default())
}

const TASK_COLUMNS: &str = "id, title, description, status, deadline, created_at, owner_id";

async fn category_ids(pool: &SqlitePool, task_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT category_id FROM task_categories WHERE task_id = ? ORDER BY category_id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}

async fn replace_categories(
    conn: &mut SqliteConnection,
    task_id: i64,
    categories: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM task_categories WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    for category_id in categories {
        sqlx::query("INSERT OR IGNORE INTO task_categories (task_id, category_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

impl Task {
    async fn hydrate(pool: &SqlitePool, row: TaskRow) -> Result<Task, sqlx::Error> {
        let categories = category_ids(pool, row.id).await?;
        row.into_task(categories)
    }

    pub async fn create(pool: &SqlitePool, new: NewTask<'_>) -> Result<Task, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks (title, description, status, deadline, created_at, owner_id) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {TASK_COLUMNS}"
        ))
        .bind(new.title)
        .bind(new.description)
        .bind(i64::from(new.status))
        .bind(new.deadline.timestamp())
        .bind(Utc::now().timestamp())
        .bind(new.owner)
        .fetch_one(&mut *tx)
        .await?;

        replace_categories(&mut tx, row.id, new.categories).await?;
        tx.commit().await?;

        Self::hydrate(pool, row).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Task>, sqlx::Error> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Self::hydrate(pool, row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list_by_owner(pool: &SqlitePool, owner: i64) -> Result<Vec<Task>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(pool)
        .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(Self::hydrate(pool, row).await?);
        }
        Ok(tasks)
    }

    /// `Ok(None)` when the task does not exist.
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        changes: TaskChanges<'_>,
    ) -> Result<Option<Task>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks SET \
               title = COALESCE(?, title), \
               description = COALESCE(?, description), \
               status = COALESCE(?, status), \
               deadline = COALESCE(?, deadline) \
             WHERE id = ? RETURNING {TASK_COLUMNS}"
        ))
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.status.map(i64::from))
        .bind(changes.deadline.map(|deadline| deadline.timestamp()))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(categories) = changes.categories {
            replace_categories(&mut tx, row.id, categories).await?;
        }
        tx.commit().await?;

        Self::hydrate(pool, row).await.map(Some)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn statistics(pool: &SqlitePool, now: DateTime<Utc>) -> Result<TaskStatistics, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&mut *tx)
            .await?;

        let by_status: Vec<(i64, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status ORDER BY status")
                .fetch_all(&mut *tx)
                .await?;

        let tasks_lt_now: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE deadline < ?")
            .bind(now.timestamp())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let tasks_by_status = by_status
            .into_iter()
            .filter_map(|(status, count)| match TaskStatus::try_from(status) {
                Ok(status) => Some(StatusCount {
                    status: status.label(),
                    tasks_count: count,
                }),
                Err(reason) => {
                    warn!(%reason, count, "skipping unknown status in statistics");
                    None
                }
            })
            .collect();

        Ok(TaskStatistics {
            tasks,
            tasks_by_status,
            tasks_lt_now,
        })
    }
}
