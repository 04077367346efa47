use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::models::task::{decode_status, timestamp, TaskStatus};

/// A step of a task. Owned by whoever created it, which need not be the task's owner.
#[derive(Debug, Clone, Serialize)]
pub struct SubTask {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub task: i64,
    pub owner: i64,
}

#[derive(sqlx::FromRow)]
struct SubTaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    status: i64,
    deadline: i64,
    created_at: i64,
    task_id: i64,
    owner_id: i64,
}

impl TryFrom<SubTaskRow> for SubTask {
    type Error = sqlx::Error;

    fn try_from(row: SubTaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: decode_status("subtask", row.id, row.status)?,
            id: row.id,
            title: row.title,
            description: row.description,
            deadline: timestamp(row.deadline),
            created_at: timestamp(row.created_at),
            task: row.task_id,
            owner: row.owner_id,
        })
    }
}

pub struct NewSubTask<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub task: i64,
    pub owner: i64,
}

#[derive(Default)]
pub struct SubTaskChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

const SUBTASK_COLUMNS: &str = "id, title, description, status, deadline, created_at, task_id, owner_id";

impl SubTask {
    pub async fn create(pool: &SqlitePool, new: NewSubTask<'_>) -> Result<SubTask, sqlx::Error> {
        sqlx::query_as::<_, SubTaskRow>(&format!(
            "INSERT INTO subtasks (title, description, status, deadline, created_at, task_id, owner_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {SUBTASK_COLUMNS}"
        ))
        .bind(new.title)
        .bind(new.description)
        .bind(i64::from(new.status))
        .bind(new.deadline.timestamp())
        .bind(Utc::now().timestamp())
        .bind(new.task)
        .bind(new.owner)
        .fetch_one(pool)
        .await?
        .try_into()
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<SubTask>, sqlx::Error> {
        sqlx::query_as::<_, SubTaskRow>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(SubTask::try_from)
        .transpose()
    }

    pub async fn list_by_owner(pool: &SqlitePool, owner: i64) -> Result<Vec<SubTask>, sqlx::Error> {
        sqlx::query_as::<_, SubTaskRow>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(SubTask::try_from)
        .collect()
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        changes: SubTaskChanges<'_>,
    ) -> Result<Option<SubTask>, sqlx::Error> {
        sqlx::query_as::<_, SubTaskRow>(&format!(
            "UPDATE subtasks SET \
               title = COALESCE(?, title), \
               description = COALESCE(?, description), \
               status = COALESCE(?, status), \
               deadline = COALESCE(?, deadline) \
             WHERE id = ? RETURNING {SUBTASK_COLUMNS}"
        ))
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.status.map(i64::from))
        .bind(changes.deadline.map(|deadline| deadline.timestamp()))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(SubTask::try_from)
        .transpose()
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
