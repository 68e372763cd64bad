use sqlx::{PgPool, Row};

use crate::models::job::JobStatusRow;

/// Get the status row for a task, if the pipeline has written one.
pub async fn get_task_status(
    pool: &PgPool,
    task_uuid: &str,
) -> Result<Option<JobStatusRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT task_uuid, status, result_url, error_message, updated_at
        FROM video_tasks
        WHERE task_uuid = $1
        "#,
    )
    .bind(task_uuid)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(JobStatusRow {
            task_uuid: r.try_get("task_uuid")?,
            status: r.try_get("status")?,
            result_url: r.try_get("result_url")?,
            error_message: r.try_get("error_message")?,
            updated_at: r.try_get("updated_at")?,
        })
    })
    .transpose()
}

/// Insert or update a task's status row. The trigger on `video_tasks`
/// publishes the new row to listeners.
pub async fn upsert_task_status(
    pool: &PgPool,
    task_uuid: &str,
    user_id: Option<&str>,
    status: &str,
    result_url: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO video_tasks (task_uuid, user_id, status, result_url, error_message)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (task_uuid) DO UPDATE
        SET status = EXCLUDED.status,
            result_url = EXCLUDED.result_url,
            error_message = EXCLUDED.error_message
        "#,
    )
    .bind(task_uuid)
    .bind(user_id)
    .bind(status)
    .bind(result_url)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}
