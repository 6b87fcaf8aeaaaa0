//! Session record persistence
//!
//! Each write updates only the columns it names, preserving the rest of the
//! row. The claim is the single-flight guard for a session: one guarded
//! upsert that both rejects concurrent starts and applies the restart-reset
//! contract, replacing the racy read-then-write check the service
//! historically performed.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{FileTimestamps, SessionRecord, SessionStatus};

/// Atomically claim a session for a new run.
///
/// Inserts the row as IN_PROGRESS. When a row exists and is not currently
/// IN_PROGRESS, it is flipped back to IN_PROGRESS and the transient fields
/// (`end`, `total`, `progress`, `current`, `error`) reset to NULL. Returns
/// `false` when the session is already running; under concurrent start
/// requests exactly one caller wins.
///
/// `timestamps` and `total_length` from a prior run are left in place until
/// the next successful completion overwrites them.
pub async fn claim_session(
    pool: &SqlitePool,
    session_id: &str,
    start: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (session_id, status, start)
        VALUES (?, 'IN_PROGRESS', ?)
        ON CONFLICT(session_id) DO UPDATE SET
            status = 'IN_PROGRESS',
            start = excluded.start,
            "end" = NULL,
            total = NULL,
            progress = NULL,
            current = NULL,
            error = NULL
        WHERE sessions.status != 'IN_PROGRESS'
        "#,
    )
    .bind(session_id)
    .bind(start.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record the matched pair count at the start of a run.
pub async fn set_total(
    pool: &SqlitePool,
    session_id: &str,
    total: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET total = ?, progress = 0 WHERE session_id = ?")
        .bind(total as i64)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the audio file currently being processed.
pub async fn set_current(
    pool: &SqlitePool,
    session_id: &str,
    audio_file: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET current = ? WHERE session_id = ?")
        .bind(audio_file)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record pairs completed so far.
pub async fn set_progress(
    pool: &SqlitePool,
    session_id: &str,
    progress: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET progress = ? WHERE session_id = ?")
        .bind(progress as i64)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Terminal failure write: status plus the error message observers read.
pub async fn mark_failed(
    pool: &SqlitePool,
    session_id: &str,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET status = 'FAILED', error = ? WHERE session_id = ?")
        .bind(error)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Terminal success write: full result list, end time, aggregate duration.
pub async fn mark_done(
    pool: &SqlitePool,
    session_id: &str,
    end: DateTime<Utc>,
    total_length: f64,
    timestamps: &[FileTimestamps],
) -> Result<(), sqlx::Error> {
    let timestamps_json = serde_json::to_string(timestamps)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        UPDATE sessions
        SET status = 'DONE', "end" = ?, total_length = ?, timestamps = ?
        WHERE session_id = ?
        "#,
    )
    .bind(end.to_rfc3339())
    .bind(total_length)
    .bind(timestamps_json)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a session record. `None` when the session has never been started.
pub async fn load_session(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Option<SessionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT session_id, status, start, "end", total, progress,
               current, error, timestamps, total_length
        FROM sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_str: String = row.get("status");
    let status = SessionStatus::parse(&status_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("Unknown session status: {}", status_str).into())
    })?;

    let timestamps_json: String = row.get("timestamps");
    let timestamps: Vec<FileTimestamps> = serde_json::from_str(&timestamps_json)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Some(SessionRecord {
        session_id: row.get("session_id"),
        status,
        start: parse_timestamp(row.get("start"))?,
        end: parse_timestamp(row.get("end"))?,
        total: row.get("total"),
        progress: row.get("progress"),
        current: row.get("current"),
        error: row.get("error"),
        timestamps,
        total_length: row.get("total_length"),
    }))
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
}
