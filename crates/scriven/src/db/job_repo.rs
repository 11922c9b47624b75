//! Job repository — CRUD and lifecycle mutations for the `jobs` table.
//!
//! Full-row `update` is last-write-wins; the execution engine uses the
//! targeted mutation helpers so terminal writes never clobber fields they
//! do not own (a failure write must not touch `progress`).

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::job::{Job, JobOptions, JobStatus, JobType};

use super::{Database, DatabaseError};

fn from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        id: row.get("id")?,
        job_type: row.get("job_type")?,
        status: row.get("status")?,
        input_file: row.get("input_file")?,
        output_file: row.get("output_file")?,
        options: JobOptions {
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            enable_timestamp: row.get("enable_timestamp")?,
            enable_chunked: row.get("enable_chunked")?,
            chunk_length: row.get("chunk_length")?,
            translate_to: row.get("translate_to")?,
            enhancement_prompt: row.get("enhancement_prompt")?,
            auto_enhance: row.get("auto_enhance")?,
        },
        progress: row.get("progress")?,
        error_message: row.get("error_message")?,
        archived: row.get("archived")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    /// Archived jobs are hidden unless this is set.
    pub include_archived: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row and returns its assigned id.
pub fn insert(db: &Database, job: &Job) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_type, status, input_file, output_file, start_time, end_time,
             enable_timestamp, enable_chunked, chunk_length, translate_to, enhancement_prompt,
             auto_enhance, progress, error_message, archived, created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                job.job_type,
                job.status,
                job.input_file,
                job.output_file,
                job.options.start_time,
                job.options.end_time,
                job.options.enable_timestamp,
                job.options.enable_chunked,
                job.options.chunk_length,
                job.options.translate_to,
                job.options.enhancement_prompt,
                job.options.auto_enhance,
                job.progress,
                job.error_message,
                job.archived,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a job by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Job>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Updates an existing job row. All fields except `id` and `created_at`
/// are overwritten (last-write-wins, no field-level merge).
pub fn update(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET job_type=?2, status=?3, input_file=?4, output_file=?5,
             start_time=?6, end_time=?7, enable_timestamp=?8, enable_chunked=?9,
             chunk_length=?10, translate_to=?11, enhancement_prompt=?12, auto_enhance=?13,
             progress=?14, error_message=?15, archived=?16, started_at=?17, completed_at=?18
             WHERE id=?1",
            params![
                job.id,
                job.job_type,
                job.status,
                job.input_file,
                job.output_file,
                job.options.start_time,
                job.options.end_time,
                job.options.enable_timestamp,
                job.options.enable_chunked,
                job.options.chunk_length,
                job.options.translate_to,
                job.options.enhancement_prompt,
                job.options.auto_enhance,
                job.progress,
                job.error_message,
                job.archived,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Queries jobs with filters, returning (rows, total count ignoring
/// pagination), newest first.
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<Job>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(job_type) = filter.job_type {
            conditions.push(format!("job_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(job_type));
        }
        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status));
        }
        if !filter.include_archived {
            conditions.push("archived = 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<Job> = stmt
            .query_map(params_ref.as_slice(), from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Returns all jobs currently in the given status.
pub fn find_by_status(db: &Database, status: JobStatus) -> Result<Vec<Job>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE status = ?1 ORDER BY id")?;
        let rows: Vec<Job> = stmt
            .query_map(params![status], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// PENDING → PROCESSING: records the attempt start and resets progress.
/// Claims a PENDING job for execution. The status guard makes the claim
/// atomic: of two slots racing on the same id, exactly one sees `true`.
pub fn mark_processing(
    db: &Database,
    id: i64,
    started_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, started_at = ?3, progress = 0
             WHERE id = ?1 AND status = ?4",
            params![id, JobStatus::Processing, started_at, JobStatus::Pending],
        )?;
        Ok(changed > 0)
    })
}

/// Persists a job-level progress percentage.
pub fn update_progress(db: &Database, id: i64, progress: f64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET progress = ?2 WHERE id = ?1",
            params![id, progress],
        )?;
        Ok(())
    })
}

/// Records the produced artifact path.
pub fn set_output(db: &Database, id: i64, output_file: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET output_file = ?2 WHERE id = ?1",
            params![id, output_file],
        )?;
        Ok(())
    })
}

/// The single terminal success write: COMPLETED, progress 100,
/// completion timestamp.
pub fn mark_completed(
    db: &Database,
    id: i64,
    completed_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, progress = 100, completed_at = ?3 WHERE id = ?1",
            params![id, JobStatus::Completed, completed_at],
        )?;
        Ok(())
    })
}

/// The terminal failure write. Progress is left at its last value;
/// `output_file` is cleared so that only COMPLETED jobs carry one.
pub fn mark_failed(
    db: &Database,
    id: i64,
    error_message: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, error_message = ?3, completed_at = ?4,
             output_file = NULL WHERE id = ?1",
            params![id, JobStatus::Failed, error_message, completed_at],
        )?;
        Ok(())
    })
}

/// Sets or clears the archived flag. Returns false if the job does not exist.
pub fn set_archived(db: &Database, id: i64, archived: bool) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET archived = ?2 WHERE id = ?1",
            params![id, archived],
        )?;
        Ok(changed > 0)
    })
}

/// Deletes a job row. Returns false if the row was already gone.
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
