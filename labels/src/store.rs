// SPDX-License-Identifier: CC0-1.0

//! Transactional persistence for labels and jobs. Writes commit on scope
//! exit and roll back on error; reads go straight through the pool.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::model::{AddressLabel, AnalysisJob, JobStatus, LabelCategory};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Handle to the `address_labels` / `analysis_jobs` store. Cheap to clone;
/// wraps a connection pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (creating if missing) the SQLite database at `database_url`
    /// and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn put_label(
        &self,
        address: &str,
        label: &str,
        category: LabelCategory,
        notes: Option<&str>,
    ) -> Result<AddressLabel, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO address_labels (address, label, category, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(address) DO UPDATE SET
                label = excluded.label, category = excluded.category,
                notes = excluded.notes, updated_at = excluded.updated_at",
        )
        .bind(address)
        .bind(label)
        .bind(category.as_str())
        .bind(notes)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.get_label(address)
            .await?
            .ok_or_else(|| StoreError::CorruptRow(format!("label for {address} missing after write")))
    }

    pub async fn get_label(&self, address: &str) -> Result<Option<AddressLabel>, StoreError> {
        let row = sqlx::query(
            "SELECT address, label, category, notes, created_at, updated_at FROM address_labels WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_label).transpose()
    }

    pub async fn list_labels(&self) -> Result<Vec<AddressLabel>, StoreError> {
        let rows = sqlx::query(
            "SELECT address, label, category, notes, created_at, updated_at FROM address_labels ORDER BY address",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_label).collect()
    }

    /// Returns `true` if a label existed and was removed.
    pub async fn delete_label(&self, address: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM address_labels WHERE address = ?")
            .bind(address)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_job(&self, job_type: &str, params: serde_json::Value) -> Result<AnalysisJob, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO analysis_jobs (id, job_type, params, status, result, error, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, NULL, ?, ?)",
        )
        .bind(id.to_string())
        .bind(job_type)
        .bind(params.to_string())
        .bind(JobStatus::Pending.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.get_job(id)
            .await?
            .ok_or_else(|| StoreError::CorruptRow(format!("job {id} missing after write")))
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<AnalysisJob>, StoreError> {
        let row = sqlx::query(
            "SELECT id, job_type, params, status, result, error, created_at, updated_at
             FROM analysis_jobs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_job).transpose()
    }

    /// Advisory cancellation: flips status to `cancelled` only if the job
    /// has not already finished. The engine honours this at its next
    /// suspension point, not immediately.
    pub async fn cancel_job(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE analysis_jobs SET status = ?, updated_at = ?
             WHERE id = ? AND status IN ('pending', 'running')",
        )
        .bind(JobStatus::Cancelled.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claims the oldest `pending` job, if any, flipping it to
    /// `running` in the same transaction so two indexer ticks never race on
    /// the same row.
    pub async fn claim_next_pending(&self) -> Result<Option<AnalysisJob>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT id, job_type, params, status, result, error, created_at, updated_at
             FROM analysis_jobs WHERE status = 'pending' ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let job = row_to_job(row)?;
        sqlx::query("UPDATE analysis_jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(JobStatus::Running.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(job.id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(AnalysisJob { status: JobStatus::Running, ..job }))
    }

    pub async fn start_job(&self, id: Uuid) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Running, None, None).await
    }

    pub async fn complete_job(&self, id: Uuid, result: serde_json::Value) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Completed, Some(result), None).await
    }

    pub async fn fail_job(&self, id: Uuid, error: String) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Failed, None, Some(error)).await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE analysis_jobs SET status = ?, result = ?, error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(result.map(|v| v.to_string()))
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn row_to_label(row: sqlx::sqlite::SqliteRow) -> Result<AddressLabel, StoreError> {
    let created_at = row
        .try_get::<String, _>("created_at")?
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("created_at: {e}")))?;
    let updated_at = row
        .try_get::<String, _>("updated_at")?
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("updated_at: {e}")))?;
    let category_str = row.try_get::<String, _>("category")?;
    let category = LabelCategory::parse(&category_str)
        .ok_or_else(|| StoreError::CorruptRow(format!("unknown label category: {category_str}")))?;
    Ok(AddressLabel {
        address: row.try_get("address")?,
        label: row.try_get("label")?,
        category,
        notes: row.try_get("notes")?,
        created_at,
        updated_at,
    })
}

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> Result<AnalysisJob, StoreError> {
    let id = row
        .try_get::<String, _>("id")?
        .parse()
        .map_err(|e: uuid::Error| StoreError::CorruptRow(format!("id: {e}")))?;
    let status_str = row.try_get::<String, _>("status")?;
    let status = JobStatus::parse(&status_str)
        .ok_or_else(|| StoreError::CorruptRow(format!("unknown job status: {status_str}")))?;
    let params = serde_json::from_str(&row.try_get::<String, _>("params")?)
        .map_err(|e| StoreError::CorruptRow(format!("params: {e}")))?;
    let result = row
        .try_get::<Option<String>, _>("result")?
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::CorruptRow(format!("result: {e}")))?;
    let created_at = row
        .try_get::<String, _>("created_at")?
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("created_at: {e}")))?;
    let updated_at = row
        .try_get::<String, _>("updated_at")?
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("updated_at: {e}")))?;
    Ok(AnalysisJob {
        id,
        job_type: row.try_get("job_type")?,
        params,
        status,
        result,
        error: row.try_get("error")?,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        Store::connect("sqlite::memory:").await.expect("connect to in-memory sqlite")
    }

    #[tokio::test]
    async fn put_then_get_label_round_trips() {
        let store = memory_store().await;
        store.put_label("bc1qexample", "my cold wallet", LabelCategory::Personal, None).await.unwrap();
        let label = store.get_label("bc1qexample").await.unwrap().expect("label present");
        assert_eq!(label.label, "my cold wallet");
        assert_eq!(label.category, LabelCategory::Personal);
    }

    #[tokio::test]
    async fn put_label_upserts() {
        let store = memory_store().await;
        store.put_label("bc1qexample", "first", LabelCategory::Other, None).await.unwrap();
        store
            .put_label("bc1qexample", "second", LabelCategory::Exchange, Some("kraken deposit"))
            .await
            .unwrap();
        let labels = store.list_labels().await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, "second");
        assert_eq!(labels[0].category, LabelCategory::Exchange);
        assert_eq!(labels[0].notes.as_deref(), Some("kraken deposit"));
    }

    #[tokio::test]
    async fn delete_label_reports_whether_it_existed() {
        let store = memory_store().await;
        assert!(!store.delete_label("bc1qnope").await.unwrap());
        store.put_label("bc1qexample", "label", LabelCategory::Other, None).await.unwrap();
        assert!(store.delete_label("bc1qexample").await.unwrap());
        assert!(store.get_label("bc1qexample").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn job_lifecycle_pending_to_completed() {
        let store = memory_store().await;
        let job = store.create_job("trace_forward", serde_json::json!({"txid": "ab"})).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        store.start_job(job.id).await.unwrap();
        let running = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);

        store.complete_job(job.id, serde_json::json!({"nodes": []})).await.unwrap();
        let done = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.result.is_some());
    }

    #[tokio::test]
    async fn cancel_is_a_noop_once_completed() {
        let store = memory_store().await;
        let job = store.create_job("trace_forward", serde_json::json!({})).await.unwrap();
        store.complete_job(job.id, serde_json::json!({})).await.unwrap();
        assert!(!store.cancel_job(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn claim_next_pending_picks_oldest_and_marks_running() {
        let store = memory_store().await;
        let first = store.create_job("trace_forward", serde_json::json!({"n": 1})).await.unwrap();
        let _second = store.create_job("trace_forward", serde_json::json!({"n": 2})).await.unwrap();

        let claimed = store.claim_next_pending().await.unwrap().expect("one pending job");
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);

        let reread = store.get_job(first.id).await.unwrap().unwrap();
        assert_eq!(reread.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn claim_next_pending_is_none_when_queue_is_empty() {
        let store = memory_store().await;
        assert!(store.claim_next_pending().await.unwrap().is_none());
    }
}
