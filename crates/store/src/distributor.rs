//! SQLite-backed durable distributor store.
//!
//! A completed task is inserted once per `(source_id, task_id)`; a
//! second save for the same key is reported as `Error::Duplicate`
//! rather than overwritten, so the first recorded result always wins.

use async_trait::async_trait;
use orchestrator_common::config::DistributorConfig;
use orchestrator_common::error::{Error, Result};
use orchestrator_common::types::{Record, SourceId, Task, TaskId};
use orchestrator_core::distributor::{Distributor, ResultPage};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use std::time::Duration;
use tracing::{instrument, warn};

pub struct SqliteDistributor {
    pool: SqlitePool,
}

impl SqliteDistributor {
    pub async fn connect(cfg: &DistributorConfig) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", cfg.db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs_f64(cfg.connect_timeout_secs))
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(&format!("PRAGMA busy_timeout={}", cfg.busy_timeout_ms))
            .execute(&pool)
            .await?;

        let distributor = Self { pool };
        distributor.init_schema().await?;
        Ok(distributor)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                source_id INTEGER NOT NULL,
                task_id INTEGER NOT NULL,
                ctime REAL NOT NULL,
                json TEXT NOT NULL,
                PRIMARY KEY (source_id, task_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_ctime ON records(ctime)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(FromRow)]
struct RecordRow {
    source_id: i64,
    task_id: i64,
    ctime: f64,
    json: String,
}

impl RecordRow {
    fn into_record(self) -> Result<Record> {
        Ok(Record {
            source_id: self.source_id,
            task_id: self.task_id,
            ctime: self.ctime,
            payload: serde_json::from_str(&self.json)?,
        })
    }
}

#[async_trait]
impl Distributor for SqliteDistributor {
    #[instrument(skip(self, task), fields(source_id = task.source_id, task_id = task.task_id))]
    async fn save(&self, task: &Task) -> Result<()> {
        let ctime = task.total_end_time().unwrap_or(task.total_start_time().unwrap_or(0.0));
        let json = serde_json::to_string(task)?;

        let result = sqlx::query("INSERT INTO records (source_id, task_id, ctime, json) VALUES (?, ?, ?, ?)")
            .bind(task.source_id)
            .bind(task.task_id)
            .bind(ctime)
            .bind(json)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!(
                    source_id = task.source_id,
                    task_id = task.task_id,
                    "duplicate distributor save ignored"
                );
                Err(Error::Duplicate(format!(
                    "source_id={}, task_id={}",
                    task.source_id, task.task_id
                )))
            }
            Err(err) => Err(Error::Store(err)),
        }
    }

    async fn query_since(&self, cursor: f64, limit: usize) -> Result<ResultPage> {
        let rows: Vec<RecordRow> = if limit == 0 {
            sqlx::query_as("SELECT source_id, task_id, ctime, json FROM records WHERE ctime > ? ORDER BY ctime ASC")
                .bind(cursor)
                .fetch_all(&self.pool)
                .await?
        } else {
            let mut rows: Vec<RecordRow> = sqlx::query_as(
                "SELECT source_id, task_id, ctime, json FROM records WHERE ctime > ? ORDER BY ctime DESC LIMIT ?",
            )
            .bind(cursor)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            rows.reverse();
            rows
        };

        let new_cursor = rows.last().map(|r| r.ctime).unwrap_or(cursor);
        let records = rows.into_iter().map(RecordRow::into_record).collect::<Result<Vec<_>>>()?;

        Ok(ResultPage {
            records,
            cursor: new_cursor,
        })
    }

    async fn query_all(&self) -> Result<Vec<Record>> {
        let rows: Vec<RecordRow> =
            sqlx::query_as("SELECT source_id, task_id, ctime, json FROM records ORDER BY source_id, task_id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM records").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_common::types::{Dag, PriorityCoefficients};

    async fn test_distributor() -> SqliteDistributor {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let distributor = SqliteDistributor { pool };
        distributor.init_schema().await.unwrap();
        distributor
    }

    fn sample_task(source_id: SourceId, task_id: TaskId, ctime: f64) -> Task {
        let mut task = Task::new(
            source_id,
            task_id,
            Dag::new(),
            Default::default(),
            Default::default(),
            "chunk.bin".to_string(),
            0,
            PriorityCoefficients::default(),
        );
        task.record_timestamp(orchestrator_common::types::TAG_TOTAL, false, ctime);
        task.record_timestamp(orchestrator_common::types::TAG_TOTAL, true, ctime);
        task
    }

    #[tokio::test]
    async fn saving_twice_reports_duplicate_and_keeps_first() {
        let distributor = test_distributor().await;
        distributor.save(&sample_task(1, 1, 1.0)).await.unwrap();
        let err = distributor.save(&sample_task(1, 1, 2.0)).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));

        let all = distributor.query_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].ctime, 1.0);
    }

    #[tokio::test]
    async fn query_since_returns_oldest_first_and_advances_cursor() {
        let distributor = test_distributor().await;
        for i in 1..=5 {
            distributor.save(&sample_task(1, i, f64::from(i as i32))).await.unwrap();
        }

        let page = distributor.query_since(0.0, 2).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].task_id, 1);
        assert_eq!(page.records[1].task_id, 2);
        assert_eq!(page.cursor, 2.0);

        let next = distributor.query_since(page.cursor, 2).await.unwrap();
        assert_eq!(next.records[0].task_id, 3);
        assert_eq!(next.records[1].task_id, 4);
    }

    #[tokio::test]
    async fn query_since_with_no_new_records_keeps_cursor() {
        let distributor = test_distributor().await;
        distributor.save(&sample_task(1, 1, 1.0)).await.unwrap();

        let page = distributor.query_since(5.0, 10).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.cursor, 5.0);
    }

    #[tokio::test]
    async fn clear_removes_every_record() {
        let distributor = test_distributor().await;
        distributor.save(&sample_task(1, 1, 1.0)).await.unwrap();
        distributor.clear().await.unwrap();
        assert!(distributor.query_all().await.unwrap().is_empty());
    }
}
