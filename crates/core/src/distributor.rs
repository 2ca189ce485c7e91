//! Durable distributor store contract.

use async_trait::async_trait;
use orchestrator_common::error::Result;
use orchestrator_common::types::{Record, Task};

/// A page of records returned by an incremental poll, plus the cursor
/// to resume from on the next call.
#[derive(Debug, Clone)]
pub struct ResultPage {
    pub records: Vec<Record>,
    pub cursor: f64,
}

/// Durable, at-least-once store for completed tasks, keyed by
/// `(source_id, task_id)`.
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Persist `task`. A pre-existing row for the same key is kept
    /// as-is and the write is reported via `Error::Duplicate` rather
    /// than silently overwriting it.
    async fn save(&self, task: &Task) -> Result<()>;

    /// Returns the oldest `limit` records with `ctime > cursor`, along
    /// with the new cursor (the `ctime` of the last record returned, or
    /// `cursor` unchanged if nothing matched). `limit == 0` returns all
    /// matching records.
    async fn query_since(&self, cursor: f64, limit: usize) -> Result<ResultPage>;

    /// All records ordered by `(source_id, task_id)`.
    async fn query_all(&self) -> Result<Vec<Record>>;

    /// Drop every record and reinitialize the schema.
    async fn clear(&self) -> Result<()>;
}
