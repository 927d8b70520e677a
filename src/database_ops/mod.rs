pub mod db;
pub mod sync;

pub use db::{Db, StoreCounts};
pub use sync::{sync_batch, BulkWriteFailure, CatalogStore, SyncReport, UpsertOutcome};

use thiserror::Error;

/// Store-side failures. Connection problems are fatal for a run; bulk-write
/// problems are absorbed into the sync report at the engine boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to the catalog store")]
    Connect(#[source] sqlx::Error),
    #[error("failed to bootstrap the catalog schema")]
    Schema(#[source] sqlx::Error),
    #[error("bulk upsert failed")]
    BulkWrite(#[source] sqlx::Error),
    #[error("catalog query failed")]
    Query(#[source] sqlx::Error),
    #[error("stored document could not be decoded: {0}")]
    Decode(String),
}
