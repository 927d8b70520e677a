pub mod database_ops;
pub mod feed;
pub mod logging;
pub mod normalization;

pub mod util {
    pub mod env;
}

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use database_ops::{sync_batch, Db, SyncReport};
use feed::{load_feed, Rejection};
use normalization::normalize;

/// Everything one pipeline run produced, for the caller to print or inspect.
pub struct RunSummary {
    pub parsed: usize,
    pub rejections: Vec<Rejection>,
    pub report: SyncReport,
}

/// One full pipeline run: read the feed, parse, normalize, reconcile.
///
/// Element-level rejections and bulk-write failures land in the summary;
/// only unreadable/ill-formed input propagates as an error. The store
/// connection is the caller's: acquired before parse work starts, dropped
/// when the caller exits.
pub async fn run_sync(db: &Db, feed_path: &Path) -> Result<RunSummary> {
    let feed::ParsedFeed {
        products,
        rejections,
    } = load_feed(feed_path)?;

    for rejection in &rejections {
        warn!(reason = %rejection.reason, "skipped catalog record");
    }

    let batch: Vec<_> = products.into_iter().map(normalize).collect();
    let report = sync_batch(db, &batch).await;
    info!(
        parsed = batch.len(),
        rejected = rejections.len(),
        inserted = report.inserted,
        modified = report.modified,
        "catalog sync finished"
    );

    Ok(RunSummary {
        parsed: batch.len(),
        rejections,
        report,
    })
}
