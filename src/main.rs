use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use catalog_sync::database_ops::Db;
use catalog_sync::feed::{self, ParsedFeed};
use catalog_sync::logging::init_tracing;
use catalog_sync::normalization::normalize;
use catalog_sync::util::env;
use catalog_sync::{run_sync, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version, about = "Vendor catalog import and sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Parse a catalog feed and reconcile it into the product store
    Sync {
        /// Path to the vendor XML feed
        #[arg(long)]
        feed: PathBuf,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Pool size; one bulk call needs very little
        #[arg(long, default_value_t = 5)]
        max_connections: u32,
    },
    /// Parse and validate a feed without touching the store
    Lint {
        /// Path to the vendor XML feed
        #[arg(long)]
        feed: PathBuf,
        /// Emit the normalized batch and rejections as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print row counts for the products table
    DbCounts {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Fetch one stored product by stock code
    Lookup {
        stock_code: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

fn resolve_db_url(flag: Option<String>) -> Result<String> {
    match flag {
        Some(url) => Ok(url),
        None => env::db_url(),
    }
}

fn print_rejections(summary_rejections: &[feed::Rejection]) {
    for rejection in summary_rejections {
        eprintln!("rejected record ({}):\n{}\n", rejection.reason, rejection.source);
    }
}

fn summary_line(summary: &RunSummary) -> String {
    let mut parts = Vec::new();
    if summary.report.inserted > 0 {
        parts.push(format!("{} inserted", summary.report.inserted));
    }
    if summary.report.modified > 0 {
        parts.push(format!("{} modified", summary.report.modified));
    }
    if !summary.rejections.is_empty() {
        parts.push(format!("{} rejected", summary.rejections.len()));
    }
    if parts.is_empty() {
        "catalog sync: no changes".to_string()
    } else {
        format!("catalog sync: {}", parts.join(", "))
    }
}

async fn sync_cmd(feed_path: &Path, db_url: Option<String>, max_connections: u32) -> Result<()> {
    let url = resolve_db_url(db_url)?;
    // Connect before any parse work is spent; a dead store aborts here.
    let db = Db::connect(&url, max_connections).await?;
    db.ensure_schema().await?;

    let summary = run_sync(&db, feed_path).await?;
    print_rejections(&summary.rejections);
    for failure in &summary.report.failures {
        eprintln!(
            "bulk write failure: {} records starting at {}: {}",
            failure.records, failure.first_stock_code, failure.error
        );
    }
    println!("{}", summary_line(&summary));
    Ok(())
}

fn lint_cmd(feed_path: &Path, json: bool) -> Result<()> {
    let ParsedFeed {
        products,
        rejections,
    } = feed::load_feed(feed_path)?;
    let batch: Vec<_> = products.into_iter().map(normalize).collect();

    if json {
        let doc = serde_json::json!({ "products": batch, "rejections": rejections });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_rejections(&rejections);
        println!(
            "feed ok: {} valid records, {} rejected",
            batch.len(),
            rejections.len()
        );
    }
    Ok(())
}

async fn db_counts_cmd(db_url: Option<String>) -> Result<()> {
    let url = resolve_db_url(db_url)?;
    let db = Db::connect(&url, 2).await?;
    db.ensure_schema().await?;
    let counts = db.counts().await?;
    println!(
        "products: {} ({} discounted, {} out of stock)",
        counts.products, counts.discounted, counts.out_of_stock
    );
    Ok(())
}

async fn lookup_cmd(stock_code: &str, db_url: Option<String>) -> Result<()> {
    let url = resolve_db_url(db_url)?;
    let db = Db::connect(&url, 2).await?;
    match db.find_by_stock_code(stock_code).await? {
        Some(product) => println!("{}", serde_json::to_string_pretty(&product)?),
        None => eprintln!("no product with stock code {stock_code}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing("info")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            feed,
            db_url,
            max_connections,
        } => sync_cmd(&feed, db_url, max_connections).await,
        Commands::Lint { feed, json } => lint_cmd(&feed, json),
        Commands::DbCounts { db_url } => db_counts_cmd(db_url).await,
        Commands::Lookup { stock_code, db_url } => lookup_cmd(&stock_code, db_url).await,
    }
}
