pub mod model;
pub mod parser;

pub use model::{Color, Product, Rejection, UnknownColor};
pub use parser::{parse_feed, ParsedFeed};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural feed failures. Anything element-level is a [`Rejection`], not an
/// error; these abort the whole run.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read catalog feed {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog feed: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Read and parse one catalog document from disk.
pub fn load_feed(path: &Path) -> Result<ParsedFeed, FeedError> {
    let xml = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feed(&xml)
}
