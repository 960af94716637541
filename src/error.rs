use std::path::PathBuf;

/// Errors raised while compiling or analysing the datasets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("{endpoint} returned full pages for {pages} requests; raise max_pages to fetch more")]
    PageLimit { endpoint: String, pages: usize },

    #[error("rank {rank} requested but only {available} block groups are ranked")]
    RankOutOfRange { rank: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cache file {}: {reason}", .path.display())]
    Cache { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
