use thiserror::Error;

/// Failures of the local key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid stored value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the Anky backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
}

#[derive(Debug, Error, PartialEq)]
pub enum KeyLogError {
    #[error("keystroke log needs at least 4 header lines, found {0}")]
    MissingHeader(usize),

    #[error("invalid start timestamp: {0}")]
    Timestamp(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    KeyLog(#[from] KeyLogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("history log error: {0}")]
    History(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("draft {0} not found")]
    DraftNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
