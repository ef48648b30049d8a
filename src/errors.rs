use std::path::PathBuf;

/// Failures that abort a run before any row is processed.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("io error reading {path}: {source}")]
    IO {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid utf-8: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("could not parse {0}: no delimiter yields at least 3 columns")]
    NoDelimiter(PathBuf),

    #[error("{0} has no `url` column")]
    MissingUrlColumn(PathBuf),
}

/// Error types for page fetching, distinguishing retryable from terminal failures
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transient failures (5xx, 429, timeout, connection error), worth retrying
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent failures (4xx, unreadable body)
    #[error("terminal: {0}")]
    Terminal(String),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Retryable(_))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no usable content at {url}")]
    NoContent { url: String },
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend payload: {0}")]
    Payload(String),
}
