//! Error types for crawl handlers and storage sinks

use thiserror::Error;

/// Errors raised by a crawl handler
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A required site parameter is missing or malformed
    #[error("invalid site parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Every page fetch failed
    #[error("no page could be fetched ({attempted} attempted): {last_error}")]
    NoPagesFetched { attempted: u32, last_error: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing a record to a sink failed
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Handler-specific failure
    #[error("{0}")]
    Other(String),
}

impl CrawlError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a storage sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink '{sink}' I/O error: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sink '{sink}' failed to serialize record: {source}")]
    Serialize {
        sink: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sink '{sink}' database error: {source}")]
    Database {
        sink: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Handler resolution failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no handler found for site '{site_id}' (category hint: {hint})")]
    NoHandlerFound { site_id: String, hint: String },
}
