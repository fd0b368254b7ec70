//! Error types for the conversion pipeline

use thiserror::Error;

/// Failure to obtain bytes for an image or mask locator
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network hiccups, server-side errors and rate limiting; worth retrying
    #[error("transient failure fetching {locator}: {reason}")]
    Transient { locator: String, reason: String },
    /// Malformed locator, client-side HTTP status or missing file
    #[error("permanent failure fetching {locator}: {reason}")]
    Permanent { locator: String, reason: String },
}

impl FetchError {
    pub fn transient(locator: &str, reason: impl ToString) -> Self {
        FetchError::Transient {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn permanent(locator: &str, reason: impl ToString) -> Self {
        FetchError::Permanent {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid mask: {0}")]
    InvalidMask(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("cannot reduce an empty set of polygons")]
    EmptyGeometry,

    #[error("category '{0}' is not part of the configured category order")]
    UnknownCategory(String),

    #[error("category '{0}' appears more than once in the configured category order")]
    DuplicateCategory(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("conversion cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
