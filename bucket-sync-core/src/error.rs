use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single call against the remote file service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("access token cannot be sent as a header value")]
    InvalidToken,
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// Failure raised by the synchronisation engine.
///
/// Whether one of these aborts a run or is recorded against a single work
/// item is decided by the call site, not by the variant.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("could not obtain signature for `{path}`: {source}")]
    Signature {
        path: String,
        #[source]
        source: std::sync::Arc<TransportError>,
    },

    #[error("cannot map `{path}`: {reason}")]
    PathMapping { path: String, reason: String },

    #[error("invalid source `{}`: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("cannot prepare destination `{}`: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walking `{}` failed: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("listing `{dir}` failed: {source}")]
    Listing {
        dir: String,
        #[source]
        source: TransportError,
    },

    #[error("writing `{}` failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid extension filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("worker task failed: {0}")]
    Worker(String),
}
