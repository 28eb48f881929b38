//! Error taxonomy for the scrape pipeline.
//!
//! Each layer returns its own error type so callers decide deliberately
//! whether a failure skips one entry, degrades a record, aborts pagination
//! or ends the run:
//!
//! | Type | Raised by | Effect on the run |
//! |------|-----------|-------------------|
//! | [`FetchError`] | [`crate::fetch`] | Aborts pagination; buffered work is still flushed |
//! | [`ExtractError`] | [`crate::scrapers`] | Skips the entry |
//! | [`IdentityError`] | [`crate::identity`] | Skips the entry |
//! | [`StoreError`] | [`crate::store`] | Ends the run ([`RunError`]) |
//! | [`NotifyError`] | [`crate::notify`] | Logged only |
//! | [`ImageError`] | [`crate::images`] | Written into the row as an error marker |

use crate::models::ArticleRecord;
use thiserror::Error;

/// A GET that did not produce a usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Whether a retry could plausibly succeed (transport errors, 429, 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport { .. } => true,
        }
    }
}

/// An article URL that cannot be turned into a dedup key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot canonicalize {raw:?}: {reason}")]
pub struct IdentityError {
    pub raw: String,
    pub reason: String,
}

/// A listing entry that cannot become a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("malformed entry: missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Failure talking to the persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no row with id {0}")]
    UnknownRow(String),

    #[error("store rejected the write: {0}")]
    Rejected(String),
}

/// Failure rendering or dispatching the run digest.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to write digest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid mail setting: {0}")]
    Config(String),

    #[error("mail dispatch failed: {0}")]
    Send(String),
}

/// Failure in one step of the crop-and-rehost pipeline.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Download(#[from] FetchError),

    #[error("image decode/encode failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("upload failed: {0}")]
    Upload(String),
}

impl From<reqwest::Error> for ImageError {
    fn from(e: reqwest::Error) -> Self {
        ImageError::Upload(e.to_string())
    }
}

/// Failures that end a scrape run early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid site.base_url: {0}")]
    Site(#[from] url::ParseError),

    #[error("could not read existing records: {0}")]
    Seed(#[source] StoreError),

    #[error("flush failed with {unflushed} record(s) still buffered: {source}")]
    Sink {
        unflushed: usize,
        /// Records written by earlier flushes of the same run.
        committed: Vec<ArticleRecord>,
        #[source]
        source: StoreError,
    },
}
