//! Remote service access.
//!
//! The sync engine talks to the authoritative store only through
//! [`RemoteGateway`]. Failures are split into [`Rejection`]s, which the
//! service returns deliberately for a single request, and everything else,
//! which is fatal for that one request but never for a whole sync cycle.

mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ItemId, RemoteItem};

pub use http::{HttpConnector, HttpRemoteGateway, ITEMS_PATH};

/// Deliberate refusals of a single request by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The payload failed validation; resending it unchanged will fail again
    BadRequest,
    /// The record does not exist on the remote
    NotFound,
    /// The remote holds a newer version of the record
    Conflict,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BadRequest => "bad request",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
        })
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Remote rejected request: {0}")]
    Rejected(Rejection),
    #[error("Remote request failed: {0}")]
    Transport(String),
    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether retrying the same request on a later cycle may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidEndpoint(_) | Self::Rejected(_) | Self::Malformed(_) => false,
        }
    }

    /// The rejection carried by this error, if it is one.
    pub const fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Record CRUD surface of the remote service.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Records updated at or after `since`, or every record when `since` is absent.
    async fn list_since(&self, since: Option<DateTime<Utc>>) -> RemoteResult<Vec<RemoteItem>>;

    /// Ids of every record currently live on the remote.
    async fn list_ids(&self) -> RemoteResult<Vec<ItemId>>;

    /// A single record, `None` when the remote does not know it.
    async fn fetch(&self, id: &ItemId) -> RemoteResult<Option<RemoteItem>>;

    /// Create a record; may be rejected with `BadRequest` or `Conflict`.
    async fn create(&self, item: &RemoteItem) -> RemoteResult<RemoteItem>;

    /// Replace a record; may be rejected with `BadRequest`, `NotFound` or `Conflict`.
    async fn replace(&self, id: &ItemId, item: &RemoteItem) -> RemoteResult<RemoteItem>;

    /// Delete a record; may be rejected with `NotFound`.
    async fn delete(&self, id: &ItemId) -> RemoteResult<()>;
}

/// Builds a gateway for the endpoint named in a control message.
pub trait Connect: Send + Sync + 'static {
    type Gateway: RemoteGateway + 'static;

    fn connect(&self, endpoint: &str) -> RemoteResult<Self::Gateway>;
}
