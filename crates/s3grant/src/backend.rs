//! Storage and identity backends
//!
//! The engine never sees wire responses. Backends extract the few fields it consumes into
//! the typed records defined here.

use std::fmt;
use std::ops::ControlFlow;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type StdError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BackendResult<T> = Result<T, BackendError>;

/// A failed backend call, classified by what the engine cares about.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {message}")]
    Other {
        message: String,
        #[source]
        source: Option<StdError>,
    },
}

impl BackendError {
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other {
            message: msg.into(),
            source: None,
        }
    }

    pub fn with_source(msg: impl Into<String>, source: impl Into<StdError>) -> Self {
        Self::Other {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

/// One immediate child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    File {
        key: String,
        last_modified: Option<OffsetDateTime>,
    },
    Folder {
        prefix: String,
    },
}

impl ListingEntry {
    pub fn file(key: impl Into<String>, last_modified: OffsetDateTime) -> Self {
        Self::File {
            key: key.into(),
            last_modified: Some(last_modified),
        }
    }

    pub fn folder(prefix: impl Into<String>) -> Self {
        Self::Folder { prefix: prefix.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { key, .. } => key,
            Self::Folder { prefix } => prefix,
        }
    }
}

/// How a partial read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The observer asked the reader to stop.
    Stopped { bytes_read: u64 },
    /// The body was exhausted without the observer stopping it.
    Completed { bytes_read: u64 },
}

/// Receives progress while an object body is being read.
///
/// The reader checks the returned value after every chunk and stops the transfer on
/// [`ControlFlow::Break`].
pub trait ChunkObserver: Send {
    fn on_chunk(&mut self, bytes_read: u64, total_bytes: Option<u64>) -> ControlFlow<()>;
}

/// The identity whose policies grant the cluster its access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
}

/// Policies attached to an identity, inline and managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyList {
    pub policy_names: Vec<String>,
    #[serde(default)]
    pub attached_policies: Vec<String>,
}

impl PolicyList {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policy_names.is_empty() && self.attached_policies.is_empty()
    }
}

impl fmt::Display for PolicyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all: Vec<&str> = self
            .policy_names
            .iter()
            .chain(&self.attached_policies)
            .map(String::as_str)
            .collect();
        write!(f, "[{}]", all.join(", "))
    }
}

#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Lists the immediate children of `prefix`, grouping deeper keys by `delimiter`.
    ///
    /// Returns at most `max_keys` entries. This is a single bounded page, never a
    /// recursive enumeration.
    async fn list_children(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> BackendResult<Vec<ListingEntry>>;

    /// Returns the raw location constraint of the bucket. An empty string means `us-east-1`.
    async fn bucket_location(&self, bucket: &str) -> BackendResult<String>;

    /// Reads the object body, reporting each chunk to `observer` until it stops the read.
    async fn partial_read(
        &self,
        bucket: &str,
        key: &str,
        observer: &mut dyn ChunkObserver,
    ) -> BackendResult<ReadOutcome>;

    async fn put_object(&self, bucket: &str, key: &str, content: Bytes) -> BackendResult<()>;
}

#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn get_identity(&self, name: &str) -> BackendResult<IdentityRecord>;

    async fn list_attached_policies(&self, name: &str) -> BackendResult<PolicyList>;
}
