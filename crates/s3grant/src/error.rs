use crate::backend::BackendError;

use std::io;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Fatal errors. Any of these aborts the run.
///
/// Every non-fatal condition is recorded as a warning in the
/// [`ValidationReport`](crate::ValidationReport) instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid bucket path {input:?}: {reason}")]
    InvalidInput { input: String, reason: &'static str },

    #[error("failed to verify access on bucket {bucket} path {prefix:?}")]
    RootAccess {
        bucket: String,
        prefix: String,
        #[source]
        source: BackendError,
    },

    #[error("did not find any folders or files in bucket {bucket} path {prefix:?} using delimiter {delimiter:?}")]
    RootEmpty {
        bucket: String,
        prefix: String,
        delimiter: String,
    },

    #[error("invalid policy template: {0}")]
    PolicyTemplate(String),

    #[error("failed to serialize document")]
    Json(#[from] serde_json::Error),

    #[error("artifact i/o failed")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_input(input: &str, reason: &'static str) -> Self {
        Self::InvalidInput {
            input: input.to_owned(),
            reason,
        }
    }

    /// Whether this error was raised before any backend call was made.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Whether this error comes from the target-prefix listing.
    #[must_use]
    pub fn is_root_access_error(&self) -> bool {
        matches!(self, Self::RootAccess { .. } | Self::RootEmpty { .. })
    }
}
