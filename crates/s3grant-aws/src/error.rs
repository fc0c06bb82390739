use s3grant::BackendError;

use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

/// What the engine needs to know about a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    Other,
}

/// Classifies an error by its service error code, falling back to the HTTP status.
///
/// ```
/// # use s3grant_aws::{classify, ErrorKind};
/// assert_eq!(classify(Some("AccessDenied"), Some(403)), ErrorKind::AccessDenied);
/// assert_eq!(classify(Some("NoSuchEntity"), Some(404)), ErrorKind::NotFound);
/// assert_eq!(classify(None, Some(503)), ErrorKind::Other);
/// ```
#[must_use]
pub fn classify(code: Option<&str>, status: Option<u16>) -> ErrorKind {
    match code {
        Some("AccessDenied" | "AccessDeniedException" | "AllAccessDisabled") => return ErrorKind::AccessDenied,
        Some("NoSuchBucket" | "NoSuchKey" | "NotFound" | "NoSuchEntity") => return ErrorKind::NotFound,
        // archived objects fail GetObject with 403 InvalidObjectState
        Some("InvalidObjectState") => return ErrorKind::Other,
        _ => {}
    }
    match status {
        Some(403) => ErrorKind::AccessDenied,
        Some(404) => ErrorKind::NotFound,
        _ => ErrorKind::Other,
    }
}

/// Converts an SDK error into a [`BackendError`], keeping the original as the source.
pub(crate) fn from_sdk<E>(op: &str, err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let (code, message) = match err.as_service_error() {
        Some(service_err) => (
            service_err.code().map(str::to_owned),
            service_err.message().unwrap_or("no message").to_owned(),
        ),
        None => (None, err.to_string()),
    };
    let status = err.raw_response().map(|res| res.status().as_u16());

    let msg = match &code {
        Some(code) => format!("{op}: {code}: {message}"),
        None => format!("{op}: {message}"),
    };

    match classify(code.as_deref(), status) {
        ErrorKind::AccessDenied => BackendError::access_denied(msg),
        ErrorKind::NotFound => BackendError::not_found(msg),
        ErrorKind::Other => BackendError::with_source(msg, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_take_precedence() {
        assert_eq!(classify(Some("AccessDenied"), Some(400)), ErrorKind::AccessDenied);
        assert_eq!(classify(Some("AllAccessDisabled"), None), ErrorKind::AccessDenied);
        assert_eq!(classify(Some("NoSuchBucket"), Some(403)), ErrorKind::NotFound);
        assert_eq!(classify(Some("NoSuchKey"), None), ErrorKind::NotFound);
    }

    #[test]
    fn status_fallback() {
        // HEAD-style responses carry no error body
        assert_eq!(classify(None, Some(403)), ErrorKind::AccessDenied);
        assert_eq!(classify(None, Some(404)), ErrorKind::NotFound);
        assert_eq!(classify(Some("InternalError"), Some(500)), ErrorKind::Other);
        assert_eq!(classify(Some("SlowDown"), Some(503)), ErrorKind::Other);
        assert_eq!(classify(None, None), ErrorKind::Other);
    }

    #[test]
    fn invalid_object_state_is_not_denial() {
        assert_eq!(classify(Some("InvalidObjectState"), Some(403)), ErrorKind::Other);
    }
}
