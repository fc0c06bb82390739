//! Write probe
//!
//! Uploads a uniquely named object into the target prefix. The grant is read-only, so
//! the upload must be rejected.

use crate::backend::StorageBackend;
use crate::config::ProbeConfig;
use crate::path::PathSpec;
use crate::report::{ReportBuilder, WriteOutcome};

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Key of the probe object: `<prefix>/<probe_file_name>.<unix millis>`.
#[must_use]
pub fn probe_key(path: &PathSpec, config: &ProbeConfig, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let name = format!("{}.{millis}", config.probe_file_name);
    path.key_for(&name, &config.delimiter)
}

/// Attempts the upload and records the outcome.
#[tracing::instrument(skip_all, fields(bucket = path.bucket()))]
pub async fn probe_write(
    storage: &dyn StorageBackend,
    config: &ProbeConfig,
    path: &PathSpec,
    now: OffsetDateTime,
    report: &mut ReportBuilder,
) -> WriteOutcome {
    let key = probe_key(path, config, now);
    debug!(%key, "attempting probe upload");

    let content = Bytes::from(config.probe_content.clone().into_bytes());
    let outcome = match storage.put_object(path.bucket(), &key, content).await {
        Ok(()) => {
            report.warn(format!(
                "write access unexpectedly granted at path {key} in bucket {}",
                path.bucket()
            ));
            WriteOutcome::Granted { key }
        }
        Err(err) => {
            if !err.is_access_denied() {
                report.warn(format!(
                    "write attempt at path {key} in bucket {} was rejected without an access-denied response: {err}",
                    path.bucket()
                ));
            }
            info!("successfully verified read only access");
            WriteOutcome::Denied { key }
        }
    };

    report.record_write(outcome.clone());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    #[test]
    fn key_under_prefix() {
        let config = ProbeConfig::default();
        let now = datetime!(2024-05-01 12:00:00.250 UTC);

        let path = PathSpec::parse("acme-data/raw/", "/").unwrap();
        assert_eq!(probe_key(&path, &config, now), "raw/dummy.txt.1714564800250");

        let path = PathSpec::parse("acme-data/raw", "/").unwrap();
        assert_eq!(probe_key(&path, &config, now), "raw/dummy.txt.1714564800250");

        let path = PathSpec::parse("acme-data", "/").unwrap();
        assert_eq!(probe_key(&path, &config, now), "dummy.txt.1714564800250");
    }

    #[test]
    fn keys_are_distinct_over_time() {
        let config = ProbeConfig::default();
        let path = PathSpec::parse("acme-data/raw/", "/").unwrap();
        let a = probe_key(&path, &config, datetime!(2024-05-01 12:00:00.001 UTC));
        let b = probe_key(&path, &config, datetime!(2024-05-01 12:00:00.002 UTC));
        assert_ne!(a, b);
    }
}
