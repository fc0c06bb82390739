//! Access prober
//!
//! Climbs from the target prefix to the bucket root. The listing at the target (level 0)
//! must succeed and return something; listings at every ancestor must be denied.
//!
//! | level | listing granted | listing denied or failed |
//! |-------|-----------------|--------------------------|
//! | 0     | expected        | fatal                    |
//! | > 0   | warning         | expected                 |

use crate::backend::StorageBackend;
use crate::config::ProbeConfig;
use crate::download::SampleDownloader;
use crate::error::{Error, Result};
use crate::path::PathSpec;
use crate::region::Region;
use crate::report::{AccessOutcome, ReportBuilder};

use time::OffsetDateTime;
use tracing::{debug, error, info};

pub struct AccessProber<'a> {
    storage: &'a dyn StorageBackend,
    config: &'a ProbeConfig,
    now: OffsetDateTime,
}

impl<'a> AccessProber<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn StorageBackend, config: &'a ProbeConfig, now: OffsetDateTime) -> Self {
        Self { storage, config, now }
    }

    /// Probes every level of `path`, recording outcomes and warnings into `report`.
    ///
    /// Returns the number of objects verified as downloadable.
    ///
    /// # Errors
    /// Returns [`Error::RootAccess`] or [`Error::RootEmpty`] if the target prefix cannot be
    /// listed. No other condition is fatal.
    #[tracing::instrument(skip_all, fields(bucket = path.bucket(), prefix = path.prefix(), region = %expected_region))]
    pub async fn run(&self, path: &PathSpec, expected_region: &Region, report: &mut ReportBuilder) -> Result<usize> {
        let bucket = path.bucket();
        let delimiter = self.config.delimiter.as_str();
        let mut downloaded = 0;

        for (level, prefix) in path.probe_levels(delimiter).enumerate() {
            let access = if level == 0 { "read allow" } else { "read deny" };
            info!("checking bucket for {access} access at prefix {prefix:?}");

            if level == 0 {
                self.check_region(bucket, expected_region, report).await;
            }

            let listing = self
                .storage
                .list_children(bucket, prefix, delimiter, self.config.list_max_keys)
                .await;

            match (level, listing) {
                (0, Err(source)) => {
                    error!(%source, "target listing failed");
                    report.record_access(AccessOutcome {
                        level,
                        prefix: prefix.to_owned(),
                        expected_granted: true,
                        actual_granted: false,
                        error: Some(source.to_string()),
                    });
                    return Err(Error::RootAccess {
                        bucket: bucket.to_owned(),
                        prefix: prefix.to_owned(),
                        source,
                    });
                }
                (0, Ok(entries)) if entries.is_empty() => {
                    error!("target listing is empty");
                    report.record_access(AccessOutcome {
                        level,
                        prefix: prefix.to_owned(),
                        expected_granted: true,
                        actual_granted: true,
                        error: Some("listing returned no entries".to_owned()),
                    });
                    return Err(Error::RootEmpty {
                        bucket: bucket.to_owned(),
                        prefix: prefix.to_owned(),
                        delimiter: delimiter.to_owned(),
                    });
                }
                (0, Ok(entries)) => {
                    debug!(entries = entries.len(), "target listing granted");
                    report.record_access(AccessOutcome {
                        level,
                        prefix: prefix.to_owned(),
                        expected_granted: true,
                        actual_granted: true,
                        error: None,
                    });

                    let downloader = SampleDownloader::new(self.storage, self.config, self.now);
                    downloaded = downloader.run(bucket, prefix, entries, report).await;
                }
                (_, Ok(entries)) => {
                    debug!(entries = entries.len(), "ancestor listing granted");
                    report.record_access(AccessOutcome {
                        level,
                        prefix: prefix.to_owned(),
                        expected_granted: false,
                        actual_granted: true,
                        error: None,
                    });
                    report.warn(format!(
                        "excess read access at ancestor path {prefix:?} of bucket {bucket}, \
                         listing above the target prefix should be denied"
                    ));
                }
                (_, Err(err)) => {
                    if err.is_access_denied() {
                        debug!("ancestor listing denied");
                    } else {
                        report.warn(format!(
                            "listing at ancestor path {prefix:?} of bucket {bucket} failed without an \
                             access-denied response, treating it as denied: {err}"
                        ));
                    }
                    report.record_access(AccessOutcome {
                        level,
                        prefix: prefix.to_owned(),
                        expected_granted: false,
                        actual_granted: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        if downloaded == 0 {
            report.warn(format!(
                "could not confirm downloadability of any object under the target path {path}"
            ));
        }

        Ok(downloaded)
    }

    async fn check_region(&self, bucket: &str, expected: &Region, report: &mut ReportBuilder) {
        let location = match self.storage.bucket_location(bucket).await {
            Ok(location) => location,
            Err(err) => {
                report.warn(format!("could not determine the region of bucket {bucket}: {err}"));
                return;
            }
        };

        match Region::from_location_constraint(&location) {
            Ok(region) if region == *expected => debug!(%region, "bucket region matches"),
            Ok(region) => report.warn(format!(
                "cluster region {expected} is not the bucket region {region}, excess transfer charges will occur"
            )),
            Err(err) => report.warn(format!("could not determine the region of bucket {bucket}: {err}")),
        }
    }
}
