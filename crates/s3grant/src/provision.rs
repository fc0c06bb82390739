//! Provisioning actions
//!
//! [`Provisioner::check`] runs the verification pipeline and publishes the artifact.
//! [`Provisioner::create`] renders the bucket policy the customer should attach.

use crate::backend::{IdentityBackend, StorageBackend};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::identity::check_identity;
use crate::path::PathSpec;
use crate::policy;
use crate::probe::AccessProber;
use crate::region::Region;
use crate::report::{ReportBuilder, ReportSink, ValidationReport};
use crate::write_probe::probe_write;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Inputs of a `check` run.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Raw `bucket[/prefix]` spec.
    pub s3_bucket: String,
    /// Region the cluster runs in.
    pub region: Region,
    pub cluster_name: String,
    /// Publish an unvalidated artifact before probing starts.
    pub force: bool,
    /// Rendered access policy, attached to the artifact when validated.
    pub policy_document: Option<Value>,
}

/// Inputs of a `create` run.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub s3_bucket: String,
    pub account_id: String,
    pub template: String,
}

/// Outcome of a `create` run.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub policy: Value,
    pub warnings: Vec<String>,
}

pub struct Provisioner<'a> {
    storage: &'a dyn StorageBackend,
    identity: &'a dyn IdentityBackend,
    config: &'a ProbeConfig,
    now: Option<OffsetDateTime>,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn StorageBackend, identity: &'a dyn IdentityBackend, config: &'a ProbeConfig) -> Self {
        Self {
            storage,
            identity,
            config,
            now: None,
        }
    }

    /// Pins the clock used for the age-leniency cutoff and the probe key.
    #[must_use]
    pub fn with_now(mut self, now: OffsetDateTime) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> OffsetDateTime {
        self.now.unwrap_or_else(OffsetDateTime::now_utc)
    }

    /// Verifies the read-only grant and publishes the report to `sink`.
    ///
    /// # Errors
    /// Returns an error on invalid input, when the target prefix cannot be listed, or when
    /// the sink fails. A failed verification is not an error; see
    /// [`ValidationReport::validated`].
    pub async fn check(&self, req: &CheckRequest, sink: &mut dyn ReportSink) -> Result<ValidationReport> {
        let path = PathSpec::parse(&req.s3_bucket, &self.config.delimiter)?;
        info!(%path, cluster = %req.cluster_name, "checking bucket grant");

        let mut report = ReportBuilder::new(path.clone(), &req.s3_bucket, &req.cluster_name, req.region.clone());

        match check_identity(self.identity, &self.config.identity_name).await {
            Ok((identity, policies)) => report.set_identity(identity, policies),
            Err(err) => report.warn(err.to_string()),
        }

        if req.force {
            info!("publishing preliminary report");
            sink.publish(&report.preliminary())?;
        }

        let now = self.now();
        AccessProber::new(self.storage, self.config, now)
            .run(&path, &req.region, &mut report)
            .await?;

        probe_write(self.storage, self.config, &path, now, &mut report).await;

        let final_report = report.finalize(req.policy_document.clone());
        sink.publish(&final_report)?;
        Ok(final_report)
    }

    /// Renders the bucket policy for the customer to attach.
    ///
    /// The identity check runs here as well, so the customer learns about a missing admin
    /// identity before they configure the bucket.
    ///
    /// # Errors
    /// Returns an error on invalid input or an unusable template.
    pub async fn create(&self, req: &CreateRequest) -> Result<CreateOutcome> {
        let path = PathSpec::parse(&req.s3_bucket, &self.config.delimiter)?;
        let policy = policy::render(&req.template, &req.account_id, &path)?;

        let mut warnings = Vec::new();
        if let Err(err) = check_identity(self.identity, &self.config.identity_name).await {
            warn!("{err}");
            warnings.push(err.to_string());
        }

        info!(%path, "rendered bucket policy");
        Ok(CreateOutcome { policy, warnings })
    }
}
