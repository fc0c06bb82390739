//! Validation report and the `interana_cluster.json` artifact
//!
//! A [`ReportBuilder`] is created once per run. Each stage records its outcomes and
//! appends warnings; [`ReportBuilder::finalize`] computes the verdict and freezes the
//! result into a [`ValidationReport`].

use crate::backend::{IdentityRecord, PolicyList};
use crate::error::Result;
use crate::path::PathSpec;
use crate::region::Region;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Default artifact file name.
pub const ARTIFACT_FILE: &str = "interana_cluster.json";

/// Result of one listing probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub level: usize,
    pub prefix: String,
    pub expected_granted: bool,
    pub actual_granted: bool,
    pub error: Option<String>,
}

impl AccessOutcome {
    #[must_use]
    pub fn matches_expectation(&self) -> bool {
        self.expected_granted == self.actual_granted
    }
}

/// An object found while searching for something to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateObject {
    pub key: String,
    pub last_modified: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAttempt {
    pub object: CandidateObject,
    pub succeeded: bool,
    /// The failure was excused by the age-leniency window.
    pub excused: bool,
    pub reason: Option<String>,
}

/// Outcome of the write probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Denied { key: String },
    Granted { key: String },
}

/// Accumulates the outcomes of a run.
#[derive(Debug)]
pub struct ReportBuilder {
    bucket_path: PathSpec,
    s3_bucket: String,
    cluster_name: String,
    region: Region,
    identity: Option<IdentityRecord>,
    policies: Option<PolicyList>,
    warnings: Vec<String>,
    outcomes: Vec<AccessOutcome>,
    downloads: Vec<DownloadAttempt>,
    write: Option<WriteOutcome>,
}

impl ReportBuilder {
    #[must_use]
    pub fn new(bucket_path: PathSpec, s3_bucket: impl Into<String>, cluster_name: impl Into<String>, region: Region) -> Self {
        Self {
            bucket_path,
            s3_bucket: s3_bucket.into(),
            cluster_name: cluster_name.into(),
            region,
            identity: None,
            policies: None,
            warnings: Vec::new(),
            outcomes: Vec::new(),
            downloads: Vec::new(),
            write: None,
        }
    }

    /// Appends a warning and logs it.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.warnings.push(msg);
    }

    pub fn set_identity(&mut self, identity: IdentityRecord, policies: PolicyList) {
        self.identity = Some(identity);
        self.policies = Some(policies);
    }

    pub fn record_access(&mut self, outcome: AccessOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn record_download(&mut self, attempt: DownloadAttempt) {
        self.downloads.push(attempt);
    }

    pub fn record_write(&mut self, outcome: WriteOutcome) {
        self.write = Some(outcome);
    }

    #[must_use]
    pub fn bucket_path(&self) -> &PathSpec {
        &self.bucket_path
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn outcomes(&self) -> &[AccessOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn downloads(&self) -> &[DownloadAttempt] {
        &self.downloads
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloads.iter().filter(|a| a.succeeded).count()
    }

    /// The verdict for the outcomes recorded so far.
    ///
    /// Requires a granted target listing, no granted ancestor listing, at least one
    /// successful download and a denied write.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        let root_granted = self.outcomes.iter().any(|o| o.level == 0 && o.actual_granted);
        let all_matched = self.outcomes.iter().all(AccessOutcome::matches_expectation);
        let write_denied = matches!(self.write, Some(WriteOutcome::Denied { .. }));
        root_granted && all_matched && self.downloaded() > 0 && write_denied
    }

    /// An unvalidated snapshot, published before probing when the operator forces a report.
    #[must_use]
    pub fn preliminary(&self) -> ValidationReport {
        self.build(false, Value::Object(serde_json::Map::new()))
    }

    /// Computes the verdict and freezes the report.
    ///
    /// The policy document is attached only when the run is validated.
    #[must_use]
    pub fn finalize(mut self, policy_document: Option<Value>) -> ValidationReport {
        let validated = self.is_validated();

        let document = match (validated, policy_document) {
            (true, Some(doc)) => doc,
            (true, None) => {
                self.warn("access-policy document is unavailable, attach it manually");
                Value::Object(serde_json::Map::new())
            }
            (false, _) => Value::Object(serde_json::Map::new()),
        };

        let report = self.build(validated, document);
        if validated {
            info!(path = %report.bucket_path, "validated read-only access");
        } else {
            warn!(path = %report.bucket_path, warnings = report.warnings.len(), "validation failed");
            for (i, w) in report.warnings.iter().enumerate() {
                warn!("  {}: {w}", i + 1);
            }
        }
        report
    }

    fn build(&self, validated: bool, bucket_policy_document: Value) -> ValidationReport {
        ValidationReport {
            validated,
            warnings: self.warnings.clone(),
            identity: self.identity.clone(),
            policies: self.policies.clone(),
            bucket_path: self.bucket_path.clone(),
            s3_bucket: self.s3_bucket.clone(),
            cluster_name: self.cluster_name.clone(),
            region: self.region.clone(),
            bucket_policy_document,
        }
    }
}

/// The frozen result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    validated: bool,
    warnings: Vec<String>,
    identity: Option<IdentityRecord>,
    policies: Option<PolicyList>,
    bucket_path: PathSpec,
    s3_bucket: String,
    cluster_name: String,
    region: Region,
    bucket_policy_document: Value,
}

impl ValidationReport {
    #[must_use]
    pub fn validated(&self) -> bool {
        self.validated
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn identity(&self) -> Option<&IdentityRecord> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn policies(&self) -> Option<&PolicyList> {
        self.policies.as_ref()
    }

    #[must_use]
    pub fn bucket_path(&self) -> &PathSpec {
        &self.bucket_path
    }

    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    #[must_use]
    pub fn bucket_policy_document(&self) -> &Value {
        &self.bucket_policy_document
    }

    /// The artifact view of this report.
    #[must_use]
    pub fn artifact<'a>(&'a self, credentials: &'a CredentialsContext) -> ClusterArtifact<'a> {
        ClusterArtifact {
            aws_access_key: credentials.access_key.as_deref(),
            aws_secret_key: credentials.secret_key.as_deref(),
            aws_region_name: self.region.as_str(),
            s3_bucket: &self.s3_bucket,
            bucket_name: self.bucket_path.bucket(),
            bucket_prefix: self.bucket_path.prefix(),
            user: self.identity.as_ref(),
            all_policies: self.policies.as_ref(),
            validated: self.validated,
            warnings: &self.warnings,
            clustername: &self.cluster_name,
            s3_bucket_policy: &self.bucket_policy_document,
        }
    }
}

/// Credentials the operator passed explicitly. Both are `None` with the default chain.
#[derive(Debug, Clone, Default)]
pub struct CredentialsContext {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// The hand-off document. Field names are a stable contract with the operator.
#[derive(Debug, Serialize)]
pub struct ClusterArtifact<'a> {
    pub aws_access_key: Option<&'a str>,
    pub aws_secret_key: Option<&'a str>,
    pub aws_region_name: &'a str,
    pub s3_bucket: &'a str,
    pub bucket_name: &'a str,
    pub bucket_prefix: &'a str,
    pub user: Option<&'a IdentityRecord>,
    pub all_policies: Option<&'a PolicyList>,
    pub validated: bool,
    pub warnings: &'a [String],
    pub clustername: &'a str,
    pub s3_bucket_policy: &'a Value,
}

impl ClusterArtifact<'_> {
    /// Serializes with 4-space indentation.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let buf = to_json_pretty(self)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }
}

pub(crate) fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Where finished reports go.
pub trait ReportSink {
    /// Publishes a report. Called once for a forced preliminary report and once at the end.
    ///
    /// # Errors
    /// Returns an error if the report cannot be persisted.
    fn publish(&mut self, report: &ValidationReport) -> Result;
}

/// Writes the artifact file, overwriting prior contents, and echoes it to the console.
#[derive(Debug)]
pub struct ArtifactWriter<W> {
    path: PathBuf,
    credentials: CredentialsContext,
    console: W,
}

impl<W: Write> ArtifactWriter<W> {
    pub fn new(path: impl Into<PathBuf>, credentials: CredentialsContext, console: W) -> Self {
        Self {
            path: path.into(),
            credentials,
            console,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<W: Write> ReportSink for ArtifactWriter<W> {
    fn publish(&mut self, report: &ValidationReport) -> Result {
        let json = to_json_pretty(&report.artifact(&self.credentials))?;
        fs::write(&self.path, &json)?;
        info!(path = %self.path.display(), validated = report.validated(), "wrote artifact");

        writeln!(self.console, "****{} contents. Please send to your cluster operator****", self.path.display())?;
        self.console.write_all(&json)?;
        self.console.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ReportBuilder {
        let path = PathSpec::parse("acme-data/raw/", "/").unwrap();
        ReportBuilder::new(path, "acme-data/raw/", "acme", Region::new("us-east-1").unwrap())
    }

    fn granted(level: usize) -> AccessOutcome {
        AccessOutcome {
            level,
            prefix: String::new(),
            expected_granted: level == 0,
            actual_granted: true,
            error: None,
        }
    }

    fn denied(level: usize) -> AccessOutcome {
        AccessOutcome {
            actual_granted: false,
            error: Some("access denied".into()),
            ..granted(level)
        }
    }

    fn success() -> DownloadAttempt {
        DownloadAttempt {
            object: CandidateObject {
                key: "raw/a.csv".into(),
                last_modified: None,
            },
            succeeded: true,
            excused: false,
            reason: None,
        }
    }

    fn passing() -> ReportBuilder {
        let mut b = builder();
        b.record_access(granted(0));
        b.record_access(denied(1));
        b.record_download(success());
        b.record_write(WriteOutcome::Denied { key: "raw/dummy.txt.1".into() });
        b
    }

    #[test]
    fn verdict_requires_every_check() {
        assert!(passing().is_validated());

        let mut b = passing();
        b.record_access(granted(2));
        assert!(!b.is_validated());

        let mut b = passing();
        b.record_write(WriteOutcome::Granted { key: "raw/dummy.txt.1".into() });
        assert!(!b.is_validated());

        let mut b = builder();
        b.record_access(granted(0));
        b.record_write(WriteOutcome::Denied { key: "k".into() });
        assert!(!b.is_validated());

        assert!(!builder().is_validated());
    }

    #[test]
    fn warnings_do_not_decide_the_verdict() {
        let mut b = passing();
        b.warn("bucket region eu-west-1 differs from cluster region us-east-1");
        let report = b.finalize(Some(serde_json::json!({"Version": "2012-10-17"})));
        assert!(report.validated());
        assert_eq!(report.warnings().len(), 1);
        assert_eq!(report.bucket_policy_document()["Version"], "2012-10-17");
    }

    #[test]
    fn policy_attached_only_when_validated() {
        let mut b = builder();
        b.record_access(denied(0));
        let report = b.finalize(Some(serde_json::json!({"Version": "2012-10-17"})));
        assert!(!report.validated());
        assert_eq!(report.bucket_policy_document(), &serde_json::json!({}));

        let report = passing().finalize(None);
        assert!(report.validated());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn artifact_schema() {
        let report = passing().finalize(Some(serde_json::json!({})));
        let creds = CredentialsContext::default();
        let json = report.artifact(&creds).to_json().unwrap();
        assert!(json.starts_with("{\n    \"aws_access_key\": null,"));

        let value: Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "aws_access_key",
            "aws_secret_key",
            "aws_region_name",
            "s3_bucket",
            "bucket_name",
            "bucket_prefix",
            "user",
            "all_policies",
            "validated",
            "warnings",
            "clustername",
            "s3_bucket_policy",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(value["user"], Value::Null);
        assert_eq!(value["bucket_prefix"], "raw/");
        assert_eq!(value["clustername"], "acme");
    }
}
