//! S3 access grant verification
//!
//! `s3grant` onboards a customer's S3 location for a managed analytics cluster. It confirms
//! that the cluster identity has been granted *read-only* access (list + get, no put) to a
//! customer-specified bucket path, checks that the bucket lives in the expected region, and
//! produces the `interana_cluster.json` hand-off artifact.
//!
//! # Pipeline
//!
//! A `check` run is strictly sequential:
//!
//! 1. [`PathSpec`](path::PathSpec) resolves `bucket[/prefix]` and rejects wildcards.
//! 2. The identity check ([`identity`]) confirms the admin identity and its policies.
//!    Failures degrade to warnings.
//! 3. The access prober ([`probe`]) climbs from the target prefix to the bucket root.
//!    Listing must succeed at the target and fail at every ancestor.
//! 4. The sample downloader ([`download`]) proves at least one object is readable by
//!    reading only its first chunk.
//! 5. The write probe ([`write_probe`]) proves that uploads are denied.
//! 6. The reporter ([`report`]) computes the verdict and publishes the artifact.
//!
//! Only two conditions abort a run: invalid input and a failed or empty listing at the
//! target prefix. Everything else becomes a warning in the artifact.
//!
//! # Backends
//!
//! The engine talks to storage and identity services through the [`StorageBackend`] and
//! [`IdentityBackend`] traits. The `s3grant-aws` crate implements them on top of
//! `aws-sdk-s3` and `aws-sdk-iam`.

#![allow(
    clippy::bool_assert_comparison, // I don't like `assert!(!expression)`. It's very misleading.
    clippy::multiple_crate_versions, // Sometimes not fixable
    clippy::module_name_repetitions,
    clippy::single_match_else,
)]

mod error;

pub mod backend;
pub mod config;
pub mod download;
pub mod identity;
pub mod path;
pub mod policy;
pub mod probe;
pub mod provision;
pub mod region;
pub mod report;
pub mod write_probe;

pub use self::error::*;

pub use self::backend::{BackendError, BackendResult, IdentityBackend, StorageBackend};
pub use self::provision::{CheckRequest, CreateRequest, Provisioner};
pub use self::report::{ReportSink, ValidationReport};
