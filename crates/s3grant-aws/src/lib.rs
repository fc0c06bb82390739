//! AWS backends for `s3grant`
//!
//! [`S3Storage`] implements [`s3grant::StorageBackend`] with `aws-sdk-s3`, and
//! [`IamIdentity`] implements [`s3grant::IdentityBackend`] with `aws-sdk-iam`.

#![allow(
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions, // Sometimes not fixable
)]

mod error;
mod identity;
mod storage;

pub use self::error::{ErrorKind, classify};
pub use self::identity::IamIdentity;
pub use self::storage::S3Storage;
