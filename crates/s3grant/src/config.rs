//! Probe configuration
//!
//! All tunables of the verification engine live in [`ProbeConfig`]. Every field has a
//! default, so a partial JSON document is a valid configuration.
//!
//! # Example
//! ```
//! use s3grant::config::ProbeConfig;
//!
//! let config = ProbeConfig::default();
//! assert_eq!(config.identity_name, "interana_admin");
//! assert_eq!(config.candidate_window, 100);
//!
//! let config = ProbeConfig::from_json(r#"{ "identity_name": "acme_admin" }"#).unwrap();
//! assert_eq!(config.identity_name, "acme_admin");
//! assert_eq!(config.delimiter, "/");
//! ```

use crate::error::Result;

use serde::{Deserialize, Serialize};
use time::Duration;

/// Verification engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ProbeConfig {
    /// Identity whose existence and policies are checked.
    ///
    /// Default: `interana_admin`
    pub identity_name: String,

    /// Hierarchy separator used for listings and prefix climbing.
    ///
    /// Default: `/`
    pub delimiter: String,

    /// Page size of a single bounded listing.
    ///
    /// Default: 1000
    pub list_max_keys: usize,

    /// Capacity of the rolling buffer of download candidates per folder.
    ///
    /// When a folder has more files, only the most recently listed ones survive.
    ///
    /// Default: 100
    pub candidate_window: usize,

    /// Download failures on objects older than this are excused.
    ///
    /// Cold-storage objects may be unreadable for reasons unrelated to permissions.
    ///
    /// Default: 604800 (7 days)
    pub age_leniency_secs: u64,

    /// Maximum number of sub-folders listed while searching for a downloadable object.
    ///
    /// Default: 256
    pub max_folder_expansions: usize,

    /// Base name of the write probe object.
    ///
    /// Default: `dummy.txt`
    pub probe_file_name: String,

    /// Body uploaded by the write probe.
    ///
    /// Default: `read-only access probe\n`
    pub probe_content: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            identity_name: "interana_admin".to_owned(),
            delimiter: "/".to_owned(),
            list_max_keys: 1000,
            candidate_window: 100,
            age_leniency_secs: 7 * 24 * 60 * 60, // 7 days
            max_folder_expansions: 256,
            probe_file_name: "dummy.txt".to_owned(),
            probe_content: "read-only access probe\n".to_owned(),
        }
    }
}

impl ProbeConfig {
    /// Parses a configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if `json` is not a valid configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn age_leniency(&self) -> Duration {
        let secs = i64::try_from(self.age_leniency_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.list_max_keys, 1000);
        assert_eq!(config.age_leniency(), Duration::days(7));
        assert_eq!(config.probe_file_name, "dummy.txt");
    }

    #[test]
    fn partial_document() {
        let config = ProbeConfig::from_json(r#"{"candidate_window": 5, "age_leniency_secs": 60}"#).unwrap();
        assert_eq!(config.candidate_window, 5);
        assert_eq!(config.age_leniency(), Duration::minutes(1));
        assert_eq!(config.identity_name, "interana_admin");
    }

    #[test]
    fn rejects_garbage() {
        assert!(ProbeConfig::from_json("[1, 2]").is_err());
        assert!(ProbeConfig::from_json(r#"{"list_max_keys": "many"}"#).is_err());
    }
}
