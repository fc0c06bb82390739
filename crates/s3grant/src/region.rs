//! AWS region handling
//!
//! The cluster runs in one region. A bucket in another region still works but every
//! byte read crosses regions and is billed as transfer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A validated AWS region identifier, e.g. `us-east-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

/// Error type for invalid region strings.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid region format: {0:?}")]
pub struct RegionError(String);

/// Region of buckets created without a location constraint.
pub const DEFAULT_REGION: &str = "us-east-1";

impl Region {
    /// Creates a new `Region` from a string, validating the format.
    ///
    /// # Errors
    /// Returns `RegionError` if the region string doesn't match expected patterns.
    ///
    /// # Examples
    /// ```
    /// # use s3grant::region::Region;
    /// let region = Region::new("us-east-1").unwrap();
    /// assert_eq!(region.as_str(), "us-east-1");
    ///
    /// assert!(Region::new("us_east_1").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, RegionError> {
        if is_valid_region(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(RegionError(s.to_owned()))
        }
    }

    /// Converts a bucket location constraint into the region it denotes.
    ///
    /// Buckets in `us-east-1` report an empty constraint, and some very old buckets
    /// report the legacy `EU` constraint.
    ///
    /// # Errors
    /// Returns `RegionError` if the constraint is not a region.
    ///
    /// # Examples
    /// ```
    /// # use s3grant::region::Region;
    /// assert_eq!(Region::from_location_constraint("").unwrap().as_str(), "us-east-1");
    /// assert_eq!(Region::from_location_constraint("EU").unwrap().as_str(), "eu-west-1");
    /// assert_eq!(Region::from_location_constraint("ap-south-1").unwrap().as_str(), "ap-south-1");
    /// ```
    pub fn from_location_constraint(constraint: &str) -> Result<Self, RegionError> {
        match constraint.trim() {
            "" => Ok(Self(DEFAULT_REGION.to_owned())),
            "EU" => Ok(Self("eu-west-1".to_owned())),
            other => Self::new(other),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_region(&s) { Ok(Self(s)) } else { Err(RegionError(s)) }
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// Validates a region string.
///
/// Accepts lowercase letters, digits and single hyphens, starting with a letter and not
/// ending with a hyphen. This covers standard, government and China partitions as well
/// as single-word regions like `local`.
///
/// # Examples
/// ```
/// # use s3grant::region::is_valid_region;
/// assert!(is_valid_region("us-east-1"));
/// assert!(is_valid_region("us-gov-west-1"));
/// assert!(is_valid_region("local"));
/// assert!(!is_valid_region(""));
/// assert!(!is_valid_region("Us-East-1"));
/// ```
#[must_use]
pub fn is_valid_region(s: &str) -> bool {
    let bytes = s.as_bytes();

    let Some(first) = bytes.first() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }

    if !bytes.iter().all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
        return false;
    }

    !s.ends_with('-') && !s.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_new() {
        assert!(Region::new("us-east-1").is_ok());
        assert!(Region::new("eu-west-2").is_ok());
        assert!(Region::new("us-gov-west-1").is_ok());
        assert!(Region::new("cn-north-1").is_ok());
        assert!(Region::new("local").is_ok());

        assert!(Region::new("").is_err());
        assert!(Region::new("invalid region").is_err());
        assert!(Region::new("-us-east-1").is_err());
        assert!(Region::new("us-east-1-").is_err());
        assert!(Region::new("us--east-1").is_err());
        assert!(Region::new("1us-east").is_err());
    }

    #[test]
    fn test_location_constraint() {
        assert_eq!(Region::from_location_constraint("").unwrap().as_str(), "us-east-1");
        assert_eq!(Region::from_location_constraint("  ").unwrap().as_str(), "us-east-1");
        assert_eq!(Region::from_location_constraint("EU").unwrap().as_str(), "eu-west-1");
        assert_eq!(Region::from_location_constraint("us-west-2").unwrap().as_str(), "us-west-2");
        assert!(Region::from_location_constraint("Mars").is_err());
    }

    #[test]
    fn test_serde() {
        let region: Region = serde_json::from_str("\"eu-central-1\"").unwrap();
        assert_eq!(region.as_str(), "eu-central-1");
        assert_eq!(serde_json::to_string(&region).unwrap(), "\"eu-central-1\"");
        assert!(serde_json::from_str::<Region>("\"EU Central\"").is_err());
    }

    #[test]
    fn test_region_display() {
        let region: Region = "us-east-1".parse().unwrap();
        assert_eq!(format!("{region}"), "us-east-1");
        assert_eq!(region.into_string(), "us-east-1");
    }
}
