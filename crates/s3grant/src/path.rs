//! Bucket path specs
//!
//! A path spec names a bucket and an optional key prefix: `my-bucket/datasets/raw/`.
//! Wildcards are rejected outright.

use crate::error::{Error, Result};

use std::fmt;

use serde::{Deserialize, Serialize};

const WILDCARDS: &[char] = &['*', '?'];

const SCHEME: &str = "s3://";

/// A resolved `bucket[/prefix]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSpec {
    bucket: String,
    prefix: String,
}

impl PathSpec {
    /// Resolves a raw `bucket[/prefix]` spec.
    ///
    /// The bucket is everything before the first `delimiter`; the prefix is the rest,
    /// without leading separators. An optional `s3://` scheme is accepted.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the spec contains a wildcard or has no bucket.
    ///
    /// # Examples
    /// ```
    /// # use s3grant::path::PathSpec;
    /// let spec = PathSpec::parse("acme-data/raw/2024/", "/").unwrap();
    /// assert_eq!(spec.bucket(), "acme-data");
    /// assert_eq!(spec.prefix(), "raw/2024/");
    ///
    /// assert!(PathSpec::parse("my-bucket/*", "/").is_err());
    /// ```
    pub fn parse(input: &str, delimiter: &str) -> Result<Self> {
        if input.contains(WILDCARDS) {
            return Err(Error::invalid_input(input, "wildcards are not supported, use a plain prefix"));
        }
        if delimiter.is_empty() {
            return Err(Error::invalid_input(input, "empty delimiter"));
        }

        let spec = input.trim();
        let spec = spec.strip_prefix(SCHEME).unwrap_or(spec);

        let (bucket, prefix) = match spec.split_once(delimiter) {
            Some((bucket, rest)) => (bucket, trim_leading(rest, delimiter)),
            None => (spec, ""),
        };

        if bucket.is_empty() {
            return Err(Error::invalid_input(input, "missing bucket name"));
        }

        Ok(Self {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    /// The prefixes probed by prefix climbing, from the target up to the bucket root.
    #[must_use]
    pub fn probe_levels<'a>(&'a self, delimiter: &'a str) -> ProbeLevels<'a> {
        ProbeLevels {
            next: Some(&self.prefix),
            delimiter,
        }
    }

    /// Joins `name` under the prefix, adding a separator only when needed.
    ///
    /// # Examples
    /// ```
    /// # use s3grant::path::PathSpec;
    /// let spec = PathSpec::parse("b/raw", "/").unwrap();
    /// assert_eq!(spec.key_for("x.txt", "/"), "raw/x.txt");
    /// let spec = PathSpec::parse("b", "/").unwrap();
    /// assert_eq!(spec.key_for("x.txt", "/"), "x.txt");
    /// ```
    #[must_use]
    pub fn key_for(&self, name: &str, delimiter: &str) -> String {
        if self.prefix.is_empty() || self.prefix.ends_with(delimiter) {
            format!("{}{name}", self.prefix)
        } else {
            format!("{}{delimiter}{name}", self.prefix)
        }
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "s3://{}", self.bucket)
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.prefix)
        }
    }
}

fn trim_leading<'a>(mut s: &'a str, delimiter: &str) -> &'a str {
    while let Some(rest) = s.strip_prefix(delimiter) {
        s = rest;
    }
    s
}

/// Drops the last segment of `prefix`, ignoring one trailing separator.
///
/// # Examples
/// ```
/// # use s3grant::path::parent_prefix;
/// assert_eq!(parent_prefix("raw/2024/", "/"), "raw");
/// assert_eq!(parent_prefix("raw/2024", "/"), "raw");
/// assert_eq!(parent_prefix("raw/", "/"), "");
/// assert_eq!(parent_prefix("", "/"), "");
/// ```
#[must_use]
pub fn parent_prefix<'a>(prefix: &'a str, delimiter: &str) -> &'a str {
    let trimmed = prefix.strip_suffix(delimiter).unwrap_or(prefix);
    match trimmed.rsplit_once(delimiter) {
        Some((parent, _)) => parent,
        None => "",
    }
}

/// Number of segments in `prefix`.
#[must_use]
pub fn depth(prefix: &str, delimiter: &str) -> usize {
    let trimmed = prefix.strip_suffix(delimiter).unwrap_or(prefix);
    if trimmed.is_empty() { 0 } else { trimmed.split(delimiter).count() }
}

/// Iterator over probe levels. See [`PathSpec::probe_levels`].
///
/// Yields the target prefix first and the bucket root (`""`) last. Each step is strictly
/// shorter than the one before, so it yields at most `depth + 1` items.
#[derive(Debug, Clone)]
pub struct ProbeLevels<'a> {
    next: Option<&'a str>,
    delimiter: &'a str,
}

impl<'a> Iterator for ProbeLevels<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current.is_empty() {
            None
        } else {
            Some(parent_prefix(current, self.delimiter))
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(spec: &str) -> Vec<String> {
        let spec = PathSpec::parse(spec, "/").unwrap();
        spec.probe_levels("/").map(str::to_owned).collect()
    }

    #[test]
    fn parse_bucket_only() {
        let spec = PathSpec::parse("acme-data", "/").unwrap();
        assert_eq!(spec.bucket(), "acme-data");
        assert_eq!(spec.prefix(), "");
        assert!(spec.is_root());

        let spec = PathSpec::parse("acme-data/", "/").unwrap();
        assert!(spec.is_root());
    }

    #[test]
    fn parse_prefix() {
        let spec = PathSpec::parse("acme-data/raw/", "/").unwrap();
        assert_eq!(spec.prefix(), "raw/");

        let spec = PathSpec::parse("acme-data//raw/events", "/").unwrap();
        assert_eq!(spec.prefix(), "raw/events");

        let spec = PathSpec::parse(" s3://acme-data/raw ", "/").unwrap();
        assert_eq!(spec.bucket(), "acme-data");
        assert_eq!(spec.prefix(), "raw");
        assert_eq!(spec.to_string(), "s3://acme-data/raw");
    }

    #[test]
    fn parse_rejects() {
        for input in ["my-bucket/*", "my-bucket/raw/*", "my-*", "b/file?.txt", "", "/raw", "s3:///raw"] {
            let err = PathSpec::parse(input, "/").unwrap_err();
            assert!(err.is_input_error(), "{input:?}");
        }
    }

    #[test]
    fn climbing() {
        assert_eq!(levels("b/raw/"), ["raw/", ""]);
        assert_eq!(levels("b/raw/2024/01/"), ["raw/2024/01/", "raw/2024", "raw", ""]);
        assert_eq!(levels("b/raw/2024"), ["raw/2024", "raw", ""]);
        assert_eq!(levels("b"), [""]);
    }

    #[test]
    fn climbing_is_bounded_by_depth() {
        for spec in ["b", "b/a", "b/a/", "b/a/b/c", "b/a/b/c/", "b/a//b", "b/x/y/z/w/v/u/"] {
            let path = PathSpec::parse(spec, "/").unwrap();
            let n = path.probe_levels("/").count();
            assert!(n <= depth(path.prefix(), "/") + 1, "{spec}: {n} levels");
        }
    }

    #[test]
    fn other_delimiter() {
        let spec = PathSpec::parse("b:raw:2024", ":").unwrap();
        assert_eq!(spec.prefix(), "raw:2024");
        let levels: Vec<_> = spec.probe_levels(":").collect();
        assert_eq!(levels, ["raw:2024", "raw", ""]);
    }

    #[test]
    fn probe_key() {
        let spec = PathSpec::parse("b/raw/", "/").unwrap();
        assert_eq!(spec.key_for("dummy.txt.1", "/"), "raw/dummy.txt.1");
    }
}
