//! Bucket access-policy rendering
//!
//! The customer attaches the rendered policy to their bucket. It grants the cluster
//! account `GetObject` below the prefix and `ListBucket` restricted to the prefix.

use crate::error::{Error, Result};
use crate::path::PathSpec;
use crate::report::to_json_pretty;

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

/// Default rendered policy file name.
pub const POLICY_FILE: &str = "s3_bucket_list.policy";

/// Built-in policy template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../policy/s3_bucket_list.policy.template");

const ACCOUNT_ID: &str = "<INTERANA_ACCOUNT_ID>";
const BUCKET_NAME: &str = "<BUCKET_NAME>";
const BUCKET_PREFIX: &str = "<BUCKET_PREFIX>";

/// Index of the statement carrying the `s3:prefix` condition.
const LIST_STATEMENT: usize = 1;

/// Normalizes an AWS account id, accepting the dashed console form.
///
/// # Errors
/// Returns an error unless the id is exactly 12 digits after removing dashes.
pub fn account_id(raw: &str) -> Result<String> {
    let id: String = raw.trim().chars().filter(|&c| c != '-').collect();
    if id.len() == 12 && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(Error::invalid_input(raw, "account id must be 12 digits"))
    }
}

/// Renders `template` for the given cluster account and bucket path.
///
/// A root grant needs no prefix restriction, so the list statement's `Condition` is
/// dropped when the prefix is empty.
///
/// # Errors
/// Returns an error if the account id is malformed or the rendered template is not JSON.
///
/// # Examples
/// ```
/// # use s3grant::path::PathSpec;
/// # use s3grant::policy::{render, DEFAULT_TEMPLATE};
/// let path = PathSpec::parse("acme-data/raw/", "/").unwrap();
/// let policy = render(DEFAULT_TEMPLATE, "123456789012", &path).unwrap();
/// assert_eq!(policy["Statement"][0]["Resource"], "arn:aws:s3:::acme-data/raw/*");
/// ```
pub fn render(template: &str, account: &str, path: &PathSpec) -> Result<Value> {
    let account = account_id(account)?;

    let rendered = template
        .replace(ACCOUNT_ID, &account)
        .replace(BUCKET_NAME, path.bucket())
        .replace(BUCKET_PREFIX, path.prefix());

    let mut policy: Value = serde_json::from_str(&rendered)?;

    if path.is_root() {
        let statement = policy
            .get_mut("Statement")
            .and_then(|s| s.get_mut(LIST_STATEMENT))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Error::PolicyTemplate(format!("missing statement {LIST_STATEMENT}")))?;
        if statement.remove("Condition").is_some() {
            debug!("dropped prefix condition for root grant");
        }
    }

    Ok(policy)
}

/// Reads a previously rendered policy.
///
/// # Errors
/// Returns an error if the file cannot be read or is not JSON.
pub fn load(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Writes a rendered policy, overwriting prior contents.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save(path: &Path, policy: &Value) -> Result {
    fs::write(path, to_json_pretty(policy)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_for(spec: &str) -> Value {
        let path = PathSpec::parse(spec, "/").unwrap();
        render(DEFAULT_TEMPLATE, "1234-5678-9012", &path).unwrap()
    }

    #[test]
    fn substitutes_placeholders() {
        let policy = render_for("acme-data/raw/");
        let text = policy.to_string();
        assert!(!text.contains('<'), "{text}");
        assert!(text.contains("arn:aws:iam::123456789012:root"));

        let list = &policy["Statement"][1];
        assert_eq!(list["Resource"], "arn:aws:s3:::acme-data");
        assert_eq!(list["Condition"]["StringLike"]["s3:prefix"][0], "raw/*");
    }

    #[test]
    fn root_grant_drops_condition() {
        let policy = render_for("acme-data");
        assert!(policy["Statement"][1].get("Condition").is_none());
        assert_eq!(policy["Statement"][0]["Resource"], "arn:aws:s3:::acme-data/*");
    }

    #[test]
    fn account_id_validation() {
        assert_eq!(account_id("123456789012").unwrap(), "123456789012");
        assert_eq!(account_id(" 1234-5678-9012 ").unwrap(), "123456789012");
        assert!(account_id("12345").is_err());
        assert!(account_id("12345678901a").is_err());
    }

    #[test]
    fn template_errors() {
        let path = PathSpec::parse("acme-data", "/").unwrap();
        assert!(render("{ not json", "123456789012", &path).is_err());

        let err = render(r#"{"Statement": []}"#, "123456789012", &path).unwrap_err();
        assert!(matches!(err, Error::PolicyTemplate(_)));
    }
}
