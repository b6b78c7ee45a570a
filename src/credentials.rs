//! Provider credential access.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

/// Route53 access key id.
pub const KEY_ROUTE53_ACCESS_KEY_ID: &str = "route53.accessKeyId";

/// Route53 secret access key.
pub const KEY_ROUTE53_SECRET_ACCESS_KEY: &str = "route53.secretAccessKey";

/// Route53 signing region (optional).
pub const KEY_ROUTE53_REGION: &str = "route53.region";

/// Source of provider credentials, keyed by well-known names.
pub trait Credentials: Send + Sync {
    /// Get the credential value for the given key.
    fn get_credential(&self, key: &str) -> Option<String>;
}

impl Credentials for HashMap<String, String> {
    fn get_credential(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Credentials read from a TOML file.
///
/// Keys may be written as nested tables (`route53.accessKeyId = "..."`) or as
/// quoted flat keys (`"route53.accessKeyId" = "..."`).
#[derive(Debug, Default)]
pub struct FileCredentials {
    table: toml::Table,
}

impl FileCredentials {
    /// Load credentials from a file. A missing file yields empty credentials.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Ignoring non-existent credentials file '{}'",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse credentials from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        Ok(Self { table })
    }

    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        if let Some(value) = self.table.get(key) {
            return Some(value);
        }

        let mut parts = key.split('.');
        let mut current = self.table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }
}

impl Credentials for FileCredentials {
    fn get_credential(&self, key: &str) -> Option<String> {
        self.lookup(key)
            .and_then(toml::Value::as_str)
            .map(resolve_env)
    }
}

/// Resolve environment variable references (values starting with $).
pub(crate) fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_keys() {
        let creds = FileCredentials::parse(
            r#"
            [route53]
            accessKeyId = "AKIA123"
            secretAccessKey = "s3cr3t"
            "#,
        )
        .unwrap();

        assert_eq!(
            creds.get_credential(KEY_ROUTE53_ACCESS_KEY_ID),
            Some("AKIA123".to_string())
        );
        assert_eq!(
            creds.get_credential(KEY_ROUTE53_SECRET_ACCESS_KEY),
            Some("s3cr3t".to_string())
        );
        assert_eq!(creds.get_credential(KEY_ROUTE53_REGION), None);
    }

    #[test]
    fn test_flat_quoted_keys() {
        let creds = FileCredentials::parse(r#""route53.region" = "eu-west-1""#).unwrap();
        assert_eq!(
            creds.get_credential(KEY_ROUTE53_REGION),
            Some("eu-west-1".to_string())
        );
    }

    #[test]
    fn test_non_string_value_is_absent() {
        let creds = FileCredentials::parse("route53.accessKeyId = 42").unwrap();
        assert_eq!(creds.get_credential(KEY_ROUTE53_ACCESS_KEY_ID), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let creds = FileCredentials::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(creds.get_credential(KEY_ROUTE53_ACCESS_KEY_ID), None);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let result = FileCredentials::parse("route53 = [");
        assert!(matches!(result, Err(crate::DdnsError::Config(_))));
    }

    #[test]
    fn test_resolve_env_with_value() {
        assert_eq!(resolve_env("plain_value"), "plain_value");
    }

    #[test]
    fn test_resolve_env_with_existing_var() {
        std::env::set_var("TEST_DDNS_UPDATER_VAR", "resolved_value");
        assert_eq!(resolve_env("$TEST_DDNS_UPDATER_VAR"), "resolved_value");
        std::env::remove_var("TEST_DDNS_UPDATER_VAR");
    }

    #[test]
    fn test_resolve_env_with_missing_var() {
        let result = resolve_env("$NONEXISTENT_VAR_12345");
        assert_eq!(result, "$NONEXISTENT_VAR_12345");
    }
}
