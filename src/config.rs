use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use crate::auth::{RolePermissions, TokenCodec};

const DEV_TOKEN_SECRET: &str = "cutline-dev-secret-do-not-use-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid permissions file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CUTLINE_TOKEN_SECRET must be set")]
    MissingSecret,

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// Runtime configuration loaded from `CUTLINE_*` environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: String,
    pub token_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub permissions_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for key in Self::tracked_keys() {
            if let Ok(value) = std::env::var(key) {
                values.insert(key.to_string(), value);
            }
        }
        Self::from_map(&values, cfg!(debug_assertions))
    }

    /// Build from an explicit key/value map. `allow_dev_secret` lets a
    /// missing secret fall back to a fixed development key.
    pub fn from_map(
        values: &HashMap<String, String>,
        allow_dev_secret: bool,
    ) -> Result<Self, ConfigError> {
        fn value<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
            values
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        }

        fn seconds(
            values: &HashMap<String, String>,
            key: &str,
            default: i64,
        ) -> Result<Duration, ConfigError> {
            match value(values, key) {
                None => Ok(Duration::seconds(default)),
                Some(raw) => match raw.parse::<i64>() {
                    Ok(secs) if secs > 0 => Ok(Duration::seconds(secs)),
                    _ => Err(ConfigError::InvalidNumber {
                        key: key.to_string(),
                        value: raw.to_string(),
                    }),
                },
            }
        }

        let token_secret = match value(values, "CUTLINE_TOKEN_SECRET") {
            Some(secret) => secret.to_string(),
            None if allow_dev_secret => {
                warn!("CUTLINE_TOKEN_SECRET is not set; using the development secret");
                DEV_TOKEN_SECRET.to_string()
            }
            None => return Err(ConfigError::MissingSecret),
        };

        Ok(Self {
            database: value(values, "CUTLINE_DATABASE")
                .unwrap_or("cutline.db")
                .to_string(),
            token_secret,
            access_ttl: seconds(values, "CUTLINE_ACCESS_TTL_SECS", 900)?,
            refresh_ttl: seconds(values, "CUTLINE_REFRESH_TTL_SECS", 604_800)?,
            permissions_file: value(values, "CUTLINE_PERMISSIONS_FILE").map(PathBuf::from),
        })
    }

    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(&self.token_secret)
    }

    /// The role table from `permissions_file`, or the built-in defaults.
    pub fn load_permissions(&self) -> Result<RolePermissions, ConfigError> {
        match &self.permissions_file {
            Some(path) => RolePermissions::from_file(path),
            None => Ok(RolePermissions::default()),
        }
    }

    fn tracked_keys() -> [&'static str; 5] {
        [
            "CUTLINE_DATABASE",
            "CUTLINE_TOKEN_SECRET",
            "CUTLINE_ACCESS_TTL_SECS",
            "CUTLINE_REFRESH_TTL_SECS",
            "CUTLINE_PERMISSIONS_FILE",
        ]
    }
}

/// Limits on worker self-service voids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoidPolicy {
    /// How long after `log_time` a worker may still void their own log, and
    /// the trailing window the void quota is counted over.
    pub window: Duration,
    pub max_voids: u64,
}

impl Default for VoidPolicy {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            max_voids: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config =
            AppConfig::from_map(&map(&[("CUTLINE_TOKEN_SECRET", "s3cret")]), false).unwrap();
        assert_eq!(config.database, "cutline.db");
        assert_eq!(config.access_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_ttl, Duration::days(7));
        assert!(config.permissions_file.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let err = AppConfig::from_map(&HashMap::new(), false).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));

        let config = AppConfig::from_map(&map(&[("CUTLINE_TOKEN_SECRET", "  ")]), true).unwrap();
        assert_eq!(config.token_secret, DEV_TOKEN_SECRET);
    }

    #[test]
    fn test_invalid_ttl() {
        let err = AppConfig::from_map(
            &map(&[
                ("CUTLINE_TOKEN_SECRET", "x"),
                ("CUTLINE_ACCESS_TTL_SECS", "-5"),
            ]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { ref key, .. } if key == "CUTLINE_ACCESS_TTL_SECS"));
    }

    #[test]
    fn test_load_permissions_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "roles:\n  worker:\n    - task:read").unwrap();

        let config = AppConfig::from_map(
            &map(&[
                ("CUTLINE_TOKEN_SECRET", "x"),
                ("CUTLINE_PERMISSIONS_FILE", file.path().to_str().unwrap()),
            ]),
            false,
        )
        .unwrap();

        let perms = config.load_permissions().unwrap();
        assert!(perms.has_permission("worker", "task:read"));
        assert!(!perms.has_permission("worker", "log:create"));
    }

    #[test]
    fn test_missing_permissions_file() {
        let config = AppConfig::from_map(
            &map(&[
                ("CUTLINE_TOKEN_SECRET", "x"),
                ("CUTLINE_PERMISSIONS_FILE", "/nonexistent/perms.yaml"),
            ]),
            false,
        )
        .unwrap();
        assert!(matches!(
            config.load_permissions(),
            Err(ConfigError::Io { .. })
        ));
    }
}
