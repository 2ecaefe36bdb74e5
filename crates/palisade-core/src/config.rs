use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PalisadeError, Result};

/// Environment variables that override storage credentials from the file.
pub const ACCESS_KEY_ENV: &str = "PALISADE_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "PALISADE_SECRET_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreConfig>,
}

/// A named backup job driven by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub path: String,
    /// Human-readable interval such as `"1h"`, `"10m"`, `"1h30m"`.
    pub interval: String,
}

impl Job {
    pub fn interval_duration(&self) -> Result<Duration> {
        parse_interval(&self.interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StorageConfig {
    /// Credentials with environment overrides applied. The file values are
    /// the fallback so configs can omit secrets entirely.
    pub fn resolved_credentials(&self) -> (String, String) {
        let access = std::env::var(ACCESS_KEY_ENV).unwrap_or_else(|_| self.access_key.clone());
        let secret = std::env::var(SECRET_KEY_ENV).unwrap_or_else(|_| self.secret_key.clone());
        (access, secret)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    pub target_dir: String,
    #[serde(default)]
    pub priority_patterns: Vec<String>,
}

/// Load the JSON configuration file.
pub fn load(path: &Path) -> Result<Config> {
    let data = std::fs::read(path).map_err(|e| {
        PalisadeError::Config(format!("cannot read config '{}': {e}", path.display()))
    })?;
    let cfg: Config = serde_json::from_slice(&data).map_err(|e| {
        PalisadeError::Config(format!("malformed config '{}': {e}", path.display()))
    })?;
    Ok(cfg)
}

/// Parse a composable duration string with `ns`/`us`/`ms`/`s`/`m`/`h`
/// suffixes, e.g. `"10m"`, `"1h30m"`, `"1500ms"`.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(PalisadeError::Config("interval must not be empty".into()));
    }

    let bytes = input.as_bytes();
    let mut total = Duration::ZERO;
    let mut pos = 0;

    while pos < bytes.len() {
        let num_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == num_start {
            return Err(PalisadeError::Config(format!(
                "invalid interval '{raw}': expected a number at '{}'",
                &input[pos..]
            )));
        }
        let value: u64 = input[num_start..pos]
            .parse()
            .map_err(|_| PalisadeError::Config(format!("invalid interval value in '{raw}'")))?;

        let unit_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let step = match &input[unit_start..pos] {
            "ns" => Duration::from_nanos(value),
            "us" => Duration::from_micros(value),
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(60 * 60)),
            "" => {
                return Err(PalisadeError::Config(format!(
                    "invalid interval '{raw}': missing unit (use ns/us/ms/s/m/h)"
                )));
            }
            other => {
                return Err(PalisadeError::Config(format!(
                    "invalid interval '{raw}': unknown unit '{other}'"
                )));
            }
        };
        total = total
            .checked_add(step)
            .ok_or_else(|| PalisadeError::Config(format!("interval '{raw}' overflows")))?;
    }

    if total.is_zero() {
        return Err(PalisadeError::Config(format!(
            "interval '{raw}' must be positive"
        )));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_units() {
        assert_eq!(parse_interval("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_interval("7us").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_interval("3ns").unwrap(), Duration::from_nanos(3));
    }

    #[test]
    fn parse_composed_segments() {
        assert_eq!(
            parse_interval("1h30m").unwrap(),
            Duration::from_secs(90 * 60)
        );
        assert_eq!(
            parse_interval("2m30s").unwrap(),
            Duration::from_secs(150)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("  ").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("ten minutes").is_err());
        assert!(parse_interval("10w").is_err());
        assert!(parse_interval("0s").is_err());
    }

    #[test]
    fn load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "jobs": [
                    {"name": "home", "path": "/home/user", "interval": "1h"},
                    {"name": "etc", "path": "/etc", "interval": "30m"}
                ],
                "storage": {
                    "type": "s3",
                    "bucket": "backups",
                    "endpoint": "minio.local:9000",
                    "use_ssl": true,
                    "access_key": "ak",
                    "secret_key": "sk"
                },
                "restore": {
                    "target_dir": "/restore",
                    "priority_patterns": ["*.key", "*.conf"]
                }
            }"#,
        )
        .unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.jobs.len(), 2);
        assert_eq!(cfg.jobs[0].interval_duration().unwrap().as_secs(), 3600);
        let storage = cfg.storage.unwrap();
        assert_eq!(storage.kind, StorageKind::S3);
        assert_eq!(storage.region, "us-east-1");
        assert_eq!(
            cfg.restore.unwrap().priority_patterns,
            vec!["*.key", "*.conf"]
        );
    }

    #[test]
    fn load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"jobs": []}"#).unwrap();

        let cfg = load(&path).unwrap();
        assert!(cfg.jobs.is_empty());
        assert!(cfg.storage.is_none());
        assert!(cfg.restore.is_none());
    }

    #[test]
    fn malformed_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(load(&path), Err(PalisadeError::Config(_))));
    }
}
