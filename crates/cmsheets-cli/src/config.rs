//! `cmsheets.toml` configuration
//!
//! Every section has defaults; a minimal file names the document and the
//! user:
//!
//! ```toml
//! [document]
//! id = "q3-dashboard"
//! owner = "ana@example.com"
//!
//! [user]
//! email = "ana@example.com"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://dfareporting.googleapis.com/dfareporting/v4";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/dfareporting";

/// Upper bound for `sync.time_limit_secs`: one day
pub const MAX_TIME_LIMIT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub document: DocumentConfig,
    pub user: UserConfig,
    pub api: ApiConfig,
    pub oauth: OAuthConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    pub owner: String,
    /// Directory holding one CSV file per tab
    pub tabs_dir: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            id: "default".into(),
            name: "Untitled spreadsheet".into(),
            url: String::new(),
            owner: String::new(),
            tabs_dir: PathBuf::from("tabs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub auth_url: String,
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.into(),
            client_id: String::new(),
            scope: DEFAULT_SCOPE.into(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// JSON-lines file receiving outgoing mail
    pub outbox: PathBuf,
    pub daily_quota: u32,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            outbox: PathBuf::from("outbox.jsonl"),
            daily_quota: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("cmsheets.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Execution budget of one invocation; 0 disables the limit
    pub time_limit_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 360,
        }
    }
}

impl Config {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::parse(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        Ok(config.resolve_paths(base))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        anyhow::ensure!(
            config.sync.time_limit_secs <= MAX_TIME_LIMIT_SECS,
            "sync.time_limit_secs must be at most {MAX_TIME_LIMIT_SECS}, got {}",
            config.sync.time_limit_secs
        );
        Ok(config)
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.document.tabs_dir = resolve(&self.document.tabs_dir);
        self.mail.outbox = resolve(&self.mail.outbox);
        self.storage.database = resolve(&self.storage.database);
        self
    }

    pub fn time_limit(&self) -> Option<chrono::Duration> {
        if self.sync.time_limit_secs == 0 {
            return None;
        }
        i64::try_from(self.sync.time_limit_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_file_gets_defaults() {
        let config = Config::parse(
            r#"
            [document]
            id = "q3"

            [user]
            email = "ana@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.document.id, "q3");
        assert_eq!(config.document.tabs_dir, PathBuf::from("tabs"));
        assert_eq!(config.user.email, "ana@example.com");
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.oauth.scope, DEFAULT_SCOPE);
        assert_eq!(config.mail.daily_quota, 100);
        assert_eq!(config.time_limit(), Some(chrono::Duration::seconds(360)));
    }

    #[test]
    fn zero_time_limit_disables_it() {
        let config = Config::parse("[sync]\ntime_limit_secs = 0\n").unwrap();
        assert_eq!(config.time_limit(), None);
    }

    #[test]
    fn oversized_time_limit_is_rejected() {
        let err = Config::parse("[sync]\ntime_limit_secs = 9223372036854775807\n").unwrap_err();
        assert!(err.to_string().contains("time_limit_secs"));

        let config = Config::parse("[sync]\ntime_limit_secs = 86400\n").unwrap();
        assert_eq!(config.time_limit(), Some(chrono::Duration::days(1)));
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmsheets.toml");
        std::fs::write(&path, "[storage]\ndatabase = \"state/db.sqlite\"\n").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.storage.database, dir.path().join("state/db.sqlite"));
        assert_eq!(config.document.tabs_dir, dir.path().join("tabs"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(Config::parse("[mail]\ndaily_quota = \"lots\"\n").is_err());
    }
}
