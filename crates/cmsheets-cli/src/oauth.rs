//! Reporting-scope OAuth token kept in user properties.
//!
//! The code-for-token exchange happens outside cmsheets; the resulting
//! access token is stored with `cmsheets auth set-token`.

use chrono::{DateTime, Duration, Utc};
use cmsheets_core::{OAuthDelegate, PropertyStore, Scope, SyncError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::OAuthConfig;

/// User property holding the serialized token
pub const TOKEN_KEY: &str = "oauth2.dfareporting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct PropertyOAuth<'a> {
    store: &'a dyn PropertyStore,
    config: OAuthConfig,
}

impl<'a> PropertyOAuth<'a> {
    pub fn new(store: &'a dyn PropertyStore, config: OAuthConfig) -> Self {
        Self { store, config }
    }

    pub fn store_token(&self, access_token: &str, expires_in: Option<Duration>) -> Result<(), SyncError> {
        let token = StoredToken {
            access_token: access_token.to_string(),
            expires_at: expires_in.map(|d| Utc::now() + d),
        };
        let json = serde_json::to_string(&token)
            .map_err(|e| SyncError::Api(format!("cannot serialize token: {e}")))?;
        self.store.set(Scope::User, TOKEN_KEY, &json)?;
        Ok(())
    }

    pub fn token(&self) -> Option<StoredToken> {
        let raw = match self.store.get(Scope::User, TOKEN_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "stored token unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(error = %err, "stored token is not valid JSON; ignoring it");
                None
            }
        }
    }

    fn valid_token(&self) -> Option<StoredToken> {
        self.token()
            .filter(|t| t.expires_at.map_or(true, |at| at > Utc::now()))
    }
}

impl OAuthDelegate for PropertyOAuth<'_> {
    fn has_access(&self) -> bool {
        self.valid_token().is_some()
    }

    fn access_token(&self) -> Result<String, SyncError> {
        self.valid_token()
            .map(|t| t.access_token)
            .ok_or_else(|| SyncError::AuthRequired {
                authorization_url: self.authorization_url(),
            })
    }

    fn authorization_url(&self) -> String {
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        match Url::parse_with_params(&self.config.auth_url, &params) {
            Ok(url) => url.to_string(),
            Err(err) => {
                warn!(auth_url = %self.config.auth_url, error = %err, "invalid authorization endpoint");
                self.config.auth_url.clone()
            }
        }
    }

    fn reset(&self) -> Result<(), SyncError> {
        self.store.delete(Scope::User, TOKEN_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsheets_core::memory::MemoryPropertyStore;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-1".into(),
            ..OAuthConfig::default()
        }
    }

    #[test]
    fn no_token_means_no_access() {
        let props = MemoryPropertyStore::new();
        let oauth = PropertyOAuth::new(&props, config());
        assert!(!oauth.has_access());
        assert!(oauth.access_token().unwrap_err().is_auth_required());
    }

    #[test]
    fn stored_token_is_returned_until_reset() {
        let props = MemoryPropertyStore::new();
        let oauth = PropertyOAuth::new(&props, config());
        oauth.store_token("ya29.abc", Some(Duration::hours(1))).unwrap();

        assert!(oauth.has_access());
        assert_eq!(oauth.access_token().unwrap(), "ya29.abc");

        oauth.reset().unwrap();
        assert!(!oauth.has_access());
    }

    #[test]
    fn expired_token_is_ignored() {
        let props = MemoryPropertyStore::new();
        let oauth = PropertyOAuth::new(&props, config());
        oauth.store_token("old", Some(Duration::seconds(-5))).unwrap();
        assert!(!oauth.has_access());
    }

    #[test]
    fn authorization_url_carries_scope_and_client() {
        let props = MemoryPropertyStore::new();
        let url = PropertyOAuth::new(&props, config()).authorization_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdfareporting"));
    }
}
