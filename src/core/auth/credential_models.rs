use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FORMS_BODY_SCOPE: &str = "https://www.googleapis.com/auth/forms.body";
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Authorization failed: {0}")]
    Consent(String),

    #[error("Service account error: {0}")]
    ServiceAccount(String),
}

/// An OAuth access token plus what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Valid means usable for at least another minute.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// An empty scope list is what older token files contain; it is accepted.
    pub fn covers(&self, scopes: &[String]) -> bool {
        self.scopes.is_empty() || scopes.iter().all(|s| self.scopes.contains(s))
    }
}

/// Where the credential lives between runs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<Credential>, AuthError>;

    async fn persist(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// The provider-specific half of the credential lifecycle.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Exchanges the refresh token for a new access token.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;

    /// Asks the user for consent. May block until they finish in the browser.
    async fn authorize(&self, scopes: &[String]) -> Result<Credential, AuthError>;
}

/// Anything that can hand out a bearer token for the Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_in_secs: i64) -> Credential {
        Credential {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: vec![FORMS_BODY_SCOPE.to_string()],
        }
    }

    #[test]
    fn test_validity_respects_margin() {
        let now = Utc::now();
        assert!(credential(3600).is_valid_at(now));
        assert!(!credential(30).is_valid_at(now));
        assert!(!credential(-10).is_valid_at(now));
    }

    #[test]
    fn test_scope_coverage() {
        let cred = credential(3600);
        assert!(cred.covers(&[FORMS_BODY_SCOPE.to_string()]));
        assert!(!cred.covers(&[
            FORMS_BODY_SCOPE.to_string(),
            GMAIL_SEND_SCOPE.to_string()
        ]));

        let legacy = Credential {
            scopes: vec![],
            ..cred
        };
        assert!(legacy.covers(&[GMAIL_SEND_SCOPE.to_string()]));
    }

    #[test]
    fn test_serialization_omits_missing_refresh_token() {
        let json = serde_json::to_string(&credential(60)).unwrap();
        assert!(json.contains("\"access_token\""));
        assert!(json.contains("\"expires_at\""));
        assert!(!json.contains("refresh_token"));
    }
}
