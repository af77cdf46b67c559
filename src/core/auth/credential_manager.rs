// =============================================================================
// CREDENTIAL LIFECYCLE
// =============================================================================
//
// Decides which of the following produces the token for a request:
// 1. The in-memory copy, if it is still valid
// 2. The stored credential, if it is still valid
// 3. A refresh of the stored credential (then persisted)
// 4. Interactive consent (then persisted)
//
// Storage and the OAuth provider are both ports, so the rules here are tested
// without touching the filesystem or the network.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::credential_models::{AuthError, Credential, CredentialStore, OAuthFlow, TokenSource};

pub struct CredentialManager<S: CredentialStore, F: OAuthFlow> {
    store: S,
    flow: F,
    scopes: Vec<String>,
    cached: RwLock<Option<Credential>>,
}

impl<S: CredentialStore, F: OAuthFlow> CredentialManager<S, F> {
    pub fn new(store: S, flow: F, scopes: Vec<String>) -> Self {
        Self {
            store,
            flow,
            scopes,
            cached: RwLock::new(None),
        }
    }

    /// Returns a credential that is valid right now, renewing it if needed.
    pub async fn load_or_refresh_credential(&self) -> Result<Credential, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(credential) = cached.as_ref() {
                if credential.is_valid_at(Utc::now()) {
                    return Ok(credential.clone());
                }
            }
        }

        let credential = self.resolve().await?;

        let mut cached = self.cached.write().await;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    async fn resolve(&self) -> Result<Credential, AuthError> {
        let stored = self
            .store
            .load()
            .await?
            .filter(|credential| credential.covers(&self.scopes));

        if let Some(credential) = stored {
            if credential.is_valid_at(Utc::now()) {
                return Ok(credential);
            }

            if credential.can_refresh() {
                match self.flow.refresh(&credential).await {
                    Ok(refreshed) => {
                        tracing::info!("Refreshed Google access token");
                        self.persist(&refreshed).await;
                        return Ok(refreshed);
                    }
                    Err(e) => {
                        tracing::warn!("Token refresh failed, asking for consent again: {}", e);
                    }
                }
            }
        }

        tracing::info!("No usable Google credential, starting the consent flow");
        let granted = self.flow.authorize(&self.scopes).await?;
        self.persist(&granted).await;
        Ok(granted)
    }

    // A credential that cannot be saved is still good for this run.
    async fn persist(&self, credential: &Credential) {
        if let Err(e) = self.store.persist(credential).await {
            tracing::warn!("Failed to persist Google credential: {}", e);
        }
    }
}

#[async_trait]
impl<S: CredentialStore, F: OAuthFlow> TokenSource for CredentialManager<S, F> {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.load_or_refresh_credential().await?.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::credential_models::{FORMS_BODY_SCOPE, GMAIL_SEND_SCOPE};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn scopes() -> Vec<String> {
        vec![FORMS_BODY_SCOPE.to_string(), GMAIL_SEND_SCOPE.to_string()]
    }

    fn credential(token: &str, expires_in_secs: i64, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: token.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: scopes(),
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        stored: Mutex<Option<Credential>>,
        persisted: AtomicUsize,
    }

    impl MemoryStore {
        fn with(credential: Credential) -> Self {
            Self {
                stored: Mutex::new(Some(credential)),
                persisted: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn persist(&self, credential: &Credential) -> Result<(), AuthError> {
            self.persisted.fetch_add(1, Ordering::SeqCst);
            *self.stored.lock().unwrap() = Some(credential.clone());
            Ok(())
        }
    }

    struct FakeFlow {
        refresh_ok: bool,
        refreshes: AtomicUsize,
        consents: AtomicUsize,
    }

    impl FakeFlow {
        fn new(refresh_ok: bool) -> Self {
            Self {
                refresh_ok,
                refreshes: AtomicUsize::new(0),
                consents: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OAuthFlow for FakeFlow {
        async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_ok {
                return Err(AuthError::Refresh("invalid_grant".to_string()));
            }
            Ok(Credential {
                access_token: "refreshed".to_string(),
                expires_at: Utc::now() + Duration::seconds(3600),
                ..credential.clone()
            })
        }

        async fn authorize(&self, _scopes: &[String]) -> Result<Credential, AuthError> {
            self.consents.fetch_add(1, Ordering::SeqCst);
            Ok(credential("consented", 3600, Some("new-refresh")))
        }
    }

    #[tokio::test]
    async fn test_valid_stored_credential_is_used_as_is() {
        let manager = CredentialManager::new(
            MemoryStore::with(credential("stored", 3600, None)),
            FakeFlow::new(true),
            scopes(),
        );

        assert_eq!(manager.access_token().await.unwrap(), "stored");
        assert_eq!(manager.flow.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(manager.flow.consents.load(Ordering::SeqCst), 0);
        assert_eq!(manager.store.persisted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed_and_persisted() {
        let manager = CredentialManager::new(
            MemoryStore::with(credential("old", -5, Some("refresh"))),
            FakeFlow::new(true),
            scopes(),
        );

        assert_eq!(manager.access_token().await.unwrap(), "refreshed");
        assert_eq!(manager.store.persisted.load(Ordering::SeqCst), 1);
        let stored = manager.store.stored.lock().unwrap().clone().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_consent() {
        let manager = CredentialManager::new(
            MemoryStore::with(credential("old", -5, Some("revoked"))),
            FakeFlow::new(false),
            scopes(),
        );

        assert_eq!(manager.access_token().await.unwrap(), "consented");
        assert_eq!(manager.flow.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.flow.consents.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_store_runs_consent_once_then_caches() {
        let manager =
            CredentialManager::new(MemoryStore::default(), FakeFlow::new(true), scopes());

        assert_eq!(manager.access_token().await.unwrap(), "consented");
        assert_eq!(manager.access_token().await.unwrap(), "consented");
        assert_eq!(manager.flow.consents.load(Ordering::SeqCst), 1);
        assert_eq!(manager.store.persisted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_credential_missing_scopes_triggers_consent() {
        let narrow = Credential {
            scopes: vec![FORMS_BODY_SCOPE.to_string()],
            ..credential("forms-only", 3600, Some("refresh"))
        };
        let manager = CredentialManager::new(MemoryStore::with(narrow), FakeFlow::new(true), scopes());

        assert_eq!(manager.access_token().await.unwrap(), "consented");
        assert_eq!(manager.flow.refreshes.load(Ordering::SeqCst), 0);
    }
}
