use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::auth::{AuthError, Credential, CredentialStore};

/// Keeps the OAuth credential in a JSON file between runs.
pub struct TokenFileStore {
    path: PathBuf,
}

impl TokenFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CredentialStore for TokenFileStore {
    async fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        // An unreadable token file only costs a new consent round.
        match serde_json::from_str(&text) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!("Ignoring token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    async fn persist(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
        }

        let text = serde_json::to_string_pretty(credential)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        write_private(&self.path, text.as_bytes())
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }
}

/// Writes `contents` to `path`, readable by the owner only on unix.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    // `mode` only applies on creation; tighten files left by older runs too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }

    file.write_all(contents).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn credential() -> Credential {
        Credential {
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap(),
            scopes: vec!["https://www.googleapis.com/auth/forms.body".to_string()],
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = TokenFileStore::new(dir.path().join("token.json"));

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_creates_parent_dirs_and_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("token.json");
        let store = TokenFileStore::new(&path);

        store.persist(&credential()).await.unwrap();

        assert!(path.exists());
        assert_eq!(store.load().await.unwrap(), Some(credential()));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_latest() {
        let dir = tempdir().unwrap();
        let store = TokenFileStore::new(dir.path().join("token.json"));
        let newer = Credential {
            access_token: "ya29.newer".to_string(),
            expires_at: credential().expires_at + Duration::hours(1),
            ..credential()
        };

        store.persist(&credential()).await.unwrap();
        store.persist(&newer).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = TokenFileStore::new(&path);

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = TokenFileStore::new(&path);
        store.persist(&credential()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().await.unwrap(), Some(credential()));
    }
}
