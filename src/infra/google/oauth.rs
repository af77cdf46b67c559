// =============================================================================
// GOOGLE OAUTH - INSTALLED APP FLOW
// =============================================================================
//
// Implements `OAuthFlow` for a desktop client secret
// (`client_secret.json` downloaded from the Cloud Console):
//
// 1. Print a consent URL carrying a random `state`.
// 2. Wait for the browser redirect on http://127.0.0.1:{port}/ (one request).
// 3. Check `state`, then trade the `code` for tokens at the token URI.
//
// Refresh uses the stored refresh token; Google usually omits a new one in
// the refresh response, in which case the old one is kept.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::core::auth::{AuthError, Credential, OAuthFlow};

const STATE_LENGTH: usize = 30;
/// Both the listener and the redirect URI use the IPv4 literal, so the
/// browser cannot resolve `localhost` to `::1` and miss the listener.
const LOOPBACK_HOST: &str = "127.0.0.1";
const MAX_REQUEST_BYTES: usize = 16 * 1024;

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Connection: close\r\n\r\n\
The authentication flow has completed. You may close this window.";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_json(json: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "client secret has neither an \"installed\" nor a \"web\" section".into())
    }

    pub async fn from_file(path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenEndpointResponse {
    fn into_credential(self, fallback_refresh: Option<String>, requested: &[String]) -> Credential {
        let scopes = match self.scope {
            Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => requested.to_vec(),
        };

        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            scopes,
        }
    }
}

pub fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Builds the consent URL. Offline access plus forced consent makes Google
/// return a refresh token every time.
pub fn build_authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.join(" ").as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::Consent(format!("invalid auth URI {}: {}", secret.auth_uri, e)))
}

/// Pulls the authorization code out of the redirect's request line,
/// e.g. `GET /?state=abc&code=4/0Ab HTTP/1.1`.
pub fn parse_redirect_request(request: &str, expected_state: &str) -> Result<String, AuthError> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| AuthError::Consent("malformed redirect request".to_string()))?;

    let url = Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| AuthError::Consent(format!("malformed redirect target: {}", e)))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(AuthError::Consent(format!("authorization denied: {}", error)));
    }
    if param("state").as_deref() != Some(expected_state) {
        return Err(AuthError::Consent(
            "state mismatch in redirect, possible CSRF".to_string(),
        ));
    }

    param("code").ok_or_else(|| AuthError::Consent("redirect carried no code".to_string()))
}

pub struct InstalledAppFlow {
    secret: ClientSecret,
    port: u16,
    client: Client,
}

impl InstalledAppFlow {
    pub fn new(secret: ClientSecret, port: u16) -> Self {
        Self {
            secret,
            port,
            client: Client::new(),
        }
    }

    fn redirect_uri(&self) -> String {
        format!("http://{}:{}/", LOOPBACK_HOST, self.port)
    }

    /// Accepts exactly one connection on the loopback port and returns its request head.
    async fn receive_redirect(&self, listener: TcpListener) -> Result<String, Box<dyn Error + Send + Sync>> {
        let (mut stream, peer) = listener.accept().await?;
        tracing::debug!("OAuth redirect received from {}", peer);

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buffer.windows(4).any(|w| w == b"\r\n\r\n") && buffer.len() < MAX_REQUEST_BYTES {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        stream.write_all(SUCCESS_PAGE.as_bytes()).await?;
        stream.shutdown().await?;

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenEndpointResponse, Box<dyn Error + Send + Sync>> {
        let response = self
            .client
            .post(&self.secret.token_uri)
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(format!("Token endpoint error ({}): {}", status, text).into());
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl OAuthFlow for InstalledAppFlow {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Refresh("no refresh token stored".to_string()))?;

        let response = self
            .token_request(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        Ok(response.into_credential(credential.refresh_token.clone(), &credential.scopes))
    }

    async fn authorize(&self, scopes: &[String]) -> Result<Credential, AuthError> {
        let consent_error = |e: Box<dyn Error + Send + Sync>| AuthError::Consent(e.to_string());

        let listener = TcpListener::bind((LOOPBACK_HOST, self.port))
            .await
            .map_err(|e| AuthError::Consent(format!("cannot listen on port {}: {}", self.port, e)))?;

        let state = random_state();
        let redirect_uri = self.redirect_uri();
        let url = build_authorization_url(&self.secret, &redirect_uri, scopes, &state)?;

        println!("Please visit this URL to authorize this application:\n{}", url);

        let request = self.receive_redirect(listener).await.map_err(consent_error)?;
        let code = parse_redirect_request(&request, &state)?;

        let response = self
            .token_request(&[
                ("code", code.as_str()),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await
            .map_err(consent_error)?;

        tracing::info!("Google authorization granted");
        Ok(response.into_credential(None, scopes))
    }
}
