// =============================================================================
// GMAIL CLIENT
// =============================================================================
//
// Implements `MailSender` with `users.messages.send` as the authorised user
// (`me`). The message is a plain-text RFC 2822 document, base64url-encoded
// into the `raw` field. Requires the `gmail.send` scope.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

use super::check_response;
use crate::core::auth::TokenSource;
use crate::core::notify::{Invitation, MailSender};

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Header values must stay on one line.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 encoded-word for non-ASCII subjects.
fn encode_subject(subject: &str) -> String {
    let subject = header_value(subject);
    if subject.is_ascii() {
        subject
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}

/// Renders the invitation as an RFC 2822 message with CRLF line endings.
pub fn build_mime_message(message: &Invitation) -> String {
    let body = message.body.replace("\r\n", "\n").replace('\n', "\r\n");
    format!(
        "To: {}\r\n\
         Subject: {}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         \r\n\
         {}",
        header_value(&message.to),
        encode_subject(&message.subject),
        body
    )
}

pub fn encode_raw(mime: &str) -> String {
    URL_SAFE.encode(mime.as_bytes())
}

pub struct GmailClient {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl GmailClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: Client::new(),
            tokens,
        }
    }
}

#[async_trait]
impl MailSender for GmailClient {
    async fn send(&self, message: &Invitation) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;
        let request = SendRequest {
            raw: encode_raw(&build_mime_message(message)),
        };

        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let sent: SendResponse = check_response(response, "Gmail").await?.json().await?;
        tracing::debug!("Gmail accepted message {} for {}", sent.id, message.to);
        Ok(())
    }
}
