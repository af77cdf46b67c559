pub mod forms_client;
pub mod gmail_client;
pub mod oauth;
pub mod service_account;
pub mod token_file_store;

pub use forms_client::GoogleFormsClient;
pub use gmail_client::GmailClient;
pub use oauth::{ClientSecret, InstalledAppFlow};
pub use service_account::ServiceAccountAuth;
pub use token_file_store::TokenFileStore;

use reqwest::Response;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

/// Passes successful responses through; turns anything else into an error
/// carrying Google's own message when the body has one.
pub(crate) async fn check_response(
    response: Response,
    api: &str,
) -> Result<Response, Box<dyn Error + Send + Sync>> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await?;
    Err(describe_error(api, status.as_u16(), &text).into())
}

fn describe_error(api: &str, status: u16, body: &str) -> String {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(parsed) => format!(
            "{} API error ({} {}): {}",
            api,
            status,
            parsed.error.status.unwrap_or_default(),
            parsed.error.message
        ),
        Err(_) => format!("{} API error: {} - {}", api, status, body),
    }
}
