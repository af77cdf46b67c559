pub mod credential_manager;
pub mod credential_models;

pub use credential_manager::CredentialManager;
pub use credential_models::{
    AuthError, Credential, CredentialStore, OAuthFlow, TokenSource, FORMS_BODY_SCOPE,
    GMAIL_SEND_SCOPE,
};
