// Entry point of the quiz generator.
//
// **Architecture Overview:**
// - `core/` = Business logic (quiz parsing, form assembly, credential rules)
// - `infra/` = Implementations of core traits (Gemini, lopdf + Tesseract, Google APIs)
// - `cli/` = Command-line adapter (arguments, environment, printed reports)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the requested command and report failures without panicking

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use crate::cli::args::{Cli, Command, PublishArgs, QuizArgs};
use crate::cli::config::{
    AiProviderKind, AiSettings, GoogleAuthSettings, OcrSettings, ServiceAccountKey,
};
use crate::cli::report::{render_delivery, render_generated};
use crate::core::ai::{AiProvider, AiService};
use crate::core::auth::{CredentialManager, TokenSource, FORMS_BODY_SCOPE, GMAIL_SEND_SCOPE};
use crate::core::forms::QuizFormPublisher;
use crate::core::notify::{parse_recipients, NotifierService};
use crate::core::pipeline::{form_title, GeneratedQuiz, QuizDelivery, QuizPipeline, QuizRequest};
use crate::infra::ai::{GeminiClient, OpenRouterClient};
use crate::infra::google::{
    ClientSecret, GmailClient, GoogleFormsClient, InstalledAppFlow, ServiceAccountAuth,
    TokenFileStore,
};
use crate::infra::pdf::{PdfExtractor, TesseractOcr};

// ============================================================================
// DEPENDENCY INJECTION
// ============================================================================

fn build_ai_service(settings: AiSettings) -> AiService<Box<dyn AiProvider>> {
    let provider: Box<dyn AiProvider> = match settings.provider {
        AiProviderKind::Gemini => Box::new(GeminiClient::new(settings.api_key)),
        AiProviderKind::OpenRouter => Box::new(OpenRouterClient::new(settings.api_key)),
    };
    AiService::new(provider, settings.config)
}

fn build_extractor(settings: &OcrSettings) -> PdfExtractor {
    if !settings.enabled {
        tracing::info!("OCR disabled, embedded images will not be read");
        return PdfExtractor::text_only();
    }

    let ocr = TesseractOcr::new(&settings.command, &settings.language);
    if !ocr.is_available() {
        tracing::warn!(
            "'{}' could not be run, embedded images will not be read",
            settings.command
        );
        return PdfExtractor::text_only();
    }

    PdfExtractor::new(Box::new(ocr))
}

fn google_scopes() -> Vec<String> {
    vec![FORMS_BODY_SCOPE.to_string(), GMAIL_SEND_SCOPE.to_string()]
}

async fn build_token_source(settings: &GoogleAuthSettings) -> Result<Arc<dyn TokenSource>> {
    let source: Arc<dyn TokenSource> = match settings {
        GoogleAuthSettings::InstalledApp {
            client_secret_file,
            token_file,
            port,
        } => {
            let secret = ClientSecret::from_file(client_secret_file)
                .await
                .map_err(|e| anyhow!("Failed to load OAuth client secret: {}", e))?;
            let flow = InstalledAppFlow::new(secret, *port);
            let store = TokenFileStore::new(token_file);
            Arc::new(CredentialManager::new(store, flow, google_scopes()))
        }
        GoogleAuthSettings::ServiceAccount {
            key,
            delegated_user,
        } => {
            let auth = match key {
                ServiceAccountKey::File(path) => {
                    ServiceAccountAuth::from_file(path, google_scopes()).await
                }
                ServiceAccountKey::Json(json) => ServiceAccountAuth::from_json(json, google_scopes()),
            }
            .map_err(|e| anyhow!("Failed to load service account key: {}", e))?;

            if delegated_user.is_none() {
                tracing::warn!(
                    "GOOGLE_DELEGATED_USER is not set; {} has no mailbox to send invitations from",
                    auth.client_email()
                );
            }
            Arc::new(auth.with_delegated_user(delegated_user.clone()))
        }
    };
    Ok(source)
}

// ============================================================================
// COMMANDS
// ============================================================================

async fn generate(args: &QuizArgs) -> Result<GeneratedQuiz> {
    let ai = build_ai_service(AiSettings::from_env()?);
    tracing::info!("Using model {}", ai.model());
    let extractor = Arc::new(build_extractor(&OcrSettings::from_env()?));
    let pipeline = QuizPipeline::new(extractor, ai);

    let request = QuizRequest {
        pdf_path: args.pdf.clone(),
        difficulty: args.difficulty,
        count: args.count,
    };
    Ok(pipeline.generate(&request).await?)
}

async fn publish(args: PublishArgs) -> Result<()> {
    let mut recipients = args.recipients;
    if let Some(path) = &args.recipients_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read recipients file {}", path.display()))?;
        recipients.extend(parse_recipients(&text));
    }
    if recipients.is_empty() {
        tracing::warn!("No recipients given, the form will be created without invitations");
    }

    // Authorise first so a consent problem does not waste a model call.
    let tokens = build_token_source(&GoogleAuthSettings::from_env()?).await?;
    tokens.access_token().await?;

    let generated = generate(&args.quiz).await?;
    let title = args
        .title
        .unwrap_or_else(|| form_title(&args.quiz.pdf, args.quiz.difficulty));

    let delivery = QuizDelivery::new(
        QuizFormPublisher::new(GoogleFormsClient::new(Arc::clone(&tokens))),
        NotifierService::new(GmailClient::new(tokens)),
    );
    let report = delivery.deliver(&title, &generated.quiz, &recipients).await?;

    print!("{}", render_delivery(&report, &generated));
    Ok(())
}

async fn login() -> Result<()> {
    let settings = GoogleAuthSettings::from_env()?;
    let tokens = build_token_source(&settings).await?;
    tokens.access_token().await?;

    match &settings {
        GoogleAuthSettings::InstalledApp { token_file, .. } => {
            println!("Google access granted, credential stored in {}", token_file.display());
        }
        GoogleAuthSettings::ServiceAccount { .. } => {
            println!("Service account token obtained");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => {
            let generated = generate(&args).await?;
            print!("{}", render_generated(&generated));
        }
        Command::Publish(args) => publish(args).await?,
        Command::Login => login().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env first so RUST_LOG set there applies to the subscriber.
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
