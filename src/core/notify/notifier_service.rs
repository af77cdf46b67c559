// Sends one invitation email per student. Sends run one after another; a
// failed send is counted and logged, and the loop moves on.

use async_trait::async_trait;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Error sending email to {recipient}: {reason}")]
pub struct EmailSendError {
    pub recipient: String,
    pub reason: String,
}

/// A plain-text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// The outbound mail service.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &Invitation) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<EmailSendError>,
}

/// Splits free text (one address per line) into trimmed, non-empty addresses.
pub fn parse_recipients(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn invitation_subject(form_title: &str) -> String {
    format!("New Quiz: {}", form_title)
}

pub fn invitation_body(form_url: &str) -> String {
    format!(
        "Hello,

A new quiz has been created for you.

Please complete the quiz using the following link:
{form_url}

Important:
- Fill in your full name, roll number, and section carefully
- Complete all questions
- You will see your score immediately after submission
- You will get feedback for each question
- You will see the correct answers for any questions you missed

Good luck!
"
    )
}

pub struct NotifierService<M: MailSender> {
    mailer: M,
}

impl<M: MailSender> NotifierService<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }

    /// Sends the invitation to every address in `recipients`.
    pub async fn send_invitations(
        &self,
        recipients: &[String],
        form_title: &str,
        form_url: &str,
    ) -> NotifyReport {
        let subject = invitation_subject(form_title);
        let body = invitation_body(form_url);
        let mut report = NotifyReport::default();

        for recipient in recipients.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            report.attempted += 1;

            let message = Invitation {
                to: recipient.to_string(),
                subject: subject.clone(),
                body: body.clone(),
            };

            match self.mailer.send(&message).await {
                Ok(()) => {
                    report.succeeded += 1;
                    tracing::info!("Sent quiz invitation to {}", recipient);
                }
                Err(e) => {
                    let failure = EmailSendError {
                        recipient: recipient.to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        report
    }
}
