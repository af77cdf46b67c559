// =============================================================================
// QUIZ PIPELINE
// =============================================================================
//
// Linear, run-to-completion flow:
//
//   extract -> build prompt -> model -> parse -> assemble   (QuizPipeline)
//   publish form -> email students                           (QuizDelivery)
//
// Stage failures abort the run with a PipelineError. Per-item failures
// (a malformed question, one bounced email) are recorded in the reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::ai::{AiProvider, AiService, GenerationError};
use crate::core::extract::{DocumentExtractor, ExtractionError, RawDocumentText};
use crate::core::forms::{FormCreationError, FormService, PublishedForm, QuizFormPublisher};
use crate::core::notify::{MailSender, NotifierService, NotifyReport};
use crate::core::quiz::{
    assemble_questions, build_prompt, parse_completion, AssembledQuiz, Difficulty,
    ParsedCompletion, QuestionCount, QuizError,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    FormCreation(#[from] FormCreationError),
}

#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub pdf_path: PathBuf,
    pub difficulty: Difficulty,
    pub count: QuestionCount,
}

#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub document: RawDocumentText,
    pub completion: ParsedCompletion,
    pub quiz: AssembledQuiz,
}

/// `Quiz: {file name} - {Difficulty} Level`
pub fn form_title(pdf_path: &Path, difficulty: Difficulty) -> String {
    let name = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pdf_path.display().to_string());
    format!("Quiz: {} - {} Level", name, difficulty)
}

pub struct QuizPipeline<E: DocumentExtractor + 'static, P: AiProvider> {
    extractor: Arc<E>,
    ai: AiService<P>,
}

impl<E: DocumentExtractor + 'static, P: AiProvider> QuizPipeline<E, P> {
    pub fn new(extractor: Arc<E>, ai: AiService<P>) -> Self {
        Self { extractor, ai }
    }

    /// Runs the extractor on the blocking pool.
    pub async fn extract(&self, path: &Path) -> Result<RawDocumentText, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
    }

    pub async fn generate(&self, request: &QuizRequest) -> Result<GeneratedQuiz, PipelineError> {
        let document = self.extract(&request.pdf_path).await?;
        tracing::info!(
            "Extracted {} chars from {} page(s), {} image(s) read by OCR",
            document.text.len(),
            document.page_count,
            document.images_read
        );

        let prompt = build_prompt(&document.text, request.difficulty, request.count);
        let completion = self.ai.generate(&prompt).await?;
        let completion = parse_completion(&completion)?;

        let quiz = assemble_questions(&completion.blocks, &completion.answers);
        if quiz.questions.len() != request.count.get() as usize {
            tracing::warn!(
                "Asked for {} question(s), kept {} ({} skipped)",
                request.count.get(),
                quiz.questions.len(),
                quiz.skipped.len()
            );
        }

        Ok(GeneratedQuiz {
            document,
            completion,
            quiz,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub form: PublishedForm,
    pub emails: NotifyReport,
}

pub struct QuizDelivery<F: FormService, M: MailSender> {
    publisher: QuizFormPublisher<F>,
    notifier: NotifierService<M>,
}

impl<F: FormService, M: MailSender> QuizDelivery<F, M> {
    pub fn new(publisher: QuizFormPublisher<F>, notifier: NotifierService<M>) -> Self {
        Self {
            publisher,
            notifier,
        }
    }

    /// Publishes the form, then emails every recipient. Emails are only sent
    /// once the form exists.
    pub async fn deliver(
        &self,
        title: &str,
        quiz: &AssembledQuiz,
        recipients: &[String],
    ) -> Result<DeliveryReport, PipelineError> {
        let form = self.publisher.publish(title, &quiz.questions).await?;
        tracing::info!("Quiz created successfully: {}", form.responder_url);

        let emails = self
            .notifier
            .send_invitations(recipients, title, &form.responder_url)
            .await;

        Ok(DeliveryReport { form, emails })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::{AiConfig, AiMessage, AiProviderResponse};
    use crate::core::forms::FormUpdate;
    use crate::core::notify::Invitation;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::Mutex;

    struct FixedExtractor(Result<&'static str, ()>);

    impl DocumentExtractor for FixedExtractor {
        fn extract(&self, path: &Path) -> Result<RawDocumentText, ExtractionError> {
            match self.0 {
                Ok(text) => Ok(RawDocumentText {
                    text: text.to_string(),
                    page_count: 1,
                    images_read: 0,
                }),
                Err(()) => Err(ExtractionError::Unreadable {
                    path: path.to_path_buf(),
                    reason: "not a PDF".to_string(),
                }),
            }
        }
    }

    struct FixedModel {
        completion: &'static str,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AiProvider for FixedModel {
        async fn chat_complete(
            &self,
            messages: &[AiMessage],
            _config: &AiConfig,
        ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
            self.prompts
                .lock()
                .unwrap()
                .extend(messages.iter().map(|m| m.content.clone()));
            Ok(AiProviderResponse {
                content: self.completion.to_string(),
                thinking: None,
            })
        }
    }

    struct NullForms;

    #[async_trait]
    impl FormService for NullForms {
        async fn create_form(&self, _title: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok("f1".to_string())
        }

        async fn batch_update(
            &self,
            _form_id: &str,
            _updates: &[FormUpdate],
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }

        async fn responder_url(&self, _form_id: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok("https://forms.example/f1".to_string())
        }
    }

    #[derive(Default)]
    struct CountingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailSender for CountingMailer {
        async fn send(&self, message: &Invitation) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.sent.lock().unwrap().push(message.to.clone());
            Ok(())
        }
    }

    const COMPLETION: &str = "Question No. 1: What is 2+2?\na. 3\nb. 4\nc. 5\nd. 6\n\nAnswer Key:\nQ1. b";

    fn request(count: u32) -> QuizRequest {
        QuizRequest {
            pdf_path: PathBuf::from("uploads/arithmetic.pdf"),
            difficulty: Difficulty::Easy,
            count: QuestionCount::new(count).unwrap(),
        }
    }

    type Prompts = Arc<Mutex<Vec<String>>>;

    fn pipeline(
        extractor: FixedExtractor,
        completion: &'static str,
    ) -> (QuizPipeline<FixedExtractor, FixedModel>, Prompts) {
        let prompts = Prompts::default();
        let model = FixedModel {
            completion,
            prompts: Arc::clone(&prompts),
        };
        let pipeline =
            QuizPipeline::new(Arc::new(extractor), AiService::new(model, AiConfig::default()));
        (pipeline, prompts)
    }

    #[test]
    fn test_form_title_uses_file_name() {
        assert_eq!(
            form_title(Path::new("/tmp/uploads/cells.pdf"), Difficulty::Hard),
            "Quiz: cells.pdf - Hard Level"
        );
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let (pipeline, prompts) = pipeline(FixedExtractor(Ok("Two plus two is four.")), COMPLETION);

        let generated = pipeline.generate(&request(1)).await.unwrap();

        assert_eq!(generated.quiz.questions.len(), 1);
        let question = &generated.quiz.questions[0];
        assert_eq!(question.stem, "1: What is 2+2?");
        assert_eq!(question.options, vec!["3", "4", "5", "6"]);
        assert_eq!(question.correct_index, 1);

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("exactly 1 easy MCQ questions"));
        assert!(prompts[0].ends_with("Two plus two is four."));
    }

    #[tokio::test]
    async fn test_extraction_failure_stops_before_the_model() {
        let (pipeline, prompts) = pipeline(FixedExtractor(Err(())), COMPLETION);

        let result = pipeline.generate(&request(1)).await;

        assert!(matches!(result, Err(PipelineError::Extraction(_))));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_answer_key_aborts() {
        let (pipeline, _) = pipeline(FixedExtractor(Ok("text")), "Question No. 1: A?\na. x");

        let result = pipeline.generate(&request(1)).await;

        assert!(matches!(
            result,
            Err(PipelineError::Quiz(QuizError::MissingAnswerKey))
        ));
    }

    #[tokio::test]
    async fn test_delivery_publishes_then_emails() {
        let delivery = QuizDelivery::new(
            QuizFormPublisher::new(NullForms),
            NotifierService::new(CountingMailer::default()),
        );
        let (pipeline, _) = pipeline(FixedExtractor(Ok("text")), COMPLETION);
        let generated = pipeline.generate(&request(1)).await.unwrap();
        let recipients = vec!["a@school.edu".to_string(), "b@school.edu".to_string()];

        let report = delivery
            .deliver("Quiz: arithmetic.pdf - Easy Level", &generated.quiz, &recipients)
            .await
            .unwrap();

        assert_eq!(report.form.responder_url, "https://forms.example/f1");
        assert_eq!(report.emails.succeeded, 2);
    }
}
