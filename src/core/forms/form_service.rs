// Publishes parsed questions as a self-grading quiz form.
//
// The remote sequence is fixed:
//   create form -> enable quiz -> add all items -> enable quiz again -> fetch link
// Any remote failure aborts the run; malformed questions never get this far
// because `assemble_questions` already skipped them.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use thiserror::Error;

use super::form_models::{ChoiceItem, FormItem, FormUpdate, PublishedForm, STUDENT_INFO_FIELDS};
use crate::core::quiz::ParsedQuestion;

/// Remote call that failed, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStage {
    Create,
    EnableQuiz,
    AddItems,
    FinalSettings,
    FetchLink,
}

impl fmt::Display for FormStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FormStage::Create => "creating the form",
            FormStage::EnableQuiz => "enabling quiz mode",
            FormStage::AddItems => "adding questions",
            FormStage::FinalSettings => "applying final settings",
            FormStage::FetchLink => "fetching the responder link",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum FormCreationError {
    #[error("No well-formed questions to put on the form")]
    NoQuestions,

    #[error("Error creating Google Form while {stage}: {message}")]
    Api { stage: FormStage, message: String },
}

/// The remote form service.
#[async_trait]
pub trait FormService: Send + Sync {
    /// Creates an empty form and returns its id.
    async fn create_form(&self, title: &str) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Applies all updates in one request.
    async fn batch_update(
        &self,
        form_id: &str,
        updates: &[FormUpdate],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// The public link students use to answer the form.
    async fn responder_url(&self, form_id: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Builds the item list: student info fields first, then one graded item per question.
pub fn build_item_updates(questions: &[ParsedQuestion]) -> Vec<FormUpdate> {
    let info_fields = STUDENT_INFO_FIELDS.iter().map(|title| FormItem::TextField {
        title: title.to_string(),
        required: true,
    });
    let choices = questions
        .iter()
        .map(|q| FormItem::Choice(ChoiceItem::from_question(q)));

    info_fields
        .chain(choices)
        .enumerate()
        .map(|(index, item)| FormUpdate::CreateItem { item, index })
        .collect()
}

pub struct QuizFormPublisher<F: FormService> {
    forms: F,
}

impl<F: FormService> QuizFormPublisher<F> {
    pub fn new(forms: F) -> Self {
        Self { forms }
    }

    pub async fn publish(
        &self,
        title: &str,
        questions: &[ParsedQuestion],
    ) -> Result<PublishedForm, FormCreationError> {
        if questions.is_empty() {
            return Err(FormCreationError::NoQuestions);
        }

        let api_error = |stage: FormStage| {
            move |e: Box<dyn Error + Send + Sync>| FormCreationError::Api {
                stage,
                message: e.to_string(),
            }
        };

        let form_id = self
            .forms
            .create_form(title)
            .await
            .map_err(api_error(FormStage::Create))?;
        tracing::info!("Created form {} titled '{}'", form_id, title);

        self.forms
            .batch_update(&form_id, &[FormUpdate::EnableQuiz])
            .await
            .map_err(api_error(FormStage::EnableQuiz))?;

        let items = build_item_updates(questions);
        tracing::debug!("Adding {} item(s) to form {}", items.len(), form_id);
        self.forms
            .batch_update(&form_id, &items)
            .await
            .map_err(api_error(FormStage::AddItems))?;

        self.forms
            .batch_update(&form_id, &[FormUpdate::EnableQuiz])
            .await
            .map_err(api_error(FormStage::FinalSettings))?;

        let responder_url = self
            .forms
            .responder_url(&form_id)
            .await
            .map_err(api_error(FormStage::FetchLink))?;

        Ok(PublishedForm {
            form_id,
            responder_url,
            question_count: questions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(String),
        Batch(Vec<FormUpdate>),
        Link,
    }

    #[derive(Default)]
    struct RecordingForms {
        calls: Mutex<Vec<Call>>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl FormService for RecordingForms {
        async fn create_form(&self, title: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.lock().unwrap().push(Call::Create(title.to_string()));
            Ok("form-123".to_string())
        }

        async fn batch_update(
            &self,
            _form_id: &str,
            updates: &[FormUpdate],
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut calls = self.calls.lock().unwrap();
            let batch_number = calls.iter().filter(|c| matches!(c, Call::Batch(_))).count();
            calls.push(Call::Batch(updates.to_vec()));
            if self.fail_on_batch == Some(batch_number) {
                return Err("403 PERMISSION_DENIED".into());
            }
            Ok(())
        }

        async fn responder_url(&self, form_id: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.lock().unwrap().push(Call::Link);
            Ok(format!("https://docs.google.com/forms/d/e/{}/viewform", form_id))
        }
    }

    fn question(stem: &str, correct_index: usize) -> ParsedQuestion {
        ParsedQuestion {
            position: 1,
            stem: stem.to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_index,
            answer_defaulted: false,
        }
    }

    #[test]
    fn test_items_start_with_student_fields() {
        let updates = build_item_updates(&[question("1: What is 2+2?", 1)]);

        assert_eq!(updates.len(), STUDENT_INFO_FIELDS.len() + 1);
        assert_eq!(
            updates[0],
            FormUpdate::CreateItem {
                item: FormItem::TextField {
                    title: "Full Name".to_string(),
                    required: true
                },
                index: 0
            }
        );

        match &updates[4] {
            FormUpdate::CreateItem {
                item: FormItem::Choice(choice),
                index,
            } => {
                assert_eq!(*index, 4);
                assert_eq!(choice.title, "1: What is 2+2?");
                assert_eq!(choice.correct_option, "4");
                assert_eq!(choice.when_wrong, "The correct answer is: 4");
                assert_eq!(choice.point_value, 1);
                assert!(choice.shuffle);
            }
            other => panic!("expected a choice item, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_issues_calls_in_order() {
        let publisher = QuizFormPublisher::new(RecordingForms::default());

        let published = publisher
            .publish("Quiz: notes.pdf - Easy Level", &[question("A?", 0), question("B?", 2)])
            .await
            .unwrap();

        assert_eq!(published.form_id, "form-123");
        assert_eq!(published.question_count, 2);
        assert!(published.responder_url.ends_with("/viewform"));

        let calls = publisher.forms.calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], Call::Create("Quiz: notes.pdf - Easy Level".to_string()));
        assert_eq!(calls[1], Call::Batch(vec![FormUpdate::EnableQuiz]));
        match &calls[2] {
            Call::Batch(items) => assert_eq!(items.len(), 6),
            other => panic!("expected item batch, got {:?}", other),
        }
        assert_eq!(calls[3], Call::Batch(vec![FormUpdate::EnableQuiz]));
        assert_eq!(calls[4], Call::Link);
    }

    #[tokio::test]
    async fn test_remote_failure_names_the_stage() {
        let publisher = QuizFormPublisher::new(RecordingForms {
            fail_on_batch: Some(1),
            ..Default::default()
        });

        match publisher.publish("Quiz", &[question("A?", 0)]).await {
            Err(FormCreationError::Api { stage, message }) => {
                assert_eq!(stage, FormStage::AddItems);
                assert!(message.contains("PERMISSION_DENIED"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_questions_makes_no_remote_calls() {
        let publisher = QuizFormPublisher::new(RecordingForms::default());

        let result = publisher.publish("Quiz", &[]).await;

        assert!(matches!(result, Err(FormCreationError::NoQuestions)));
        assert!(publisher.forms.calls.lock().unwrap().is_empty());
    }
}
