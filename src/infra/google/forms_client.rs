// =============================================================================
// GOOGLE FORMS CLIENT
// =============================================================================
//
// Implements `FormService` over the Forms REST API v1
// (https://developers.google.com/forms/api/reference/rest).
//
// - `POST /v1/forms` creates a form; only `info.title` and
//   `info.documentTitle` are accepted at creation time.
// - `POST /v1/forms/{id}:batchUpdate` applies settings and item requests.
// - `GET /v1/forms/{id}` returns the form, including `responderUri`.
//
// Requires the `forms.body` scope.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

use super::check_response;
use crate::core::auth::TokenSource;
use crate::core::forms::{ChoiceItem, FormItem, FormService, FormUpdate};

const FORMS_API_URL: &str = "https://forms.googleapis.com/v1/forms";

// =============================================================================
// REQUEST STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Info {
    title: String,
    document_title: String,
}

#[derive(Debug, Serialize)]
struct CreateFormRequest {
    info: Info,
}

#[derive(Debug, Serialize)]
struct BatchUpdateRequest {
    requests: Vec<Request>,
}

/// One entry of `requests[]`; serialises as `{"updateSettings": {...}}` etc.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Request {
    UpdateSettings(UpdateSettingsRequest),
    CreateItem(CreateItemRequest),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSettingsRequest {
    settings: FormSettings,
    update_mask: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormSettings {
    quiz_settings: QuizSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizSettings {
    is_quiz: bool,
}

#[derive(Debug, Serialize)]
struct CreateItemRequest {
    item: Item,
    location: Location,
}

#[derive(Debug, Serialize)]
struct Location {
    index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    title: String,
    question_item: QuestionItem,
}

#[derive(Debug, Serialize)]
struct QuestionItem {
    question: Question,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Question {
    required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    text_question: Option<TextQuestion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    choice_question: Option<ChoiceQuestion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    grading: Option<Grading>,
}

#[derive(Debug, Serialize)]
struct TextQuestion {
    paragraph: bool,
}

#[derive(Debug, Serialize)]
struct ChoiceQuestion {
    /// "RADIO" for single select.
    #[serde(rename = "type")]
    kind: String,
    options: Vec<OptionValue>,
    shuffle: bool,
}

#[derive(Debug, Serialize)]
struct OptionValue {
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Grading {
    point_value: u32,
    correct_answers: CorrectAnswers,
    when_right: Feedback,
    when_wrong: Feedback,
}

#[derive(Debug, Serialize)]
struct CorrectAnswers {
    answers: Vec<OptionValue>,
}

#[derive(Debug, Serialize)]
struct Feedback {
    text: String,
}

// =============================================================================
// RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormResponse {
    form_id: String,
    responder_uri: Option<String>,
}

// =============================================================================
// CONVERSION
// =============================================================================

fn text_item(title: &str, required: bool) -> Item {
    Item {
        title: title.to_string(),
        question_item: QuestionItem {
            question: Question {
                required,
                text_question: Some(TextQuestion { paragraph: false }),
                choice_question: None,
                grading: None,
            },
        },
    }
}

fn choice_item(choice: &ChoiceItem) -> Item {
    let option = |value: &String| OptionValue {
        value: value.clone(),
    };

    Item {
        title: choice.title.clone(),
        question_item: QuestionItem {
            question: Question {
                required: choice.required,
                text_question: None,
                choice_question: Some(ChoiceQuestion {
                    kind: "RADIO".to_string(),
                    options: choice.options.iter().map(option).collect(),
                    shuffle: choice.shuffle,
                }),
                grading: Some(Grading {
                    point_value: choice.point_value,
                    correct_answers: CorrectAnswers {
                        answers: vec![option(&choice.correct_option)],
                    },
                    when_right: Feedback {
                        text: choice.when_right.clone(),
                    },
                    when_wrong: Feedback {
                        text: choice.when_wrong.clone(),
                    },
                }),
            },
        },
    }
}

fn to_request(update: &FormUpdate) -> Request {
    match update {
        FormUpdate::EnableQuiz => Request::UpdateSettings(UpdateSettingsRequest {
            settings: FormSettings {
                quiz_settings: QuizSettings { is_quiz: true },
            },
            update_mask: "quizSettings.isQuiz".to_string(),
        }),
        FormUpdate::CreateItem { item, index } => {
            let item = match item {
                FormItem::TextField { title, required } => text_item(title, *required),
                FormItem::Choice(choice) => choice_item(choice),
            };
            Request::CreateItem(CreateItemRequest {
                item,
                location: Location { index: *index },
            })
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleFormsClient {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleFormsClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: Client::new(),
            tokens,
        }
    }
}

#[async_trait]
impl FormService for GoogleFormsClient {
    async fn create_form(&self, title: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;
        let request = CreateFormRequest {
            info: Info {
                title: title.to_string(),
                document_title: title.to_string(),
            },
        };

        let response = self
            .client
            .post(FORMS_API_URL)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let form: FormResponse = check_response(response, "Forms").await?.json().await?;
        Ok(form.form_id)
    }

    async fn batch_update(
        &self,
        form_id: &str,
        updates: &[FormUpdate],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;
        let request = BatchUpdateRequest {
            requests: updates.iter().map(to_request).collect(),
        };

        tracing::debug!(
            "Forms batchUpdate on {} with {} request(s)",
            form_id,
            request.requests.len()
        );

        let response = self
            .client
            .post(format!("{}/{}:batchUpdate", FORMS_API_URL, form_id))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        check_response(response, "Forms").await?;
        Ok(())
    }

    async fn responder_url(&self, form_id: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .get(format!("{}/{}", FORMS_API_URL, form_id))
            .bearer_auth(token)
            .send()
            .await?;

        let form: FormResponse = check_response(response, "Forms").await?.json().await?;
        form.responder_uri
            .ok_or_else(|| format!("Form {} has no responder link", form.form_id).into())
    }
}
