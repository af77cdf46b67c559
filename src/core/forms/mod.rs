pub mod form_models;
pub mod form_service;

pub use form_models::{ChoiceItem, FormItem, FormUpdate, PublishedForm};
pub use form_service::{FormCreationError, FormService, QuizFormPublisher};
