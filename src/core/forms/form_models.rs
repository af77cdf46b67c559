// Provider-neutral description of what goes onto a graded form.
// The infra client translates these into the Forms API request shapes.

use crate::core::quiz::ParsedQuestion;

pub const RIGHT_ANSWER_FEEDBACK: &str = "Correct! Well done!";
pub const POINTS_PER_QUESTION: u32 = 1;

/// Required short-answer fields placed ahead of the questions.
pub const STUDENT_INFO_FIELDS: [&str; 4] = ["Full Name", "Roll Number", "Section", "Email Address"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormItem {
    /// Single-line text question.
    TextField { title: String, required: bool },
    /// Auto-graded single-select question.
    Choice(ChoiceItem),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceItem {
    pub title: String,
    pub options: Vec<String>,
    pub correct_option: String,
    pub point_value: u32,
    pub shuffle: bool,
    pub required: bool,
    pub when_right: String,
    pub when_wrong: String,
}

impl ChoiceItem {
    pub fn from_question(question: &ParsedQuestion) -> Self {
        let correct = question.correct_option().to_string();
        Self {
            title: question.stem.clone(),
            options: question.options.clone(),
            when_wrong: format!("The correct answer is: {}", correct),
            correct_option: correct,
            point_value: POINTS_PER_QUESTION,
            shuffle: true,
            required: true,
            when_right: RIGHT_ANSWER_FEEDBACK.to_string(),
        }
    }
}

/// One entry of a batch update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormUpdate {
    /// Turns on quiz mode, which enables grading and answer feedback.
    EnableQuiz,
    CreateItem { item: FormItem, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedForm {
    pub form_id: String,
    pub responder_url: String,
    pub question_count: usize,
}
