// Builds the single free-text prompt sent to the completion model.
// The layout requested here is exactly what `response_parser` expects back,
// so the two files change together.

use super::quiz_models::{Difficulty, QuestionCount};

/// Heading the model is asked to put in front of every question.
pub const QUESTION_MARKER: &str = "Question No. ";

/// Heading the model is asked to put in front of the answers.
pub const ANSWER_KEY_MARKER: &str = "Answer Key";

const QUESTION_FORMAT: &str = "\
Please generate multiple choice questions in the following format:

Question No. {question_number}: {question}

a. {option_a}
b. {option_b}
c. {option_c}
d. {option_d}
";

const ANSWER_FORMAT: &str = "\
After all of the questions, please generate an Answer Key in the following format:

Answer Key:
Q{question_number}. {correct_option}, Q{question_number}. {correct_option}
";

/// Builds the prompt for `count` questions at `difficulty`, grounded in `document_text`.
pub fn build_prompt(document_text: &str, difficulty: Difficulty, count: QuestionCount) -> String {
    format!(
        "Please generate exactly {count} {level} MCQ questions, each with four options.\n\n\
         {QUESTION_FORMAT}\n\
         {ANSWER_FORMAT}\n\
         Based on the given text only:\n\
         {document_text}",
        count = count.get(),
        level = difficulty.prompt_adjective(),
    )
}
