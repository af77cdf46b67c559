pub mod prompt_builder;
pub mod question_parser;
pub mod quiz_models;
pub mod response_parser;

pub use prompt_builder::build_prompt;
pub use question_parser::assemble_questions;
pub use quiz_models::{
    AssembledQuiz, Difficulty, ParsedCompletion, ParsedQuestion, QuestionCount, QuizError,
};
pub use response_parser::parse_completion;
