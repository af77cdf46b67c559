// Domain types for the quiz pipeline.
// These carry raw model output (blocks and tokens) as well as the structured
// questions derived from them. Nothing here knows about PDFs or Google APIs.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest number of questions a single run may request.
pub const MAX_QUESTION_COUNT: u32 = 20;

/// Number of lettered options (`a.` through `d.`) a question may carry.
pub const MAX_OPTIONS: usize = 4;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("Invalid difficulty level '{0}'. Please choose from 'Easy', 'Medium', or 'Hard'.")]
    InvalidDifficulty(String),

    #[error("Question count must be between 1 and {max}, got {0}", max = MAX_QUESTION_COUNT)]
    InvalidQuestionCount(u32),

    #[error("Failed to find 'Answer Key' in the response. Check the model's output.")]
    MissingAnswerKey,
}

// ============================================================================
// REQUEST PARAMETERS
// ============================================================================

/// Difficulty levels offered to the user. This is a closed set; anything else
/// is rejected before a prompt is ever built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// The adjective used inside the prompt.
    pub fn prompt_adjective(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "moderate",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(label)
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(QuizError::InvalidDifficulty(s.to_string())),
        }
    }
}

/// A validated question count in `1..=MAX_QUESTION_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCount(u32);

impl QuestionCount {
    pub fn new(count: u32) -> Result<Self, QuizError> {
        if count == 0 || count > MAX_QUESTION_COUNT {
            return Err(QuizError::InvalidQuestionCount(count));
        }
        Ok(Self(count))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

// ============================================================================
// RAW MODEL OUTPUT
// ============================================================================

/// Raw per-question text fragment, before structural parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBlock(pub String);

impl QuestionBlock {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw per-question answer indicator, before index normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerToken(pub String);

impl AnswerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of splitting a completion at the answer key marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCompletion {
    /// Cleaned text before the marker.
    pub question_section: String,
    /// Cleaned text after the marker.
    pub answer_section: String,
    pub blocks: Vec<QuestionBlock>,
    pub answers: Vec<AnswerToken>,
}

// ============================================================================
// STRUCTURED QUESTIONS
// ============================================================================

/// A question ready to be placed on a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    /// 1-based position of the source block in the completion.
    pub position: usize,
    pub stem: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    /// True when no usable answer indicator was found and option `a` was assumed.
    pub answer_defaulted: bool,
}

impl ParsedQuestion {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}

/// Why a question block was left out of the quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoOptions,
    EmptyOption,
    DuplicateOptions,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoOptions => write!(f, "no lettered options found"),
            SkipReason::EmptyOption => write!(f, "an option has no text"),
            SkipReason::DuplicateOptions => write!(f, "two options share the same text"),
        }
    }
}

/// Per-question parse result. Batch assembly folds over these rather than
/// bailing out on the first malformed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Ok(ParsedQuestion),
    Skip(SkipReason),
}

/// A skipped block together with its 1-based position in the completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedQuestion {
    pub position: usize,
    pub reason: SkipReason,
}

/// All questions that survived parsing, plus what was dropped along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledQuiz {
    pub questions: Vec<ParsedQuestion>,
    pub skipped: Vec<SkippedQuestion>,
}

impl AssembledQuiz {
    pub fn defaulted_answers(&self) -> usize {
        self.questions.iter().filter(|q| q.answer_defaulted).count()
    }
}
