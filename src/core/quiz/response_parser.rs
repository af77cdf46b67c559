// Splits a raw model completion into question blocks and answer tokens.
//
// The completion is free text, so this is marker-driven:
// 1. Strip `*` and `#` (bold / heading markup the model likes to add).
// 2. Cut at the first "Answer Key". No marker means the whole batch is unusable.
// 3. Split the question side on "Question No. " and drop the preamble fragment.
// 4. Split the answer side on ", " (and line breaks) into tokens.

use super::prompt_builder::{ANSWER_KEY_MARKER, QUESTION_MARKER};
use super::quiz_models::{AnswerToken, ParsedCompletion, QuestionBlock, QuizError};

const MARKUP_CHARS: [char; 2] = ['*', '#'];

/// Removes emphasis and heading markup characters.
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !MARKUP_CHARS.contains(c)).collect()
}

/// Parses a completion. Fails without producing partial output when the
/// answer key marker is missing.
pub fn parse_completion(completion: &str) -> Result<ParsedCompletion, QuizError> {
    let cleaned = strip_markup(completion);

    let marker_at = cleaned
        .find(ANSWER_KEY_MARKER)
        .ok_or(QuizError::MissingAnswerKey)?;

    let question_section = &cleaned[..marker_at];
    let answer_section = &cleaned[marker_at + ANSWER_KEY_MARKER.len()..];

    let blocks = split_question_blocks(question_section);
    let answers = split_answer_tokens(answer_section);

    tracing::debug!(
        "Parsed completion: {} question block(s), {} answer token(s)",
        blocks.len(),
        answers.len()
    );

    Ok(ParsedCompletion {
        question_section: question_section.to_string(),
        answer_section: answer_section.to_string(),
        blocks,
        answers,
    })
}

fn split_question_blocks(section: &str) -> Vec<QuestionBlock> {
    section
        .split(QUESTION_MARKER)
        .skip(1)
        .map(|fragment| QuestionBlock(fragment.to_string()))
        .collect()
}

fn split_answer_tokens(section: &str) -> Vec<AnswerToken> {
    // The heading is usually "Answer Key:" followed by a newline.
    let body = section.trim_start_matches(|c: char| c == ':' || c.is_whitespace());

    body.split(", ")
        .flat_map(str::lines)
        .map(|token| token.trim().trim_end_matches(',').trim())
        .filter(|token| !token.is_empty())
        .map(|token| AnswerToken(token.to_string()))
        .collect()
}
