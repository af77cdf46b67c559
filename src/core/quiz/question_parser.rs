// Turns (QuestionBlock, AnswerToken) pairs into structured questions.
//
// Blocks are expected to look like:
//
//   1: What is 2+2?
//   a. 3
//   b. 4
//   ...
//
// and tokens like "Q1. b", "b", "B.", or "2". Neither shape is guaranteed,
// so every step has a fallback and a malformed block is skipped, never fatal.

use std::collections::HashSet;

use super::quiz_models::{
    AnswerToken, AssembledQuiz, ParseOutcome, ParsedQuestion, QuestionBlock, SkipReason,
    SkippedQuestion, MAX_OPTIONS,
};

const OPTION_PREFIXES: [&str; 4] = ["a.", "b.", "c.", "d."];

/// How an answer index was obtained from its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Letter,
    LetterWithDot,
    Digit,
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerIndex {
    pub index: usize,
    pub source: AnswerSource,
}

impl AnswerIndex {
    fn defaulted() -> Self {
        Self {
            index: 0,
            source: AnswerSource::Defaulted,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        self.source == AnswerSource::Defaulted
    }
}

/// Splits a leading `Q<number>` prefix (optional dot) off a lowercased token,
/// e.g. `q12. d` -> `(Some(12), "d")`.
fn split_question_prefix(token: &str) -> (Option<usize>, &str) {
    let Some(rest) = token.strip_prefix('q') else {
        return (None, token);
    };

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return (None, token);
    }

    let number = rest[..digits].parse().ok();
    let rest = &rest[digits..];
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    (number, rest.trim_start())
}

/// The question number an answer token names, if it starts with `Q<number>`.
pub fn answer_question_number(token: &str) -> Option<usize> {
    let lowered = token.trim().to_lowercase();
    split_question_prefix(&lowered).0
}

fn letter_index(letter: char) -> Option<usize> {
    match letter {
        'a' => Some(0),
        'b' => Some(1),
        'c' => Some(2),
        'd' => Some(3),
        _ => None,
    }
}

/// Maps an answer token to an option index in `0..4`.
///
/// Precedence: single letter, then a lettered prefix like `b.`, then a digit
/// `1`-`4`. Anything else falls back to index 0, flagged as defaulted.
pub fn resolve_answer_index(token: &str) -> AnswerIndex {
    let lowered = token.trim().to_lowercase();
    let cleaned = split_question_prefix(&lowered).1.trim();

    let mut chars = cleaned.chars();
    let first = chars.next();
    let second = chars.next();

    match (first, second) {
        (Some(letter), None) => {
            if let Some(index) = letter_index(letter) {
                return AnswerIndex {
                    index,
                    source: AnswerSource::Letter,
                };
            }
        }
        (Some(letter), Some('.')) => {
            if let Some(index) = letter_index(letter) {
                return AnswerIndex {
                    index,
                    source: AnswerSource::LetterWithDot,
                };
            }
        }
        _ => {}
    }

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return AnswerIndex::defaulted();
    }

    match cleaned.parse::<usize>() {
        Ok(n @ 1..=4) => AnswerIndex {
            index: n - 1,
            source: AnswerSource::Digit,
        },
        _ => AnswerIndex::defaulted(),
    }
}

/// Removes the first three characters of an option line (`a. `) and trims.
fn option_text(line: &str) -> String {
    line.char_indices()
        .nth(3)
        .map(|(at, _)| line[at..].trim().to_string())
        .unwrap_or_default()
}

/// Parses a single block against its answer token. `position` is the block's
/// 1-based place in the completion.
pub fn parse_question(
    block: &QuestionBlock,
    position: usize,
    answer: Option<&AnswerToken>,
) -> ParseOutcome {
    let mut lines = block.as_str().lines();
    let stem = lines.next().unwrap_or_default().trim().to_string();

    let mut options: Vec<String> = lines
        .map(str::trim)
        .filter(|line| OPTION_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .map(option_text)
        .collect();

    if options.is_empty() {
        return ParseOutcome::Skip(SkipReason::NoOptions);
    }
    if options.len() > MAX_OPTIONS {
        tracing::debug!(
            "Question '{}' has {} option lines, keeping the first {}",
            stem,
            options.len(),
            MAX_OPTIONS
        );
        options.truncate(MAX_OPTIONS);
    }
    if options.iter().any(String::is_empty) {
        return ParseOutcome::Skip(SkipReason::EmptyOption);
    }
    let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
    if distinct.len() != options.len() {
        return ParseOutcome::Skip(SkipReason::DuplicateOptions);
    }

    let resolved = answer
        .map(|token| resolve_answer_index(token.as_str()))
        .unwrap_or_else(AnswerIndex::defaulted);

    let (correct_index, answer_defaulted) = if resolved.index >= options.len() {
        (0, true)
    } else {
        (resolved.index, resolved.is_defaulted())
    };

    ParseOutcome::Ok(ParsedQuestion {
        position,
        stem,
        options,
        correct_index,
        answer_defaulted,
    })
}

/// Matches answer tokens to blocks.
///
/// A token naming its question (`Q3. c`) goes to that block. Remaining
/// tokens fill the unclaimed blocks in order. A token with neither a question
/// number nor a readable answer (a stray sentence under the heading) is
/// dropped so it cannot shift the tokens after it.
pub fn pair_answers(block_count: usize, answers: &[AnswerToken]) -> Vec<Option<&AnswerToken>> {
    let mut paired: Vec<Option<&AnswerToken>> = vec![None; block_count];
    let mut unnumbered = Vec::new();

    for token in answers {
        match answer_question_number(token.as_str()) {
            Some(number) if (1..=block_count).contains(&number) => {
                let slot = &mut paired[number - 1];
                if slot.is_none() {
                    *slot = Some(token);
                } else {
                    tracing::debug!("Ignoring repeated answer for question {}: {:?}", number, token.as_str());
                }
            }
            Some(number) => {
                tracing::debug!("Ignoring answer for question {} beyond the last block", number);
            }
            None if resolve_answer_index(token.as_str()).is_defaulted() => {
                tracing::debug!("Ignoring answer key line {:?}", token.as_str());
            }
            None => unnumbered.push(token),
        }
    }

    let mut unnumbered = unnumbered.into_iter();
    for slot in paired.iter_mut().filter(|slot| slot.is_none()) {
        *slot = unnumbered.next();
    }

    paired
}

/// Folds every block into either a question or a recorded skip.
///
/// A block without a matching answer token still becomes a question, graded
/// against option `a`.
pub fn assemble_questions(blocks: &[QuestionBlock], answers: &[AnswerToken]) -> AssembledQuiz {
    let mut quiz = AssembledQuiz::default();
    let paired = pair_answers(blocks.len(), answers);

    for (i, (block, answer)) in blocks.iter().zip(paired).enumerate() {
        let position = i + 1;
        match parse_question(block, position, answer) {
            ParseOutcome::Ok(question) => {
                if question.answer_defaulted {
                    tracing::warn!(
                        "Question {}: could not read answer {:?}, grading against option a",
                        position,
                        answer.map(AnswerToken::as_str)
                    );
                }
                quiz.questions.push(question);
            }
            ParseOutcome::Skip(reason) => {
                tracing::warn!(
                    "Skipping question {} due to formatting error: {}",
                    position,
                    reason
                );
                quiz.skipped.push(SkippedQuestion { position, reason });
            }
        }
    }

    quiz
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quiz::response_parser::parse_completion;

    fn block(text: &str) -> QuestionBlock {
        QuestionBlock(text.to_string())
    }

    fn token(text: &str) -> AnswerToken {
        AnswerToken(text.to_string())
    }

    #[test]
    fn test_answer_index_documented_cases() {
        assert_eq!(resolve_answer_index("a").index, 0);
        assert_eq!(resolve_answer_index("B.").index, 1);
        assert_eq!(resolve_answer_index("Q3. c").index, 2);
        assert_eq!(resolve_answer_index("4").index, 3);
        assert_eq!(resolve_answer_index("").index, 0);
        assert_eq!(resolve_answer_index("z").index, 0);
    }

    #[test]
    fn test_answer_index_sources() {
        assert_eq!(resolve_answer_index("a").source, AnswerSource::Letter);
        assert_eq!(resolve_answer_index("c. Paris").source, AnswerSource::LetterWithDot);
        assert_eq!(resolve_answer_index("Q2 3").source, AnswerSource::Digit);
        assert!(resolve_answer_index("").is_defaulted());
        assert!(resolve_answer_index("z").is_defaulted());
        assert!(resolve_answer_index("5").is_defaulted());
        assert!(resolve_answer_index("Paris").is_defaulted());
    }

    #[test]
    fn test_signed_numbers_are_not_digits() {
        assert!(resolve_answer_index("+2").is_defaulted());
        assert!(resolve_answer_index("-1").is_defaulted());
        assert!(resolve_answer_index("Q1. +3").is_defaulted());
        assert_eq!(resolve_answer_index("Q1. 3").index, 2);
    }

    #[test]
    fn test_answer_index_is_idempotent() {
        for raw in ["a", "B.", "Q3. c", "4", "", "z", "q12.d", "Q1. b ,"] {
            assert_eq!(resolve_answer_index(raw), resolve_answer_index(raw));
        }
    }

    #[test]
    fn test_question_prefix_variants() {
        assert_eq!(resolve_answer_index("q12.d").index, 3);
        assert_eq!(resolve_answer_index("Q7 b").index, 1);
        assert_eq!(resolve_answer_index("  Q1.   C  ").index, 2);
        // Lone "q" with no number is not a prefix.
        assert!(resolve_answer_index("q").is_defaulted());
    }

    #[test]
    fn test_documented_example_question() {
        let outcome = parse_question(
            &block("1: What is 2+2?\na. 3\nb. 4\nc. 5\nd. 6\n\n"),
            1,
            Some(&token("Q1. b")),
        );

        assert_eq!(
            outcome,
            ParseOutcome::Ok(ParsedQuestion {
                position: 1,
                stem: "1: What is 2+2?".to_string(),
                options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
                correct_index: 1,
                answer_defaulted: false,
            })
        );
    }

    #[test]
    fn test_block_without_options_is_skipped() {
        let outcome = parse_question(&block("1: Explain gravity.\n\n"), 1, Some(&token("a")));
        assert_eq!(outcome, ParseOutcome::Skip(SkipReason::NoOptions));
    }

    #[test]
    fn test_duplicate_options_are_skipped() {
        let outcome = parse_question(&block("1: Pick\na. same\nb. same"), 1, Some(&token("a")));
        assert_eq!(outcome, ParseOutcome::Skip(SkipReason::DuplicateOptions));
    }

    #[test]
    fn test_empty_option_is_skipped() {
        let outcome = parse_question(&block("1: Pick\na.\nb. real"), 1, Some(&token("b")));
        assert_eq!(outcome, ParseOutcome::Skip(SkipReason::EmptyOption));
    }

    #[test]
    fn test_out_of_range_answer_defaults_to_first_option() {
        let outcome = parse_question(&block("1: Pick\na. x\nb. y"), 1, Some(&token("d")));
        match outcome {
            ParseOutcome::Ok(q) => {
                assert_eq!(q.correct_index, 0);
                assert!(q.answer_defaulted);
            }
            other => panic!("expected a question, got {:?}", other),
        }
    }

    #[test]
    fn test_options_keep_line_order_and_cap_at_four() {
        let outcome = parse_question(
            &block("1: Pick\n  b. second\na. first\nc. third\nd. fourth\na. fifth"),
            1,
            Some(&token("a")),
        );
        match outcome {
            ParseOutcome::Ok(q) => {
                assert_eq!(q.options, vec!["second", "first", "third", "fourth"]);
            }
            other => panic!("expected a question, got {:?}", other),
        }
    }

    #[test]
    fn test_unicode_option_text_is_sliced_safely() {
        let outcome = parse_question(&block("1: Pick\na.é one\nb. two"), 1, Some(&token("a")));
        match outcome {
            ParseOutcome::Ok(q) => assert_eq!(q.options[0], "one"),
            other => panic!("expected a question, got {:?}", other),
        }
    }

    #[test]
    fn test_assembly_skips_only_malformed_blocks() {
        let blocks = vec![
            block("1: A?\na. x\nb. y"),
            block("2: Essay question\n"),
            block("3: C?\na. p\nb. q\nc. r"),
        ];
        let answers = vec![token("Q1. b"), token("Q2. a"), token("Q3. c")];

        let quiz = assemble_questions(&blocks, &answers);

        assert_eq!(quiz.questions.len(), blocks.len() - 1);
        assert_eq!(
            quiz.skipped,
            vec![SkippedQuestion {
                position: 2,
                reason: SkipReason::NoOptions
            }]
        );
        assert_eq!(quiz.questions[0].correct_index, 1);
        assert_eq!(quiz.questions[1].correct_index, 2);
    }

    #[test]
    fn test_missing_answer_token_defaults() {
        let quiz = assemble_questions(&[block("1: A?\na. x\nb. y")], &[]);

        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.defaulted_answers(), 1);
    }

    #[test]
    fn test_chatty_answer_key_line_does_not_shift_answers() {
        let completion = parse_completion(
            "Question No. 1: A?\na. x\nb. y\nc. z\n\
             Question No. 2: B?\na. p\nb. q\nc. r\n\
             Answer Key:\nHere are the correct answers:\nQ1. b\nQ2. c",
        )
        .unwrap();

        let quiz = assemble_questions(&completion.blocks, &completion.answers);

        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[0].correct_index, 1);
        assert_eq!(quiz.questions[1].correct_index, 2);
        assert_eq!(quiz.defaulted_answers(), 0);
    }

    #[test]
    fn test_numbered_answers_pair_by_question_number() {
        let blocks = vec![block("1: A?\na. x\nb. y"), block("2: B?\na. p\nb. q")];
        let answers = vec![token("Q2. a"), token("Q1. b")];

        let quiz = assemble_questions(&blocks, &answers);

        assert_eq!(quiz.questions[0].correct_index, 1);
        assert_eq!(quiz.questions[1].correct_index, 0);
    }

    #[test]
    fn test_unnumbered_answers_fill_remaining_blocks_in_order() {
        let answers = vec![token("b"), token("Q3. a"), token("c")];

        let paired = pair_answers(3, &answers);

        let paired: Vec<Option<&str>> = paired.into_iter().map(|t| t.map(AnswerToken::as_str)).collect();
        assert_eq!(paired, vec![Some("b"), Some("c"), Some("Q3. a")]);
    }

    #[test]
    fn test_questions_keep_their_block_position() {
        let blocks = vec![
            block("1: A?\na. x\nb. y"),
            block("2: Essay question\n"),
            block("3: C?\na. p\nb. q"),
        ];

        let quiz = assemble_questions(&blocks, &[token("Q1. a"), token("Q2. a"), token("Q3. b")]);

        let positions: Vec<usize> = quiz.questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 3]);
        assert_eq!(quiz.questions[1].correct_index, 1);
    }
}
