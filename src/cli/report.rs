// Plain-text summaries printed at the end of a command.

use std::fmt::Write;

use crate::core::pipeline::{DeliveryReport, GeneratedQuiz};

const OPTION_LETTERS: [char; 4] = ['a', 'b', 'c', 'd'];

fn option_letter(index: usize) -> char {
    OPTION_LETTERS.get(index).copied().unwrap_or('?')
}

/// Questions with lettered options, then the answer key as parsed.
pub fn render_generated(generated: &GeneratedQuiz) -> String {
    let mut out = String::new();
    let quiz = &generated.quiz;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Generated MCQ Questions:\n");
    for question in &quiz.questions {
        let _ = writeln!(out, "Question No. {}", question.stem);
        for (i, option) in question.options.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", option_letter(i), option);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Answer Key:");
    for question in &quiz.questions {
        let flag = if question.answer_defaulted {
            " (answer unreadable, defaulted)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "Q{}. {} ({}){}",
            question.position,
            option_letter(question.correct_index),
            question.correct_option(),
            flag
        );
    }

    let completion = &generated.completion;
    if completion.blocks.len() != completion.answers.len() {
        let _ = writeln!(
            out,
            "\nThe model returned {} question block(s) but {} answer(s).",
            completion.blocks.len(),
            completion.answers.len()
        );
    }

    if !quiz.skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped {} malformed question(s):", quiz.skipped.len());
        for skipped in &quiz.skipped {
            let _ = writeln!(out, "  block {}: {}", skipped.position, skipped.reason);
        }
    }

    if generated.document.has_ocr_content() {
        let _ = writeln!(
            out,
            "\nSource text included OCR from {} image(s).",
            generated.document.images_read
        );
    }

    out
}

pub fn render_delivery(report: &DeliveryReport, generated: &GeneratedQuiz) -> String {
    let mut out = String::new();
    let quiz = &generated.quiz;

    let _ = writeln!(out, "Quiz created successfully: {}", report.form.responder_url);
    let _ = writeln!(out, "Form ID: {}", report.form.form_id);
    let _ = writeln!(
        out,
        "Published {} question(s), skipped {}, {} answer(s) defaulted to option a",
        report.form.question_count,
        quiz.skipped.len(),
        quiz.defaulted_answers()
    );
    let _ = writeln!(
        out,
        "Sent quiz invitations to {} of {} students",
        report.emails.succeeded, report.emails.attempted
    );
    for failure in &report.emails.failures {
        let _ = writeln!(out, "  {}", failure);
    }

    out
}
