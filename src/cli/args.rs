use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::quiz::{Difficulty, QuestionCount, QuizError};

#[derive(Debug, Parser)]
#[command(
    name = "quiz_forge",
    version,
    about = "Generate multiple-choice quizzes from a PDF and publish them as graded Google Forms"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate questions and print them with the answer key.
    Generate(QuizArgs),

    /// Generate questions, publish a graded form and email students the link.
    Publish(PublishArgs),

    /// Authorise access to Google Forms and Gmail and store the credential.
    Login,
}

#[derive(Debug, Args)]
pub struct QuizArgs {
    /// PDF to build the quiz from.
    #[arg(long)]
    pub pdf: PathBuf,

    /// Easy, Medium or Hard.
    #[arg(long, default_value = "Medium", value_parser = parse_difficulty)]
    pub difficulty: Difficulty,

    /// Number of questions, 1 to 20.
    #[arg(long, default_value = "5", value_parser = parse_count)]
    pub count: QuestionCount,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub quiz: QuizArgs,

    /// File with one student email address per line.
    #[arg(long)]
    pub recipients_file: Option<PathBuf>,

    /// Student email address; may be repeated.
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,

    /// Form title. Defaults to "Quiz: {file name} - {difficulty} Level".
    #[arg(long)]
    pub title: Option<String>,
}

fn parse_difficulty(value: &str) -> Result<Difficulty, QuizError> {
    value.parse()
}

fn parse_count(value: &str) -> Result<QuestionCount, String> {
    let count: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a whole number", value))?;
    QuestionCount::new(count).map_err(|e| e.to_string())
}
