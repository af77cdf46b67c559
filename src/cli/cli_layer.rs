// Command-line front end: argument parsing, environment configuration and
// the text printed back to the instructor running the tool.

pub mod args;
pub mod config;
pub mod report;
