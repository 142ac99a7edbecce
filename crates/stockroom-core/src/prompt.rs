//! Interactive prompts
//!
//! Destructive operations ask for confirmation through a [`Prompter`], so
//! the terminal implementation can be swapped for scripted answers.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("prompt was cancelled")]
    Cancelled,

    #[error("no answer available for prompt: {0}")]
    NoAnswer(String),

    #[error("prompt failed: {0}")]
    Io(String),
}

pub type PromptResult<T> = Result<T, PromptError>;

/// Source of answers to interactive questions
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question. Defaults to "no".
    fn confirm(&self, message: &str) -> PromptResult<bool>;

    /// Ask for free-form text
    fn input(&self, message: &str) -> PromptResult<String>;
}

/// Prompter backed by the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> PromptResult<bool> {
        inquire::Confirm::new(message)
            .with_default(false)
            .prompt()
            .map_err(map_inquire_error)
    }

    fn input(&self, message: &str) -> PromptResult<String> {
        inquire::Text::new(message).prompt().map_err(map_inquire_error)
    }
}

fn map_inquire_error(err: inquire::InquireError) -> PromptError {
    match err {
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
            PromptError::Cancelled
        }
        other => PromptError::Io(other.to_string()),
    }
}

/// A single scripted answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Confirm(bool),
    Text(String),
}

/// Prompter answering from a queue, for tests and non-interactive runs
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages shown so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    fn next(&self, message: &str) -> PromptResult<ScriptedAnswer> {
        self.asked.lock().push(message.to_string());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| PromptError::NoAnswer(message.to_string()))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> PromptResult<bool> {
        match self.next(message)? {
            ScriptedAnswer::Confirm(answer) => Ok(answer),
            ScriptedAnswer::Text(text) => Ok(matches!(text.trim().to_lowercase().as_str(), "y" | "yes")),
        }
    }

    fn input(&self, message: &str) -> PromptResult<String> {
        match self.next(message)? {
            ScriptedAnswer::Text(text) => Ok(text),
            ScriptedAnswer::Confirm(answer) => Ok(if answer { "yes" } else { "no" }.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_answers_in_order() {
        let prompter = ScriptedPrompter::new([
            ScriptedAnswer::Confirm(true),
            ScriptedAnswer::Text("inventory".to_string()),
        ]);

        assert!(prompter.confirm("Drop?").unwrap());
        assert_eq!(prompter.input("Name?").unwrap(), "inventory");
        assert_eq!(prompter.asked(), vec!["Drop?".to_string(), "Name?".to_string()]);
    }

    #[test]
    fn test_exhausted_script_is_an_error() {
        let prompter = ScriptedPrompter::default();
        assert!(matches!(prompter.confirm("Drop?"), Err(PromptError::NoAnswer(_))));
    }

    #[test]
    fn test_text_answer_to_confirm() {
        let prompter = ScriptedPrompter::new([ScriptedAnswer::Text("YES".to_string())]);
        assert!(prompter.confirm("Continue?").unwrap());
    }
}
