//! User confirmation collaborator.

use crate::error::Result;

/// Yes/no questions put to the user. Only used for overwrite decisions.
pub trait Prompt {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Answers every question the same way (`--yes`, tests, non-interactive
/// runs).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&self, question: &str) -> Result<bool> {
        tracing::debug!(question, answer = self.0, "answering prompt");
        Ok(self.0)
    }
}
