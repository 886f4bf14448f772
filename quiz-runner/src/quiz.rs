//! The two collaborators the runner drives: where questions come from and
//! how an answer gets tried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A question currently on screen with its candidate answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub choices: Vec<String>,
}

impl Question {
    pub fn new<I, S>(text: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into().trim().to_string(),
            choices: choices
                .into_iter()
                .map(|c| c.into().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// The choice whose text equals `answer`, if offered
    pub fn choice_matching(&self, answer: &str) -> Option<&str> {
        let answer = answer.trim();
        self.choices
            .iter()
            .map(String::as_str)
            .find(|choice| *choice == answer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Accepted,
    Rejected,
}

impl TrialOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionSource: Send {
    /// The question awaiting an answer, or `None` when the quiz is over
    async fn current_question(&mut self) -> anyhow::Result<Option<Question>>;

    /// Move past the current question
    async fn advance(&mut self) -> anyhow::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerTrial: Send {
    /// Submit `choice` for the current question and report the verdict
    async fn attempt(&mut self, choice: &str) -> anyhow::Result<TrialOutcome>;
}
