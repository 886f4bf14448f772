//! A practice quiz read from a JSON answer key.
//!
//! ```json
//! [ { "text": "What is the capital of France?",
//!     "choices": ["Berlin", "Paris"], "answer": "Paris" } ]
//! ```
//!
//! One [`QuizDeck`] serves as both the question source and the grader, so
//! clones share their position.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};
use crate::quiz::{AnswerTrial, Question, QuestionSource, TrialOutcome};

#[derive(Debug, Clone, Deserialize)]
pub struct DeckCard {
    #[serde(flatten)]
    pub question: Question,
    pub answer: String,
}

#[derive(Debug, Default)]
struct DeckState {
    cards: Vec<DeckCard>,
    position: usize,
    attempts: usize,
}

#[derive(Debug, Clone, Default)]
pub struct QuizDeck {
    state: Arc<Mutex<DeckState>>,
}

impl QuizDeck {
    pub fn new(cards: Vec<DeckCard>) -> Self {
        let cards = cards
            .into_iter()
            .map(|card| DeckCard {
                question: Question::new(card.question.text, card.question.choices),
                answer: card.answer.trim().to_string(),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(DeckState {
                cards,
                ..DeckState::default()
            })),
        }
    }

    pub fn from_json(json: &str) -> RunnerResult<Self> {
        let cards: Vec<DeckCard> = serde_json::from_str(json)?;
        if cards.is_empty() {
            return Err(RunnerError::Usage("the deck has no questions".to_string()));
        }
        Ok(Self::new(cards))
    }

    pub async fn load(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.state.lock().cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answers submitted so far
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }
}

#[async_trait]
impl QuestionSource for QuizDeck {
    async fn current_question(&mut self) -> anyhow::Result<Option<Question>> {
        let state = self.state.lock();
        Ok(state
            .cards
            .get(state.position)
            .map(|card| card.question.clone()))
    }

    async fn advance(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.position < state.cards.len() {
            state.position += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl AnswerTrial for QuizDeck {
    async fn attempt(&mut self, choice: &str) -> anyhow::Result<TrialOutcome> {
        let mut state = self.state.lock();
        state.attempts += 1;
        let card = state
            .cards
            .get(state.position)
            .ok_or_else(|| anyhow::anyhow!("no question to answer"))?;

        let outcome = if card.answer == choice.trim() {
            TrialOutcome::Accepted
        } else {
            TrialOutcome::Rejected
        };
        debug!("{:?} for {:?}: {:?}", choice, card.question.text, outcome);
        Ok(outcome)
    }
}
