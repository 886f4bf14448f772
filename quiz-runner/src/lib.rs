//! Trial-and-error quiz answering on top of [`answer_memory`].
//!
//! A [`QuizRunner`] pulls questions from a [`QuestionSource`], tries the
//! remembered answer first and otherwise works through the choices with an
//! [`AnswerTrial`], learning whichever one is accepted.

pub mod cli;
pub mod config;
pub mod deck;
pub mod error;
pub mod quiz;
pub mod runner;
pub mod telemetry;

pub use cli::{Command, execute, load_settings, open_memory};
pub use config::{LoggingConfig, RunnerConfig, Settings, StorageBackend, StorageSettings};
pub use deck::{DeckCard, QuizDeck};
pub use error::{RunnerError, RunnerResult};
pub use quiz::{AnswerTrial, Question, QuestionSource, TrialOutcome};
pub use runner::{QuestionOutcome, QuizRunner, RunMode, RunStats, StopHandle};
