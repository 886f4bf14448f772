use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use answer_memory::{AnswerMemory, LearnSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::quiz::{AnswerTrial, Question, QuestionSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Try the remembered answer first, enumerate only on a miss
    #[default]
    Smart,
    /// Always enumerate the choices
    Learn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub questions: usize,
    pub correct: usize,
    pub learned: usize,
    pub memory_hits: usize,
    pub exhausted: usize,
    pub attempts: usize,
}

/// What happened to a single question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// The remembered answer was accepted
    Recalled { attempts: usize },
    /// A choice was accepted after enumeration
    Discovered { attempts: usize, learned: bool },
    /// No choice was accepted within the attempt limit, or the fixed
    /// answer was rejected or not offered
    Exhausted { attempts: usize },
}

impl QuestionOutcome {
    pub fn attempts(&self) -> usize {
        match *self {
            Self::Recalled { attempts }
            | Self::Discovered { attempts, .. }
            | Self::Exhausted { attempts } => attempts,
        }
    }

    pub fn is_correct(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

impl RunStats {
    fn record(&mut self, outcome: QuestionOutcome) {
        self.questions += 1;
        self.attempts += outcome.attempts();
        match outcome {
            QuestionOutcome::Recalled { .. } => {
                self.correct += 1;
                self.memory_hits += 1;
            },
            QuestionOutcome::Discovered { learned, .. } => {
                self.correct += 1;
                if learned {
                    self.learned += 1;
                }
            },
            QuestionOutcome::Exhausted { .. } => self.exhausted += 1,
        }
    }
}

/// Cloneable flag that asks a running loop to stop after the current trial
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct QuizRunner<S, T> {
    source: S,
    trial: T,
    config: RunnerConfig,
    stop: StopHandle,
}

impl<S, T> QuizRunner<S, T>
where
    S: QuestionSource,
    T: AnswerTrial,
{
    pub fn new(source: S, trial: T, config: RunnerConfig) -> Self {
        Self {
            source,
            trial,
            config,
            stop: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, T) {
        (self.source, self.trial)
    }

    /// Answer questions until the source runs dry, `max_questions` is
    /// reached or the stop handle fires
    pub async fn run(
        &mut self,
        memory: &mut AnswerMemory,
        max_questions: usize,
    ) -> RunnerResult<RunStats> {
        info!(
            "Starting {:?} run for up to {} questions ({} remembered)",
            self.config.mode,
            max_questions,
            memory.len()
        );
        self.drive(memory, max_questions, None).await
    }

    /// Submit `answer` to every question that offers it and move on either
    /// way. Accepted answers are learned with [`LearnSource::Fixed`]. Stops
    /// early once a question comes without choices.
    pub async fn run_fixed(
        &mut self,
        memory: &mut AnswerMemory,
        answer: &str,
        max_questions: usize,
    ) -> RunnerResult<RunStats> {
        info!(
            "Submitting {:?} to up to {} questions",
            answer, max_questions
        );
        self.drive(memory, max_questions, Some(answer)).await
    }

    async fn drive(
        &mut self,
        memory: &mut AnswerMemory,
        max_questions: usize,
        fixed: Option<&str>,
    ) -> RunnerResult<RunStats> {
        let mut stats = RunStats::default();

        while stats.questions < max_questions && !self.stop.is_stopped() {
            let Some(question) = self
                .source
                .current_question()
                .await
                .map_err(RunnerError::Source)?
            else {
                info!("No more questions");
                break;
            };
            if fixed.is_some() && question.choices.is_empty() {
                info!("No choices left");
                break;
            }

            let outcome = match fixed {
                Some(answer) => self.answer_fixed(memory, &question, answer).await?,
                None => self.answer(memory, &question).await?,
            };
            debug!("Question {:?}: {:?}", question.text, outcome);
            stats.record(outcome);

            if outcome.is_correct() || fixed.is_some() {
                self.source.advance().await.map_err(RunnerError::Source)?;
            } else {
                warn!(
                    "No accepted answer for {:?} after {} attempts",
                    question.text,
                    outcome.attempts()
                );
            }

            pause(self.config.question_delay_ms).await;
        }

        info!(
            "Run finished: {}/{} correct, {} learned, {} from memory, {} exhausted",
            stats.correct, stats.questions, stats.learned, stats.memory_hits, stats.exhausted
        );
        Ok(stats)
    }

    /// Work through a single question
    pub async fn answer(
        &mut self,
        memory: &mut AnswerMemory,
        question: &Question,
    ) -> RunnerResult<QuestionOutcome> {
        let mut attempts = 0;
        let mut rejected: Option<&str> = None;

        if self.config.mode == RunMode::Smart {
            if let Some(choice) = self.remembered_choice(memory, question) {
                attempts += 1;
                if self.try_choice(choice).await? {
                    debug!("Remembered answer accepted: {}", choice);
                    return Ok(QuestionOutcome::Recalled { attempts });
                }
                info!("Remembered answer {:?} was rejected", choice);
                rejected = Some(choice);
            }
        }

        for choice in question.choices.iter().map(String::as_str) {
            if attempts >= self.config.max_attempts_per_question || self.stop.is_stopped() {
                break;
            }
            if rejected == Some(choice) {
                continue;
            }
            if attempts > 0 {
                pause(self.config.trial_delay_ms).await;
            }

            attempts += 1;
            if self.try_choice(choice).await? {
                let learned = remember(memory, question, choice, LearnSource::Auto);
                return Ok(QuestionOutcome::Discovered { attempts, learned });
            }
        }

        Ok(QuestionOutcome::Exhausted { attempts })
    }

    /// Try `answer` once if the question offers it
    pub async fn answer_fixed(
        &mut self,
        memory: &mut AnswerMemory,
        question: &Question,
        answer: &str,
    ) -> RunnerResult<QuestionOutcome> {
        let Some(choice) = question.choice_matching(answer) else {
            debug!("{:?} is not offered for {:?}", answer, question.text);
            return Ok(QuestionOutcome::Exhausted { attempts: 0 });
        };

        if self.try_choice(choice).await? {
            let learned = remember(memory, question, choice, LearnSource::Fixed);
            Ok(QuestionOutcome::Discovered {
                attempts: 1,
                learned,
            })
        } else {
            Ok(QuestionOutcome::Exhausted { attempts: 1 })
        }
    }

    fn remembered_choice<'q>(
        &self,
        memory: &AnswerMemory,
        question: &'q Question,
    ) -> Option<&'q str> {
        let recall = memory.recall(&question.text)?;
        if recall.confidence < self.config.min_recall_confidence {
            debug!(
                "Ignoring remembered answer {:?} (confidence {:.2})",
                recall.answer, recall.confidence
            );
            return None;
        }

        let choice = question.choice_matching(&recall.answer);
        if choice.is_none() {
            debug!("Remembered answer {:?} is not offered", recall.answer);
        }
        choice
    }

    async fn try_choice(&mut self, choice: &str) -> RunnerResult<bool> {
        let outcome = self
            .trial
            .attempt(choice)
            .await
            .map_err(RunnerError::Trial)?;
        Ok(outcome.is_accepted())
    }
}

fn remember(
    memory: &mut AnswerMemory,
    question: &Question,
    choice: &str,
    source: LearnSource,
) -> bool {
    match memory.learn_with_source(&question.text, choice, source) {
        Ok(()) => true,
        Err(e) => {
            warn!("Not remembering answer for {:?}: {}", question.text, e);
            false
        },
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{MockAnswerTrial, MockQuestionSource, TrialOutcome};
    use answer_memory::MemoryConfig;
    use answer_memory::store::InMemoryStore;
    use mockall::predicate::eq;

    const CAPITAL: &str = "What is the capital of France?";

    async fn memory() -> AnswerMemory {
        AnswerMemory::open(MemoryConfig::default(), Arc::new(InMemoryStore::new())).await
    }

    fn capital_question() -> Question {
        Question::new(CAPITAL, ["Berlin", "Madrid", "Paris", "Rome"])
    }

    fn config(mode: RunMode) -> RunnerConfig {
        RunnerConfig {
            mode,
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_smart_mode_uses_memory_first() {
        let mut memory = memory().await;
        memory.learn(CAPITAL, "Paris").unwrap();

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .with(eq("Paris"))
            .times(1)
            .returning(|_| Ok(TrialOutcome::Accepted));

        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, config(RunMode::Smart));
        let outcome = runner.answer(&mut memory, &capital_question()).await.unwrap();

        assert_eq!(outcome, QuestionOutcome::Recalled { attempts: 1 });
        // Recall alone never reinforces
        assert_eq!(memory.recall(CAPITAL).unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn test_rejected_memory_falls_back_to_enumeration() {
        let mut memory = memory().await;
        memory.learn(CAPITAL, "Rome").unwrap();

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .returning(|choice| match choice {
                "Paris" => Ok(TrialOutcome::Accepted),
                _ => Ok(TrialOutcome::Rejected),
            });

        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, config(RunMode::Smart));
        let outcome = runner.answer(&mut memory, &capital_question()).await.unwrap();

        // Rome, then Berlin, Madrid, Paris with Rome not retried
        assert_eq!(
            outcome,
            QuestionOutcome::Discovered {
                attempts: 4,
                learned: true
            }
        );
        assert_eq!(memory.recall(CAPITAL).unwrap().answer, "Paris");
    }

    #[tokio::test]
    async fn test_learn_mode_skips_memory() {
        let mut memory = memory().await;
        memory.learn(CAPITAL, "Paris").unwrap();

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .times(3)
            .returning(|choice| match choice {
                "Paris" => Ok(TrialOutcome::Accepted),
                _ => Ok(TrialOutcome::Rejected),
            });

        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, config(RunMode::Learn));
        let outcome = runner.answer(&mut memory, &capital_question()).await.unwrap();

        assert_eq!(
            outcome,
            QuestionOutcome::Discovered {
                attempts: 3,
                learned: true
            }
        );
        assert_eq!(memory.recall(CAPITAL).unwrap().hit_count, 2);
    }

    #[tokio::test]
    async fn test_attempt_limit() {
        let mut memory = memory().await;

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .times(2)
            .returning(|_| Ok(TrialOutcome::Rejected));

        let runner_config = RunnerConfig {
            max_attempts_per_question: 2,
            ..config(RunMode::Learn)
        };
        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, runner_config);
        let outcome = runner.answer(&mut memory, &capital_question()).await.unwrap();

        assert_eq!(outcome, QuestionOutcome::Exhausted { attempts: 2 });
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_recall_is_ignored() {
        let mut memory = memory().await;
        memory.learn(CAPITAL, "Paris").unwrap();

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .returning(|choice| match choice {
                "Paris" => Ok(TrialOutcome::Accepted),
                _ => Ok(TrialOutcome::Rejected),
            });

        let runner_config = RunnerConfig {
            min_recall_confidence: 2.0,
            ..config(RunMode::Smart)
        };
        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, runner_config);
        let outcome = runner.answer(&mut memory, &capital_question()).await.unwrap();

        assert!(matches!(outcome, QuestionOutcome::Discovered { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_source_error_aborts_run() {
        let mut memory = memory().await;

        let mut source = MockQuestionSource::new();
        source
            .expect_current_question()
            .returning(|| Err(anyhow::anyhow!("page closed")));

        let mut runner = QuizRunner::new(source, MockAnswerTrial::new(), config(RunMode::Smart));
        let err = runner.run(&mut memory, 10).await.unwrap_err();

        assert!(matches!(err, RunnerError::Source(_)));
    }

    #[tokio::test]
    async fn test_stop_handle_ends_run() {
        let mut memory = memory().await;
        let mut runner = QuizRunner::new(
            MockQuestionSource::new(),
            MockAnswerTrial::new(),
            config(RunMode::Smart),
        );

        runner.stop_handle().stop();
        let stats = runner.run(&mut memory, 10).await.unwrap();

        assert_eq!(stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_fixed_answer_learned_when_accepted() {
        let mut memory = memory().await;

        let mut trial = MockAnswerTrial::new();
        trial
            .expect_attempt()
            .with(eq("Paris"))
            .times(1)
            .returning(|_| Ok(TrialOutcome::Accepted));

        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, config(RunMode::Smart));
        let outcome = runner
            .answer_fixed(&mut memory, &capital_question(), "Paris")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            QuestionOutcome::Discovered {
                attempts: 1,
                learned: true
            }
        );
        let entries = memory.export_all();
        assert_eq!(entries.values().next().unwrap().source, LearnSource::Fixed);
    }

    #[tokio::test]
    async fn test_fixed_answer_not_offered() {
        let mut memory = memory().await;
        let mut trial = MockAnswerTrial::new();
        trial.expect_attempt().times(0);

        let mut runner = QuizRunner::new(MockQuestionSource::new(), trial, config(RunMode::Smart));
        let outcome = runner
            .answer_fixed(&mut memory, &capital_question(), "Lisbon")
            .await
            .unwrap();

        assert_eq!(outcome, QuestionOutcome::Exhausted { attempts: 0 });
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_fixed_run_always_advances() {
        let mut memory = memory().await;

        let mut source = MockQuestionSource::new();
        let mut served = 0;
        source.expect_current_question().returning(move || {
            served += 1;
            Ok(match served {
                1 => Some(Question::new("First question about colours", ["Red", "Blue"])),
                2 => Some(Question::new("Second question about colours", ["Green", "Red"])),
                _ => Some(Question::new("Results page", Vec::<String>::new())),
            })
        });
        source.expect_advance().times(2).returning(|| Ok(()));

        let mut trial = MockAnswerTrial::new();
        let mut calls = 0;
        trial.expect_attempt().with(eq("Red")).times(2).returning(move |_| {
            calls += 1;
            Ok(if calls == 1 {
                TrialOutcome::Rejected
            } else {
                TrialOutcome::Accepted
            })
        });

        let mut runner = QuizRunner::new(source, trial, config(RunMode::Smart));
        let stats = runner.run_fixed(&mut memory, "Red", 10).await.unwrap();

        assert_eq!(stats.questions, 2);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.learned, 1);
        assert_eq!(stats.exhausted, 1);
        assert!(memory.recall("Second question about colours").is_some());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = RunStats::default();
        stats.record(QuestionOutcome::Recalled { attempts: 1 });
        stats.record(QuestionOutcome::Discovered {
            attempts: 3,
            learned: true,
        });
        stats.record(QuestionOutcome::Exhausted { attempts: 4 });

        assert_eq!(stats.questions, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.learned, 1);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.attempts, 8);
    }
}
