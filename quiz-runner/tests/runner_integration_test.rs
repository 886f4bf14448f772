//! Drives the runner against a scripted quiz with a real answer memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use answer_memory::store::{FileStore, InMemoryStore};
use answer_memory::{AnswerMemory, LearnSource, MemoryConfig};
use async_trait::async_trait;
use quiz_runner::{
    AnswerTrial, Question, QuestionSource, QuizRunner, RunMode, RunnerConfig, TrialOutcome,
};

/// Shared state of a fake quiz page
#[derive(Default)]
struct Script {
    questions: Vec<(Question, String)>,
    position: usize,
    attempts: Vec<String>,
}

#[derive(Clone, Default)]
struct ScriptedQuiz(Arc<Mutex<Script>>);

impl ScriptedQuiz {
    fn new(items: &[(&str, &[&str], &str)]) -> Self {
        let questions = items
            .iter()
            .map(|(text, choices, answer)| {
                (Question::new(*text, choices.iter().copied()), answer.to_string())
            })
            .collect();
        Self(Arc::new(Mutex::new(Script {
            questions,
            ..Script::default()
        })))
    }

    fn attempts(&self) -> usize {
        self.0.lock().unwrap().attempts.len()
    }
}

#[async_trait]
impl QuestionSource for ScriptedQuiz {
    async fn current_question(&mut self) -> anyhow::Result<Option<Question>> {
        let script = self.0.lock().unwrap();
        Ok(script.questions.get(script.position).map(|(q, _)| q.clone()))
    }

    async fn advance(&mut self) -> anyhow::Result<()> {
        self.0.lock().unwrap().position += 1;
        Ok(())
    }
}

#[async_trait]
impl AnswerTrial for ScriptedQuiz {
    async fn attempt(&mut self, choice: &str) -> anyhow::Result<TrialOutcome> {
        let mut script = self.0.lock().unwrap();
        script.attempts.push(choice.to_string());
        let (_, answer) = &script.questions[script.position];
        Ok(if answer == choice {
            TrialOutcome::Accepted
        } else {
            TrialOutcome::Rejected
        })
    }
}

const QUIZ: &[(&str, &[&str], &str)] = &[
    (
        "What is the capital of France?",
        &["Berlin", "Madrid", "Paris", "Rome"],
        "Paris",
    ),
    (
        "Which planet is known as the red planet?",
        &["Venus", "Mars", "Jupiter"],
        "Mars",
    ),
    (
        "Choose the synonym of the word happy",
        &["sad", "angry", "tired", "joyful"],
        "joyful",
    ),
];

fn runner(quiz: &ScriptedQuiz, mode: RunMode) -> QuizRunner<ScriptedQuiz, ScriptedQuiz> {
    let config = RunnerConfig {
        mode,
        ..RunnerConfig::default()
    };
    QuizRunner::new(quiz.clone(), quiz.clone(), config)
}

/// Test that a learning pass followed by a smart pass answers from memory.
#[tokio::test]
async fn test_learn_then_recall() {
    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(InMemoryStore::new())).await;

    let first = ScriptedQuiz::new(QUIZ);
    let stats = runner(&first, RunMode::Learn)
        .run(&mut memory, 100)
        .await
        .unwrap();
    assert_eq!(stats.questions, 3);
    assert_eq!(stats.correct, 3);
    assert_eq!(stats.learned, 3);
    assert_eq!(stats.memory_hits, 0);
    // 3 + 2 + 4 choices tried
    assert_eq!(first.attempts(), 9);

    let second = ScriptedQuiz::new(QUIZ);
    let stats = runner(&second, RunMode::Smart)
        .run(&mut memory, 100)
        .await
        .unwrap();
    assert_eq!(stats.correct, 3);
    assert_eq!(stats.memory_hits, 3);
    assert_eq!(stats.learned, 0);
    assert_eq!(second.attempts(), 3);
}

/// Test that a reworded question is answered from a fuzzy match.
#[tokio::test]
async fn test_fuzzy_recall_in_smart_mode() {
    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(InMemoryStore::new())).await;
    memory
        .learn_with_source("What is the capital of France?", "Paris", LearnSource::Auto)
        .unwrap();

    const REWORDED: &[(&str, &[&str], &str)] = &[(
        "what's the capital city of France",
        &["Lyon", "Paris", "Nice"],
        "Paris",
    )];
    let quiz = ScriptedQuiz::new(REWORDED);
    let stats = runner(&quiz, RunMode::Smart)
        .run(&mut memory, 10)
        .await
        .unwrap();

    assert_eq!(stats.memory_hits, 1);
    assert_eq!(quiz.attempts(), 1);
}

/// Test that the question limit bounds the run.
#[tokio::test]
async fn test_question_limit() {
    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(InMemoryStore::new())).await;
    let quiz = ScriptedQuiz::new(QUIZ);

    let stats = runner(&quiz, RunMode::Smart)
        .run(&mut memory, 2)
        .await
        .unwrap();

    assert_eq!(stats.questions, 2);
    assert_eq!(memory.len(), 2);
}

/// Test that an unanswerable question is counted and retried up to the limit.
#[tokio::test]
async fn test_exhausted_question() {
    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(InMemoryStore::new())).await;
    const UNANSWERABLE: &[(&str, &[&str], &str)] =
        &[("Which of these is a prime number?", &["4", "6", "8"], "7")];
    let quiz = ScriptedQuiz::new(UNANSWERABLE);

    let stats = runner(&quiz, RunMode::Smart)
        .run(&mut memory, 2)
        .await
        .unwrap();

    assert_eq!(stats.questions, 2);
    assert_eq!(stats.exhausted, 2);
    assert_eq!(stats.correct, 0);
    assert!(memory.is_empty());
}

/// Test that answers learned in one session are used by the next.
#[tokio::test]
async fn test_memory_persists_between_sessions() {
    let dir = tempfile::tempdir().unwrap();

    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(FileStore::new(dir.path()))).await;
    let quiz = ScriptedQuiz::new(QUIZ);
    runner(&quiz, RunMode::Learn)
        .run(&mut memory, 100)
        .await
        .unwrap();
    memory.close().await;

    let mut memory =
        AnswerMemory::open(MemoryConfig::default(), Arc::new(FileStore::new(dir.path()))).await;
    let quiz = ScriptedQuiz::new(QUIZ);
    let stats = runner(&quiz, RunMode::Smart)
        .run(&mut memory, 100)
        .await
        .unwrap();

    assert_eq!(stats.memory_hits, 3);
    let recorded: HashMap<_, _> = memory
        .export_all()
        .into_values()
        .map(|entry| (entry.answer, entry.source))
        .collect();
    assert_eq!(recorded.get("Mars"), Some(&LearnSource::Auto));
}
