//! Command line entry points.

use std::path::PathBuf;

use answer_memory::AnswerMemory;
use tracing::info;

use crate::config::Settings;
use crate::deck::QuizDeck;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::QuizRunner;

pub const USAGE: &str = "usage: quiz-runner <run DECK.json | export DIR | import FILE | clear | stats>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer a practice deck with the configured mode
    Run { deck: PathBuf },
    Export { dir: PathBuf },
    Import { file: PathBuf },
    Clear,
    Stats,
}

impl Command {
    pub fn parse<I>(args: I) -> RunnerResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = args.next().unwrap_or_default();
        let operand = args.next().map(PathBuf::from);

        let command = match (command.as_str(), operand) {
            ("run", Some(deck)) => Self::Run { deck },
            ("export", Some(dir)) => Self::Export { dir },
            ("import", Some(file)) => Self::Import { file },
            ("clear", None) => Self::Clear,
            ("stats", None) => Self::Stats,
            _ => return Err(RunnerError::Usage(USAGE.to_string())),
        };

        if args.next().is_some() {
            return Err(RunnerError::Usage(USAGE.to_string()));
        }
        Ok(command)
    }
}

/// Load `.env` and the layered settings
pub fn load_settings() -> RunnerResult<Settings> {
    dotenv::dotenv().ok();
    Ok(Settings::new()?)
}

/// Open the answer memory described by `settings`
pub async fn open_memory(settings: &Settings) -> RunnerResult<AnswerMemory> {
    let store = settings.storage.build_store()?;
    let memory = AnswerMemory::open(settings.memory.clone(), store).await;
    info!(
        "Answer memory ready: {} entries ({:?})",
        memory.len(),
        memory.load_status()
    );
    Ok(memory)
}

/// Run `command` and return a one-line summary
pub async fn execute(settings: &Settings, command: Command) -> RunnerResult<String> {
    let mut memory = open_memory(settings).await?;

    let summary = match command {
        Command::Run { deck } => {
            let deck = QuizDeck::load(&deck).await?;
            let config = settings.runner.clone();
            let max_questions = config.max_questions;
            let fixed_answer = config.fixed_answer.clone();

            let mut runner = QuizRunner::new(deck.clone(), deck, config);
            let stats = match fixed_answer {
                Some(answer) => {
                    runner
                        .run_fixed(&mut memory, &answer, max_questions)
                        .await?
                },
                None => runner.run(&mut memory, max_questions).await?,
            };
            format!(
                "{}/{} correct, {} learned, {} from memory, {} exhausted",
                stats.correct, stats.questions, stats.learned, stats.memory_hits, stats.exhausted
            )
        },
        Command::Export { dir } => {
            let path = memory.export_to_dir(&dir).await?;
            format!("exported {} answers to {}", memory.len(), path.display())
        },
        Command::Import { file } => {
            let payload = tokio::fs::read_to_string(&file).await?;
            let count = memory.import(&payload)?;
            format!("imported {count} answers")
        },
        Command::Clear => {
            memory.clear();
            "answer memory cleared".to_string()
        },
        Command::Stats => {
            let stats = memory.stats();
            format!(
                "{} answers remembered, {} learned, last update {}",
                memory.len(),
                stats.learned,
                stats.last_update
            )
        },
    };

    memory.close().await;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn file_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::File;
        settings.storage.dir = Some(dir.join("store").to_string_lossy().to_string());
        settings
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(args("run deck.json")).unwrap(),
            Command::Run {
                deck: PathBuf::from("deck.json")
            }
        );
        assert_eq!(Command::parse(args("stats")).unwrap(), Command::Stats);

        for bad in ["", "run", "stats extra", "export a b", "unknown x"] {
            assert!(matches!(
                Command::parse(args(bad)),
                Err(RunnerError::Usage(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_run_deck_then_stats() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.json");
        std::fs::write(
            &deck,
            r#"[{ "text": "What is the capital of France?",
                  "choices": ["Berlin", "Paris"], "answer": "Paris" }]"#,
        )
        .unwrap();
        let settings = file_settings(dir.path());

        let summary = execute(&settings, Command::Run { deck: deck.clone() })
            .await
            .unwrap();
        assert_eq!(summary, "1/1 correct, 1 learned, 0 from memory, 0 exhausted");

        // The second pass answers from the persisted memory
        let summary = execute(&settings, Command::Run { deck }).await.unwrap();
        assert_eq!(summary, "1/1 correct, 0 learned, 1 from memory, 0 exhausted");

        let summary = execute(&settings, Command::Stats).await.unwrap();
        assert!(summary.starts_with("1 answers remembered, 1 learned"));
    }

    #[tokio::test]
    async fn test_fixed_answer_run() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.json");
        std::fs::write(
            &deck,
            r#"[{ "text": "Pick the true statement here", "choices": ["A", "B"], "answer": "A" },
                { "text": "Pick the false statement here", "choices": ["A", "B"], "answer": "B" }]"#,
        )
        .unwrap();
        let mut settings = file_settings(dir.path());
        settings.runner.fixed_answer = Some("A".to_string());

        let summary = execute(&settings, Command::Run { deck }).await.unwrap();
        assert_eq!(summary, "1/2 correct, 1 learned, 0 from memory, 1 exhausted");
    }

    #[tokio::test]
    async fn test_missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let settings = file_settings(dir.path());

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            execute(&settings, Command::Run { deck: missing.clone() }).await,
            Err(RunnerError::Io(_))
        ));
        assert!(matches!(
            execute(&settings, Command::Import { file: missing }).await,
            Err(RunnerError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let settings = file_settings(dir.path());
        let file = dir.path().join("garbage.json");
        std::fs::write(&file, "not an export").unwrap();

        assert!(matches!(
            execute(&settings, Command::Import { file }).await,
            Err(RunnerError::Memory(_))
        ));
    }

    #[test]
    fn test_load_settings() {
        assert!(load_settings().is_ok());
    }
}
