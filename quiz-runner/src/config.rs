use answer_memory::MemoryConfig;
use answer_memory::store::{FileStore, InMemoryStore, PersistentStore};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

use crate::error::RunnerResult;
use crate::runner::RunMode;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the file backend; the platform data directory when unset
    pub dir: Option<String>,
}

impl StorageSettings {
    pub fn build_store(&self) -> RunnerResult<Arc<dyn PersistentStore>> {
        let store: Arc<dyn PersistentStore> = match self.backend {
            StorageBackend::Memory => Arc::new(InMemoryStore::new()),
            StorageBackend::File => match &self.dir {
                Some(dir) => Arc::new(FileStore::new(dir)),
                None => Arc::new(FileStore::in_data_dir()?),
            },
        };
        Ok(store)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    pub mode: RunMode,
    pub max_questions: usize,
    pub max_attempts_per_question: usize,
    pub trial_delay_ms: u64,
    pub question_delay_ms: u64,
    /// Recalled answers below this confidence are not tried first
    pub min_recall_confidence: f64,
    /// Submit this answer to every question instead of searching
    pub fixed_answer: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Smart,
            max_questions: 100,
            max_attempts_per_question: 30,
            trial_delay_ms: 0,
            question_delay_ms: 0,
            min_recall_confidence: 0.0,
            fixed_answer: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("memory.max_entries", 1000)?
            .set_default("memory.retain_fraction", 0.8)?
            .set_default("memory.max_persisted_bytes", 4 * 1024 * 1024)?
            .set_default("memory.storage_key", answer_memory::DEFAULT_STORAGE_KEY)?
            .set_default("storage.backend", "file")?
            .set_default("runner.mode", "smart")?
            .set_default("runner.max_questions", 100)?
            .set_default("runner.max_attempts_per_question", 30)?
            .set_default("runner.trial_delay_ms", 0)?
            .set_default("runner.question_delay_ms", 0)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("ANSWER_MEMORY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
