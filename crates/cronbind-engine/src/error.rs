use cronbind_core::{JobKey, TriggerKey};
use thiserror::Error;

/// Errors raised by the engine or its durable store.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored job data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    /// A job or trigger with this key exists and overwriting is disabled.
    #[error("Object already exists: {key}")]
    ObjectAlreadyExists { key: String },

    #[error("Job not found: {key}")]
    JobNotFound { key: JobKey },

    #[error("Trigger not found: {key}")]
    TriggerNotFound { key: TriggerKey },

    #[error("Unknown time zone '{name}': {reason}")]
    InvalidTimeZone { name: String, reason: String },

    /// A thread panicked while holding the store lock.
    #[error("Job store lock poisoned")]
    StorePoisoned,

    #[error("Worker pool closed")]
    WorkerPoolClosed,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure reported by a [`crate::Job`] for a single fire.
///
/// Local to that fire: the trigger stays scheduled.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct JobExecutionError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl JobExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
