use cronbind_core::JobKey;
use cronbind_engine::EngineError;
use thiserror::Error;

/// Bad declarations or schedule placeholders. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Could not resolve placeholder '{key}' in \"{expression}\"")]
    UnresolvablePlaceholder { key: String, expression: String },

    #[error("Unterminated placeholder in \"{expression}\"")]
    UnterminatedPlaceholder { expression: String },

    #[error("Circular placeholder reference '{key}' in \"{expression}\"")]
    CircularPlaceholder { key: String, expression: String },

    /// Two declarations (or two registered instances) derive the same identifier.
    #[error("Duplicate job identifier '{identifier}'")]
    DuplicateIdentifier { identifier: String },

    #[error("Invalid job identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },
}

/// A single job could not be bound. Logged; the other jobs are still scheduled.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Job {identifier}: invalid cron expression \"{expression}\": {source}")]
    InvalidSchedule {
        identifier: String,
        expression: String,
        source: EngineError,
    },

    #[error("Job {identifier}: store rejected the job: {source}")]
    Store {
        identifier: String,
        source: EngineError,
    },
}

/// Orphan cleanup could not finish. Fatal at startup.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Failed to enumerate stored jobs: {0}")]
    Enumerate(#[source] EngineError),

    #[error("Failed to delete orphaned job {key}: {source}")]
    Delete { key: JobKey, source: EngineError },
}

/// No live instance backs a fired job.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No live instance registered for job '{identifier}'")]
    NotRegistered { identifier: String },

    /// The stored job carries no identifier to look up.
    #[error("Job {job} has no '{key}' entry in its bound data")]
    MissingBinding { job: JobKey, key: &'static str },
}

/// The entry point could not be called or failed while running.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Job '{identifier}' has no entry point '{entry_point}'")]
    MissingEntryPoint {
        identifier: String,
        entry_point: String,
    },

    #[error("Job '{identifier}' entry point '{entry_point}' failed: {source}")]
    Failed {
        identifier: String,
        entry_point: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Job '{identifier}' entry point '{entry_point}' panicked: {message}")]
    Panicked {
        identifier: String,
        entry_point: String,
        message: String,
    },
}

/// Fire-time failure of the dispatch shim. Local to one fire.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Conditions that stop the scheduler from reaching steady state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// The store could not be opened or its schema created.
    #[error("Scheduler engine failed to start: {0}")]
    Engine(#[from] EngineError),
}
