use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::ConfigurationError;

/// Entry point invoked when a declaration does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "execute";

/// Last path segment of `T`'s type name, without generic arguments.
///
/// `my_app::jobs::Job1` → `Job1`.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Business code's statement that some unit of work runs on a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDeclaration {
    identifier: String,
    schedule: String,
    entry_point: String,
}

impl JobDeclaration {
    /// Declare a job owned by type `T`; the identifier is `T`'s simple name.
    pub fn of<T: ?Sized + 'static>(schedule: impl Into<String>) -> Self {
        Self::named(simple_type_name::<T>(), schedule)
    }

    pub fn named(identifier: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            schedule: schedule.into(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// A validated declaration, ready for binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    identifier: String,
    schedule_expression: String,
    entry_point: String,
}

impl JobDefinition {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Raw expression, possibly containing placeholders.
    pub fn schedule_expression(&self) -> &str {
        &self.schedule_expression
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Normalise declarations into definitions, keeping discovery order.
///
/// An empty input is allowed (logged as a warning); a repeated identifier is not.
pub fn collect_definitions<I>(declarations: I) -> Result<Vec<JobDefinition>, ConfigurationError>
where
    I: IntoIterator<Item = JobDeclaration>,
{
    let mut seen = HashSet::new();
    let mut definitions = Vec::new();

    for declaration in declarations {
        validate_identifier(&declaration.identifier)?;
        if declaration.entry_point.trim().is_empty() {
            return Err(ConfigurationError::InvalidIdentifier {
                identifier: declaration.identifier,
                reason: "entry point name is empty".to_string(),
            });
        }
        if !seen.insert(declaration.identifier.clone()) {
            return Err(ConfigurationError::DuplicateIdentifier {
                identifier: declaration.identifier,
            });
        }
        debug!(job = %declaration.identifier, schedule = %declaration.schedule, "job declared");
        definitions.push(JobDefinition {
            identifier: declaration.identifier,
            schedule_expression: declaration.schedule,
            entry_point: declaration.entry_point,
        });
    }

    if definitions.is_empty() {
        warn!("No jobs added. Did you pass your job declarations to the scheduler?");
    }
    Ok(definitions)
}

fn validate_identifier(identifier: &str) -> Result<(), ConfigurationError> {
    let reason = if identifier.is_empty() {
        "identifier is empty"
    } else if identifier.chars().any(char::is_whitespace) {
        "identifier contains whitespace"
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    })
}
