use serde::{Deserialize, Serialize};
use std::fmt;

/// Group used for every job and trigger unless a caller picks another one.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Identifies a stored job: `(name, group)`, unique within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub name: String,
    pub group: String,
}

impl JobKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Key in [`DEFAULT_GROUP`].
    pub fn with_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Identifies a stored trigger. Lives in a separate namespace from [`JobKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    pub name: String,
    pub group: String,
}

impl TriggerKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    pub fn with_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_group_dot_name() {
        let key = JobKey::with_default_group("Job1Detail");
        assert_eq!(key.to_string(), "DEFAULT.Job1Detail");
    }

    #[test]
    fn trigger_key_keeps_its_group() {
        let key = TriggerKey::new("Job0Trigger", "legacy");
        assert_eq!(key.to_string(), "legacy.Job0Trigger");
        assert_ne!(key, TriggerKey::with_default_group("Job0Trigger"));
    }
}
