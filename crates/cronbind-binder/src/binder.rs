//! Turns job definitions into engine job/trigger pairs.

use std::time::Duration;

use cronbind_core::{JobKey, TriggerKey};
use cronbind_engine::{CronTrigger, JobDetail, ScheduledJob};
use tracing::{error, info};

use crate::declaration::JobDefinition;
use crate::error::{BindError, ConfigurationError};
use crate::resolver::{resolve, PropertySource, ResolvedSchedule};

/// Bound-data key holding the declaration identifier.
pub const IDENTIFIER_KEY: &str = "job.identifier";
/// Bound-data key holding the entry point name.
pub const ENTRY_POINT_KEY: &str = "job.entry_point";

pub fn job_key_for(identifier: &str) -> JobKey {
    JobKey::with_default_group(format!("{identifier}Detail"))
}

pub fn trigger_key_for(identifier: &str) -> TriggerKey {
    TriggerKey::with_default_group(format!("{identifier}Trigger"))
}

/// Build the durable, non-overlapping job and its cron trigger for one definition.
pub fn bind(
    definition: &JobDefinition,
    schedule: &ResolvedSchedule,
) -> Result<ScheduledJob, BindError> {
    let identifier = definition.identifier();
    let job_key = job_key_for(identifier);

    let trigger = CronTrigger::new(trigger_key_for(identifier), job_key.clone(), schedule.as_str())
        .map_err(|source| BindError::InvalidSchedule {
            identifier: identifier.to_string(),
            expression: schedule.as_str().to_string(),
            source,
        })?
        .with_start_delay(Duration::ZERO);

    let detail = JobDetail::new(job_key)
        .with_data(IDENTIFIER_KEY, identifier)
        .with_data(ENTRY_POINT_KEY, definition.entry_point())
        .durable(true)
        .disallow_concurrent(true);

    Ok(ScheduledJob { detail, trigger })
}

/// Resolve and bind every definition.
///
/// A placeholder that cannot be resolved stops startup. A job whose resolved
/// schedule is rejected is logged and left out; the rest are still bound.
pub fn bind_definitions(
    definitions: &[JobDefinition],
    properties: &dyn PropertySource,
) -> Result<Vec<ScheduledJob>, ConfigurationError> {
    let mut bound = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let schedule = resolve(definition.schedule_expression(), properties)?;
        match bind(definition, &schedule) {
            Ok(job) => {
                info!(
                    job = %definition.identifier(),
                    cron = %schedule.as_str(),
                    entry_point = %definition.entry_point(),
                    "Created a job"
                );
                bound.push(job);
            }
            Err(e) => error!(job = %definition.identifier(), error = %e, "failed to bind job"),
        }
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{collect_definitions, JobDeclaration};
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Log sink for asserting on formatted events.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Job1;
    struct Job3;

    fn no_properties() -> HashMap<String, String> {
        HashMap::new()
    }

    fn definitions(declarations: Vec<JobDeclaration>) -> Vec<JobDefinition> {
        collect_definitions(declarations).expect("collect")
    }

    #[test]
    fn bound_job_carries_keys_data_and_flags() {
        let defs = definitions(vec![
            JobDeclaration::of::<Job3>("0 0/5 * * * ?").with_entry_point("do_it")
        ]);
        let schedule = resolve(defs[0].schedule_expression(), &no_properties()).expect("resolve");
        let job = bind(&defs[0], &schedule).expect("bind");

        assert_eq!(job.detail.key.to_string(), "DEFAULT.Job3Detail");
        assert_eq!(job.trigger.key.to_string(), "DEFAULT.Job3Trigger");
        assert_eq!(job.trigger.job_key, job.detail.key);
        assert!(job.detail.durable);
        assert!(job.detail.disallow_concurrent);
        assert_eq!(job.trigger.start_delay, Duration::ZERO);
        assert_eq!(job.detail.job_data[IDENTIFIER_KEY], "Job3");
        assert_eq!(job.detail.job_data[ENTRY_POINT_KEY], "do_it");
    }

    #[test]
    fn malformed_cron_is_bind_error() {
        let defs = definitions(vec![JobDeclaration::of::<Job1>("every five minutes")]);
        let schedule = resolve(defs[0].schedule_expression(), &no_properties()).expect("resolve");
        assert!(matches!(
            bind(&defs[0], &schedule),
            Err(BindError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn bind_definitions_skips_bad_schedules() {
        let defs = definitions(vec![
            JobDeclaration::of::<Job1>("not cron"),
            JobDeclaration::of::<Job3>("${job3.cron:0 0/5 * * * ?}"),
        ]);
        let props = HashMap::from([("job3.cron".to_string(), "0 0/2 * * * ?".to_string())]);
        let bound = bind_definitions(&defs, &props).expect("bind");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].trigger.cron_expression(), "0 0/2 * * * ?");
    }

    #[test]
    fn unresolvable_placeholder_is_fatal() {
        let defs = definitions(vec![JobDeclaration::of::<Job3>("${job3.cron}")]);
        let err = bind_definitions(&defs, &no_properties()).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnresolvablePlaceholder { .. }));
    }

    #[test]
    fn bind_failure_is_logged_with_the_job_field() {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let defs = definitions(vec![JobDeclaration::of::<Job1>("not cron")]);
        let bound = tracing::subscriber::with_default(subscriber, || {
            bind_definitions(&defs, &no_properties())
        })
        .expect("bind");
        assert!(bound.is_empty());

        let text = logs.text();
        assert!(text.contains("failed to bind job"), "{text}");
        assert!(text.contains("job=Job1"), "{text}");
    }
}
