//! Jobs shipped with the daemon.

use std::sync::Arc;

use cronbind_binder::{ConfigurationError, InstanceRegistry, JobDeclaration, JobInstance};
use tracing::info;

pub(crate) struct Job1;

impl Job1 {
    fn execute(&self) {
        info!("Job1 executing");
    }
}

pub(crate) struct Job2;

impl Job2 {
    fn execute(&self) -> i32 {
        info!("Job2 executing");
        666
    }
}

pub(crate) struct Job3;

impl Job3 {
    fn do_it(&self) {
        info!("Job3 doing it");
    }
}

pub(crate) fn declarations() -> Vec<JobDeclaration> {
    vec![
        JobDeclaration::of::<Job1>("0 0/1 * * * ?"),
        JobDeclaration::of::<Job2>("0 0/1 * * * ?"),
        JobDeclaration::of::<Job3>("${job3.cron:0 0/5 * * * ?}").with_entry_point("do_it"),
    ]
}

pub(crate) fn instances() -> Result<InstanceRegistry, ConfigurationError> {
    let mut registry = InstanceRegistry::new();
    registry.register(JobInstance::of(Arc::new(Job1)).entry_point("execute", Job1::execute))?;
    registry.register(JobInstance::of(Arc::new(Job2)).entry_point("execute", Job2::execute))?;
    registry.register(JobInstance::of(Arc::new(Job3)).entry_point("do_it", Job3::do_it))?;
    Ok(registry)
}
