use std::collections::HashSet;
use std::sync::Arc;

use cronbind_core::JobKey;
use cronbind_engine::{EngineOptions, SchedulerEngine};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::binder::bind_definitions;
use crate::declaration::{collect_definitions, JobDeclaration};
use crate::dispatch::DispatchFactory;
use crate::error::{BindError, StartupError};
use crate::instance::InstanceRegistry;
use crate::reconcile::reconcile_orphans;
use crate::resolver::PropertySource;

/// Validate, resolve and bind `declarations`, start the engine on `conn` and
/// delete stored jobs no longer declared.
///
/// The returned engine is initialized but not yet polling; hand it to
/// [`SchedulerEngine::run`].
pub fn build_scheduler_handle<I>(
    conn: Connection,
    declarations: I,
    instances: InstanceRegistry,
    properties: &dyn PropertySource,
    options: EngineOptions,
) -> Result<SchedulerEngine, StartupError>
where
    I: IntoIterator<Item = JobDeclaration>,
{
    let definitions = collect_definitions(declarations)?;
    for definition in &definitions {
        if !instances.contains(definition.identifier()) {
            warn!(job = %definition.identifier(), "no live instance registered; fires will fail until one is");
        }
    }

    let jobs = bind_definitions(&definitions, properties)?;
    let mut declared: HashSet<JobKey> = jobs.iter().map(|job| job.detail.key.clone()).collect();

    let factory = Arc::new(DispatchFactory::new(Arc::new(instances)));
    let init = SchedulerEngine::initialize(conn, jobs, factory, options)?;

    for rejected in init.rejected {
        let identifier = rejected
            .job_key
            .name
            .strip_suffix("Detail")
            .unwrap_or(&rejected.job_key.name)
            .to_string();
        declared.remove(&rejected.job_key);
        let e = BindError::Store {
            identifier: identifier.clone(),
            source: rejected.error,
        };
        error!(job = %identifier, error = %e, "failed to store job");
    }

    let engine = init.engine;
    let deleted = reconcile_orphans(&engine, &declared)?;

    info!(jobs = declared.len(), orphans_deleted = deleted.len(), "scheduler ready");
    Ok(engine)
}
