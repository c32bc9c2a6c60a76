use std::sync::Arc;

use cronbind_engine::{FireContext, Job, JobDetail, JobExecutionError, JobFactory};
use tracing::debug;

use crate::binder::{ENTRY_POINT_KEY, IDENTIFIER_KEY};
use crate::declaration::DEFAULT_ENTRY_POINT;
use crate::error::{DispatchError, LookupError};
use crate::instance::InstanceRegistry;

/// The single job type the engine runs for every bound declaration.
///
/// Reads the identifier and entry point from the fire's bound data, looks up
/// the live instance and calls it.
pub struct DispatchJob {
    instances: Arc<InstanceRegistry>,
}

impl DispatchJob {
    pub fn new(instances: Arc<InstanceRegistry>) -> Self {
        Self { instances }
    }

    pub fn dispatch(&self, ctx: &mut FireContext) -> Result<(), DispatchError> {
        let identifier = ctx
            .bound_str(IDENTIFIER_KEY)
            .ok_or_else(|| LookupError::MissingBinding {
                job: ctx.job_key().clone(),
                key: IDENTIFIER_KEY,
            })?
            .to_string();
        let entry_point = ctx
            .bound_str(ENTRY_POINT_KEY)
            .unwrap_or(DEFAULT_ENTRY_POINT)
            .to_string();

        let instance = self.instances.resolve(&identifier)?;
        debug!(job = %identifier, entry_point = %entry_point, fire = %ctx.fire_instance_id(), "dispatching");

        if let Some(value) = instance.invoke(&entry_point)? {
            ctx.set_result(value);
        }
        Ok(())
    }
}

impl Job for DispatchJob {
    fn execute(&self, ctx: &mut FireContext) -> Result<(), JobExecutionError> {
        self.dispatch(ctx)
            .map_err(|e| JobExecutionError::with_source(e.to_string(), e))
    }
}

/// Hands the engine a [`DispatchJob`] sharing one frozen registry.
pub struct DispatchFactory {
    instances: Arc<InstanceRegistry>,
}

impl DispatchFactory {
    pub fn new(instances: Arc<InstanceRegistry>) -> Self {
        Self { instances }
    }
}

impl JobFactory for DispatchFactory {
    fn new_job(&self, _detail: &JobDetail) -> Result<Box<dyn Job>, JobExecutionError> {
        Ok(Box::new(DispatchJob::new(Arc::clone(&self.instances))))
    }
}
