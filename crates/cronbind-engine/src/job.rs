use crate::error::JobExecutionError;
use crate::types::{FireContext, JobDetail};

/// Work executed when a trigger fires.
///
/// Runs on a blocking worker thread; implementations may block for as long
/// as the job takes.
pub trait Job: Send + Sync {
    fn execute(&self, ctx: &mut FireContext) -> Result<(), JobExecutionError>;
}

/// Produces the [`Job`] to run for a stored [`JobDetail`] at fire time.
///
/// The store only persists keys and data, so this is where a fire gets
/// connected back to live code.
pub trait JobFactory: Send + Sync {
    fn new_job(&self, detail: &JobDetail) -> Result<Box<dyn Job>, JobExecutionError>;
}
