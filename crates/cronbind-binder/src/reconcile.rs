//! Removal of stored jobs that the current declaration set no longer names.

use std::collections::HashSet;

use cronbind_core::JobKey;
use cronbind_engine::{EngineError, SchedulerEngine};
use tracing::{debug, info};

use crate::error::ReconciliationError;

/// The slice of the job store the reconciler needs.
pub trait JobStoreAdmin {
    fn job_group_names(&self) -> Result<Vec<String>, EngineError>;
    fn job_keys(&self, group: &str) -> Result<Vec<JobKey>, EngineError>;
    fn delete_job(&self, key: &JobKey) -> Result<bool, EngineError>;
}

impl JobStoreAdmin for SchedulerEngine {
    fn job_group_names(&self) -> Result<Vec<String>, EngineError> {
        SchedulerEngine::job_group_names(self)
    }

    fn job_keys(&self, group: &str) -> Result<Vec<JobKey>, EngineError> {
        SchedulerEngine::job_keys(self, group)
    }

    fn delete_job(&self, key: &JobKey) -> Result<bool, EngineError> {
        SchedulerEngine::delete_job(self, key)
    }
}

/// Delete every stored job, in any group, whose key is not in `declared`.
///
/// Returns the deleted keys. Runs after binding, so `declared` must hold the
/// keys of every job bound in this process.
pub fn reconcile_orphans(
    store: &dyn JobStoreAdmin,
    declared: &HashSet<JobKey>,
) -> Result<Vec<JobKey>, ReconciliationError> {
    let mut deleted = Vec::new();

    for group in store.job_group_names().map_err(ReconciliationError::Enumerate)? {
        let keys = store.job_keys(&group).map_err(ReconciliationError::Enumerate)?;
        for key in keys {
            if declared.contains(&key) {
                continue;
            }
            // Already gone counts as cleaned up.
            let removed = store
                .delete_job(&key)
                .map_err(|source| ReconciliationError::Delete {
                    key: key.clone(),
                    source,
                })?;
            if removed {
                info!(job = %key, "Deleted orphaned job");
            } else {
                debug!(job = %key, "orphaned job already gone");
            }
            deleted.push(key);
        }
    }

    Ok(deleted)
}
