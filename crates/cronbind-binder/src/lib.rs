//! `cronbind-binder`: binds declared jobs to the cron engine.
//!
//! Business code lists [`JobDeclaration`]s and registers the live objects
//! behind them in an [`InstanceRegistry`]. [`build_scheduler_handle`] then
//!
//! 1. validates the declarations ([`collect_definitions`]),
//! 2. resolves `${key:default}` placeholders in each schedule ([`resolve`]),
//! 3. binds each one to a durable, non-overlapping job and cron trigger ([`bind`]),
//! 4. stores them in the engine and removes stored jobs that are no longer
//!    declared ([`reconcile_orphans`]).
//!
//! At fire time the engine runs a [`DispatchJob`], which looks the instance
//! up by identifier and calls the declared entry point.

pub mod binder;
pub mod bootstrap;
pub mod declaration;
pub mod dispatch;
pub mod error;
pub mod instance;
pub mod reconcile;
pub mod resolver;

pub use binder::{bind, bind_definitions, job_key_for, trigger_key_for, ENTRY_POINT_KEY, IDENTIFIER_KEY};
pub use bootstrap::build_scheduler_handle;
pub use declaration::{collect_definitions, JobDeclaration, JobDefinition, DEFAULT_ENTRY_POINT};
pub use dispatch::{DispatchFactory, DispatchJob};
pub use error::{
    BindError, ConfigurationError, DispatchError, InvocationError, LookupError,
    ReconciliationError, StartupError,
};
pub use instance::{EntryError, InstanceBuilder, InstanceRegistry, IntoRunValue, JobInstance};
pub use reconcile::{reconcile_orphans, JobStoreAdmin};
pub use resolver::{resolve, FnSource, PropertySource, ResolvedSchedule};
