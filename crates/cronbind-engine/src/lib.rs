//! `cronbind-engine`: durable cron scheduler backed by SQLite.
//!
//! # Overview
//!
//! Jobs and their cron triggers live in two tables (`job_details`,
//! `cron_triggers`). [`SchedulerEngine::initialize`] stores the startup set
//! of job/trigger pairs, then [`SchedulerEngine::run`] polls for due triggers
//! and executes each fire on a blocking worker thread through the
//! [`JobFactory`] supplied at initialization.
//!
//! | Guarantee            | Mechanism                                             |
//! |----------------------|-------------------------------------------------------|
//! | Survives restarts    | SQLite store; pending fire times kept on re-binding   |
//! | No overlapping runs  | `disallow_concurrent` jobs tracked while in flight    |
//! | Bounded parallelism  | Semaphore with `thread_count` permits                 |
//! | Misfire handling     | A missed fire time fires once, then resumes on time   |
//! | Wall-clock schedules | Cron fields read in the local or a named IANA zone    |

pub mod db;
pub mod engine;
pub mod error;
pub mod job;
pub mod schedule;
pub mod store;
pub mod types;

pub use engine::{EngineOptions, Initialized, RejectedJob, ScheduledJob, SchedulerEngine};
pub use error::{EngineError, JobExecutionError, Result};
pub use job::{Job, JobFactory};
pub use schedule::{CronSchedule, ScheduleZone};
pub use store::{JobStore, TriggerWrite};
pub use types::{CronTrigger, FireContext, JobDataMap, JobDetail, RunOutcome, StoredTrigger};
