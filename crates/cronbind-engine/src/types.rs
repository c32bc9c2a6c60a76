use std::time::Duration;

use chrono::{DateTime, Utc};
use cronbind_core::{JobKey, TriggerKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schedule::{CronSchedule, ScheduleZone};

/// Opaque key/value data stored with a job and handed to it on every fire.
pub type JobDataMap = serde_json::Map<String, Value>;

/// A job as the store knows it: key, bound data and execution flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: JobKey,
    pub job_data: JobDataMap,
    /// Durable jobs stay in the store even when no trigger references them.
    pub durable: bool,
    /// At most one execution of this job may be in flight at any time.
    pub disallow_concurrent: bool,
}

impl JobDetail {
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            job_data: JobDataMap::new(),
            durable: false,
            disallow_concurrent: false,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.job_data.insert(key.into(), value.into());
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn disallow_concurrent(mut self, disallow: bool) -> Self {
        self.disallow_concurrent = disallow;
        self
    }
}

/// A cron trigger bound to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTrigger {
    pub key: TriggerKey,
    pub job_key: JobKey,
    pub schedule: CronSchedule,
    /// Offset added to "now" before computing the first fire time.
    pub start_delay: Duration,
}

impl CronTrigger {
    /// Build a trigger, rejecting malformed cron expressions up front.
    pub fn new(key: TriggerKey, job_key: JobKey, expression: &str) -> Result<Self> {
        Ok(Self {
            key,
            job_key,
            schedule: CronSchedule::parse(expression)?,
            start_delay: Duration::ZERO,
        })
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Read the cron fields in `zone` instead of the host's local zone.
    pub fn with_time_zone(mut self, zone: ScheduleZone) -> Self {
        self.schedule = self.schedule.in_zone(zone);
        self
    }

    pub fn cron_expression(&self) -> &str {
        self.schedule.expression()
    }

    /// First fire time for a trigger stored at `now`.
    pub fn first_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delay = chrono::Duration::from_std(self.start_delay).unwrap_or_default();
        self.schedule.next_after(now + delay)
    }
}

/// A trigger row read back from the store, including its firing state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrigger {
    pub key: TriggerKey,
    pub job_key: JobKey,
    pub cron_expression: String,
    pub start_delay: Duration,
    /// `None` when the schedule is exhausted.
    pub next_fire: Option<DateTime<Utc>>,
    pub prev_fire: Option<DateTime<Utc>>,
}

/// Mutable context handed to a [`crate::Job`] for one fire.
#[derive(Debug, Clone)]
pub struct FireContext {
    fire_instance_id: String,
    job_key: JobKey,
    trigger_key: Option<TriggerKey>,
    scheduled_fire_time: Option<DateTime<Utc>>,
    fire_time: DateTime<Utc>,
    job_data: JobDataMap,
    result: Option<Value>,
}

impl FireContext {
    pub(crate) fn new(
        detail: &JobDetail,
        trigger_key: Option<TriggerKey>,
        scheduled_fire_time: Option<DateTime<Utc>>,
        fire_time: DateTime<Utc>,
    ) -> Self {
        Self {
            // UUIDv7 sorts by fire time, which keeps log correlation simple
            fire_instance_id: uuid::Uuid::now_v7().to_string(),
            job_key: detail.key.clone(),
            trigger_key,
            scheduled_fire_time,
            fire_time,
            job_data: detail.job_data.clone(),
            result: None,
        }
    }

    pub fn fire_instance_id(&self) -> &str {
        &self.fire_instance_id
    }

    pub fn job_key(&self) -> &JobKey {
        &self.job_key
    }

    /// `None` for manual fires via [`crate::SchedulerEngine::trigger_job`].
    pub fn trigger_key(&self) -> Option<&TriggerKey> {
        self.trigger_key.as_ref()
    }

    pub fn scheduled_fire_time(&self) -> Option<DateTime<Utc>> {
        self.scheduled_fire_time
    }

    pub fn fire_time(&self) -> DateTime<Utc> {
        self.fire_time
    }

    /// Data stored with the job at bind time.
    pub fn bound_data(&self) -> &JobDataMap {
        &self.job_data
    }

    pub fn bound_str(&self, key: &str) -> Option<&str> {
        self.job_data.get(key).and_then(Value::as_str)
    }

    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }
}

/// What happened on one fire. Published for observability, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub fire_instance_id: String,
    pub job_key: JobKey,
    pub trigger_key: Option<TriggerKey>,
    pub fire_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl RunOutcome {
    pub(crate) fn from_context(ctx: FireContext, duration_ms: u64, error: Option<String>) -> Self {
        Self {
            fire_instance_id: ctx.fire_instance_id,
            job_key: ctx.job_key,
            trigger_key: ctx.trigger_key,
            fire_time: ctx.fire_time,
            duration_ms,
            result: ctx.result,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
