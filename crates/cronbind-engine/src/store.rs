use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cronbind_core::{JobKey, TriggerKey};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::{
    db::init_db,
    error::{EngineError, Result},
    types::{CronTrigger, JobDataMap, JobDetail, StoredTrigger},
};

const TRIGGER_COLUMNS: &str = "trigger_name, trigger_group, job_name, job_group,
     cron_expression, start_delay_ms, next_fire_ms, prev_fire_ms";

/// How a trigger write changed the stored firing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerWrite {
    /// No trigger with this key existed.
    Inserted,
    /// Same job and expression as before; the pending fire time was kept.
    Unchanged,
    /// Expression or job changed; the next fire time was recomputed.
    Rescheduled,
}

/// Durable job/trigger store on SQLite.
///
/// All engine threads go through this type; the connection is guarded by a
/// mutex so reads and writes are serialised.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EngineError::StorePoisoned)
    }

    /// Store a job and its trigger in one transaction.
    ///
    /// With `replace`, an existing job is overwritten and an existing trigger
    /// keeps its pending fire time unless its expression or job changed.
    pub fn store_job_and_trigger(
        &self,
        detail: &JobDetail,
        trigger: &CronTrigger,
        replace: bool,
        now: DateTime<Utc>,
    ) -> Result<TriggerWrite> {
        if trigger.job_key != detail.key {
            return Err(EngineError::JobNotFound {
                key: trigger.job_key.clone(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now_str = now.to_rfc3339();

        write_job(&tx, detail, replace, &now_str)?;
        let write = write_trigger(&tx, trigger, replace, now, &now_str)?;
        tx.commit()?;

        debug!(job = %detail.key, trigger = %trigger.key, ?write, "job and trigger stored");
        Ok(write)
    }

    /// Every group that holds at least one job, sorted.
    pub fn job_group_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT job_group FROM job_details ORDER BY job_group")?;
        let groups = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn job_keys(&self, group: &str) -> Result<Vec<JobKey>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT job_name FROM job_details WHERE job_group = ?1 ORDER BY job_name",
        )?;
        let keys = stmt
            .query_map([group], |row| {
                Ok(JobKey::new(row.get::<_, String>(0)?, group))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    pub fn trigger_keys(&self, group: &str) -> Result<Vec<TriggerKey>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT trigger_name FROM cron_triggers WHERE trigger_group = ?1 ORDER BY trigger_name",
        )?;
        let keys = stmt
            .query_map([group], |row| {
                Ok(TriggerKey::new(row.get::<_, String>(0)?, group))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    pub fn check_job_exists(&self, key: &JobKey) -> Result<bool> {
        let conn = self.lock()?;
        job_exists(&conn, key)
    }

    pub fn job_detail(&self, key: &JobKey) -> Result<Option<JobDetail>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT job_data, is_durable, disallow_concurrent
                 FROM job_details WHERE job_name = ?1 AND job_group = ?2",
                params![key.name, key.group],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?, // job_data JSON
                        row.get::<_, bool>(1)?,   // is_durable
                        row.get::<_, bool>(2)?,   // disallow_concurrent
                    ))
                },
            )
            .optional()?;

        let Some((data_json, durable, disallow_concurrent)) = row else {
            return Ok(None);
        };
        let job_data: JobDataMap = serde_json::from_str(&data_json)?;
        Ok(Some(JobDetail {
            key: key.clone(),
            job_data,
            durable,
            disallow_concurrent,
        }))
    }

    pub fn trigger(&self, key: &TriggerKey) -> Result<Option<StoredTrigger>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TRIGGER_COLUMNS} FROM cron_triggers
             WHERE trigger_name = ?1 AND trigger_group = ?2"
        );
        let trigger = conn
            .query_row(&sql, params![key.name, key.group], trigger_from_row)
            .optional()?;
        Ok(trigger)
    }

    /// Delete a job and every trigger pointing at it.
    ///
    /// Returns false when nothing with this key was stored.
    pub fn delete_job(&self, key: &JobKey) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let triggers = tx.execute(
            "DELETE FROM cron_triggers WHERE job_name = ?1 AND job_group = ?2",
            params![key.name, key.group],
        )?;
        let jobs = tx.execute(
            "DELETE FROM job_details WHERE job_name = ?1 AND job_group = ?2",
            params![key.name, key.group],
        )?;
        tx.commit()?;

        if jobs > 0 || triggers > 0 {
            debug!(job = %key, triggers, "job deleted");
        }
        Ok(jobs > 0 || triggers > 0)
    }

    /// Delete a single trigger, leaving its job in place.
    pub fn delete_trigger(&self, key: &TriggerKey) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM cron_triggers WHERE trigger_name = ?1 AND trigger_group = ?2",
            params![key.name, key.group],
        )?;
        Ok(n > 0)
    }

    /// Triggers whose next fire time is at or before `now`, earliest first.
    pub fn due_triggers(&self, now: DateTime<Utc>) -> Result<Vec<StoredTrigger>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TRIGGER_COLUMNS} FROM cron_triggers
             WHERE next_fire_ms IS NOT NULL AND next_fire_ms <= ?1
             ORDER BY next_fire_ms, trigger_name"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let due = stmt
            .query_map([now.timestamp_millis()], trigger_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(due)
    }

    /// Advance a trigger after it fired at `scheduled`.
    pub fn record_fire(
        &self,
        key: &TriggerKey,
        scheduled: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE cron_triggers SET prev_fire_ms = ?1, next_fire_ms = ?2, updated_at = ?3
             WHERE trigger_name = ?4 AND trigger_group = ?5",
            params![
                scheduled.timestamp_millis(),
                next.map(|dt| dt.timestamp_millis()),
                Utc::now().to_rfc3339(),
                key.name,
                key.group
            ],
        )?;
        if n == 0 {
            return Err(EngineError::TriggerNotFound { key: key.clone() });
        }
        Ok(())
    }
}

// --- private helpers -------------------------------------------------------

fn job_exists(conn: &Connection, key: &JobKey) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM job_details WHERE job_name = ?1 AND job_group = ?2",
            params![key.name, key.group],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_job(conn: &Connection, detail: &JobDetail, replace: bool, now: &str) -> Result<()> {
    if !replace && job_exists(conn, &detail.key)? {
        return Err(EngineError::ObjectAlreadyExists {
            key: detail.key.to_string(),
        });
    }
    let data_json = serde_json::to_string(&detail.job_data)?;
    conn.execute(
        "INSERT INTO job_details
         (job_name, job_group, job_data, is_durable, disallow_concurrent,
          created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?6)
         ON CONFLICT (job_name, job_group) DO UPDATE SET
            job_data = excluded.job_data,
            is_durable = excluded.is_durable,
            disallow_concurrent = excluded.disallow_concurrent,
            updated_at = excluded.updated_at",
        params![
            detail.key.name,
            detail.key.group,
            data_json,
            detail.durable,
            detail.disallow_concurrent,
            now
        ],
    )?;
    Ok(())
}

fn write_trigger(
    conn: &Connection,
    trigger: &CronTrigger,
    replace: bool,
    now: DateTime<Utc>,
    now_str: &str,
) -> Result<TriggerWrite> {
    // Columns: job_name, job_group, cron_expression, next_fire_ms
    let existing: Option<(String, String, String, Option<i64>)> = conn
        .query_row(
            "SELECT job_name, job_group, cron_expression, next_fire_ms FROM cron_triggers
             WHERE trigger_name = ?1 AND trigger_group = ?2",
            params![trigger.key.name, trigger.key.group],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let start_delay_ms = i64::try_from(trigger.start_delay.as_millis()).unwrap_or(i64::MAX);

    let (write, next_fire) = match existing {
        Some(_) if !replace => {
            return Err(EngineError::ObjectAlreadyExists {
                key: trigger.key.to_string(),
            })
        }
        // Same binding as last run: keep the pending fire so restarts neither
        // skip nor duplicate it.
        Some((job_name, job_group, expression, Some(next)))
            if job_name == trigger.job_key.name
                && job_group == trigger.job_key.group
                && expression == trigger.cron_expression() =>
        {
            (TriggerWrite::Unchanged, Some(next))
        }
        Some(_) => (
            TriggerWrite::Rescheduled,
            trigger.first_fire_after(now).map(|dt| dt.timestamp_millis()),
        ),
        None => (
            TriggerWrite::Inserted,
            trigger.first_fire_after(now).map(|dt| dt.timestamp_millis()),
        ),
    };

    conn.execute(
        "INSERT INTO cron_triggers
         (trigger_name, trigger_group, job_name, job_group, cron_expression,
          start_delay_ms, next_fire_ms, prev_fire_ms, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,NULL,?8,?8)
         ON CONFLICT (trigger_name, trigger_group) DO UPDATE SET
            job_name = excluded.job_name,
            job_group = excluded.job_group,
            cron_expression = excluded.cron_expression,
            start_delay_ms = excluded.start_delay_ms,
            next_fire_ms = excluded.next_fire_ms,
            updated_at = excluded.updated_at",
        params![
            trigger.key.name,
            trigger.key.group,
            trigger.job_key.name,
            trigger.job_key.group,
            trigger.cron_expression(),
            start_delay_ms,
            next_fire,
            now_str
        ],
    )?;
    Ok(write)
}

fn trigger_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTrigger> {
    let start_delay_ms: i64 = row.get(5)?;
    Ok(StoredTrigger {
        key: TriggerKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
        job_key: JobKey::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
        cron_expression: row.get(4)?,
        start_delay: Duration::from_millis(start_delay_ms.max(0) as u64),
        next_fire: row
            .get::<_, Option<i64>>(6)?
            .and_then(DateTime::from_timestamp_millis),
        prev_fire: row
            .get::<_, Option<i64>>(7)?
            .and_then(DateTime::from_timestamp_millis),
    })
}
