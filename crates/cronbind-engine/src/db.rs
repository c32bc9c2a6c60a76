use rusqlite::Connection;

use crate::error::Result;

/// Initialise the job store schema in `conn`.
///
/// Creates `job_details` and `cron_triggers` (idempotent). Fire times are
/// stored as epoch milliseconds so the due-trigger query compares integers.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_details (
            job_name            TEXT    NOT NULL,
            job_group           TEXT    NOT NULL,
            job_data            TEXT    NOT NULL,   -- JSON object
            is_durable          INTEGER NOT NULL,
            disallow_concurrent INTEGER NOT NULL,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL,
            PRIMARY KEY (job_name, job_group)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS cron_triggers (
            trigger_name        TEXT    NOT NULL,
            trigger_group       TEXT    NOT NULL,
            job_name            TEXT    NOT NULL,
            job_group           TEXT    NOT NULL,
            cron_expression     TEXT    NOT NULL,
            start_delay_ms      INTEGER NOT NULL DEFAULT 0,
            next_fire_ms        INTEGER,            -- NULL once the schedule is exhausted
            prev_fire_ms        INTEGER,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL,
            PRIMARY KEY (trigger_name, trigger_group)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_cron_triggers_next_fire ON cron_triggers (next_fire_ms);
        CREATE INDEX IF NOT EXISTS idx_cron_triggers_job ON cron_triggers (job_name, job_group);
        ",
    )?;
    Ok(())
}
