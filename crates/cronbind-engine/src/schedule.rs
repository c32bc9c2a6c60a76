use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{EngineError, Result};

/// Zone in which cron fields (hour, day, ...) are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleZone {
    /// The host's local zone.
    #[default]
    Local,
    Named(Tz),
}

impl ScheduleZone {
    /// `None`, an empty name or `local` selects the host zone; anything else
    /// must be an IANA zone name.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim) {
            None | Some("") => Ok(Self::Local),
            Some(n) if n.eq_ignore_ascii_case("local") => Ok(Self::Local),
            Some(n) => n
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|e| EngineError::InvalidTimeZone {
                    name: n.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

impl fmt::Display for ScheduleZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// A parsed cron expression (Quartz grammar: `sec min hour dom mon dow [year]`).
///
/// Keeps the source text so it can be persisted and compared on re-binding.
/// Fields are matched against wall-clock time in the schedule's zone.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
    zone: ScheduleZone,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let schedule =
            cron::Schedule::from_str(trimmed).map_err(|e| EngineError::InvalidCronExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
            zone: ScheduleZone::Local,
        })
    }

    pub fn in_zone(mut self, zone: ScheduleZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn zone(&self) -> ScheduleZone {
        self.zone
    }

    /// First fire time strictly after `from`, or `None` when the schedule is exhausted.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.zone {
            ScheduleZone::Local => self.next_in(&Local, from),
            ScheduleZone::Named(tz) => self.next_in(&tz, from),
        }
    }

    fn next_in<Z: TimeZone>(&self, zone: &Z, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(zone))
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expression", &self.expression)
            .field("zone", &self.zone)
            .finish()
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression && self.zone == other.zone
    }
}

impl Eq for CronSchedule {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const UTC: ScheduleZone = ScheduleZone::Named(chrono_tz::UTC);

    #[test]
    fn every_minute_with_question_mark() {
        let sched = CronSchedule::parse("0 0/1 * * * ?").expect("parse failed").in_zone(UTC);
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 15).unwrap();
        let next = sched.next_after(after).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (10, 31, 0));
    }

    #[test]
    fn every_five_minutes() {
        let sched = CronSchedule::parse("0 0/5 * * * ?").expect("parse failed").in_zone(UTC);
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 2, 0).unwrap();
        let next = sched.next_after(after).unwrap();
        assert_eq!(next.minute(), 5);
    }

    #[test]
    fn next_is_strictly_after() {
        let sched = CronSchedule::parse("0 0/1 * * * ?").expect("parse failed").in_zone(UTC);
        let on_tick = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        assert_eq!(sched.next_after(on_tick).unwrap().minute(), 31);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let sched = CronSchedule::parse("  0 0/1 * * * ?  ").expect("parse failed");
        assert_eq!(sched.expression(), "0 0/1 * * * ?");
    }

    #[test]
    fn malformed_expression_is_err() {
        let err = CronSchedule::parse("every minute").unwrap_err();
        assert!(matches!(err, EngineError::InvalidCronExpression { .. }));
    }

    #[test]
    fn hour_fields_follow_the_schedule_zone() {
        let noon = CronSchedule::parse("0 0 12 * * ?")
            .expect("parse failed")
            .in_zone(ScheduleZone::Named(chrono_tz::America::New_York));
        let after = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        let next = noon.next_after(after).unwrap();

        // EDT is UTC-4 in October.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 18, 16, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&chrono_tz::America::New_York).hour(), 12);
    }

    #[test]
    fn local_zone_reads_host_wall_clock() {
        let noon = CronSchedule::parse("0 0 12 * * ?").expect("parse failed");
        assert_eq!(noon.zone(), ScheduleZone::Local);
        let next = noon.next_after(Utc::now()).unwrap();
        assert_eq!(next.with_timezone(&Local).hour(), 12);
    }

    #[test]
    fn zone_names_are_parsed() {
        assert_eq!(ScheduleZone::from_name(None).unwrap(), ScheduleZone::Local);
        assert_eq!(ScheduleZone::from_name(Some("local")).unwrap(), ScheduleZone::Local);
        assert_eq!(
            ScheduleZone::from_name(Some("Europe/Berlin")).unwrap(),
            ScheduleZone::Named(chrono_tz::Europe::Berlin)
        );
        let err = ScheduleZone::from_name(Some("Mars/Olympus")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeZone { .. }));
    }
}
