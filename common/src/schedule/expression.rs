// Cron expression parsing, matching and next-fire search

use super::field::{CronField, FieldKind};
use crate::errors::ScheduleError;
use chrono::{DateTime, Datelike, Duration, Offset, SubsecRound, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

/// Forward search horizon for `next_fire_after`: one year of seconds
pub const SEARCH_HORIZON_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Truncate an instant to whole seconds
#[inline]
pub fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(0)
}

/// A parsed 6-field cron expression: second minute hour day-of-month month day-of-week
///
/// All fields must match (logical AND) for an instant to match. There is no
/// day-of-month / day-of-week OR rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    fields: [CronField; 6],
}

impl CronExpression {
    /// Parse an expression; the whole expression is rejected on any malformed field
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let tokens: Vec<&str> = expression.split_whitespace().collect();
        if tokens.len() != 6 {
            return Err(ScheduleError::invalid(
                expression,
                format!(
                    "expected 6 fields (second minute hour day month dayOfWeek), found {}",
                    tokens.len()
                ),
            ));
        }

        let parse = |index: usize| CronField::parse(FieldKind::ALL[index], tokens[index], expression);

        Ok(Self {
            source: tokens.join(" "),
            fields: [parse(0)?, parse(1)?, parse(2)?, parse(3)?, parse(4)?, parse(5)?],
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn field(&self, kind: FieldKind) -> &CronField {
        &self.fields[kind.index()]
    }

    /// Whether the calendar components of `instant`, in its own timezone, match every field
    pub fn matches<Z: TimeZone>(&self, instant: &DateTime<Z>) -> bool {
        self.first_mismatch(instant).is_none()
    }

    /// First matching instant strictly after `from` (truncated to seconds),
    /// evaluated in the local time of `tz`
    pub fn next_fire_after<Z: TimeZone>(
        &self,
        from: DateTime<Utc>,
        tz: &Z,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let seed = truncate_to_second(from);
        let horizon = seed + Duration::seconds(SEARCH_HORIZON_SECONDS);
        let mut candidate = seed + Duration::seconds(1);

        while candidate <= horizon {
            let local = candidate.with_timezone(tz);
            let skip = match self.first_mismatch(&local) {
                None => return Ok(candidate),
                Some(skip) => skip,
            };

            // Whole units are skipped only while the UTC offset is stable,
            // otherwise a DST shift could jump over a matching local second.
            let jumped = candidate + Duration::seconds(skip);
            candidate = if skip > 1
                && jumped.with_timezone(tz).offset().fix() != local.offset().fix()
            {
                candidate + Duration::seconds(1)
            } else {
                jumped
            };
        }

        Err(ScheduleError::NoNextExecution {
            expression: self.source.clone(),
        })
    }

    /// `None` on a full match, otherwise the number of seconds until the start
    /// of the smallest calendar unit that could change the mismatching field
    fn first_mismatch<Z: TimeZone>(&self, local: &DateTime<Z>) -> Option<i64> {
        let [second, minute, hour, day, month, weekday] = &self.fields;
        let elapsed_in_minute = local.second() as i64;
        let elapsed_in_hour = local.minute() as i64 * 60 + elapsed_in_minute;
        let elapsed_in_day = local.hour() as i64 * 3600 + elapsed_in_hour;

        if !month.contains(local.month())
            || !day.contains(local.day())
            || !weekday.contains(local.weekday().num_days_from_sunday())
        {
            return Some(86_400 - elapsed_in_day);
        }
        if !hour.contains(local.hour()) {
            return Some(3_600 - elapsed_in_hour);
        }
        if !minute.contains(local.minute()) {
            return Some(60 - elapsed_in_minute);
        }
        if !second.contains(local.second()) {
            return Some(1);
        }
        None
    }
}

impl FromStr for CronExpression {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
