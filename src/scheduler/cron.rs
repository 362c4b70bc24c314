//! Cron expression parsing and evaluation.
//!
//! Five fields, `minute hour day month weekday`, evaluated in a fixed time
//! zone. Each field accepts `*`, a value, a range `a-b`, a step `*/n` or
//! `a-b/n`, and comma separated lists of those. Months and weekdays also
//! accept three letter English names; weekday `7` is Sunday like `0`.
//!
//! All five fields must match for a minute to fire.

use std::{fmt, str::FromStr};

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

/// How far ahead [`CronExpression::next_after`] searches, in days. Long
/// enough for `0 0 29 2 *`.
const SEARCH_HORIZON_DAYS: i64 = 366 * 4 + 1;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field {value:?}: {reason}")]
    Field {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Bounds and aliases of one field.
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    /// Upper end of `*`. Weekday 7 is only an alias of 0.
    wildcard_max: u32,
    names: &'static [&'static str],
    /// Value the names start at (`jan` = 1, `sun` = 0).
    names_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    wildcard_max: 59,
    names: &[],
    names_base: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    wildcard_max: 23,
    names: &[],
    names_base: 0,
};
const DAY: FieldSpec = FieldSpec {
    name: "day",
    min: 1,
    max: 31,
    wildcard_max: 31,
    names: &[],
    names_base: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    wildcard_max: 12,
    names: &MONTH_NAMES,
    names_base: 1,
};
const WEEKDAY: FieldSpec = FieldSpec {
    name: "weekday",
    min: 0,
    max: 7,
    wildcard_max: 6,
    names: &WEEKDAY_NAMES,
    names_base: 0,
};

/// Set of values a field matches, one bit per value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CronField(u64);

impl CronField {
    fn matches(self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }

    fn values(self, min: u32, max: u32) -> impl Iterator<Item = u32> {
        (min..=max).filter(move |v| self.matches(*v))
    }
}

/// A parsed trigger expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    /// Sunday = 0.
    weekday: CronField,
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronParser::parse(s)
    }
}

/// Cron expression parser.
pub struct CronParser;

impl CronParser {
    /// Parse a cron expression string.
    ///
    /// # Examples
    ///
    /// - `30 7 * * *` - Every day at 07:30
    /// - `*/15 * * * *` - Every 15 minutes
    /// - `0 9-17 * * mon-fri` - On the hour, 9am-5pm, Monday-Friday
    ///
    /// # Errors
    ///
    /// Returns an error if the expression does not have exactly five fields
    /// or any field is out of range.
    pub fn parse(expr: &str) -> Result<CronExpression, CronError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut weekday = Self::parse_field(parts[4], &WEEKDAY)?;
        if weekday.matches(7) {
            weekday.0 = (weekday.0 & !(1 << 7)) | 1;
        }

        Ok(CronExpression {
            source: parts.join(" "),
            minute: Self::parse_field(parts[0], &MINUTE)?,
            hour: Self::parse_field(parts[1], &HOUR)?,
            day: Self::parse_field(parts[2], &DAY)?,
            month: Self::parse_field(parts[3], &MONTH)?,
            weekday,
        })
    }

    /// Whether `expr` parses.
    pub fn is_valid(expr: &str) -> bool {
        Self::parse(expr).is_ok()
    }

    fn parse_field(field: &str, spec: &FieldSpec) -> Result<CronField, CronError> {
        let invalid = |reason: String| CronError::Field {
            field: spec.name,
            value: field.to_string(),
            reason,
        };

        let mut bits = 0u64;
        for item in field.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| invalid(format!("bad step {step:?}")))?;
                    if step == 0 {
                        return Err(invalid("step must be at least 1".to_string()));
                    }
                    (range, Some(step))
                }
                None => (item, None),
            };

            let (start, end) = if range == "*" {
                (spec.min, spec.wildcard_max)
            } else if let Some((a, b)) = range.split_once('-') {
                (Self::value(a, spec, &invalid)?, Self::value(b, spec, &invalid)?)
            } else {
                let v = Self::value(range, spec, &invalid)?;
                // `5/10` means 5, 15, 25, ...
                (v, if step.is_some() { spec.max } else { v })
            };

            if start > end {
                return Err(invalid(format!("range {start}-{end} is reversed")));
            }

            let step = step.unwrap_or(1);
            let mut v = start;
            while v <= end {
                bits |= 1 << v;
                v += step;
            }
        }

        Ok(CronField(bits))
    }

    fn value(
        raw: &str,
        spec: &FieldSpec,
        invalid: &dyn Fn(String) -> CronError,
    ) -> Result<u32, CronError> {
        let lower = raw.to_ascii_lowercase();
        let value = match spec.names.iter().position(|n| *n == lower) {
            Some(index) => index as u32 + spec.names_base,
            None => raw
                .parse::<u32>()
                .map_err(|_| invalid(format!("bad value {raw:?}")))?,
        };
        if value < spec.min || value > spec.max {
            return Err(invalid(format!(
                "{value} is outside {}-{}",
                spec.min, spec.max
            )));
        }
        Ok(value)
    }
}

impl CronExpression {
    /// Whether the expression fires at this wall-clock minute.
    pub fn matches_local(&self, local: &NaiveDateTime) -> bool {
        self.minute.matches(local.minute())
            && self.hour.matches(local.hour())
            && self.matches_date(local.date())
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        self.day.matches(date.day())
            && self.month.matches(date.month())
            && self.weekday.matches(date.weekday().num_days_from_sunday())
    }

    /// First fire instant strictly after `after`, evaluated in `tz`.
    ///
    /// Wall-clock times that do not exist in `tz` (a DST gap) are skipped.
    /// Times that occur twice fire once, at the earlier instant. `None` when
    /// nothing matches within about four years (e.g. `0 0 31 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local_after = after.with_timezone(&tz).naive_local();
        let start = local_after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))?
            + Duration::minutes(1);

        let first_day = start.date();
        for offset in 0..SEARCH_HORIZON_DAYS {
            let date = first_day + Duration::days(offset);
            if !self.matches_date(date) {
                continue;
            }

            for hour in self.hour.values(0, 23) {
                for minute in self.minute.values(0, 59) {
                    let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
                        continue;
                    };
                    if naive < start {
                        continue;
                    }

                    let instant = match tz.from_local_datetime(&naive) {
                        LocalResult::Single(dt) => dt,
                        LocalResult::Ambiguous(a, b) => a.min(b),
                        LocalResult::None => continue,
                    };
                    let instant = instant.with_timezone(&Utc);
                    if instant > after {
                        return Some(instant);
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::{New_York, Sao_Paulo};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_invalid() {
        assert!(CronParser::parse("not a cron").is_err());
        assert!(CronParser::parse("* * *").is_err());
        assert!(CronParser::parse("* * * * * *").is_err());
        assert!(CronParser::parse("60 * * * *").is_err());
        assert!(CronParser::parse("* 24 * * *").is_err());
        assert!(CronParser::parse("* * 0 * *").is_err());
        assert!(CronParser::parse("* * * 13 *").is_err());
        assert!(CronParser::parse("* * * * 8").is_err());
        assert!(CronParser::parse("*/0 * * * *").is_err());
        assert!(CronParser::parse("10-5 * * * *").is_err());
    }

    #[test]
    fn test_parse_valid_forms() {
        for expr in [
            "30 7 * * *",
            "*/15 * * * *",
            "0 9-17 * * mon-fri",
            "0,30 8-20/2 1,15 jan-jun 0-6",
            "5/10 * * * 7",
            "  0   0  *  *  *  ",
        ] {
            assert!(CronParser::is_valid(expr), "{expr}");
        }
    }

    #[test]
    fn test_weekday_seven_is_sunday() {
        let a = CronParser::parse("0 0 * * 7").unwrap();
        let b = CronParser::parse("0 0 * * sun").unwrap();
        assert_eq!(a.weekday, b.weekday);
        assert!(a.weekday.matches(0));
    }

    #[test]
    fn test_matches_local() {
        let expr = CronParser::parse("30 7 * * mon-fri").unwrap();
        // 2026-03-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        assert!(expr.matches_local(&monday));
        assert!(!expr.matches_local(&sunday));
    }

    #[test]
    fn test_next_after_in_zone() {
        let expr = CronParser::parse("30 7 * * *").unwrap();
        // 07:00 in Sao Paulo (UTC-3) is 10:00 UTC.
        let next = expr.next_after(utc("2026-03-02T10:00:00Z"), Sao_Paulo).unwrap();
        assert_eq!(next, utc("2026-03-02T10:30:00Z"));

        // Exactly on a fire instant: the next one is a day later.
        let next = expr.next_after(next, Sao_Paulo).unwrap();
        assert_eq!(next, utc("2026-03-03T10:30:00Z"));
    }

    #[test]
    fn test_next_after_steps() {
        let expr = CronParser::parse("*/15 * * * *").unwrap();
        let next = expr.next_after(utc("2026-03-02T10:07:42Z"), Sao_Paulo).unwrap();
        assert_eq!(next, utc("2026-03-02T10:15:00Z"));
    }

    #[test]
    fn test_next_after_leap_day() {
        let expr = CronParser::parse("0 0 29 feb *").unwrap();
        let next = expr.next_after(utc("2026-03-01T12:00:00Z"), Sao_Paulo).unwrap();
        assert_eq!(next, utc("2028-02-29T03:00:00Z"));
    }

    #[test]
    fn test_next_after_impossible_date() {
        let expr = CronParser::parse("0 0 31 2 *").unwrap();
        assert_eq!(expr.next_after(utc("2026-01-01T00:00:00Z"), Sao_Paulo), None);
    }

    #[test]
    fn test_dst_gap_is_skipped() {
        // 2026-03-08 02:30 does not exist in New York.
        let expr = CronParser::parse("30 2 * * *").unwrap();
        let next = expr.next_after(utc("2026-03-08T05:00:00Z"), New_York).unwrap();
        assert_eq!(next, utc("2026-03-09T06:30:00Z"));
    }

    #[test]
    fn test_dst_overlap_fires_once() {
        // 2026-11-01 01:30 happens twice in New York: 05:30Z and 06:30Z.
        let expr = CronParser::parse("30 1 * * *").unwrap();
        let first = expr.next_after(utc("2026-11-01T04:00:00Z"), New_York).unwrap();
        assert_eq!(first, utc("2026-11-01T05:30:00Z"));
        let second = expr.next_after(first, New_York).unwrap();
        assert_eq!(second, utc("2026-11-02T06:30:00Z"));
    }
}
