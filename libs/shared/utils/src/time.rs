use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, offset::LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeError {
    #[error("Unparseable date/time: {0}")]
    Unparseable(String),

    #[error("Local time does not exist in the reference timezone: {0}")]
    NonexistentLocal(String),

    #[error("Invalid time of day: {hour}:{minute}")]
    InvalidTimeOfDay { hour: u32, minute: u32 },
}

/// Civil date/time strings in the reference timezone, used only for
/// rendering reminder text, never for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivilParts {
    pub date: String,
    pub time: String,
}

fn zoned_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(Z|z|[+-]\d{2}:?\d{2})$").expect("static regex"))
}

/// Converts between ambiguous local-looking timestamps and absolute instants.
/// Inputs carrying an explicit offset are taken literally; bare wall-clock
/// inputs are interpreted in the configured reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimeNormalizer {
    tz: Tz,
}

impl TimeNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn to_absolute(&self, input: &str) -> Result<DateTime<Utc>, TimeError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(TimeError::Unparseable(input.to_string()));
        }

        if zoned_suffix().is_match(s) {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M%z"] {
                if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                    return Ok(dt.with_timezone(&Utc));
                }
            }
            return Err(TimeError::Unparseable(input.to_string()));
        }

        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self.resolve_local(naive);
            }
        }
        Err(TimeError::Unparseable(input.to_string()))
    }

    pub fn civil_parts(&self, instant: DateTime<Utc>) -> CivilParts {
        let local = instant.with_timezone(&self.tz);
        CivilParts {
            date: local.format("%d/%m/%Y").to_string(),
            time: local.format("%H:%M").to_string(),
        }
    }

    /// The civil date of an absolute instant in the reference timezone.
    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Absolute instant for `date @ hour:minute` civil time in the reference zone.
    pub fn at_civil_time(
        &self,
        date: NaiveDate,
        hour: u32,
        minute: u32,
    ) -> Result<DateTime<Utc>, TimeError> {
        let naive = date
            .and_hms_opt(hour, minute, 0)
            .ok_or(TimeError::InvalidTimeOfDay { hour, minute })?;
        self.resolve_local(naive)
    }

    fn resolve_local(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>, TimeError> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            // DST fold: two valid instants, take the earlier one.
            LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
            // DST gap: the wall-clock time never happened.
            LocalResult::None => Err(TimeError::NonexistentLocal(naive.to_string())),
        }
    }
}

/// Pure instant arithmetic, no zone dependency.
pub fn add_minutes(instant: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    instant + Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jerusalem() -> TimeNormalizer {
        TimeNormalizer::new(chrono_tz::Asia::Jerusalem)
    }

    #[test]
    fn zoned_input_is_taken_literally() {
        let n = jerusalem();
        let dt = n.to_absolute("2025-08-28T10:00:00+03:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-28T07:00:00+00:00");

        let utc = n.to_absolute("2025-08-28T07:00:00Z").unwrap();
        assert_eq!(utc, dt);
    }

    #[test]
    fn bare_wall_clock_is_interpreted_in_reference_zone() {
        let n = jerusalem();
        // Jerusalem is UTC+3 in August (IDT).
        let dt = n.to_absolute("2025-08-28T10:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-28T07:00:00+00:00");

        let with_seconds = n.to_absolute("2025-08-28T10:00:00").unwrap();
        assert_eq!(with_seconds, dt);
    }

    #[test]
    fn to_absolute_is_idempotent_on_zoned_strings() {
        let n = jerusalem();
        let first = n.to_absolute("2025-08-28T10:00").unwrap();
        let second = n.to_absolute(&first.to_rfc3339()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_fails() {
        let n = jerusalem();
        assert!(matches!(n.to_absolute("not a date"), Err(TimeError::Unparseable(_))));
        assert!(matches!(n.to_absolute(""), Err(TimeError::Unparseable(_))));
        assert!(matches!(n.to_absolute("28/08/2025"), Err(TimeError::Unparseable(_))));
    }

    #[test]
    fn civil_parts_render_fixed_formats() {
        let n = jerusalem();
        let instant = n.to_absolute("2025-08-28T07:00:00Z").unwrap();
        let parts = n.civil_parts(instant);
        assert_eq!(parts.date, "28/08/2025");
        assert_eq!(parts.time, "10:00");
    }

    #[test]
    fn at_civil_time_converts_to_absolute() {
        let n = jerusalem();
        let date = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
        let dt = n.at_civil_time(date, 8, 0).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-27T05:00:00+00:00");
    }

    #[test]
    fn at_civil_time_rejects_bad_time_of_day() {
        let n = jerusalem();
        let date = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
        assert!(matches!(
            n.at_civil_time(date, 24, 0),
            Err(TimeError::InvalidTimeOfDay { .. })
        ));
    }

    #[test]
    fn add_minutes_is_pure_arithmetic() {
        let n = jerusalem();
        let start = n.to_absolute("2025-08-28T10:00").unwrap();
        let end = add_minutes(start, 45);
        assert_eq!((end - start).num_minutes(), 45);
    }
}
