use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;

/// Reads wall-clock time in a configured time zone.
#[derive(Debug, Clone)]
pub struct Clock {
    tz: Tz,
    /// The zone name as configured, reported even when it did not parse.
    zone: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimeOfDay {
    pub current_hour: String,
    pub current_minutes: String,
    pub timezone: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CalendarDate {
    pub current_day: String,
    pub current_month: String,
    pub timezone: String,
}

impl Clock {
    /// Falls back to UTC when `zone` is not a known IANA time zone.
    pub fn new(zone: &str) -> Self {
        let tz = zone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(zone, "No time zone found with this key, falling back to UTC");
            Tz::UTC
        });
        Self {
            tz,
            zone: zone.to_string(),
        }
    }

    /// The configured zone name.
    pub fn timezone(&self) -> &str {
        &self.zone
    }

    pub fn time_at(&self, now: DateTime<Utc>) -> TimeOfDay {
        let local = now.with_timezone(&self.tz);
        TimeOfDay {
            current_hour: local.format("%H").to_string(),
            current_minutes: local.format("%M").to_string(),
            timezone: self.timezone().to_string(),
        }
    }

    pub fn date_at(&self, now: DateTime<Utc>) -> CalendarDate {
        let local = now.with_timezone(&self.tz);
        CalendarDate {
            current_day: local.format("%d").to_string(),
            current_month: local.format("%m").to_string(),
            timezone: self.timezone().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_in_configured_zone() {
        // Canary Islands are UTC+1 in summer.
        let clock = Clock::new("Atlantic/Canary");
        let now = Utc.with_ymd_and_hms(2024, 7, 15, 9, 5, 0).unwrap();
        assert_eq!(
            clock.time_at(now),
            TimeOfDay {
                current_hour: "10".into(),
                current_minutes: "05".into(),
                timezone: "Atlantic/Canary".into(),
            }
        );
    }

    #[test]
    fn test_date_rolls_over_with_zone() {
        let clock = Clock::new("Asia/Tokyo");
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap();
        let date = clock.date_at(now);
        assert_eq!(date.current_day, "01");
        assert_eq!(date.current_month, "01");
    }

    #[test]
    fn test_invalid_zone_keeps_its_name_but_reads_utc() {
        let clock = Clock::new("Mars/Olympus_Mons");
        assert_eq!(clock.timezone(), "Mars/Olympus_Mons");
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 0).unwrap();
        let time = clock.time_at(now);
        assert_eq!(time.current_hour, "23");
        assert_eq!(time.timezone, "Mars/Olympus_Mons");
        let date = clock.date_at(now);
        assert_eq!((date.current_day.as_str(), date.current_month.as_str()), ("02", "03"));
        assert_eq!(date.timezone, "Mars/Olympus_Mons");
    }
}
