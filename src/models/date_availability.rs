use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateAvailability {
    pub id: String,
    pub date: NaiveDate,
    pub is_open: bool,
    #[serde(with = "clock::hms_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "clock::hms_opt")]
    pub end_time: Option<NaiveTime>,
    pub max_bookings_per_day: Option<i64>,
    pub is_override: bool,
    pub override_reason: Option<String>,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "clock::timestamp")]
    pub updated_at: NaiveDateTime,
}

/// Calendar status shown on the admin month view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateStatus {
    Unconfigured,
    Override,
    Open,
    Closed,
}

impl DateStatus {
    pub fn of(availability: Option<&DateAvailability>) -> Self {
        match availability {
            None => DateStatus::Unconfigured,
            Some(a) if a.is_override => DateStatus::Override,
            Some(a) if a.is_open => DateStatus::Open,
            Some(_) => DateStatus::Closed,
        }
    }
}

impl DateAvailability {
    /// An override closes the date no matter what `is_open` says.
    pub fn is_effectively_open(&self) -> bool {
        self.is_open && !self.is_override
    }

    pub fn status(&self) -> DateStatus {
        DateStatus::of(Some(self))
    }

    /// Whether `[start, end)` sits inside the configured working hours.
    /// Dates without working hours accept any interval.
    pub fn within_hours(&self, start: &NaiveTime, end: &NaiveTime) -> bool {
        let after_open = self.start_time.map(|open| *start >= open).unwrap_or(true);
        let before_close = self.end_time.map(|close| *end <= close).unwrap_or(true);
        after_open && before_close
    }
}

/// Admin create-or-update payload for a single calendar date.
#[derive(Debug, Clone)]
pub struct DateSettings {
    pub is_open: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_bookings_per_day: Option<i64>,
}

impl DateSettings {
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start >= end {
                return Err("Working hours must end after they start".to_string());
            }
        }
        if let Some(max) = self.max_bookings_per_day {
            if max < 1 {
                return Err("Max bookings per day must be at least 1".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(is_open: bool, is_override: bool) -> DateAvailability {
        let now = chrono::Utc::now().naive_utc();
        DateAvailability {
            id: "d1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            is_open,
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: NaiveTime::from_hms_opt(17, 0, 0),
            max_bookings_per_day: Some(5),
            is_override,
            override_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_override_forces_closed() {
        assert!(date(true, false).is_effectively_open());
        assert!(!date(true, true).is_effectively_open());
        assert!(!date(false, false).is_effectively_open());
    }

    #[test]
    fn test_status_precedence() {
        assert_eq!(DateStatus::of(None), DateStatus::Unconfigured);
        assert_eq!(date(true, true).status(), DateStatus::Override);
        assert_eq!(date(true, false).status(), DateStatus::Open);
        assert_eq!(date(false, false).status(), DateStatus::Closed);
    }

    #[test]
    fn test_within_hours() {
        let d = date(true, false);
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(d.within_hours(&t(9, 0), &t(10, 0)));
        assert!(d.within_hours(&t(16, 0), &t(17, 0)));
        assert!(!d.within_hours(&t(8, 30), &t(9, 30)));
        assert!(!d.within_hours(&t(16, 30), &t(17, 30)));
    }

    #[test]
    fn test_settings_reject_inverted_hours() {
        let settings = DateSettings {
            is_open: true,
            start_time: NaiveTime::from_hms_opt(17, 0, 0),
            end_time: NaiveTime::from_hms_opt(9, 0, 0),
            max_bookings_per_day: None,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_serializes_times_as_hms() {
        let json = serde_json::to_value(date(true, false)).unwrap();
        assert_eq!(json["date"], "2025-12-20");
        assert_eq!(json["start_time"], "09:00:00");
        assert_eq!(json["end_time"], "17:00:00");
    }
}
