use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub id: String,
    pub date_availability_id: String,
    #[serde(with = "clock::hms")]
    pub start_time: NaiveTime,
    #[serde(with = "clock::hms")]
    pub end_time: NaiveTime,
    pub max_bookings: i64,
    pub current_bookings: i64,
    pub is_available: bool,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
}

impl TimeSlot {
    pub fn is_full(&self) -> bool {
        self.current_bookings >= self.max_bookings
    }

    pub fn is_bookable(&self) -> bool {
        self.is_available && !self.is_full()
    }

    pub fn remaining(&self) -> i64 {
        (self.max_bookings - self.current_bookings).max(0)
    }
}

/// A slot that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_bookings: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SlotPatch {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_bookings: Option<i64>,
    pub is_available: Option<bool>,
}

impl TimeSlot {
    pub fn apply(&mut self, patch: SlotPatch) -> Result<(), String> {
        if let Some(start) = patch.start_time {
            self.start_time = start;
        }
        if let Some(end) = patch.end_time {
            self.end_time = end;
        }
        if let Some(max) = patch.max_bookings {
            self.max_bookings = max;
        }
        if let Some(available) = patch.is_available {
            self.is_available = available;
        }
        if self.start_time >= self.end_time {
            return Err("Slot must end after it starts".to_string());
        }
        if self.max_bookings < 1 {
            return Err("Max bookings must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(current: i64, max: i64, available: bool) -> TimeSlot {
        TimeSlot {
            id: "s1".to_string(),
            date_availability_id: "d1".to_string(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            max_bookings: max,
            current_bookings: current,
            is_available: available,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_bookable_requires_capacity_and_flag() {
        assert!(slot(0, 1, true).is_bookable());
        assert!(slot(1, 2, true).is_bookable());
        assert!(!slot(1, 1, true).is_bookable());
        assert!(!slot(0, 1, false).is_bookable());
    }

    #[test]
    fn test_remaining_never_negative() {
        assert_eq!(slot(3, 2, true).remaining(), 0);
        assert_eq!(slot(1, 4, true).remaining(), 3);
    }

    #[test]
    fn test_patch_rejects_inverted_times() {
        let mut s = slot(0, 1, true);
        let err = s.apply(SlotPatch {
            end_time: NaiveTime::from_hms_opt(9, 0, 0),
            ..Default::default()
        });
        assert!(err.is_err());
    }
}
