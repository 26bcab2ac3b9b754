use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::models::clock;
use crate::models::{DateAvailability, Service, SlotSpec, TimeSlot};

#[derive(Debug, PartialEq)]
pub enum SchedulingError {
    InvalidInterval,
    InvalidCapacity,
    NoSlotsGenerated,
    DateInPast,
    DateClosed,
    DailyLimitReached,
    SlotUnavailable,
    SlotFull,
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::InvalidInterval => {
                write!(f, "Slot interval must be between 1 and {MAX_INTERVAL_MINUTES} minutes")
            }
            SchedulingError::InvalidCapacity => {
                write!(f, "Each slot must allow at least one booking")
            }
            SchedulingError::NoSlotsGenerated => {
                write!(f, "No time slots could be generated with the given parameters")
            }
            SchedulingError::DateInPast => write!(f, "That date has already passed."),
            SchedulingError::DateClosed => {
                write!(f, "This date is not open for bookings. Please pick another date.")
            }
            SchedulingError::DailyLimitReached => {
                write!(f, "This date is fully booked. Please pick another date.")
            }
            SchedulingError::SlotUnavailable => write!(
                f,
                "This time slot is no longer available. Please select another."
            ),
            SchedulingError::SlotFull => {
                write!(f, "This time slot is fully booked. Please select another.")
            }
        }
    }
}

impl std::error::Error for SchedulingError {}

const MAX_INTERVAL_MINUTES: u32 = 24 * 60;

/// Cuts `[start, end)` into back-to-back slots of `interval_minutes`.
/// A tail shorter than one interval is dropped; `start >= end` gives nothing.
pub fn generate_slots(
    start: NaiveTime,
    end: NaiveTime,
    interval_minutes: u32,
    max_bookings: i64,
) -> Result<Vec<SlotSpec>, SchedulingError> {
    if interval_minutes == 0 || interval_minutes > MAX_INTERVAL_MINUTES {
        return Err(SchedulingError::InvalidInterval);
    }
    if max_bookings < 1 {
        return Err(SchedulingError::InvalidCapacity);
    }

    let end_minutes = clock::minutes_of(&end);
    let mut current = clock::minutes_of(&start);
    let mut slots = vec![];

    while let Some(slot_end) = current
        .checked_add(interval_minutes)
        .filter(|&e| e <= end_minutes)
    {
        let (Some(start_time), Some(end_time)) =
            (clock::from_minutes(current), clock::from_minutes(slot_end))
        else {
            break;
        };
        slots.push(SlotSpec {
            start_time,
            end_time,
            max_bookings,
        });
        current = slot_end;
    }

    Ok(slots)
}

/// Like [`generate_slots`] but an empty result is an error, as the admin
/// "generate" action expects at least one slot.
pub fn generate_nonempty_slots(
    start: NaiveTime,
    end: NaiveTime,
    interval_minutes: u32,
    max_bookings: i64,
) -> Result<Vec<SlotSpec>, SchedulingError> {
    let slots = generate_slots(start, end, interval_minutes, max_bookings)?;
    if slots.is_empty() {
        return Err(SchedulingError::NoSlotsGenerated);
    }
    Ok(slots)
}

/// What a customer sees for one calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: Option<DateAvailability>,
    pub time_slots: Vec<TimeSlot>,
    pub services: Vec<Service>,
}

impl DayAvailability {
    pub fn unavailable() -> Self {
        Self {
            date: None,
            time_slots: vec![],
            services: vec![],
        }
    }
}

fn daily_limit_reached(date: &DateAvailability, active_bookings: i64) -> bool {
    date.max_bookings_per_day
        .map(|max| active_bookings >= max)
        .unwrap_or(false)
}

/// Resolves a configured date into its bookable slots and offered services.
///
/// `services` must already be filtered to the date's enabled links; inactive
/// ones are dropped here as well. `active_bookings` counts the date's
/// non-cancelled bookings, for the daily cap.
pub fn resolve_day(
    date: DateAvailability,
    slots: Vec<TimeSlot>,
    services: Vec<Service>,
    active_bookings: i64,
) -> DayAvailability {
    if !date.is_effectively_open() {
        return DayAvailability::unavailable();
    }

    let mut time_slots: Vec<TimeSlot> = if daily_limit_reached(&date, active_bookings) {
        vec![]
    } else {
        slots.into_iter().filter(TimeSlot::is_bookable).collect()
    };
    time_slots.sort_by_key(|s| s.start_time);

    let mut services: Vec<Service> = services.into_iter().filter(|s| s.active).collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));

    DayAvailability {
        date: Some(date),
        time_slots,
        services,
    }
}

/// Checks that one more booking fits, in the order a customer would hit the
/// problems: past date, closed date, daily cap, disabled slot, full slot.
pub fn check_slot_bookable(
    date: &DateAvailability,
    slot: &TimeSlot,
    active_bookings: i64,
    today: NaiveDate,
) -> Result<(), SchedulingError> {
    if date.date < today {
        return Err(SchedulingError::DateInPast);
    }
    if !date.is_effectively_open() {
        return Err(SchedulingError::DateClosed);
    }
    if daily_limit_reached(date, active_bookings) {
        return Err(SchedulingError::DailyLimitReached);
    }
    if !slot.is_available {
        return Err(SchedulingError::SlotUnavailable);
    }
    if slot.is_full() {
        return Err(SchedulingError::SlotFull);
    }
    Ok(())
}
