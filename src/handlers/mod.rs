pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod catalog;
pub mod dates;
pub mod events;
pub mod health;
pub mod slots;

use chrono::{NaiveDate, NaiveTime};

use crate::errors::AppError;
use crate::models::clock;

/// The business calendar runs on the server's local date.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn parse_day(raw: &str) -> Result<NaiveDate, AppError> {
    clock::parse_date(raw.trim())
        .map_err(|_| AppError::validation(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

pub(crate) fn parse_time_field(field: &str, raw: &str) -> Result<NaiveTime, AppError> {
    clock::parse_time(raw.trim())
        .map_err(|_| AppError::validation(format!("Invalid {field}, expected HH:MM")))
}

/// Empty strings count as "not set".
pub(crate) fn parse_opt_time_field(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<NaiveTime>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_time_field(field, s).map(Some),
        None => Ok(None),
    }
}
