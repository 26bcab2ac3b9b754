use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::clock;
use crate::models::service::empty_to_none;
use crate::models::{
    Booking, BookingDetails, BookingStatus, ChangeAction, ChangeEvent, ChangeTable, NewBooking,
};
use crate::services::changes;
use crate::services::scheduling::{self, SchedulingError};
use crate::state::AppState;

const REFERENCE_ATTEMPTS: usize = 5;

/// `BK-` plus eight upper-case hex digits.
pub fn generate_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("BK-{}", hex[..8].to_uppercase())
}

fn unique_reference(conn: &Connection) -> Result<String, AppError> {
    for _ in 0..REFERENCE_ATTEMPTS {
        let candidate = generate_reference();
        if queries::get_booking_by_reference(conn, &candidate)?.is_none() {
            return Ok(candidate);
        }
        tracing::debug!(reference = %candidate, "reference collision, retrying");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a unique booking reference"
    )))
}

fn load_details(conn: &Connection, id: &str) -> Result<BookingDetails, AppError> {
    queries::get_booking_details(conn, id)?.ok_or_else(|| AppError::not_found("booking"))
}

/// A booking leaving `cancelled` only needs its slot to have room again.
/// Date-level rules are for new customer bookings, not admin bookkeeping.
fn ensure_seat(conn: &Connection, slot_id: &str) -> Result<(), AppError> {
    let slot = queries::get_slot(conn, slot_id)?
        .ok_or_else(|| AppError::from(SchedulingError::SlotUnavailable))?;
    if slot.is_full() {
        return Err(SchedulingError::SlotFull.into());
    }
    Ok(())
}

/// Validates the wizard choices and books one seat. The checks, the insert
/// and the counter bump share one transaction, so two requests racing for
/// the last seat cannot both succeed.
pub fn create_booking(
    state: &AppState,
    input: NewBooking,
    today: NaiveDate,
) -> Result<BookingDetails, AppError> {
    input.validate_details().map_err(AppError::Validation)?;
    let day = clock::parse_date(input.date.trim())
        .map_err(|_| AppError::validation("Invalid date, expected YYYY-MM-DD"))?;

    let (details, events) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;

        let slot = queries::get_slot(&tx, &input.time_slot_id)?
            .ok_or_else(|| AppError::from(SchedulingError::SlotUnavailable))?;
        let date = queries::get_date(&tx, &slot.date_availability_id)?
            .ok_or_else(|| AppError::from(SchedulingError::DateClosed))?;
        if date.date != day {
            return Err(AppError::validation(
                "The selected time slot does not belong to the selected date",
            ));
        }

        let service = queries::get_service(&tx, &input.service_id)?
            .filter(|s| s.active)
            .ok_or_else(|| AppError::validation("The selected service is not available"))?;
        let offered = queries::list_services_for_date(&tx, &date.id)?
            .iter()
            .any(|s| s.id == service.id);
        if !offered {
            return Err(AppError::validation(
                "The selected service is not offered on this date",
            ));
        }

        let active = queries::count_active_bookings_for_date(&tx, &date.id)?;
        scheduling::check_slot_bookable(&date, &slot, active, today)?;

        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: queries::new_id(),
            time_slot_id: slot.id.clone(),
            service_id: service.id.clone(),
            customer_name: input.customer_name.trim().to_string(),
            customer_email: input.customer_email.trim().to_string(),
            customer_phone: input.customer_phone.and_then(empty_to_none),
            notes: input.notes.and_then(empty_to_none),
            status: BookingStatus::Confirmed,
            reference_number: unique_reference(&tx)?,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(&tx, &booking)?;
        queries::adjust_slot_bookings(&tx, &slot.id, 1)?;

        let events = vec![
            changes::log(&tx, ChangeTable::Bookings, ChangeAction::Insert, &booking.id)?,
            changes::log(&tx, ChangeTable::TimeSlots, ChangeAction::Update, &slot.id)?,
        ];
        let details = load_details(&tx, &booking.id)?;
        tx.commit()?;
        (details, events)
    };

    changes::publish(state, events);
    tracing::info!(
        reference = %details.booking.reference_number,
        date = %details.date_availability.date,
        slot = %details.time_slot.id,
        "booking created"
    );
    Ok(details)
}

/// Moves a booking to `status`, keeping the slot counter in step. Leaving
/// `cancelled` needs a free seat again.
fn transition(
    conn: &Connection,
    booking: &Booking,
    status: BookingStatus,
) -> Result<Vec<ChangeEvent>, AppError> {
    let was_holding = booking.status.holds_seat();
    let will_hold = status.holds_seat();

    if !was_holding && will_hold {
        ensure_seat(conn, &booking.time_slot_id)?;
    }

    queries::update_booking_status(conn, &booking.id, &status)?;
    let mut events = vec![changes::log(
        conn,
        ChangeTable::Bookings,
        ChangeAction::Update,
        &booking.id,
    )?];

    let delta = match (was_holding, will_hold) {
        (true, false) => -1,
        (false, true) => 1,
        _ => 0,
    };
    if delta != 0 {
        queries::adjust_slot_bookings(conn, &booking.time_slot_id, delta)?;
        events.push(changes::log(
            conn,
            ChangeTable::TimeSlots,
            ChangeAction::Update,
            &booking.time_slot_id,
        )?);
    }
    Ok(events)
}

/// Customer cancellation by reference code. Only confirmed bookings can be
/// cancelled this way.
pub fn cancel_by_reference(state: &AppState, reference: &str) -> Result<BookingDetails, AppError> {
    let (details, events) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;

        let booking = queries::get_booking_by_reference(&tx, reference)?
            .ok_or_else(|| AppError::not_found("booking"))?;
        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Cancelled => {
                return Err(AppError::Conflict("This booking is already cancelled.".to_string()))
            }
            _ => {
                return Err(AppError::Conflict(
                    "This booking can no longer be cancelled.".to_string(),
                ))
            }
        }

        let events = transition(&tx, &booking, BookingStatus::Cancelled)?;
        let details = load_details(&tx, &booking.id)?;
        tx.commit()?;
        (details, events)
    };

    changes::publish(state, events);
    tracing::info!(reference = %details.booking.reference_number, "booking cancelled by customer");
    Ok(details)
}

/// Admin status change. Setting the current status again is a no-op.
pub fn set_status(
    state: &AppState,
    id: &str,
    status: BookingStatus,
) -> Result<BookingDetails, AppError> {
    let (details, events) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;

        let booking = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::not_found("booking"))?;
        let events = if booking.status == status {
            vec![]
        } else {
            transition(&tx, &booking, status)?
        };
        let details = load_details(&tx, id)?;
        tx.commit()?;
        (details, events)
    };

    changes::publish(state, events);
    tracing::info!(
        reference = %details.booking.reference_number,
        status = status.as_str(),
        "booking status updated"
    );
    Ok(details)
}

pub fn delete_booking(state: &AppState, id: &str) -> Result<(), AppError> {
    let events = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;

        let booking = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::not_found("booking"))?;
        queries::delete_booking(&tx, id)?;
        let mut events = vec![changes::log(&tx, ChangeTable::Bookings, ChangeAction::Delete, id)?];
        if booking.status.holds_seat() {
            queries::adjust_slot_bookings(&tx, &booking.time_slot_id, -1)?;
            events.push(changes::log(
                &tx,
                ChangeTable::TimeSlots,
                ChangeAction::Update,
                &booking.time_slot_id,
            )?);
        }
        tx.commit()?;
        events
    };

    changes::publish(state, events);
    tracing::info!(id, "booking deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{DateSettings, NewService, SlotSpec};
    use crate::services::notify::NoopNotifier;
    use chrono::NaiveTime;

    struct Fixture {
        state: AppState,
        date_id: String,
        slot_id: String,
        service_id: String,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
    }

    fn fixture(slot_capacity: i64, max_per_day: Option<i64>) -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        let (date, _) = queries::upsert_date(
            &conn,
            &NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            &DateSettings {
                is_open: true,
                start_time: None,
                end_time: None,
                max_bookings_per_day: max_per_day,
            },
        )
        .unwrap();
        let slots = queries::insert_slots(
            &conn,
            &date.id,
            &[
                SlotSpec {
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    max_bookings: slot_capacity,
                },
                SlotSpec {
                    start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                    max_bookings: slot_capacity,
                },
            ],
        )
        .unwrap();
        let service = queries::insert_service(
            &conn,
            &NewService {
                name: "Full Detail".to_string(),
                description: None,
                duration_minutes: 60,
                price: 120.0,
                category: None,
                active: true,
            },
        )
        .unwrap();
        queries::set_service_link(&conn, &service.id, &date.id, true).unwrap();

        Fixture {
            state: AppState::new(conn, AppConfig::default(), Box::new(NoopNotifier)),
            date_id: date.id,
            slot_id: slots[0].id.clone(),
            service_id: service.id,
        }
    }

    fn request(f: &Fixture, slot_id: &str) -> NewBooking {
        NewBooking {
            date: "2025-12-20".to_string(),
            service_id: f.service_id.clone(),
            time_slot_id: slot_id.to_string(),
            customer_name: " Dana ".to_string(),
            customer_email: "dana@example.com".to_string(),
            customer_phone: Some("".to_string()),
            notes: None,
        }
    }

    fn slot_count(f: &Fixture, slot_id: &str) -> i64 {
        let conn = f.state.db().unwrap();
        queries::get_slot(&conn, slot_id).unwrap().unwrap().current_bookings
    }

    #[test]
    fn test_reference_format() {
        let r = generate_reference();
        assert_eq!(r.len(), 11);
        assert!(r.starts_with("BK-"));
        assert!(r[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_create_books_a_seat() {
        let f = fixture(2, None);
        let details = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();

        assert_eq!(details.booking.status, BookingStatus::Confirmed);
        assert_eq!(details.booking.customer_name, "Dana");
        assert_eq!(details.booking.customer_phone, None);
        assert_eq!(details.service.id, f.service_id);
        assert_eq!(slot_count(&f, &f.slot_id), 1);
    }

    #[test]
    fn test_full_slot_is_rejected() {
        let f = fixture(1, None);
        create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();
        let err = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(slot_count(&f, &f.slot_id), 1);
    }

    #[test]
    fn test_daily_cap_blocks_other_slots() {
        let f = fixture(3, Some(1));
        create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();

        let other = {
            let conn = f.state.db().unwrap();
            queries::list_slots(&conn, &f.date_id).unwrap()[1].id.clone()
        };
        let err = create_booking(&f.state, request(&f, &other), today()).unwrap_err();
        assert_eq!(err.to_string(), SchedulingError::DailyLimitReached.to_string());
    }

    #[test]
    fn test_slot_must_match_date() {
        let f = fixture(1, None);
        let mut req = request(&f, &f.slot_id);
        req.date = "2025-12-21".to_string();
        let err = create_booking(&f.state, req, today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_service_must_be_offered() {
        let f = fixture(1, None);
        {
            let conn = f.state.db().unwrap();
            queries::set_service_link(&conn, &f.service_id, &f.date_id, false).unwrap();
        }
        let err = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_past_date_is_rejected() {
        let f = fixture(1, None);
        let later = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let err = create_booking(&f.state, request(&f, &f.slot_id), later).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_cancel_frees_seat_and_is_not_repeatable() {
        let f = fixture(1, None);
        let booked = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();
        let reference = booked.booking.reference_number.to_lowercase();

        let cancelled = cancel_by_reference(&f.state, &reference).unwrap();
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        assert_eq!(slot_count(&f, &f.slot_id), 0);

        let err = cancel_by_reference(&f.state, &reference).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_reconfirm_needs_capacity() {
        let f = fixture(1, None);
        let first = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();
        set_status(&f.state, &first.booking.id, BookingStatus::Cancelled).unwrap();
        create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();

        let err = set_status(&f.state, &first.booking.id, BookingStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(slot_count(&f, &f.slot_id), 1);
    }

    #[test]
    fn test_leaving_cancelled_only_checks_slot_capacity() {
        let f = fixture(1, Some(1));
        let booked = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();
        set_status(&f.state, &booked.booking.id, BookingStatus::Cancelled).unwrap();
        {
            let conn = f.state.db().unwrap();
            queries::set_date_override(&conn, &f.date_id, true, Some("Closed")).unwrap();
        }

        let done = set_status(&f.state, &booked.booking.id, BookingStatus::Completed).unwrap();
        assert_eq!(done.booking.status, BookingStatus::Completed);
        assert_eq!(slot_count(&f, &f.slot_id), 1);
    }

    #[test]
    fn test_completed_keeps_seat_and_delete_releases_it() {
        let f = fixture(2, None);
        let booked = create_booking(&f.state, request(&f, &f.slot_id), today()).unwrap();
        set_status(&f.state, &booked.booking.id, BookingStatus::Completed).unwrap();
        assert_eq!(slot_count(&f, &f.slot_id), 1);

        delete_booking(&f.state, &booked.booking.id).unwrap();
        assert_eq!(slot_count(&f, &f.slot_id), 0);
        assert!(matches!(
            delete_booking(&f.state, &booked.booking.id).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
