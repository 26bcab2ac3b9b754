use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveTime;
use rusqlite::Connection;
use serde::Deserialize;

use super::auth::check_auth;
use super::{parse_opt_time_field, parse_time_field};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ChangeAction, ChangeEvent, ChangeTable, DateAvailability, SlotPatch, SlotSpec, TimeSlot};
use crate::services::changes;
use crate::services::scheduling;
use crate::state::AppState;

const DEFAULT_OPEN: (u32, u32) = (9, 0);
const DEFAULT_CLOSE: (u32, u32) = (17, 0);

fn load_date(conn: &Connection, id: &str) -> Result<DateAvailability, AppError> {
    queries::get_date(conn, id)?.ok_or_else(|| AppError::not_found("date"))
}

fn hours_or(t: Option<NaiveTime>, (h, m): (u32, u32)) -> NaiveTime {
    t.or_else(|| NaiveTime::from_hms_opt(h, m, 0)).unwrap_or_default()
}

fn insert_and_log(
    conn: &Connection,
    date_id: &str,
    specs: &[SlotSpec],
) -> Result<(Vec<TimeSlot>, Vec<ChangeEvent>), AppError> {
    let slots = queries::insert_slots(conn, date_id, specs)?;
    let mut events = Vec::with_capacity(slots.len());
    for slot in &slots {
        events.push(changes::log(conn, ChangeTable::TimeSlots, ChangeAction::Insert, &slot.id)?);
    }
    Ok((slots, events))
}

// GET /api/admin/dates/:id/slots
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date_id): Path<String>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    check_auth(&state, &headers)?;

    let conn = state.db()?;
    load_date(&conn, &date_id)?;
    Ok(Json(queries::list_slots(&conn, &date_id)?))
}

// POST /api/admin/dates/:id/slots
#[derive(Deserialize)]
pub struct CreateSlotRequest {
    pub start_time: String,
    pub end_time: String,
    pub max_bookings: Option<i64>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date_id): Path<String>,
    Json(body): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<TimeSlot>), AppError> {
    check_auth(&state, &headers)?;

    let spec = SlotSpec {
        start_time: parse_time_field("start time", &body.start_time)?,
        end_time: parse_time_field("end time", &body.end_time)?,
        max_bookings: body.max_bookings.unwrap_or(1),
    };
    if spec.start_time >= spec.end_time {
        return Err(AppError::validation("Slot must end after it starts"));
    }
    if spec.max_bookings < 1 {
        return Err(AppError::validation("Max bookings must be at least 1"));
    }

    let (slot, events) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let date = load_date(&tx, &date_id)?;
        if !date.within_hours(&spec.start_time, &spec.end_time) {
            return Err(AppError::validation("Slot must fall within the date's working hours"));
        }
        let (mut slots, events) = insert_and_log(&tx, &date_id, &[spec])?;
        tx.commit()?;
        let slot = slots
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("slot insert returned nothing")))?;
        (slot, events)
    };
    changes::publish(&state, events);

    Ok((StatusCode::CREATED, Json(slot)))
}

// POST /api/admin/dates/:id/slots/generate
#[derive(Deserialize)]
pub struct GenerateRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub interval_minutes: u32,
    pub max_bookings_per_slot: Option<i64>,
}

/// Appends evenly spaced slots. Missing bounds fall back to the date's working
/// hours, then to 09:00-17:00.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date_id): Path<String>,
    Json(body): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Vec<TimeSlot>>), AppError> {
    check_auth(&state, &headers)?;
    let start = parse_opt_time_field("start time", body.start_time.as_deref())?;
    let end = parse_opt_time_field("end time", body.end_time.as_deref())?;

    let (slots, events) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let date = load_date(&tx, &date_id)?;

        let start = hours_or(start.or(date.start_time), DEFAULT_OPEN);
        let end = hours_or(end.or(date.end_time), DEFAULT_CLOSE);
        let specs = scheduling::generate_nonempty_slots(
            start,
            end,
            body.interval_minutes,
            body.max_bookings_per_slot.unwrap_or(1),
        )?;

        let (slots, events) = insert_and_log(&tx, &date_id, &specs)?;
        tx.commit()?;
        (slots, events)
    };
    changes::publish(&state, events);
    tracing::info!(date_id = %date_id, count = slots.len(), "slots generated");

    Ok((StatusCode::CREATED, Json(slots)))
}

// PATCH /api/admin/slots/:id
#[derive(Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_bookings: Option<i64>,
    pub is_available: Option<bool>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateSlotRequest>,
) -> Result<Json<TimeSlot>, AppError> {
    check_auth(&state, &headers)?;
    let patch = SlotPatch {
        start_time: parse_opt_time_field("start time", body.start_time.as_deref())?,
        end_time: parse_opt_time_field("end time", body.end_time.as_deref())?,
        max_bookings: body.max_bookings,
        is_available: body.is_available,
    };

    let (slot, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let mut slot = queries::get_slot(&tx, &id)?.ok_or_else(|| AppError::not_found("slot"))?;
        slot.apply(patch).map_err(AppError::Validation)?;
        queries::update_slot(&tx, &slot)?;
        let event = changes::log(&tx, ChangeTable::TimeSlots, ChangeAction::Update, &id)?;
        tx.commit()?;
        (slot, event)
    };
    changes::publish(&state, vec![event]);

    Ok(Json(slot))
}

// DELETE /api/admin/slots/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&state, &headers)?;

    let event = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        if queries::count_bookings_for_slot(&tx, &id)? > 0 {
            return Err(AppError::Conflict(
                "This slot has bookings. Mark it unavailable instead.".to_string(),
            ));
        }
        if !queries::delete_slot(&tx, &id)? {
            return Err(AppError::not_found("slot"));
        }
        let event = changes::log(&tx, ChangeTable::TimeSlots, ChangeAction::Delete, &id)?;
        tx.commit()?;
        event
    };
    changes::publish(&state, vec![event]);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_fallback() {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(hours_or(Some(noon), DEFAULT_OPEN), noon);
        assert_eq!(
            hours_or(None, DEFAULT_CLOSE),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap()
        );
    }
}
