use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::auth::check_auth;
use super::{parse_day, parse_opt_time_field, today};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    ChangeAction, ChangeTable, DateAvailability, DateSettings, DateStatus,
    ServiceDateAvailability, ServiceSetting,
};
use crate::services::changes;
use crate::services::scheduling::{self, DayAvailability};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// First of the current month through the end of the month after next.
fn default_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).unwrap_or(today);
    let last = first
        .checked_add_months(Months::new(3))
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Bounds that keep the stored `YYYY-MM-DD` strings comparable.
fn all_dates() -> (NaiveDate, NaiveDate) {
    let earliest = NaiveDate::default();
    let latest = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(earliest);
    (earliest, latest)
}

fn resolve_range(
    query: &RangeQuery,
    default: (NaiveDate, NaiveDate),
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let from = query.from.as_deref().map(parse_day).transpose()?.unwrap_or(default.0);
    let to = query.to.as_deref().map(parse_day).transpose()?.unwrap_or(default.1);
    if from > to {
        return Err(AppError::validation("'from' must not be after 'to'"));
    }
    Ok((from, to))
}

fn load_date(conn: &rusqlite::Connection, id: &str) -> Result<DateAvailability, AppError> {
    queries::get_date(conn, id)?.ok_or_else(|| AppError::not_found("date"))
}

// GET /api/availability
#[derive(Serialize)]
pub struct AvailableDate {
    #[serde(flatten)]
    date: DateAvailability,
    bookable: bool,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<AvailableDate>>, AppError> {
    let today = today();
    let (from, to) = resolve_range(&query, default_window(today))?;

    let dates = {
        let conn = state.db()?;
        queries::list_dates(&conn, &from, &to, true)?
    };

    Ok(Json(
        dates
            .into_iter()
            .map(|date| AvailableDate {
                bookable: date.date >= today,
                date,
            })
            .collect(),
    ))
}

// GET /api/dates/:date
pub async fn day(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<DayAvailability>, AppError> {
    let day = parse_day(&raw)?;

    let conn = state.db()?;
    let Some(date) = queries::get_date_by_day(&conn, &day)? else {
        return Ok(Json(DayAvailability::unavailable()));
    };
    if !date.is_effectively_open() {
        return Ok(Json(DayAvailability::unavailable()));
    }

    let slots = queries::list_slots(&conn, &date.id)?;
    let services = queries::list_services_for_date(&conn, &date.id)?;
    let active = queries::count_active_bookings_for_date(&conn, &date.id)?;
    Ok(Json(scheduling::resolve_day(date, slots, services, active)))
}

// GET /api/admin/dates
#[derive(Serialize)]
pub struct AdminDate {
    #[serde(flatten)]
    date: DateAvailability,
    status: DateStatus,
    slot_count: usize,
    active_bookings: i64,
}

pub async fn list_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<AdminDate>>, AppError> {
    check_auth(&state, &headers)?;
    let (from, to) = resolve_range(&query, all_dates())?;

    let conn = state.db()?;
    let mut out = vec![];
    for date in queries::list_dates(&conn, &from, &to, false)? {
        let slot_count = queries::list_slots(&conn, &date.id)?.len();
        let active_bookings = queries::count_active_bookings_for_date(&conn, &date.id)?;
        out.push(AdminDate {
            status: date.status(),
            slot_count,
            active_bookings,
            date,
        });
    }
    Ok(Json(out))
}

// PUT /api/admin/dates/:date
#[derive(Deserialize)]
pub struct DateSettingsRequest {
    pub is_open: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_bookings_per_day: Option<i64>,
}

pub async fn upsert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw): Path<String>,
    Json(body): Json<DateSettingsRequest>,
) -> Result<(StatusCode, Json<DateAvailability>), AppError> {
    check_auth(&state, &headers)?;
    let day = parse_day(&raw)?;

    let settings = DateSettings {
        is_open: body.is_open,
        start_time: parse_opt_time_field("start time", body.start_time.as_deref())?,
        end_time: parse_opt_time_field("end time", body.end_time.as_deref())?,
        max_bookings_per_day: body.max_bookings_per_day,
    };
    settings.validate().map_err(AppError::Validation)?;

    let (date, created, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let (date, created) = queries::upsert_date(&tx, &day, &settings)?;
        let action = if created {
            ChangeAction::Insert
        } else {
            ChangeAction::Update
        };
        let event = changes::log(&tx, ChangeTable::DateAvailability, action, &date.id)?;
        tx.commit()?;
        (date, created, event)
    };
    changes::publish(&state, vec![event]);
    tracing::info!(date = %date.date, is_open = date.is_open, created, "date saved");

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(date)))
}

// DELETE /api/admin/dates/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&state, &headers)?;

    let event = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        if queries::count_bookings_for_date(&tx, &id)? > 0 {
            return Err(AppError::Conflict(
                "This date has bookings. Close it or set an override instead.".to_string(),
            ));
        }
        if !queries::delete_date(&tx, &id)? {
            return Err(AppError::not_found("date"));
        }
        let event = changes::log(&tx, ChangeTable::DateAvailability, ChangeAction::Delete, &id)?;
        tx.commit()?;
        event
    };
    changes::publish(&state, vec![event]);
    tracing::info!(id = %id, "date deleted");

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/admin/dates/:id/open
#[derive(Deserialize)]
pub struct OpenRequest {
    pub is_open: bool,
}

pub async fn set_open(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<OpenRequest>,
) -> Result<Json<DateAvailability>, AppError> {
    check_auth(&state, &headers)?;

    let (date, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let current = load_date(&tx, &id)?;
        if body.is_open && current.is_override {
            return Err(AppError::Conflict(
                "Clear the override before reopening this date.".to_string(),
            ));
        }
        queries::set_date_open(&tx, &id, body.is_open)?;
        let event = changes::log(&tx, ChangeTable::DateAvailability, ChangeAction::Update, &id)?;
        let date = load_date(&tx, &id)?;
        tx.commit()?;
        (date, event)
    };
    changes::publish(&state, vec![event]);

    Ok(Json(date))
}

// POST /api/admin/dates/:id/override
#[derive(Deserialize)]
pub struct OverrideRequest {
    pub is_override: bool,
    pub reason: Option<String>,
}

pub async fn set_override(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<DateAvailability>, AppError> {
    check_auth(&state, &headers)?;
    let reason = body
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty() && body.is_override);

    let (date, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        if !queries::set_date_override(&tx, &id, body.is_override, reason)? {
            return Err(AppError::not_found("date"));
        }
        let event = changes::log(&tx, ChangeTable::DateAvailability, ChangeAction::Update, &id)?;
        let date = load_date(&tx, &id)?;
        tx.commit()?;
        (date, event)
    };
    changes::publish(&state, vec![event]);
    tracing::info!(date = %date.date, is_override = date.is_override, "date override changed");

    Ok(Json(date))
}

// GET /api/admin/dates/:id/services
pub async fn list_service_links(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ServiceDateAvailability>>, AppError> {
    check_auth(&state, &headers)?;

    let conn = state.db()?;
    load_date(&conn, &id)?;
    Ok(Json(queries::list_service_links(&conn, &id)?))
}

// PUT /api/admin/dates/:id/services
#[derive(Deserialize)]
pub struct BulkLinksRequest {
    pub services: Vec<ServiceSetting>,
}

pub async fn replace_service_links(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BulkLinksRequest>,
) -> Result<Json<Vec<ServiceDateAvailability>>, AppError> {
    check_auth(&state, &headers)?;

    let (links, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        load_date(&tx, &id)?;
        for setting in body.services.iter().filter(|s| s.is_available) {
            if queries::get_service(&tx, &setting.service_id)?.is_none() {
                return Err(AppError::not_found(format!("service {}", setting.service_id)));
            }
        }
        let enabled = queries::replace_service_links(&tx, &id, &body.services)?;
        let event = changes::log(
            &tx,
            ChangeTable::ServiceDateAvailability,
            ChangeAction::Update,
            &id,
        )?;
        let links = queries::list_service_links(&tx, &id)?;
        tx.commit()?;
        tracing::info!(date_id = %id, enabled, "date services replaced");
        (links, event)
    };
    changes::publish(&state, vec![event]);

    Ok(Json(links))
}

// PUT /api/admin/dates/:id/services/:service_id
#[derive(Deserialize)]
pub struct LinkRequest {
    pub is_available: bool,
}

pub async fn set_service_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, service_id)): Path<(String, String)>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<Vec<ServiceDateAvailability>>, AppError> {
    check_auth(&state, &headers)?;

    let (links, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        load_date(&tx, &id)?;
        if queries::get_service(&tx, &service_id)?.is_none() {
            return Err(AppError::not_found("service"));
        }
        queries::set_service_link(&tx, &service_id, &id, body.is_available)?;
        let event = changes::log(
            &tx,
            ChangeTable::ServiceDateAvailability,
            ChangeAction::Update,
            &id,
        )?;
        let links = queries::list_service_links(&tx, &id)?;
        tx.commit()?;
        (links, event)
    };
    changes::publish(&state, vec![event]);

    Ok(Json(links))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_default_window_spans_three_months() {
        assert_eq!(default_window(d(2025, 11, 17)), (d(2025, 11, 1), d(2026, 1, 31)));
        assert_eq!(default_window(d(2025, 12, 31)), (d(2025, 12, 1), d(2026, 2, 28)));
    }

    #[test]
    fn test_resolve_range_rejects_inverted() {
        let query = RangeQuery {
            from: Some("2025-12-10".to_string()),
            to: Some("2025-12-01".to_string()),
        };
        assert!(resolve_range(&query, (d(2025, 1, 1), d(2025, 1, 2))).is_err());
    }
}
