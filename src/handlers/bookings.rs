use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::check_auth;
use super::{parse_day, today};
use crate::db::queries::{self, BookingFilter, DashboardStats};
use crate::errors::AppError;
use crate::models::{BookingDetails, BookingStatus, NewBooking};
use crate::services::booking;
use crate::services::calendar;
use crate::services::notify::{self, BookingEventKind};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    details: BookingDetails,
    google_calendar_url: String,
}

impl From<BookingDetails> for BookingView {
    fn from(details: BookingDetails) -> Self {
        Self {
            google_calendar_url: calendar::google_calendar_url(&details),
            details,
        }
    }
}

// POST /api/bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let details = booking::create_booking(&state, body, today())?;
    notify::dispatch(state.clone(), BookingEventKind::Created, details.clone());
    Ok((StatusCode::CREATED, Json(details.into())))
}

// GET /api/bookings/:reference
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let details = {
        let conn = state.db()?;
        let booking = queries::get_booking_by_reference(&conn, &reference)?
            .ok_or_else(|| AppError::not_found("booking"))?;
        queries::get_booking_details(&conn, &booking.id)?
            .ok_or_else(|| AppError::not_found("booking"))?
    };
    Ok(Json(details.into()))
}

// POST /api/bookings/:reference/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let details = booking::cancel_by_reference(&state, &reference)?;
    notify::dispatch(state.clone(), BookingEventKind::Cancelled, details.clone());
    Ok(Json(details.into()))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub service_id: Option<String>,
    pub date: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    check_auth(&state, &headers)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Unknown status '{raw}'")))?,
        ),
        None => None,
    };
    let filter = BookingFilter {
        status,
        service_id: query.service_id.filter(|s| !s.is_empty()),
        date: query.date.as_deref().map(parse_day).transpose()?,
        limit: query.limit.map(|l| l.clamp(1, 1000)),
    };

    let bookings = {
        let conn = state.db()?;
        queries::list_booking_details(&conn, &filter)?
    };
    let q = query.q.unwrap_or_default();
    Ok(Json(bookings.into_iter().filter(|b| b.matches(&q)).collect()))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    check_auth(&state, &headers)?;

    let previous = {
        let conn = state.db()?;
        queries::get_booking(&conn, &id)?.map(|b| b.status)
    };
    let details = booking::set_status(&state, &id, body.status)?;
    if body.status == BookingStatus::Cancelled && previous != Some(BookingStatus::Cancelled) {
        notify::dispatch(state.clone(), BookingEventKind::Cancelled, details.clone());
    }
    Ok(Json(details))
}

// DELETE /api/admin/bookings/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&state, &headers)?;
    booking::delete_booking(&state, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    check_auth(&state, &headers)?;
    let conn = state.db()?;
    Ok(Json(queries::get_dashboard_stats(&conn, &today())?))
}
