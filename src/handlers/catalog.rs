use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::check_auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ChangeAction, ChangeTable, NewService, Service, ServicePatch};
use crate::services::changes;
use crate::state::AppState;

// GET /api/services
pub async fn list_active(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Service>>, AppError> {
    let conn = state.db()?;
    Ok(Json(queries::list_services(&conn, false)?))
}

// GET /api/admin/services
#[derive(Deserialize)]
pub struct ServicesQuery {
    pub include_inactive: Option<bool>,
    pub q: Option<String>,
}

pub async fn list_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<Vec<Service>>, AppError> {
    check_auth(&state, &headers)?;

    let services = {
        let conn = state.db()?;
        queries::list_services(&conn, query.include_inactive.unwrap_or(true))?
    };
    let q = query.q.unwrap_or_default();
    Ok(Json(services.into_iter().filter(|s| s.matches(&q)).collect()))
}

// POST /api/admin/services
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewService>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_auth(&state, &headers)?;
    body.validate().map_err(AppError::Validation)?;

    let (service, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let service = queries::insert_service(&tx, &body)?;
        let event = changes::log(&tx, ChangeTable::Services, ChangeAction::Insert, &service.id)?;
        tx.commit()?;
        (service, event)
    };
    changes::publish(&state, vec![event]);
    tracing::info!(id = %service.id, name = %service.name, "service created");

    Ok((StatusCode::CREATED, Json(service)))
}

// PATCH /api/admin/services/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ServicePatch>,
) -> Result<Json<Service>, AppError> {
    check_auth(&state, &headers)?;

    let (service, event) = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        let mut service =
            queries::get_service(&tx, &id)?.ok_or_else(|| AppError::not_found("service"))?;
        service.apply(patch).map_err(AppError::Validation)?;
        queries::update_service(&tx, &service)?;
        let event = changes::log(&tx, ChangeTable::Services, ChangeAction::Update, &id)?;
        let service = queries::get_service(&tx, &id)?.ok_or_else(|| AppError::not_found("service"))?;
        tx.commit()?;
        (service, event)
    };
    changes::publish(&state, vec![event]);

    Ok(Json(service))
}

// DELETE /api/admin/services/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&state, &headers)?;

    let event = {
        let mut conn = state.db()?;
        let tx = conn.transaction()?;
        if queries::count_bookings_for_service(&tx, &id)? > 0 {
            return Err(AppError::Conflict(
                "This service has bookings. Deactivate it instead of deleting.".to_string(),
            ));
        }
        if !queries::delete_service(&tx, &id)? {
            return Err(AppError::not_found("service"));
        }
        let event = changes::log(&tx, ChangeTable::Services, ChangeAction::Delete, &id)?;
        tx.commit()?;
        event
    };
    changes::publish(&state, vec![event]);
    tracing::info!(id = %id, "service deleted");

    Ok(StatusCode::NO_CONTENT)
}
