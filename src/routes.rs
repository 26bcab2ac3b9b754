use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

fn cors(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(value)) => layer.allow_origin(value),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::catalog::list_active))
        .route("/api/availability", get(handlers::dates::availability))
        .route("/api/dates/:date", get(handlers::dates::day))
        .route("/api/bookings", post(handlers::bookings::create))
        .route("/api/bookings/:reference", get(handlers::bookings::lookup))
        .route(
            "/api/bookings/:reference/cancel",
            post(handlers::bookings::cancel),
        )
        .route(
            "/api/bookings/:reference/calendar.ics",
            get(handlers::calendar::download_ics),
        )
        .route("/api/events", get(handlers::events::stream));

    let admin = Router::new()
        .route("/api/admin/login", post(handlers::auth::login))
        .route("/api/admin/me", get(handlers::auth::me))
        .route("/api/admin/stats", get(handlers::bookings::stats))
        .route("/api/admin/dates", get(handlers::dates::list_admin))
        // PUT takes a calendar day, DELETE a date id
        .route(
            "/api/admin/dates/:key",
            put(handlers::dates::upsert).delete(handlers::dates::delete),
        )
        .route("/api/admin/dates/:key/open", post(handlers::dates::set_open))
        .route(
            "/api/admin/dates/:key/override",
            post(handlers::dates::set_override),
        )
        .route(
            "/api/admin/dates/:key/slots",
            get(handlers::slots::list).post(handlers::slots::create),
        )
        .route(
            "/api/admin/dates/:key/slots/generate",
            post(handlers::slots::generate),
        )
        .route(
            "/api/admin/dates/:key/services",
            get(handlers::dates::list_service_links).put(handlers::dates::replace_service_links),
        )
        .route(
            "/api/admin/dates/:key/services/:service_id",
            put(handlers::dates::set_service_link),
        )
        .route(
            "/api/admin/slots/:id",
            patch(handlers::slots::update).delete(handlers::slots::delete),
        )
        .route(
            "/api/admin/services",
            get(handlers::catalog::list_all).post(handlers::catalog::create),
        )
        .route(
            "/api/admin/services/:id",
            patch(handlers::catalog::update).delete(handlers::catalog::delete),
        )
        .route("/api/admin/bookings", get(handlers::bookings::list))
        .route(
            "/api/admin/bookings/:id",
            delete(handlers::bookings::delete),
        )
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::bookings::set_status),
        );

    public
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors(state.config.cors_origin.as_deref()))
        .with_state(state)
}
