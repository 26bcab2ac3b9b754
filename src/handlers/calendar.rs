use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /api/bookings/:reference/calendar.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Response, AppError> {
    let details = {
        let conn = state.db()?;
        let booking = queries::get_booking_by_reference(&conn, &reference)?
            .ok_or_else(|| AppError::not_found("booking"))?;
        queries::get_booking_details(&conn, &booking.id)?
            .ok_or_else(|| AppError::not_found("booking"))?
    };

    let ics = generate_ics(&details, &state.config.business_name);
    let filename = format!("booking-{}.ics", details.booking.reference_number);

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
