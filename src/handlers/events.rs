use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::ChangeEvent;
use crate::state::AppState;

const KEEPALIVE: Duration = Duration::from_secs(30);

fn to_event(change: &ChangeEvent) -> Event {
    let data = serde_json::to_string(change).unwrap_or_default();
    Event::default()
        .id(change.id.to_string())
        .event("change")
        .data(data)
}

// GET /api/events (SSE)
#[derive(Deserialize)]
pub struct EventsQuery {
    pub last_id: Option<i64>,
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let last_id = query.last_id.unwrap_or(0);

    // Subscribe before reading the log so nothing slips between the two.
    let rx = state.changes_tx.subscribe();
    let backlog = {
        let conn = state.db()?;
        queries::get_changes_since(&conn, last_id)?
    };
    // Live events already covered by the backlog are skipped.
    let replayed_up_to = backlog.last().map(|c| c.id).unwrap_or(last_id);

    let catchup = tokio_stream::iter(
        backlog
            .iter()
            .map(|c| Ok::<_, Infallible>(to_event(c)))
            .collect::<Vec<_>>(),
    );

    let live = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(change) if change.id > replayed_up_to => Some(Ok(to_event(&change))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "change subscriber lagged");
            None
        }
    });

    let keepalive = IntervalStream::new(tokio::time::interval(KEEPALIVE))
        .map(|_| Ok(Event::default().comment("keepalive")));

    Ok(Sse::new(catchup.chain(live).merge(keepalive)))
}
