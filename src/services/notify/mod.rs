pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::BookingDetails;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingNotification {
    pub event: BookingEventKind,
    pub business_name: String,
    pub booking: BookingDetails,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &BookingNotification) -> anyhow::Result<()>;
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &BookingNotification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fire-and-forget delivery; a failed notification never fails the booking.
pub fn dispatch(state: Arc<AppState>, event: BookingEventKind, booking: BookingDetails) {
    let notification = BookingNotification {
        event,
        business_name: state.config.business_name.clone(),
        booking,
    };
    tokio::spawn(async move {
        if let Err(e) = state.notifier.notify(&notification).await {
            tracing::warn!(
                error = %e,
                reference = %notification.booking.booking.reference_number,
                "booking notification failed"
            );
        }
    });
}
