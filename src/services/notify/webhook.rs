use anyhow::Context;
use async_trait::async_trait;

use super::{BookingNotification, Notifier};

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &BookingNotification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("failed to deliver booking webhook")?
            .error_for_status()
            .context("booking webhook returned error")?;

        tracing::info!(
            reference = %notification.booking.booking.reference_number,
            event = ?notification.event,
            "booking webhook delivered"
        );
        Ok(())
    }
}
