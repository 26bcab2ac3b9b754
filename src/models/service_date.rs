use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::clock;

/// Marks a service as bookable on one configured date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDateAvailability {
    pub id: String,
    pub service_id: String,
    pub date_availability_id: String,
    pub is_available: bool,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSetting {
    pub service_id: String,
    pub is_available: bool,
}
