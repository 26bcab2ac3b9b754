use serde::{Deserialize, Serialize};

/// One row-level write, pushed to subscribers so they can re-fetch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub id: i64,
    pub table: ChangeTable,
    pub action: ChangeAction,
    pub record_id: String,
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Services,
    DateAvailability,
    TimeSlots,
    ServiceDateAvailability,
    Bookings,
}

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Services => "services",
            ChangeTable::DateAvailability => "date_availability",
            ChangeTable::TimeSlots => "time_slots",
            ChangeTable::ServiceDateAvailability => "service_date_availability",
            ChangeTable::Bookings => "bookings",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "services" => Some(ChangeTable::Services),
            "date_availability" => Some(ChangeTable::DateAvailability),
            "time_slots" => Some(ChangeTable::TimeSlots),
            "service_date_availability" => Some(ChangeTable::ServiceDateAvailability),
            "bookings" => Some(ChangeTable::Bookings),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Insert => "insert",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(ChangeAction::Insert),
            "update" => Some(ChangeAction::Update),
            "delete" => Some(ChangeAction::Delete),
            _ => None,
        }
    }
}
