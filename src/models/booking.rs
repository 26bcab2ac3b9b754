use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::clock;
use super::{DateAvailability, Service, TimeSlot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub time_slot_id: String,
    pub service_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub reference_number: String,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "clock::timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    /// Whether a booking in this state occupies a seat in its slot.
    pub fn holds_seat(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

/// Customer-submitted booking, one field per wizard step.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub date: String,
    pub service_id: String,
    pub time_slot_id: String,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn validate_details(&self) -> Result<(), String> {
        if self.customer_name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        let email = self.customer_email.trim();
        if email.is_empty() {
            return Err("Email is required".to_string());
        }
        if !is_plausible_email(email) {
            return Err("Invalid email address".to_string());
        }
        Ok(())
    }
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// A booking joined with its slot, the slot's date and the service.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub time_slot: TimeSlot,
    pub date_availability: DateAvailability,
    pub service: Service,
}

impl BookingDetails {
    /// Case-insensitive match on customer name, email or reference.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.booking.customer_name.to_lowercase().contains(&q)
            || self.booking.customer_email.to_lowercase().contains(&q)
            || self.booking.reference_number.to_lowercase().contains(&q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str) -> NewBooking {
        NewBooking {
            date: "2025-12-20".to_string(),
            service_id: "svc".to_string(),
            time_slot_id: "slot".to_string(),
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            customer_phone: None,
            notes: None,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(BookingStatus::parse("no_show"), Some(BookingStatus::NoShow));
        assert_eq!(BookingStatus::parse("pending"), None);
        assert_eq!(BookingStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_only_cancelled_frees_seat() {
        assert!(BookingStatus::Confirmed.holds_seat());
        assert!(BookingStatus::Completed.holds_seat());
        assert!(BookingStatus::NoShow.holds_seat());
        assert!(!BookingStatus::Cancelled.holds_seat());
    }

    #[test]
    fn test_details_validation() {
        assert!(request("Jane", "jane@example.com").validate_details().is_ok());
        assert_eq!(
            request(" ", "jane@example.com").validate_details().unwrap_err(),
            "Name is required"
        );
        assert_eq!(
            request("Jane", "").validate_details().unwrap_err(),
            "Email is required"
        );
        assert_eq!(
            request("Jane", "jane@example").validate_details().unwrap_err(),
            "Invalid email address"
        );
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a b@c.de"));
        assert!(!is_plausible_email("@c.de"));
        assert!(!is_plausible_email("a@@c.de"));
        assert!(!is_plausible_email("a@.de"));
    }
}
