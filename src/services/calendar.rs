use chrono::NaiveDateTime;
use reqwest::Url;

use crate::models::BookingDetails;

fn starts_at(details: &BookingDetails) -> NaiveDateTime {
    details.date_availability.date.and_time(details.time_slot.start_time)
}

fn ends_at(details: &BookingDetails) -> NaiveDateTime {
    details.date_availability.date.and_time(details.time_slot.end_time)
}

/// Commas, semicolons and backslashes must be escaped in iCalendar text values.
/// Any line break (CRLF, CR or LF) becomes a literal `\n`.
fn escape_text(s: &str) -> String {
    s.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

pub fn generate_ics(details: &BookingDetails, business_name: &str) -> String {
    let booking = &details.booking;
    let dtstart = starts_at(details).format("%Y%m%dT%H%M%S").to_string();
    let dtend = ends_at(details).format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@slotbook", booking.id);

    let summary = escape_text(&format!("{} with {}", details.service.name, business_name));
    let mut description = format!("Booking Reference: {}", booking.reference_number);
    if let Some(notes) = booking.notes.as_deref() {
        description.push_str(&format!("\nNotes: {notes}"));
    }
    let description = escape_text(&description);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Slotbook//Booking Widget//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

/// Google Calendar "add event" link for the booking.
pub fn google_calendar_url(details: &BookingDetails) -> String {
    let dates = format!(
        "{}/{}",
        starts_at(details).format("%Y%m%dT%H%M%S"),
        ends_at(details).format("%Y%m%dT%H%M%S")
    );
    let reference = format!("Booking Reference: {}", details.booking.reference_number);

    match Url::parse_with_params(
        "https://calendar.google.com/calendar/render",
        &[
            ("action", "TEMPLATE"),
            ("text", details.service.name.as_str()),
            ("dates", dates.as_str()),
            ("details", reference.as_str()),
        ],
    ) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build calendar link");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, BookingStatus, DateAvailability, Service, TimeSlot};
    use chrono::{NaiveDate, NaiveTime};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn details(notes: Option<&str>) -> BookingDetails {
        let created = ts("2025-12-01 10:00:00");
        BookingDetails {
            booking: Booking {
                id: "test-123".to_string(),
                time_slot_id: "slot-1".to_string(),
                service_id: "svc-1".to_string(),
                customer_name: "Alice".to_string(),
                customer_email: "alice@example.com".to_string(),
                customer_phone: None,
                notes: notes.map(str::to_string),
                status: BookingStatus::Confirmed,
                reference_number: "BK-1A2B3C4D".to_string(),
                created_at: created,
                updated_at: created,
            },
            time_slot: TimeSlot {
                id: "slot-1".to_string(),
                date_availability_id: "date-1".to_string(),
                start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
                max_bookings: 1,
                current_bookings: 1,
                is_available: true,
                created_at: created,
            },
            date_availability: DateAvailability {
                id: "date-1".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
                is_open: true,
                start_time: None,
                end_time: None,
                max_bookings_per_day: None,
                is_override: false,
                override_reason: None,
                created_at: created,
                updated_at: created,
            },
            service: Service {
                id: "svc-1".to_string(),
                name: "Ceramic Coating".to_string(),
                description: None,
                duration_minutes: 90,
                price: 300.0,
                category: None,
                active: true,
                created_at: created,
                updated_at: created,
            },
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&details(Some("Blue sedan")), "Shine, Inc");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("DTSTART:20251220T140000"));
        assert!(ics.contains("DTEND:20251220T153000"));
        assert!(ics.contains("SUMMARY:Ceramic Coating with Shine\\, Inc"));
        assert!(ics.contains("DESCRIPTION:Booking Reference: BK-1A2B3C4D\\nNotes: Blue sedan"));
        assert!(ics.contains("UID:test-123@slotbook"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_generate_ics_no_notes() {
        let ics = generate_ics(&details(None), "Test Biz");
        assert!(ics.contains("DESCRIPTION:Booking Reference: BK-1A2B3C4D\r\n"));
    }

    #[test]
    fn test_generate_ics_folds_carriage_returns() {
        let ics = generate_ics(&details(Some("Gate code\r\n1234\rRing twice")), "Test Biz");
        assert!(ics.contains("\\nNotes: Gate code\\n1234\\nRing twice\r\n"));
        let description = ics
            .split("\r\n")
            .find(|line| line.starts_with("DESCRIPTION:"))
            .unwrap();
        assert!(!description.contains('\r'));
    }

    #[test]
    fn test_google_calendar_url() {
        let url = google_calendar_url(&details(None));
        assert!(url.starts_with("https://calendar.google.com/calendar/render?action=TEMPLATE"));
        assert!(url.contains("text=Ceramic+Coating"));
        assert!(url.contains("dates=20251220T140000%2F20251220T153000"));
        assert!(url.contains("BK-1A2B3C4D"));
    }
}
