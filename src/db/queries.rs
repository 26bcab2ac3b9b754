use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::clock::{self, DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};
use crate::models::{
    AdminRole, AdminUser, Booking, BookingDetails, BookingStatus, ChangeAction, ChangeEvent,
    ChangeTable, DateAvailability, DateSettings, NewService, Service, ServiceDateAvailability,
    ServiceSetting, SlotSpec, TimeSlot,
};

const SERVICE_COLS: &str =
    "id, name, description, duration_minutes, price, category, active, created_at, updated_at";
const DATE_COLS: &str = "id, date, is_open, start_time, end_time, max_bookings_per_day, is_override, override_reason, created_at, updated_at";
const SLOT_COLS: &str = "id, date_availability_id, start_time, end_time, max_bookings, current_bookings, is_available, created_at";
const BOOKING_COLS: &str = "id, time_slot_id, service_id, customer_name, customer_email, customer_phone, notes, status, reference_number, created_at, updated_at";

const DATE_WIDTH: usize = 10;
const SLOT_WIDTH: usize = 8;
const BOOKING_WIDTH: usize = 11;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn now_str() -> String {
    clock::format_timestamp(&now())
}

/// `alias.col` for every column in a comma-separated list.
fn qualified(alias: &str, cols: &str) -> String {
    cols.split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_day(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn get_time(row: &Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn get_opt_time(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveTime::parse_from_str(&s, TIME_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ── Row parsing ──

fn parse_service_row(row: &Row, o: usize) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(o)?,
        name: row.get(o + 1)?,
        description: row.get(o + 2)?,
        duration_minutes: row.get(o + 3)?,
        price: row.get(o + 4)?,
        category: row.get(o + 5)?,
        active: row.get(o + 6)?,
        created_at: get_timestamp(row, o + 7)?,
        updated_at: get_timestamp(row, o + 8)?,
    })
}

fn parse_date_row(row: &Row, o: usize) -> rusqlite::Result<DateAvailability> {
    Ok(DateAvailability {
        id: row.get(o)?,
        date: get_day(row, o + 1)?,
        is_open: row.get(o + 2)?,
        start_time: get_opt_time(row, o + 3)?,
        end_time: get_opt_time(row, o + 4)?,
        max_bookings_per_day: row.get(o + 5)?,
        is_override: row.get(o + 6)?,
        override_reason: row.get(o + 7)?,
        created_at: get_timestamp(row, o + 8)?,
        updated_at: get_timestamp(row, o + 9)?,
    })
}

fn parse_slot_row(row: &Row, o: usize) -> rusqlite::Result<TimeSlot> {
    Ok(TimeSlot {
        id: row.get(o)?,
        date_availability_id: row.get(o + 1)?,
        start_time: get_time(row, o + 2)?,
        end_time: get_time(row, o + 3)?,
        max_bookings: row.get(o + 4)?,
        current_bookings: row.get(o + 5)?,
        is_available: row.get(o + 6)?,
        created_at: get_timestamp(row, o + 7)?,
    })
}

fn parse_booking_row(row: &Row, o: usize) -> rusqlite::Result<Booking> {
    let status_str: String = row.get(o + 7)?;
    let status = BookingStatus::parse(&status_str).ok_or_else(|| {
        conversion_error(
            o + 7,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown booking status: {status_str}"),
            ),
        )
    })?;

    Ok(Booking {
        id: row.get(o)?,
        time_slot_id: row.get(o + 1)?,
        service_id: row.get(o + 2)?,
        customer_name: row.get(o + 3)?,
        customer_email: row.get(o + 4)?,
        customer_phone: row.get(o + 5)?,
        notes: row.get(o + 6)?,
        status,
        reference_number: row.get(o + 8)?,
        created_at: get_timestamp(row, o + 9)?,
        updated_at: get_timestamp(row, o + 10)?,
    })
}

// ── Services ──

pub fn list_services(conn: &Connection, include_inactive: bool) -> anyhow::Result<Vec<Service>> {
    let sql = if include_inactive {
        format!("SELECT {SERVICE_COLS} FROM services ORDER BY name ASC")
    } else {
        format!("SELECT {SERVICE_COLS} FROM services WHERE active = 1 ORDER BY name ASC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| parse_service_row(row, 0))?;
    collect(rows)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLS} FROM services WHERE id = ?1"),
            params![id],
            |row| parse_service_row(row, 0),
        )
        .optional()?;
    Ok(service)
}

pub fn insert_service(conn: &Connection, input: &NewService) -> anyhow::Result<Service> {
    let ts = now();
    let service = Service {
        id: new_id(),
        name: input.name.trim().to_string(),
        description: input.description.clone().and_then(crate::models::service::empty_to_none),
        duration_minutes: input.duration_minutes,
        price: input.price,
        category: input.category.clone().and_then(crate::models::service::empty_to_none),
        active: input.active,
        created_at: ts,
        updated_at: ts,
    };

    conn.execute(
        &format!("INSERT INTO services ({SERVICE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            service.id,
            service.name,
            service.description,
            service.duration_minutes,
            service.price,
            service.category,
            service.active,
            clock::format_timestamp(&service.created_at),
            clock::format_timestamp(&service.updated_at),
        ],
    )?;
    Ok(service)
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET name = ?1, description = ?2, duration_minutes = ?3, price = ?4,
                category = ?5, active = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            service.name.trim(),
            service.description,
            service.duration_minutes,
            service.price,
            service.category,
            service.active,
            now_str(),
            service.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_service(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Date Availability ──

pub fn list_dates(
    conn: &Connection,
    from: &NaiveDate,
    to: &NaiveDate,
    open_only: bool,
) -> anyhow::Result<Vec<DateAvailability>> {
    let filter = if open_only {
        "AND is_open = 1 AND is_override = 0"
    } else {
        ""
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATE_COLS} FROM date_availability
         WHERE date >= ?1 AND date <= ?2 {filter}
         ORDER BY date ASC"
    ))?;
    let rows = stmt.query_map(
        params![from.format(DATE_FORMAT).to_string(), to.format(DATE_FORMAT).to_string()],
        |row| parse_date_row(row, 0),
    )?;
    collect(rows)
}

pub fn get_date(conn: &Connection, id: &str) -> anyhow::Result<Option<DateAvailability>> {
    let date = conn
        .query_row(
            &format!("SELECT {DATE_COLS} FROM date_availability WHERE id = ?1"),
            params![id],
            |row| parse_date_row(row, 0),
        )
        .optional()?;
    Ok(date)
}

pub fn get_date_by_day(conn: &Connection, day: &NaiveDate) -> anyhow::Result<Option<DateAvailability>> {
    let date = conn
        .query_row(
            &format!("SELECT {DATE_COLS} FROM date_availability WHERE date = ?1"),
            params![day.format(DATE_FORMAT).to_string()],
            |row| parse_date_row(row, 0),
        )
        .optional()?;
    Ok(date)
}

/// Creates the date or updates its schedule. An active override keeps the
/// date closed whatever `settings.is_open` says.
pub fn upsert_date(
    conn: &Connection,
    day: &NaiveDate,
    settings: &DateSettings,
) -> anyhow::Result<(DateAvailability, bool)> {
    let start = settings.start_time.as_ref().map(clock::format_time);
    let end = settings.end_time.as_ref().map(clock::format_time);

    if let Some(existing) = get_date_by_day(conn, day)? {
        let is_open = settings.is_open && !existing.is_override;
        conn.execute(
            "UPDATE date_availability
             SET is_open = ?1, start_time = ?2, end_time = ?3, max_bookings_per_day = ?4, updated_at = ?5
             WHERE id = ?6",
            params![is_open, start, end, settings.max_bookings_per_day, now_str(), existing.id],
        )?;
        let updated = get_date(conn, &existing.id)?
            .ok_or_else(|| anyhow::anyhow!("date {} vanished during update", existing.id))?;
        return Ok((updated, false));
    }

    let id = new_id();
    let ts = now_str();
    conn.execute(
        &format!(
            "INSERT INTO date_availability ({DATE_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?7)"
        ),
        params![
            id,
            day.format(DATE_FORMAT).to_string(),
            settings.is_open,
            start,
            end,
            settings.max_bookings_per_day,
            ts,
        ],
    )?;
    let created =
        get_date(conn, &id)?.ok_or_else(|| anyhow::anyhow!("date {id} missing after insert"))?;
    Ok((created, true))
}

pub fn set_date_open(conn: &Connection, id: &str, is_open: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE date_availability SET is_open = ?1, updated_at = ?2 WHERE id = ?3",
        params![is_open, now_str(), id],
    )?;
    Ok(count > 0)
}

/// Setting an override also closes the date; clearing it leaves `is_open` alone.
pub fn set_date_override(
    conn: &Connection,
    id: &str,
    is_override: bool,
    reason: Option<&str>,
) -> anyhow::Result<bool> {
    let count = if is_override {
        conn.execute(
            "UPDATE date_availability
             SET is_override = 1, override_reason = ?1, is_open = 0, updated_at = ?2
             WHERE id = ?3",
            params![reason, now_str(), id],
        )?
    } else {
        conn.execute(
            "UPDATE date_availability
             SET is_override = 0, override_reason = ?1, updated_at = ?2
             WHERE id = ?3",
            params![reason, now_str(), id],
        )?
    };
    Ok(count > 0)
}

pub fn delete_date(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM date_availability WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Time Slots ──

pub fn list_slots(conn: &Connection, date_id: &str) -> anyhow::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLS} FROM time_slots WHERE date_availability_id = ?1 ORDER BY start_time ASC"
    ))?;
    let rows = stmt.query_map(params![date_id], |row| parse_slot_row(row, 0))?;
    collect(rows)
}

pub fn get_slot(conn: &Connection, id: &str) -> anyhow::Result<Option<TimeSlot>> {
    let slot = conn
        .query_row(
            &format!("SELECT {SLOT_COLS} FROM time_slots WHERE id = ?1"),
            params![id],
            |row| parse_slot_row(row, 0),
        )
        .optional()?;
    Ok(slot)
}

pub fn insert_slots(
    conn: &Connection,
    date_id: &str,
    specs: &[SlotSpec],
) -> anyhow::Result<Vec<TimeSlot>> {
    let ts = now();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO time_slots ({SLOT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6)"
    ))?;

    let mut created = Vec::with_capacity(specs.len());
    for spec in specs {
        let slot = TimeSlot {
            id: new_id(),
            date_availability_id: date_id.to_string(),
            start_time: spec.start_time,
            end_time: spec.end_time,
            max_bookings: spec.max_bookings,
            current_bookings: 0,
            is_available: true,
            created_at: ts,
        };
        stmt.execute(params![
            slot.id,
            slot.date_availability_id,
            clock::format_time(&slot.start_time),
            clock::format_time(&slot.end_time),
            slot.max_bookings,
            clock::format_timestamp(&slot.created_at),
        ])?;
        created.push(slot);
    }
    Ok(created)
}

pub fn update_slot(conn: &Connection, slot: &TimeSlot) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET start_time = ?1, end_time = ?2, max_bookings = ?3, is_available = ?4
         WHERE id = ?5",
        params![
            clock::format_time(&slot.start_time),
            clock::format_time(&slot.end_time),
            slot.max_bookings,
            slot.is_available,
            slot.id,
        ],
    )?;
    Ok(count > 0)
}

/// Moves the booking counter by `delta`, never below zero.
pub fn adjust_slot_bookings(conn: &Connection, id: &str, delta: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET current_bookings = MAX(current_bookings + ?1, 0) WHERE id = ?2",
        params![delta, id],
    )?;
    Ok(count > 0)
}

pub fn delete_slot(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM time_slots WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Service Date Availability ──

pub fn list_service_links(
    conn: &Connection,
    date_id: &str,
) -> anyhow::Result<Vec<ServiceDateAvailability>> {
    let mut stmt = conn.prepare(
        "SELECT id, service_id, date_availability_id, is_available, created_at
         FROM service_date_availability WHERE date_availability_id = ?1",
    )?;
    let rows = stmt.query_map(params![date_id], |row| {
        Ok(ServiceDateAvailability {
            id: row.get(0)?,
            service_id: row.get(1)?,
            date_availability_id: row.get(2)?,
            is_available: row.get(3)?,
            created_at: get_timestamp(row, 4)?,
        })
    })?;
    collect(rows)
}

pub fn set_service_link(
    conn: &Connection,
    service_id: &str,
    date_id: &str,
    is_available: bool,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO service_date_availability (id, service_id, date_availability_id, is_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(service_id, date_availability_id) DO UPDATE SET is_available = excluded.is_available",
        params![new_id(), service_id, date_id, is_available, now_str()],
    )?;
    Ok(())
}

/// Replaces every link for the date with the enabled entries of `settings`.
/// Run inside a transaction.
pub fn replace_service_links(
    conn: &Connection,
    date_id: &str,
    settings: &[ServiceSetting],
) -> anyhow::Result<usize> {
    conn.execute(
        "DELETE FROM service_date_availability WHERE date_availability_id = ?1",
        params![date_id],
    )?;

    let mut inserted = 0;
    for setting in settings.iter().filter(|s| s.is_available) {
        set_service_link(conn, &setting.service_id, date_id, true)?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Active services with an enabled link to the date, by name.
pub fn list_services_for_date(conn: &Connection, date_id: &str) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM services s
         INNER JOIN service_date_availability l ON l.service_id = s.id
         WHERE l.date_availability_id = ?1 AND l.is_available = 1 AND s.active = 1
         ORDER BY s.name ASC",
        qualified("s", SERVICE_COLS)
    ))?;
    let rows = stmt.query_map(params![date_id], |row| parse_service_row(row, 0))?;
    collect(rows)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            booking.id,
            booking.time_slot_id,
            booking.service_id,
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.notes,
            booking.status.as_str(),
            booking.reference_number,
            clock::format_timestamp(&booking.created_at),
            clock::format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| parse_booking_row(row, 0),
        )
        .optional()?;
    Ok(booking)
}

pub fn get_booking_by_reference(conn: &Connection, reference: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLS} FROM bookings WHERE reference_number = ?1"),
            params![reference.trim().to_uppercase()],
            |row| parse_booking_row(row, 0),
        )
        .optional()?;
    Ok(booking)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn count_bookings_for_slot(conn: &Connection, slot_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE time_slot_id = ?1",
        params![slot_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_bookings_for_service(conn: &Connection, service_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE service_id = ?1",
        params![service_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Bookings of any status attached to the date's slots.
pub fn count_bookings_for_date(conn: &Connection, date_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN time_slots t ON t.id = b.time_slot_id
         WHERE t.date_availability_id = ?1",
        params![date_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Bookings on the date that still hold a seat.
pub fn count_active_bookings_for_date(conn: &Connection, date_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN time_slots t ON t.id = b.time_slot_id
         WHERE t.date_availability_id = ?1 AND b.status != 'cancelled'",
        params![date_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub service_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

fn details_select() -> String {
    format!(
        "SELECT {}, {}, {}, {}
         FROM bookings b
         INNER JOIN time_slots t ON t.id = b.time_slot_id
         INNER JOIN date_availability d ON d.id = t.date_availability_id
         INNER JOIN services s ON s.id = b.service_id",
        qualified("b", BOOKING_COLS),
        qualified("t", SLOT_COLS),
        qualified("d", DATE_COLS),
        qualified("s", SERVICE_COLS),
    )
}

fn parse_details_row(row: &Row) -> rusqlite::Result<BookingDetails> {
    let slot_at = BOOKING_WIDTH;
    let date_at = slot_at + SLOT_WIDTH;
    let service_at = date_at + DATE_WIDTH;

    Ok(BookingDetails {
        booking: parse_booking_row(row, 0)?,
        time_slot: parse_slot_row(row, slot_at)?,
        date_availability: parse_date_row(row, date_at)?,
        service: parse_service_row(row, service_at)?,
    })
}

pub fn list_booking_details(
    conn: &Connection,
    filter: &BookingFilter,
) -> anyhow::Result<Vec<BookingDetails>> {
    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(status) = &filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("b.status = ?{}", values.len()));
    }
    if let Some(service_id) = &filter.service_id {
        values.push(Box::new(service_id.clone()));
        clauses.push(format!("b.service_id = ?{}", values.len()));
    }
    if let Some(date) = &filter.date {
        values.push(Box::new(date.format(DATE_FORMAT).to_string()));
        clauses.push(format!("d.date = ?{}", values.len()));
    }

    let mut sql = details_select();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY b.created_at DESC, b.id DESC");
    values.push(Box::new(filter.limit.unwrap_or(200)));
    sql.push_str(&format!(" LIMIT ?{}", values.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), parse_details_row)?;
    collect(rows)
}

pub fn get_booking_details(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetails>> {
    let details = conn
        .query_row(
            &format!("{} WHERE b.id = ?1", details_select()),
            params![id],
            parse_details_row,
        )
        .optional()?;
    Ok(details)
}

// ── Dashboard ──

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DashboardStats {
    pub total_bookings: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub completed: i64,
    pub no_show: i64,
    pub upcoming_confirmed: i64,
    pub today_bookings: i64,
    pub open_dates_next_30_days: i64,
    pub active_services: i64,
}

pub fn get_dashboard_stats(conn: &Connection, today: &NaiveDate) -> anyhow::Result<DashboardStats> {
    let mut stats = DashboardStats::default();

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (status, count) = row?;
        stats.total_bookings += count;
        match BookingStatus::parse(&status) {
            Some(BookingStatus::Confirmed) => stats.confirmed = count,
            Some(BookingStatus::Cancelled) => stats.cancelled = count,
            Some(BookingStatus::Completed) => stats.completed = count,
            Some(BookingStatus::NoShow) => stats.no_show = count,
            None => tracing::warn!(status = %status, "unknown booking status in store"),
        }
    }

    let today_str = today.format(DATE_FORMAT).to_string();
    let horizon = (*today + chrono::Duration::days(30)).format(DATE_FORMAT).to_string();

    stats.upcoming_confirmed = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN time_slots t ON t.id = b.time_slot_id
         INNER JOIN date_availability d ON d.id = t.date_availability_id
         WHERE d.date >= ?1 AND b.status = 'confirmed'",
        params![today_str],
        |row| row.get(0),
    )?;

    stats.today_bookings = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN time_slots t ON t.id = b.time_slot_id
         INNER JOIN date_availability d ON d.id = t.date_availability_id
         WHERE d.date = ?1 AND b.status != 'cancelled'",
        params![today_str],
        |row| row.get(0),
    )?;

    stats.open_dates_next_30_days = conn.query_row(
        "SELECT COUNT(*) FROM date_availability
         WHERE date >= ?1 AND date <= ?2 AND is_open = 1 AND is_override = 0",
        params![today_str, horizon],
        |row| row.get(0),
    )?;

    stats.active_services =
        conn.query_row("SELECT COUNT(*) FROM services WHERE active = 1", [], |row| row.get(0))?;

    Ok(stats)
}

// ── Admin Users ──

fn parse_admin_row(row: &Row) -> rusqlite::Result<AdminUser> {
    let role: String = row.get(3)?;
    Ok(AdminUser {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: AdminRole::parse(&role),
        created_at: get_timestamp(row, 4)?,
    })
}

pub fn get_admin(conn: &Connection, id: &str) -> anyhow::Result<Option<AdminUser>> {
    let admin = conn
        .query_row(
            "SELECT id, email, password_hash, role, created_at FROM admin_users WHERE id = ?1",
            params![id],
            parse_admin_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn get_admin_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<AdminUser>> {
    let admin = conn
        .query_row(
            "SELECT id, email, password_hash, role, created_at FROM admin_users WHERE email = ?1",
            params![email.trim().to_lowercase()],
            parse_admin_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn insert_admin(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    role: AdminRole,
) -> anyhow::Result<AdminUser> {
    let admin = AdminUser {
        id: new_id(),
        email: email.trim().to_lowercase(),
        password_hash: password_hash.to_string(),
        role,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO admin_users (id, email, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            admin.id,
            admin.email,
            admin.password_hash,
            admin.role.as_str(),
            clock::format_timestamp(&admin.created_at),
        ],
    )?;
    Ok(admin)
}

// ── Change Log ──

pub fn insert_change(
    conn: &Connection,
    table: ChangeTable,
    action: ChangeAction,
    record_id: &str,
) -> anyhow::Result<ChangeEvent> {
    let created_at = now_str();
    conn.execute(
        "INSERT INTO change_log (table_name, action, record_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![table.as_str(), action.as_str(), record_id, created_at],
    )?;
    Ok(ChangeEvent {
        id: conn.last_insert_rowid(),
        table,
        action,
        record_id: record_id.to_string(),
        created_at,
    })
}

pub fn get_changes_since(conn: &Connection, since_id: i64) -> anyhow::Result<Vec<ChangeEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, table_name, action, record_id, created_at
         FROM change_log WHERE id > ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![since_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut events = vec![];
    for row in rows {
        let (id, table, action, record_id, created_at) = row?;
        match (ChangeTable::parse(&table), ChangeAction::parse(&action)) {
            (Some(table), Some(action)) => events.push(ChangeEvent {
                id,
                table,
                action,
                record_id,
                created_at,
            }),
            _ => tracing::warn!(id, table = %table, action = %action, "skipping unknown change row"),
        }
    }
    Ok(events)
}

/// Drops change rows written before `cutoff`. Ids are AUTOINCREMENT, so later
/// rows never reuse a pruned id.
pub fn prune_changes_before(conn: &Connection, cutoff: &NaiveDateTime) -> anyhow::Result<usize> {
    let removed = conn.execute(
        "DELETE FROM change_log WHERE created_at < ?1",
        params![clock::format_timestamp(cutoff)],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        clock::parse_date(s).unwrap()
    }

    fn open_settings() -> DateSettings {
        DateSettings {
            is_open: true,
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: NaiveTime::from_hms_opt(17, 0, 0),
            max_bookings_per_day: Some(5),
        }
    }

    fn wash() -> NewService {
        NewService {
            name: "Wash".to_string(),
            description: Some("".to_string()),
            duration_minutes: 30,
            price: 25.0,
            category: Some("Exterior".to_string()),
            active: true,
        }
    }

    #[test]
    fn test_upsert_date_creates_then_updates() {
        let conn = setup_db();
        let (created, was_new) = upsert_date(&conn, &day("2025-12-20"), &open_settings()).unwrap();
        assert!(was_new);
        assert!(created.is_open);
        assert_eq!(created.max_bookings_per_day, Some(5));

        let mut closed = open_settings();
        closed.is_open = false;
        let (updated, was_new) = upsert_date(&conn, &day("2025-12-20"), &closed).unwrap();
        assert!(!was_new);
        assert_eq!(updated.id, created.id);
        assert!(!updated.is_open);
    }

    #[test]
    fn test_override_closes_and_survives_upsert() {
        let conn = setup_db();
        let (date, _) = upsert_date(&conn, &day("2025-12-21"), &open_settings()).unwrap();
        assert!(set_date_override(&conn, &date.id, true, Some("Storm")).unwrap());

        let stored = get_date(&conn, &date.id).unwrap().unwrap();
        assert!(stored.is_override);
        assert!(!stored.is_open);
        assert_eq!(stored.override_reason.as_deref(), Some("Storm"));

        // Re-saving the schedule as open must not reopen an overridden date.
        let (resaved, _) = upsert_date(&conn, &day("2025-12-21"), &open_settings()).unwrap();
        assert!(!resaved.is_effectively_open());
        assert!(!resaved.is_open);

        set_date_override(&conn, &date.id, false, None).unwrap();
        let cleared = get_date(&conn, &date.id).unwrap().unwrap();
        assert!(!cleared.is_override);
        assert!(!cleared.is_open);
    }

    #[test]
    fn test_list_dates_open_only() {
        let conn = setup_db();
        upsert_date(&conn, &day("2025-12-01"), &open_settings()).unwrap();
        let mut closed = open_settings();
        closed.is_open = false;
        upsert_date(&conn, &day("2025-12-02"), &closed).unwrap();
        let (overridden, _) = upsert_date(&conn, &day("2025-12-03"), &open_settings()).unwrap();
        set_date_override(&conn, &overridden.id, true, None).unwrap();

        let all = list_dates(&conn, &day("2025-12-01"), &day("2025-12-31"), false).unwrap();
        assert_eq!(all.len(), 3);
        let open = list_dates(&conn, &day("2025-12-01"), &day("2025-12-31"), true).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].date, day("2025-12-01"));
    }

    #[test]
    fn test_services_for_date_respects_links_and_active() {
        let conn = setup_db();
        let (date, _) = upsert_date(&conn, &day("2025-12-20"), &open_settings()).unwrap();
        let wash = insert_service(&conn, &wash()).unwrap();
        assert_eq!(wash.description, None);
        let mut polish_input = self::wash();
        polish_input.name = "Polish".to_string();
        let polish = insert_service(&conn, &polish_input).unwrap();

        set_service_link(&conn, &wash.id, &date.id, true).unwrap();
        set_service_link(&conn, &polish.id, &date.id, true).unwrap();
        let names: Vec<_> = list_services_for_date(&conn, &date.id)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Polish", "Wash"]);

        let mut inactive = polish.clone();
        inactive.active = false;
        update_service(&conn, &inactive).unwrap();
        set_service_link(&conn, &wash.id, &date.id, false).unwrap();
        assert!(list_services_for_date(&conn, &date.id).unwrap().is_empty());
    }

    #[test]
    fn test_replace_service_links_only_keeps_enabled() {
        let conn = setup_db();
        let (date, _) = upsert_date(&conn, &day("2025-12-20"), &open_settings()).unwrap();
        let wash = insert_service(&conn, &wash()).unwrap();
        let mut other = self::wash();
        other.name = "Interior".to_string();
        let interior = insert_service(&conn, &other).unwrap();

        set_service_link(&conn, &interior.id, &date.id, true).unwrap();
        let inserted = replace_service_links(
            &conn,
            &date.id,
            &[
                ServiceSetting { service_id: wash.id.clone(), is_available: true },
                ServiceSetting { service_id: interior.id.clone(), is_available: false },
            ],
        )
        .unwrap();
        assert_eq!(inserted, 1);

        let links = list_service_links(&conn, &date.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].service_id, wash.id);
    }

    #[test]
    fn test_adjust_slot_bookings_floors_at_zero() {
        let conn = setup_db();
        let (date, _) = upsert_date(&conn, &day("2025-12-20"), &open_settings()).unwrap();
        let slots = insert_slots(
            &conn,
            &date.id,
            &[SlotSpec {
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                max_bookings: 2,
            }],
        )
        .unwrap();
        let id = &slots[0].id;

        adjust_slot_bookings(&conn, id, 1).unwrap();
        adjust_slot_bookings(&conn, id, -1).unwrap();
        adjust_slot_bookings(&conn, id, -1).unwrap();
        assert_eq!(get_slot(&conn, id).unwrap().unwrap().current_bookings, 0);
    }

    #[test]
    fn test_delete_date_cascades_to_slots() {
        let conn = setup_db();
        let (date, _) = upsert_date(&conn, &day("2025-12-20"), &open_settings()).unwrap();
        insert_slots(
            &conn,
            &date.id,
            &[SlotSpec {
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                max_bookings: 1,
            }],
        )
        .unwrap();

        assert!(delete_date(&conn, &date.id).unwrap());
        assert!(list_slots(&conn, &date.id).unwrap().is_empty());
    }

    #[test]
    fn test_change_log_since() {
        let conn = setup_db();
        let first = insert_change(&conn, ChangeTable::Services, ChangeAction::Insert, "a").unwrap();
        insert_change(&conn, ChangeTable::Bookings, ChangeAction::Update, "b").unwrap();

        let all = get_changes_since(&conn, 0).unwrap();
        assert_eq!(all.len(), 2);
        let later = get_changes_since(&conn, first.id).unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].table, ChangeTable::Bookings);
        assert_eq!(later[0].record_id, "b");
    }

    #[test]
    fn test_prune_changes_keeps_recent_rows_and_ids() {
        let conn = setup_db();
        let old = insert_change(&conn, ChangeTable::Services, ChangeAction::Insert, "a").unwrap();
        conn.execute(
            "UPDATE change_log SET created_at = '2020-01-01 00:00:00' WHERE id = ?1",
            params![old.id],
        )
        .unwrap();
        let recent = insert_change(&conn, ChangeTable::Bookings, ChangeAction::Insert, "b").unwrap();

        let cutoff = now() - chrono::Duration::days(30);
        assert_eq!(prune_changes_before(&conn, &cutoff).unwrap(), 1);

        let left = get_changes_since(&conn, 0).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, recent.id);

        conn.execute("DELETE FROM change_log", []).unwrap();
        let next = insert_change(&conn, ChangeTable::Bookings, ChangeAction::Update, "b").unwrap();
        assert!(next.id > recent.id);
    }

    #[test]
    fn test_admin_email_is_case_insensitive() {
        let conn = setup_db();
        insert_admin(&conn, "Owner@Example.com", "hash", AdminRole::Superadmin).unwrap();
        let found = get_admin_by_email(&conn, "owner@EXAMPLE.com").unwrap().unwrap();
        assert_eq!(found.email, "owner@example.com");
        assert_eq!(found.role, AdminRole::Superadmin);
    }
}
