//! Opens one date for bookings and fills it with evenly spaced slots.
//!
//! Usage: `seed <YYYY-MM-DD> [start HH:MM] [end HH:MM] [max_per_day] [interval_minutes]`

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db::{self, queries};
use slotbook::models::{clock, ChangeAction, ChangeTable, DateSettings};
use slotbook::services::{changes, scheduling};

fn arg_or<'a>(args: &'a [String], idx: usize, default: &'a str) -> &'a str {
    args.get(idx).map(String::as_str).unwrap_or(default)
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(raw_date) = args.first() else {
        anyhow::bail!(
            "usage: seed <YYYY-MM-DD> [start HH:MM] [end HH:MM] [max_per_day] [interval_minutes]"
        );
    };

    let day = clock::parse_date(raw_date)?;
    let start = clock::parse_time(arg_or(&args, 1, "09:00"))?;
    let end = clock::parse_time(arg_or(&args, 2, "17:00"))?;
    let max_per_day: i64 = arg_or(&args, 3, "5").parse().context("invalid max_per_day")?;
    let interval: u32 = arg_or(&args, 4, "60").parse().context("invalid interval_minutes")?;

    let settings = DateSettings {
        is_open: true,
        start_time: Some(start),
        end_time: Some(end),
        max_bookings_per_day: Some(max_per_day),
    };
    settings.validate().map_err(anyhow::Error::msg)?;

    let config = AppConfig::from_env();
    let mut conn = db::init_db(&config.database_url)?;
    let tx = conn.transaction()?;

    let (date, created) = queries::upsert_date(&tx, &day, &settings)?;
    let action = if created {
        ChangeAction::Insert
    } else {
        ChangeAction::Update
    };
    changes::log(&tx, ChangeTable::DateAvailability, action, &date.id)?;

    // Re-running the seed must not stack duplicate slots.
    let existing = queries::list_slots(&tx, &date.id)?;
    if existing.is_empty() {
        let specs = scheduling::generate_nonempty_slots(start, end, interval, 1)?;
        for slot in queries::insert_slots(&tx, &date.id, &specs)? {
            changes::log(&tx, ChangeTable::TimeSlots, ChangeAction::Insert, &slot.id)?;
        }
        tracing::info!(count = specs.len(), "slots generated");
    } else {
        tracing::info!(count = existing.len(), "date already has slots, leaving them alone");
    }

    for service in queries::list_services(&tx, false)? {
        queries::set_service_link(&tx, &service.id, &date.id, true)?;
    }
    tx.commit()?;

    tracing::info!(date = %date.date, created, "seeded availability");
    Ok(())
}
