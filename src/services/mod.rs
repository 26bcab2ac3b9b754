pub mod auth;
pub mod booking;
pub mod calendar;
pub mod changes;
pub mod notify;
pub mod scheduling;
