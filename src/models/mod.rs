pub mod admin;
pub mod booking;
pub mod change;
pub mod clock;
pub mod date_availability;
pub mod service;
pub mod service_date;
pub mod time_slot;

pub use admin::{AdminRole, AdminUser};
pub use booking::{Booking, BookingDetails, BookingStatus, NewBooking};
pub use change::{ChangeAction, ChangeEvent, ChangeTable};
pub use date_availability::{DateAvailability, DateSettings, DateStatus};
pub use service::{NewService, Service, ServicePatch};
pub use service_date::{ServiceDateAvailability, ServiceSetting};
pub use time_slot::{SlotPatch, SlotSpec, TimeSlot};
