//! Appointment Flow
//!
//! A linear booking conversation (visit or test drive) that collects the
//! customer's details, checks the calendar and records confirmed bookings.
//! Drafts live behind [`DraftStore`] so the in-memory map can be swapped out.

pub mod draft;
pub mod flow;

pub use draft::{AppointmentKind, Draft, DraftStore, MemoryDraftStore, Step};
pub use flow::{parse_datetime_br, wants_appointment, AppointmentFlow};
