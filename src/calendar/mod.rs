//! Calendar Gateway
//!
//! Availability checks and event creation on top of a [`CalendarBackend`].
//! All public methods speak local naive time in the dealership's timezone;
//! the backend deals in zoned instants.

pub mod google;
pub mod hours;

pub use google::GoogleCalendar;
pub use hours::{BusinessHours, BusyInterval};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;

use hours::{floor_to_hour, slot_end, slot_is_free};

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar not configured: {0}")]
    NotConfigured(String),

    #[error("Calendar authentication failed: {0}")]
    Auth(String),

    #[error("Calendar request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Calendar API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid calendar response: {0}")]
    Decode(String),

    #[error("{0} does not exist in the calendar timezone")]
    InvalidLocalTime(NaiveDateTime),
}

/// A busy span as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusySpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Event body handed to the backend
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Busy spans intersecting `[from, to)`
    async fn query_busy(&self, from: DateTime<Tz>, to: DateTime<Tz>) -> Result<Vec<BusySpan>, CalendarError>;

    /// Insert an event, returning its id
    async fn insert_event(&self, event: &NewEvent) -> Result<String, CalendarError>;
}

/// Backend used when no calendar credentials are configured
pub struct DisabledCalendar;

#[async_trait]
impl CalendarBackend for DisabledCalendar {
    async fn query_busy(&self, _from: DateTime<Tz>, _to: DateTime<Tz>) -> Result<Vec<BusySpan>, CalendarError> {
        Err(CalendarError::NotConfigured("no calendar credentials".into()))
    }

    async fn insert_event(&self, _event: &NewEvent) -> Result<String, CalendarError> {
        Err(CalendarError::NotConfigured("no calendar credentials".into()))
    }
}

/// Who is coming, for what, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    /// "visita" or "test drive"
    pub kind: String,
    pub name: String,
    pub model: String,
    pub city: String,
    pub phone: String,
    pub start: NaiveDateTime,
}

impl Booking {
    pub fn summary(&self) -> String {
        format!("[{}] {} – {}", self.kind.to_uppercase(), self.name, self.model)
    }

    pub fn description(&self) -> String {
        format!(
            "Cliente: {}\nTelefone: {}\nTipo: {}\nCarro: {}\nCidade: {}\n",
            self.name, self.phone, self.kind, self.model, self.city
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: String,
    /// Slot start after flooring to the hour
    pub start: NaiveDateTime,
}

pub struct CalendarGateway {
    backend: Arc<dyn CalendarBackend>,
    tz: Tz,
    hours: BusinessHours,
}

impl CalendarGateway {
    pub fn new(backend: Arc<dyn CalendarBackend>, tz: Tz) -> Self {
        Self {
            backend,
            tz,
            hours: BusinessHours::default(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn business_hours(&self) -> BusinessHours {
        self.hours
    }

    fn zoned(&self, local: NaiveDateTime) -> Result<DateTime<Tz>, CalendarError> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .ok_or(CalendarError::InvalidLocalTime(local))
    }

    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.tz).naive_local()
    }

    async fn busy_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<BusyInterval>, CalendarError> {
        let spans = self
            .backend
            .query_busy(self.zoned(from)?, self.zoned(to)?)
            .await?;
        Ok(spans
            .into_iter()
            .map(|s| BusyInterval::new(self.to_local(s.start), self.to_local(s.end)))
            .collect())
    }

    /// Busy intervals within the business hours of `date`
    pub async fn free_busy(&self, date: NaiveDate) -> Result<Vec<BusyInterval>, CalendarError> {
        let (open, close) = self.hours.window(date);
        self.busy_between(open, close).await
    }

    /// Whether the hour containing `start` can be booked
    pub async fn is_slot_available(&self, start: NaiveDateTime) -> Result<bool, CalendarError> {
        let start = floor_to_hour(start);
        if !self.hours.contains_slot(start) {
            return Ok(false);
        }
        let busy = self.busy_between(start, slot_end(start)).await?;
        Ok(slot_is_free(start, &busy))
    }

    /// Open hourly slots of `date`
    pub async fn free_slots(&self, date: NaiveDate) -> Result<Vec<NaiveDateTime>, CalendarError> {
        let busy = self.free_busy(date).await?;
        Ok(hours::free_slots(&self.hours, date, &busy))
    }

    pub async fn create_event(&self, booking: &Booking) -> Result<CreatedEvent, CalendarError> {
        let start = floor_to_hour(booking.start);
        let event = NewEvent {
            summary: booking.summary(),
            description: booking.description(),
            start: self.zoned(start)?,
            end: self.zoned(slot_end(start))?,
        };
        let event_id = self.backend.insert_event(&event).await?;
        tracing::info!("Created calendar event {} at {}", event_id, start);
        Ok(CreatedEvent { event_id, start })
    }
}

/// `HH:MM` labels
pub fn slot_labels(slots: &[NaiveDateTime]) -> Vec<String> {
    slots.iter().map(|s| s.format("%H:%M").to_string()).collect()
}
