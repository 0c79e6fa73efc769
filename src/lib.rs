//! Showroom Bot
//!
//! WhatsApp customer-service bot for a car dealership.
//!
//! # Features
//!
//! - **Catalog answers**: price, link, conditions and listings straight from the offers file
//! - **Test-drive booking**: a short guided conversation backed by Google Calendar
//! - **AI fallback**: OpenAI-compatible chat completions with per-phone history
//! - **Flat-file records**: leads and appointments as CSV, sessions as a JSON snapshot
//! - **Reminders**: day-before WhatsApp messages through Twilio
//!
//! # Architecture
//!
//! ```text
//! Twilio ──► /webhook ──► Bot ──┬── AppointmentFlow ──► CalendarGateway ──► Google Calendar
//!   ▲          (TwiML)          ├── OfferCatalog (moka-cached JSON)
//!   │                           └── Assistant ──► ChatModel ──► OpenAI
//!   │                                   │
//!   └── reminders ◄── appointments.csv  └── sessions.json, leads.csv
//! ```

pub mod appointment;
pub mod assistant;
pub mod bot;
pub mod calendar;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod phone;
pub mod reminders;
pub mod server;
pub mod storage;

pub use appointment::{AppointmentFlow, DraftStore, MemoryDraftStore};
pub use assistant::Assistant;
pub use bot::{Bot, PhoneLocks, OPT_OUT_REPLY};
pub use calendar::{CalendarBackend, CalendarError, CalendarGateway};
pub use catalog::{Offer, OfferCatalog};
pub use channels::{ChannelError, MessageSender};
pub use config::Config;
pub use conversation::{ConversationMessage, ConversationStore};
pub use llm::{ChatModel, LlmError, OpenAiClient};
pub use phone::normalize_phone;
pub use server::{build_router, AppState};
pub use storage::{CsvLog, FileLock, SnapshotFile, StorageError};
