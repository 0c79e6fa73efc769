//! Day-before appointment reminders

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channels::MessageSender;
use crate::storage::{AppointmentLogEntry, CsvLog, StorageError};

/// Outcome of one reminder run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Reminder text for one booking
pub fn reminder_text(entry: &AppointmentLogEntry, dealer_name: &str, time: &str) -> String {
    let first_name = entry.name.split_whitespace().next().unwrap_or("cliente");
    let kind = if entry.kind.trim().is_empty() { "visita" } else { entry.kind.as_str() };
    let model = if entry.model.trim().is_empty() { "carro" } else { entry.model.as_str() };
    format!(
        "Olá {}! Só confirmando seu agendamento na {} amanhã às {} para {}: {}.\n\
         Se precisar remarcar, me avise por aqui. Até breve! 🚗✨",
        first_name, dealer_name, time, kind, model
    )
}

/// Message every booking that starts on `target`
pub async fn send_reminders(
    log: &CsvLog,
    sender: &dyn MessageSender,
    dealer_name: &str,
    target: NaiveDate,
) -> Result<ReminderReport, StorageError> {
    let mut report = ReminderReport::default();
    if !log.exists() {
        return Ok(report);
    }

    let entries: Vec<AppointmentLogEntry> = log.read_all()?;
    for entry in &entries {
        let Some(start) = entry.start() else {
            warn!("Skipping appointment {} with unreadable start {:?}", entry.event_id, entry.start_iso);
            report.skipped += 1;
            continue;
        };
        if start.date() != target {
            continue;
        }

        if !sender.is_ready() {
            report.skipped += 1;
            continue;
        }

        let text = reminder_text(entry, dealer_name, &start.format("%H:%M").to_string());
        match sender.send_text(&entry.phone, &text).await {
            Ok(sid) => {
                debug!("Reminder to {} sent via {} ({})", entry.phone, sender.name(), sid);
                report.sent += 1;
            }
            Err(e) => {
                warn!("Reminder to {} not sent via {}: {}", entry.phone, sender.name(), e);
                report.failed += 1;
            }
        }
    }

    if !sender.is_ready() && report.skipped > 0 {
        warn!("Sender {} is not configured, reminders skipped", sender.name());
    }
    info!(
        "Reminders for {}: sent={}, failed={}, skipped={}",
        target, report.sent, report.failed, report.skipped
    );
    Ok(report)
}
