//! Booking conversation
//!
//! ```text
//! kind ─► name ─► model ─► city ─► datetime ─► confirm ─► booked
//!   └────────────── "cancelar" at any step ──────────────► cancelled
//! ```

use chrono::{Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::draft::{AppointmentKind, Draft, DraftStore, Step};
use crate::calendar::hours::floor_to_hour;
use crate::calendar::{Booking, CalendarGateway};
use crate::storage::csv_log::TIMESTAMP_FORMAT;
use crate::storage::{AppointmentLogEntry, CsvLog};

const BOOKING_TRIGGERS: &[&str] = &[
    "agendar",
    "agenda",
    "marcar",
    "test drive",
    "testdrive",
    "visita",
    "conhecer o carro",
];
const CANCEL_WORDS: &[&str] = &["cancelar", "cancel", "parar", "sair"];
const CONFIRM_WORDS: &[&str] = &["confirmar", "confirmado", "sim"];
const DECLINE_WORDS: &[&str] = &["não", "nao"];

pub const START_PROMPT: &str = "Perfeito! Vamos agendar.\n\
    Você prefere **visita ao showroom** ou **test drive**?\n\
    Responda: *visita* ou *test drive*.";
pub const CANCELLED_REPLY: &str = "Agendamento cancelado. Se quiser retomar depois, é só dizer *agendar*.";
const KIND_REPROMPT: &str = "Por favor, informe o tipo: *visita* ou *test drive*.";
const NAME_PROMPT: &str = "Seu primeiro nome, por favor?";
const NAME_REPROMPT: &str = "Pode me dizer seu primeiro nome?";
const MODEL_PROMPT: &str = "Qual **modelo** você quer ver/dirigir? (ex.: *Pulse Drive 1.3* ou *Toro Ranch*)";
const MODEL_REPROMPT: &str = "Me diga o **modelo** (ex.: *Pulse Drive 1.3*).";
const CITY_PROMPT: &str = "Sua **cidade**?";
const CITY_REPROMPT: &str = "Qual é sua **cidade**?";
const DATETIME_PROMPT: &str = "Qual **data e hora** prefere?\n\
    Formato: *dd/mm/aaaa hh:mm* (ex.: 21/09/2025 15:30)\n\
    Dica: trabalhamos de 09:00 às 18:00.";
const DATETIME_REPROMPT: &str = "Não reconheci a data/hora. Informe no formato *dd/mm/aaaa hh:mm*.";
const SLOT_TAKEN: &str = "Esse horário não está disponível. \
    Envie outro horário (em blocos de 1h, ex.: 10:00, 11:00, 14:00).";
const CHECK_FAILED: &str = "Tive um problema ao checar disponibilidade agora. Pode me enviar outro horário?";
pub const BOOKED_REPLY: &str = "Agendamento **confirmado** no calendário! ✅\n\
    Obrigado. No dia anterior, te envio uma confirmação por aqui.";
const TAKEN_AT_CONFIRM: &str = "Esse horário acabou de ficar indisponível. \
    Qual outro horário você prefere? Formato: *dd/mm/aaaa hh:mm*.";
const CONFIRM_FAILED: &str = "Não consegui concluir no calendário agora. \
    Responda *confirmar* para tentar de novo ou *cancelar*.";
const DECLINED_REPLY: &str = "Sem problemas, cancelei o agendamento. Posso ajudar em algo mais?";
const CONFIRM_REPROMPT: &str = "Por favor, responda *confirmar* ou *cancelar*.";

static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\s+(\d{1,2}):(\d{1,2})$").expect("valid regex")
});

/// Booking keyword present
pub fn wants_appointment(message: &str) -> bool {
    let s = message.to_lowercase();
    BOOKING_TRIGGERS.iter().any(|t| s.contains(t))
}

/// `dd/mm/aaaa hh:mm` or `dd/mm/aa hh:mm`; `h` may stand in for `:`
pub fn parse_datetime_br(text: &str) -> Option<NaiveDateTime> {
    let normalized = text.trim().to_lowercase().replace('h', ":");
    let caps = DATETIME_RE.captures(&normalized)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year_raw = caps.get(3)?.as_str();
    let year = year_raw.parse::<i32>().ok()?;
    // two-digit years pivot like strptime's %y
    let year = match year_raw.len() {
        2 if year < 69 => 2000 + year,
        2 => 1900 + year,
        _ => year,
    };

    NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)?.and_hms_opt(num(4)?, num(5)?, 0)
}

/// Kind named unambiguously in the opening message
fn kind_hint(message: &str) -> Option<AppointmentKind> {
    let s = message.to_lowercase();
    let test_drive = s.contains("test drive") || s.contains("testdrive");
    let visit = s.contains("visita") || s.contains("showroom");
    match (test_drive, visit) {
        (true, false) => Some(AppointmentKind::TestDrive),
        (false, true) => Some(AppointmentKind::Visit),
        _ => None,
    }
}

fn is_one_of(answer: &str, words: &[&str]) -> bool {
    let s = answer.to_lowercase();
    words.contains(&s.as_str())
}

fn valid_field(answer: &str) -> Option<String> {
    (answer.chars().count() >= 2).then(|| answer.to_string())
}

fn confirmation(draft: &Draft, start: NaiveDateTime) -> String {
    format!(
        "Confirmando:\n- Tipo: *{}*\n- Nome: *{}*\n- Carro: *{}*\n- Cidade: *{}*\n- Data/Hora: *{}*\n\n\
         Está correto? Responda *confirmar* ou *cancelar*.",
        draft.kind.map(|k| k.as_str()).unwrap_or_default(),
        draft.name.as_deref().unwrap_or_default(),
        draft.model.as_deref().unwrap_or_default(),
        draft.city.as_deref().unwrap_or_default(),
        start.format("%d/%m/%Y %H:%M"),
    )
}

pub struct AppointmentFlow {
    drafts: Arc<dyn DraftStore>,
    calendar: Arc<CalendarGateway>,
    log: CsvLog,
}

impl AppointmentFlow {
    pub fn new(drafts: Arc<dyn DraftStore>, calendar: Arc<CalendarGateway>, log: CsvLog) -> Self {
        Self { drafts, calendar, log }
    }

    pub fn calendar(&self) -> &CalendarGateway {
        &self.calendar
    }

    pub fn log(&self) -> &CsvLog {
        &self.log
    }

    pub fn has_draft(&self, phone: &str) -> bool {
        self.drafts.get(phone).is_some()
    }

    pub fn discard(&self, phone: &str) -> bool {
        self.drafts.delete(phone)
    }

    pub fn clear_all(&self) -> usize {
        self.drafts.clear()
    }

    /// Reply when the message belongs to the booking conversation
    pub async fn handle(&self, phone: &str, message: &str) -> Option<String> {
        if self.has_draft(phone) {
            Some(self.step(phone, message).await)
        } else if wants_appointment(message) {
            Some(self.start(phone, message))
        } else {
            None
        }
    }

    /// Begin (or restart) a booking; a message naming the kind skips that question
    pub fn start(&self, phone: &str, message: &str) -> String {
        let mut draft = Draft::new();
        let reply = match kind_hint(message) {
            Some(kind) => {
                draft.kind = Some(kind);
                draft.step = Step::Name;
                format!("Perfeito! Vamos agendar: *{}*.\n{}", kind.as_str(), NAME_PROMPT)
            }
            None => START_PROMPT.to_string(),
        };
        self.drafts.put(phone, draft);
        reply
    }

    /// Advance the draft with the customer's answer
    pub async fn step(&self, phone: &str, message: &str) -> String {
        let Some(mut draft) = self.drafts.get(phone) else {
            return self.start(phone, message);
        };
        let answer = message.trim();

        if is_one_of(answer, CANCEL_WORDS) {
            self.drafts.delete(phone);
            return CANCELLED_REPLY.to_string();
        }

        let reply = match draft.step {
            Step::Kind => match AppointmentKind::parse(answer) {
                Some(kind) => {
                    draft.kind = Some(kind);
                    draft.step = Step::Name;
                    NAME_PROMPT
                }
                None => KIND_REPROMPT,
            },
            Step::Name => match valid_field(answer) {
                Some(name) => {
                    draft.name = Some(name);
                    draft.step = Step::Model;
                    MODEL_PROMPT
                }
                None => NAME_REPROMPT,
            },
            Step::Model => match valid_field(answer) {
                Some(model) => {
                    draft.model = Some(model);
                    draft.step = Step::City;
                    CITY_PROMPT
                }
                None => MODEL_REPROMPT,
            },
            Step::City => match valid_field(answer) {
                Some(city) => {
                    draft.city = Some(city);
                    draft.step = Step::DateTime;
                    DATETIME_PROMPT
                }
                None => CITY_REPROMPT,
            },
            Step::DateTime => return self.choose_time(phone, draft, answer).await,
            Step::Confirm => return self.confirm(phone, draft, answer).await,
        };

        self.drafts.put(phone, draft);
        reply.to_string()
    }

    async fn choose_time(&self, phone: &str, mut draft: Draft, answer: &str) -> String {
        let Some(start) = parse_datetime_br(answer) else {
            return DATETIME_REPROMPT.to_string();
        };
        let start = floor_to_hour(start);

        match self.calendar.is_slot_available(start).await {
            Ok(true) => {
                draft.start = Some(start);
                draft.step = Step::Confirm;
                let reply = confirmation(&draft, start);
                self.drafts.put(phone, draft);
                reply
            }
            Ok(false) => SLOT_TAKEN.to_string(),
            Err(e) => {
                error!("Availability check failed for {}: {}", phone, e);
                CHECK_FAILED.to_string()
            }
        }
    }

    async fn confirm(&self, phone: &str, mut draft: Draft, answer: &str) -> String {
        if is_one_of(answer, DECLINE_WORDS) {
            self.drafts.delete(phone);
            return DECLINED_REPLY.to_string();
        }
        if !is_one_of(answer, CONFIRM_WORDS) {
            return CONFIRM_REPROMPT.to_string();
        }

        let Some(start) = draft.start else {
            draft.step = Step::DateTime;
            self.drafts.put(phone, draft);
            return DATETIME_PROMPT.to_string();
        };

        match self.calendar.is_slot_available(start).await {
            Ok(true) => {}
            Ok(false) => {
                draft.step = Step::DateTime;
                draft.start = None;
                self.drafts.put(phone, draft);
                return TAKEN_AT_CONFIRM.to_string();
            }
            Err(e) => {
                error!("Availability re-check failed for {}: {}", phone, e);
                return CONFIRM_FAILED.to_string();
            }
        }

        let kind = draft.kind.unwrap_or(AppointmentKind::Visit);
        let booking = Booking {
            kind: kind.as_str().to_string(),
            name: draft.name.clone().unwrap_or_default(),
            model: draft.model.clone().unwrap_or_default(),
            city: draft.city.clone().unwrap_or_default(),
            phone: phone.to_string(),
            start,
        };

        let created = match self.calendar.create_event(&booking).await {
            Ok(created) => created,
            Err(e) => {
                error!("Failed to create calendar event for {}: {}", phone, e);
                return CONFIRM_FAILED.to_string();
            }
        };

        let entry = AppointmentLogEntry {
            logged_at: Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string(),
            phone: phone.to_string(),
            kind: booking.kind,
            name: booking.name,
            model: booking.model,
            city: booking.city,
            start_iso: created.start.format(TIMESTAMP_FORMAT).to_string(),
            event_id: created.event_id,
        };
        if let Err(e) = self.log.append(&entry) {
            warn!("Event {} created but not logged: {}", entry.event_id, e);
        }

        self.drafts.delete(phone);
        info!("Booked {} for {} at {}", entry.kind, phone, entry.start_iso);
        BOOKED_REPLY.to_string()
    }
}
