//! Message dispatcher
//!
//! ```text
//! inbound ─► normalize ─► opt-out? ─► booking flow? ─► catalog? ─► assistant
//!                                                                      │
//!                                               lead row ◄── reply ◄───┘
//! ```
//!
//! Every message from one phone runs under that phone's lock, so a draft or
//! a history is never advanced by two requests at once.

use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::appointment::AppointmentFlow;
use crate::assistant::Assistant;
use crate::catalog::OfferCatalog;
use crate::conversation::ConversationStore;
use crate::phone::normalize_phone;
use crate::storage::{CsvLog, LeadRecord};

const OPT_OUT_WORDS: &[&str] = &["SAIR", "STOP"];

/// Farewell sent after an opt-out
pub const OPT_OUT_REPLY: &str = "Você foi removido. Quando quiser voltar, é só mandar OI. 👋";

/// Prune idle locks once the map grows past this
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per phone
#[derive(Default)]
pub struct PhoneLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PhoneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `phone`
    pub async fn acquire(&self, phone: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                // only the map holds these, nobody is waiting on them
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks.entry(phone.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Whether a message is an opt-out request
pub fn is_opt_out(message: &str) -> bool {
    let upper = message.trim().to_uppercase();
    OPT_OUT_WORDS.contains(&upper.as_str())
}

pub struct Bot {
    conversations: Arc<ConversationStore>,
    assistant: Assistant,
    catalog: OfferCatalog,
    appointments: AppointmentFlow,
    leads: CsvLog,
    locks: PhoneLocks,
    log_opt_out_leads: bool,
}

impl Bot {
    pub fn new(
        conversations: Arc<ConversationStore>,
        assistant: Assistant,
        catalog: OfferCatalog,
        appointments: AppointmentFlow,
        leads: CsvLog,
    ) -> Self {
        Self {
            conversations,
            assistant,
            catalog,
            appointments,
            leads,
            locks: PhoneLocks::new(),
            log_opt_out_leads: false,
        }
    }

    /// Also record a lead row for the opt-out farewell
    pub fn with_opt_out_leads(mut self, enabled: bool) -> Self {
        self.log_opt_out_leads = enabled;
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn appointments(&self) -> &AppointmentFlow {
        &self.appointments
    }

    pub fn catalog(&self) -> &OfferCatalog {
        &self.catalog
    }

    pub fn leads(&self) -> &CsvLog {
        &self.leads
    }

    pub fn model_name(&self) -> &str {
        self.assistant.model_name()
    }

    /// Reply to one inbound message. An empty sender gets an empty reply.
    pub async fn handle(&self, raw_from: &str, body: &str) -> String {
        let phone = normalize_phone(raw_from);
        if phone.is_empty() {
            warn!("Inbound message without a sender");
            return String::new();
        }
        let body = body.trim();

        let _guard = self.locks.acquire(&phone).await;
        debug!("Inbound from {}: {:?}", phone, body);

        if is_opt_out(body) {
            self.opt_out(&phone);
            if self.log_opt_out_leads {
                self.record_lead(&phone, body, OPT_OUT_REPLY);
            }
            return OPT_OUT_REPLY.to_string();
        }

        let reply = match self.appointments.handle(&phone, body).await {
            Some(reply) => reply,
            None => match self.catalog.try_answer(body).await {
                Some(reply) => {
                    debug!("Catalog answered {}", phone);
                    reply
                }
                None => self.assistant.reply(&phone, body).await,
            },
        };

        self.record_lead(&phone, body, &reply);
        reply
    }

    fn opt_out(&self, phone: &str) {
        if let Err(e) = self.conversations.clear(phone) {
            warn!("Failed to persist session removal for {}: {}", phone, e);
        }
        self.appointments.discard(phone);
        info!("{} opted out", phone);
    }

    fn record_lead(&self, phone: &str, message: &str, reply: &str) {
        let record = LeadRecord::new(Local::now().naive_local(), phone, message, reply);
        if let Err(e) = self.leads.append(&record) {
            error!("Failed to record lead for {}: {}", phone, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_is_opt_out() {
        assert!(is_opt_out("SAIR"));
        assert!(is_opt_out(" sair "));
        assert!(is_opt_out("Stop"));
        assert!(!is_opt_out("quero sair mais tarde"));
        assert!(!is_opt_out(""));
    }

    #[tokio::test]
    async fn test_phone_locks_serialize() {
        let locks = Arc::new(PhoneLocks::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = locks.acquire("+55").await;
        let task = {
            let locks = locks.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("+55").await;
                order.lock().push("second");
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        drop(guard);
        task.await.unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_phone_locks_independent() {
        let locks = PhoneLocks::new();
        let _a = locks.acquire("+1").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("+2"))
            .await
            .expect("other phones are not blocked");
        assert_eq!(locks.len(), 2);
    }
}
