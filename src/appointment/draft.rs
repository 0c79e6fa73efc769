//! In-progress bookings, one per phone

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Where in the booking conversation a customer is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Kind,
    Name,
    Model,
    City,
    DateTime,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentKind {
    Visit,
    TestDrive,
}

impl AppointmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentKind::Visit => "visita",
            AppointmentKind::TestDrive => "test drive",
        }
    }

    /// "visita", "visitar" or "showroom" pick a visit; anything mentioning "test" a test drive
    pub fn parse(answer: &str) -> Option<Self> {
        let s = answer.trim().to_lowercase();
        if matches!(s.as_str(), "visita" | "visitar" | "showroom") {
            Some(AppointmentKind::Visit)
        } else if s.contains("test") {
            Some(AppointmentKind::TestDrive)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub step: Step,
    pub kind: Option<AppointmentKind>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub city: Option<String>,
    pub start: Option<NaiveDateTime>,
}

impl Draft {
    pub fn new() -> Self {
        Self {
            step: Step::Kind,
            kind: None,
            name: None,
            model: None,
            city: None,
            start: None,
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}

/// Key-value storage for drafts keyed by normalized phone
pub trait DraftStore: Send + Sync {
    fn get(&self, phone: &str) -> Option<Draft>;
    fn put(&self, phone: &str, draft: Draft);
    /// Returns whether a draft was removed
    fn delete(&self, phone: &str) -> bool;
    /// Drop everything, returning how many drafts were removed
    fn clear(&self) -> usize;
}

/// Process-local drafts; lost on restart
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, Draft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drafts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.lock().is_empty()
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, phone: &str) -> Option<Draft> {
        self.drafts.lock().get(phone).cloned()
    }

    fn put(&self, phone: &str, draft: Draft) {
        self.drafts.lock().insert(phone.to_string(), draft);
    }

    fn delete(&self, phone: &str) -> bool {
        self.drafts.lock().remove(phone).is_some()
    }

    fn clear(&self) -> usize {
        let mut drafts = self.drafts.lock();
        let n = drafts.len();
        drafts.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(AppointmentKind::parse("Visita"), Some(AppointmentKind::Visit));
        assert_eq!(AppointmentKind::parse(" showroom "), Some(AppointmentKind::Visit));
        assert_eq!(AppointmentKind::parse("test drive"), Some(AppointmentKind::TestDrive));
        assert_eq!(AppointmentKind::parse("quero um TESTdrive"), Some(AppointmentKind::TestDrive));
        assert_eq!(AppointmentKind::parse("quero visitar a loja"), None);
        assert_eq!(AppointmentKind::parse("tanto faz"), None);
    }

    #[test]
    fn test_store_one_draft_per_phone() {
        let store = MemoryDraftStore::new();
        store.put("+55", Draft::new());
        let mut next = Draft::new();
        next.step = Step::Name;
        store.put("+55", next.clone());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("+55"), Some(next));
        assert!(store.delete("+55"));
        assert!(!store.delete("+55"));
        assert!(store.get("+55").is_none());
    }

    #[test]
    fn test_clear() {
        let store = MemoryDraftStore::new();
        store.put("a", Draft::new());
        store.put("b", Draft::new());
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }
}
