//! Conversation Store
//!
//! Stores raw message turns per phone number for the AI fallback.
//! Held in memory and persisted as one JSON snapshot after every update.

use crate::storage::{SnapshotFile, StorageError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Maximum turns kept per phone (rolling window)
pub const MAX_MESSAGES_PER_CONVERSATION: usize = 12;

/// Turns forwarded to the language model
pub const CONTEXT_MESSAGES: usize = 8;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

type Sessions = HashMap<String, Vec<ConversationMessage>>;

/// Per-phone conversation history with a JSON snapshot on disk
pub struct ConversationStore {
    sessions: RwLock<Sessions>,
    snapshot: SnapshotFile,
    max_messages: usize,
    context_messages: usize,
}

impl ConversationStore {
    /// Load the snapshot (missing or corrupt file starts empty)
    pub fn open(snapshot: SnapshotFile) -> Self {
        Self::open_with_config(snapshot, MAX_MESSAGES_PER_CONVERSATION, CONTEXT_MESSAGES)
    }

    /// Open with custom limits
    pub fn open_with_config(snapshot: SnapshotFile, max_messages: usize, context_messages: usize) -> Self {
        let sessions: Sessions = snapshot.load_or_default();
        info!(
            "Conversation store opened: {} ({} sessions)",
            snapshot.path().display(),
            sessions.len()
        );
        Self {
            sessions: RwLock::new(sessions),
            snapshot,
            max_messages,
            context_messages,
        }
    }

    /// Full stored history for a phone
    pub fn get_history(&self, phone: &str) -> Vec<ConversationMessage> {
        self.sessions.read().get(phone).cloned().unwrap_or_default()
    }

    /// Stored history plus the pending user turn, cut to the model window.
    /// The pending turn is always last and counts toward the window.
    pub fn build_context(&self, phone: &str, user_msg: &str) -> Vec<ConversationMessage> {
        let mut turns = self.get_history(phone);
        turns.push(ConversationMessage::user(user_msg));
        let skip = turns.len().saturating_sub(self.context_messages);
        turns.into_iter().skip(skip).collect()
    }

    /// Add a user turn and the reply to it, trim, and persist
    pub fn add_exchange(&self, phone: &str, user_msg: &str, assistant_msg: &str) -> Result<(), StorageError> {
        {
            let mut sessions = self.sessions.write();
            let history = sessions.entry(phone.to_string()).or_default();
            history.push(ConversationMessage::user(user_msg));
            history.push(ConversationMessage::assistant(assistant_msg));
            if history.len() > self.max_messages {
                let excess = history.len() - self.max_messages;
                history.drain(..excess);
            }
        }
        debug!("Added exchange to {}", phone);
        self.persist()
    }

    /// Remove one phone's history and persist
    pub fn clear(&self, phone: &str) -> Result<bool, StorageError> {
        let removed = self.sessions.write().remove(phone).is_some();
        if removed {
            info!("Cleared conversation for {}", phone);
        }
        self.persist()?;
        Ok(removed)
    }

    /// Drop every in-memory session (the snapshot file is handled by the caller)
    pub fn clear_all(&self) -> usize {
        let mut sessions = self.sessions.write();
        let n = sessions.len();
        sessions.clear();
        n
    }

    /// Number of phones with a stored history
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> &SnapshotFile {
        &self.snapshot
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.snapshot.save_with(|| self.sessions.read().clone())
    }
}
