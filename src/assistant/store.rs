//! Conversation store: ordered turn histories keyed by chat id.
//!
//! The store takes no per-conversation lock. teloxide's dispatcher delivers
//! updates from one chat sequentially (updates are distributed by chat id),
//! so two appends for the same conversation never race in practice. Callers
//! that drive the store outside the dispatcher must serialize per id themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::assistant::turn::ConversationTurn;

/// Stable key scoping a history (the Telegram chat id).
pub type ConversationId = i64;

/// Errors from the backing medium.
#[derive(Debug)]
pub enum StoreError {
    /// The medium could not be read or written.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "conversation storage unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Append-only conversation histories.
pub trait ConversationStore: Send + Sync {
    /// Append one turn. Creates the history on first use.
    fn append(&self, id: ConversationId, turn: ConversationTurn) -> Result<(), StoreError>;

    /// Append several turns in order.
    ///
    /// The default appends one at a time and may stop partway on error.
    /// `MemoryStore` and `SqliteStore` override it so that either all turns
    /// land or none do.
    fn append_all(&self, id: ConversationId, turns: Vec<ConversationTurn>) -> Result<(), StoreError> {
        for turn in turns {
            self.append(id, turn)?;
        }
        Ok(())
    }

    /// Full ordered history, oldest first. Empty if the id was never seen.
    fn history(&self, id: ConversationId) -> Result<Vec<ConversationTurn>, StoreError>;

    /// Discard every turn for `id`. Returns how many were discarded.
    fn reset(&self, id: ConversationId) -> Result<usize, StoreError>;

    /// Discard every conversation. Returns how many turns were discarded.
    fn reset_all(&self) -> Result<usize, StoreError>;
}

/// In-process store; history is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    histories: Mutex<HashMap<ConversationId, Vec<ConversationTurn>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ConversationId, Vec<ConversationTurn>>>, StoreError> {
        self.histories
            .lock()
            .map_err(|_| StoreError::Unavailable("history lock poisoned".to_string()))
    }
}

impl ConversationStore for MemoryStore {
    fn append(&self, id: ConversationId, turn: ConversationTurn) -> Result<(), StoreError> {
        self.lock()?.entry(id).or_default().push(turn);
        Ok(())
    }

    fn append_all(&self, id: ConversationId, turns: Vec<ConversationTurn>) -> Result<(), StoreError> {
        self.lock()?.entry(id).or_default().extend(turns);
        Ok(())
    }

    fn history(&self, id: ConversationId) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(self.lock()?.get(&id).cloned().unwrap_or_default())
    }

    fn reset(&self, id: ConversationId) -> Result<usize, StoreError> {
        Ok(self.lock()?.remove(&id).map(|turns| turns.len()).unwrap_or(0))
    }

    fn reset_all(&self) -> Result<usize, StoreError> {
        let mut histories = self.lock()?;
        let discarded = histories.values().map(Vec::len).sum();
        histories.clear();
        Ok(discarded)
    }
}
