//! SQLite-backed conversation store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::assistant::store::{ConversationId, ConversationStore, StoreError};
use crate::assistant::turn::{ConversationTurn, Role};

/// Persistent histories in a single `turns` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let conn = Connection::open(path).map_err(unavailable)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;

        let (conversations, turns) = store.counts()?;
        info!("Loaded history from {:?} ({} conversations, {} turns)", path, conversations, turns);
        Ok(store)
    }

    /// Database that lives only as long as this value.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id, id);
        "#,
        )
        .map_err(unavailable)
    }

    fn counts(&self) -> Result<(usize, usize), StoreError> {
        let conn = self.lock()?;
        let (conversations, turns): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(DISTINCT conversation_id), COUNT(*) FROM turns",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(unavailable)?;
        Ok((conversations as usize, turns as usize))
    }
}

fn insert_turn(conn: &Connection, id: ConversationId, turn: &ConversationTurn) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO turns (conversation_id, role, text, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![id, turn.role().as_str(), turn.text(), turn.timestamp().to_rfc3339()],
    )
}

fn decode_turn(role: &str, text: String, timestamp: &str) -> Result<ConversationTurn, StoreError> {
    let role = Role::parse(role).ok_or_else(|| StoreError::Unavailable(format!("unknown role '{role}' in history")))?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| StoreError::Unavailable(format!("bad timestamp '{timestamp}': {e}")))?
        .with_timezone(&Utc);
    Ok(ConversationTurn::new(role, text, timestamp))
}

impl ConversationStore for SqliteStore {
    fn append(&self, id: ConversationId, turn: ConversationTurn) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_turn(&conn, id, &turn).map_err(unavailable)?;
        Ok(())
    }

    fn append_all(&self, id: ConversationId, turns: Vec<ConversationTurn>) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(unavailable)?;
        for turn in &turns {
            insert_turn(&tx, id, turn).map_err(unavailable)?;
        }
        tx.commit().map_err(unavailable)?;
        debug!("Appended {} turn(s) to conversation {}", turns.len(), id);
        Ok(())
    }

    fn history(&self, id: ConversationId) -> Result<Vec<ConversationTurn>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT role, text, timestamp FROM turns WHERE conversation_id = ?1 ORDER BY id ASC")
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(unavailable)?;

        let mut history = Vec::new();
        for row in rows {
            let (role, text, timestamp) = row.map_err(unavailable)?;
            history.push(decode_turn(&role, text, &timestamp)?);
        }
        Ok(history)
    }

    fn reset(&self, id: ConversationId) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM turns WHERE conversation_id = ?1", params![id])
            .map_err(unavailable)
    }

    fn reset_all(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM turns", []).map_err(unavailable)
    }
}
