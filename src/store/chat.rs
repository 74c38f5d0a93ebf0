use crate::error::StoreError;
use crate::samples::Timestamp;
use crate::store::{from_millis, to_millis, Database};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ChatSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: from_millis(row.get(2)?),
            updated_at: from_millis(row.get(3)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: Timestamp,
}

impl ChatMessage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: role.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            content: row.get(3)?,
            created_at: from_millis(row.get(4)?),
        })
    }
}

impl Database {
    pub fn create_chat_session(&self, title: &str) -> Result<ChatSession, StoreError> {
        let now = from_millis(to_millis(Utc::now()));
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    session.title,
                    to_millis(session.created_at),
                    to_millis(session.updated_at)
                ],
            )?;
            Ok(())
        })?;

        Ok(session)
    }

    pub fn chat_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, title, created_at, updated_at FROM chat_sessions WHERE id = ?1",
                    [id],
                    ChatSession::from_row,
                )
                .optional()?)
        })
    }

    /// All sessions, most recently active first
    pub fn chat_sessions(&self) -> Result<Vec<ChatSession>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM chat_sessions
                 ORDER BY updated_at DESC, created_at DESC",
            )?;
            let sessions = stmt
                .query_map([], ChatSession::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
    }

    pub fn rename_chat_session(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chat_sessions SET title = ?2 WHERE id = ?1",
                params![id, title],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("chat session {}", id)));
            }
            Ok(())
        })
    }

    /// Delete a session and, through the foreign key cascade, its messages
    pub fn delete_chat_session(&self, id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM chat_sessions WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Append a message and bump the session's `updated_at`
    pub fn add_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: from_millis(to_millis(Utc::now())),
        };

        self.transaction(|conn| {
            let touched = conn.execute(
                "UPDATE chat_sessions SET updated_at = ?2 WHERE id = ?1",
                params![session_id, to_millis(message.created_at)],
            )?;
            if touched == 0 {
                return Err(StoreError::NotFound(format!("chat session {}", session_id)));
            }
            conn.execute(
                "INSERT INTO chat_messages (id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    to_millis(message.created_at)
                ],
            )?;
            Ok(())
        })?;

        Ok(message)
    }

    /// Messages of a session in the order they were added
    pub fn chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, created_at FROM chat_messages
                 WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let messages = stmt
                .query_map([session_id], ChatMessage::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
    }

    /// The last `limit` messages of a session, oldest first
    pub fn recent_chat_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, created_at FROM (
                    SELECT id, session_id, role, content, created_at, rowid AS seq
                    FROM chat_messages WHERE session_id = ?1
                    ORDER BY created_at DESC, rowid DESC LIMIT ?2
                 ) ORDER BY created_at ASC, seq ASC",
            )?;
            let messages = stmt
                .query_map(params![session_id, limit as i64], ChatMessage::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
    }

    pub fn chat_message_count(&self, session_id: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            )?)
        })
    }
}
