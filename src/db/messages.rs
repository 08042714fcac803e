//! Conversation store operations
//!
//! One growing message log per session id, append-only, ordered by
//! insertion (rowid). All queries are parameterized.

use crate::gateway::Role;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::time::{SystemTime, UNIX_EPOCH};

/// One stored conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// Repository over the `messages` table
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one message to a session's log. No size cap is enforced.
    pub async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        sqlx::query(
            "INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to append message")?;

        Ok(())
    }

    /// Return the most recent `limit` messages in chronological order.
    ///
    /// Fetches newest-first, then reverses, so the window always ends at
    /// the latest turn.
    pub async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM messages \
             WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent messages")?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role_str: String = row.get("role");
            let role = Role::parse(&role_str)
                .with_context(|| format!("Unknown role '{}' in message log", role_str))?;
            messages.push(StoredMessage {
                role,
                content: row.get("content"),
                created_at: row.get("created_at"),
            });
        }

        messages.reverse();
        Ok(messages)
    }

    /// Delete every message belonging to a session.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("Failed to clear session")?;

        Ok(())
    }
}
