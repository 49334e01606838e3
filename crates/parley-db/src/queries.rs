use rusqlite::params;

use parley_types::models::{MessageStatus, Sender};

use crate::Database;
use crate::error::StoreError;
use crate::models::MessageRow;

impl Database {
    /// Insert a new message row. The id is the caller's; inserting an id
    /// that already exists fails with `DuplicateId` and writes nothing.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        text: &str,
        sender: Sender,
        timestamp: &str,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO messages (id, conversation_id, text, sender, timestamp, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    conversation_id,
                    text,
                    sender.as_str(),
                    timestamp,
                    status.as_str()
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateId(id.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Advance a message's status. The CASE ranks make the update a no-op
    /// unless the new status is strictly later in the sent/delivered/read
    /// progression, so a late `delivered` can never undo a `read`.
    /// Returns whether a row actually changed; an unknown id is not an error.
    pub fn set_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = ?1
                 WHERE id = ?2
                   AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END)
                     < (CASE ?1 WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END)",
                params![status.as_str(), message_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Mark every message in the conversation that the reader did not send
    /// themselves as read. Returns the number of rows that changed.
    pub fn mark_conversation_read(&self, conversation_id: &str) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = 'read'
                 WHERE conversation_id = ?1 AND sender != 'user' AND status != 'read'",
                params![conversation_id],
            )?;
            Ok(changed)
        })
    }

    /// Full history of one conversation, oldest first.
    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, text, sender, timestamp, status
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp ASC",
            )?;

            let rows = stmt
                .query_map(params![conversation_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        text: row.get(2)?,
                        sender: row.get(3)?,
                        timestamp: row.get(4)?,
                        status: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
