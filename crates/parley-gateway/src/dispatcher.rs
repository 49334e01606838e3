use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_db::{Database, StoreError};
use parley_types::events::Event;
use parley_types::models::{ChatMessage, MessageStatus, Sender};

use crate::registry::{ConnectionId, Registry};

/// Handle to one live connection: its registry key plus the channel the
/// connection's send task drains into the socket. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<Event>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Queue an event for this connection only.
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }
}

/// Routes every inbound event to the store and the right recipient set.
/// Holds no state of its own beyond the registry and the store; each event
/// is handled to completion independently of every other.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    db: Arc<Database>,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            registry: Registry::new(),
            db,
        }
    }

    /// Apply one inbound event: mutate the store if the event calls for it,
    /// then deliver. Three delivery policies exist — broadcast to all
    /// registered connections, unicast back to the requester, and targeted
    /// delivery to one user's connections. Failures never escape an event.
    pub async fn dispatch(&self, conn: &ConnectionHandle, event: Event) {
        match &event {
            Event::Identify { user_id } => {
                info!("connection {} identified as {}", conn.id, user_id);
                self.registry
                    .register(conn.id, user_id.clone(), conn.sender())
                    .await;
            }

            Event::Message {
                conversation_id,
                message,
                ..
            } => {
                // Persistence comes first: a message the store rejected is
                // never propagated.
                if self.persist_message(conversation_id, message).await {
                    self.registry.broadcast(&event).await;
                }
            }

            Event::GetHistory { conversation_id } => {
                self.reply_with_history(conn, conversation_id).await;
            }

            Event::Typing { .. } => {
                self.registry.broadcast(&event).await;
            }

            Event::ReadReceipt {
                conversation_id,
                message_id,
                ..
            } => {
                if let Some(message_id) = message_id {
                    self.advance_status(message_id, MessageStatus::Read).await;
                } else if let Some(conversation_id) = conversation_id {
                    self.mark_conversation_read(conversation_id).await;
                }
                self.registry.broadcast(&event).await;
            }

            Event::DeliveredReceipt { message_id, .. } => {
                if let Some(message_id) = message_id {
                    self.advance_status(message_id, MessageStatus::Delivered)
                        .await;
                }
                self.registry.broadcast(&event).await;
            }

            Event::CallRequest { target_id, .. }
            | Event::CallResponse { target_id, .. }
            | Event::WebrtcSignal { target_id, .. } => {
                // Signaling is private to the two peers; it is never
                // broadcast, and a missing target just drops the signal.
                let delivered = self.registry.send_to_user(target_id, &event).await;
                if delivered == 0 {
                    debug!("no live connection for {}, signal dropped", target_id);
                }
            }

            Event::History { .. } => {
                warn!(
                    "connection {} sent a server-only history event, ignoring",
                    conn.id
                );
            }
        }
    }

    /// Remove a closed connection. Called unconditionally on socket close,
    /// whether or not the client ever identified.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        if self.registry.unregister(conn_id).await {
            info!("connection {} unregistered", conn_id);
        }
    }

    /// Insert the message row. Returns whether the caller may broadcast.
    async fn persist_message(&self, conversation_id: &str, message: &ChatMessage) -> bool {
        let db = self.db.clone();
        let id = message.id.clone();
        let conversation = conversation_id.to_string();
        let text = message.text.clone();
        let sender = message.sender;
        let timestamp = message
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let status = message.status.unwrap_or(MessageStatus::Sent);

        let result = tokio::task::spawn_blocking(move || {
            db.insert_message(&id, &conversation, &text, sender, &timestamp, status)
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(StoreError::DuplicateId(id))) => {
                warn!("dropping message {}: id already persisted", id);
                false
            }
            Ok(Err(e)) => {
                error!("failed to persist message {}: {}", message.id, e);
                false
            }
            Err(e) => {
                error!("spawn_blocking join error: {}", e);
                false
            }
        }
    }

    /// Unicast the conversation's stored history back to the requesting
    /// connection. Works before `identify` too — the reply goes straight to
    /// the socket, not through the registry.
    async fn reply_with_history(&self, conn: &ConnectionHandle, conversation_id: &str) {
        let db = self.db.clone();
        let conversation = conversation_id.to_string();

        let rows = tokio::task::spawn_blocking(move || db.get_messages(&conversation)).await;

        match rows {
            Ok(Ok(rows)) => {
                let messages = rows.into_iter().map(row_to_message).collect();
                conn.send(Event::History {
                    conversation_id: conversation_id.to_string(),
                    messages,
                });
            }
            // No reply on failure; the client infers it from the absence
            // of a history event.
            Ok(Err(e)) => error!("history read failed for {}: {}", conversation_id, e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }

    async fn advance_status(&self, message_id: &str, status: MessageStatus) {
        let db = self.db.clone();
        let id = message_id.to_string();

        let result =
            tokio::task::spawn_blocking(move || db.set_message_status(&id, status)).await;

        match result {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(
                "no row advanced to {} for message {}",
                status.as_str(),
                message_id
            ),
            Ok(Err(e)) => error!("status update failed for {}: {}", message_id, e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }

    async fn mark_conversation_read(&self, conversation_id: &str) {
        let db = self.db.clone();
        let conversation = conversation_id.to_string();

        let result =
            tokio::task::spawn_blocking(move || db.mark_conversation_read(&conversation)).await;

        match result {
            Ok(Ok(changed)) => debug!(
                "marked {} messages read in conversation {}",
                changed, conversation_id
            ),
            Ok(Err(e)) => error!(
                "bulk read update failed for {}: {}",
                conversation_id, e
            ),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }
}

/// Map a stored row onto the wire shape. Corrupt values degrade with a
/// warning instead of dropping the whole history reply.
fn row_to_message(row: MessageRow) -> ChatMessage {
    let sender = Sender::parse(&row.sender).unwrap_or_else(|| {
        warn!("Corrupt sender '{}' on message '{}'", row.sender, row.id);
        Sender::Contact
    });

    let status = MessageStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on message '{}'", row.status, row.id);
        MessageStatus::Sent
    });

    let timestamp = row.timestamp.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!(
            "Corrupt timestamp '{}' on message '{}': {}",
            row.timestamp, row.id, e
        );
        DateTime::default()
    });

    ChatMessage {
        id: row.id,
        text: row.text,
        sender,
        timestamp,
        status: Some(status),
    }
}
