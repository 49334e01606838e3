use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use parley_ai::ReplyGenerator;
use parley_gateway::dispatcher::{ConnectionHandle, Dispatcher};
use parley_types::events::Event;
use parley_types::models::{ChatMessage, Sender};

/// Run the assistant as an ordinary protocol client: it identifies itself
/// under the assistant id, watches broadcast messages in its conversation,
/// and answers user messages through the same dispatch path every other
/// client uses. Generator failures stay here; the relay never notices.
pub fn spawn(dispatcher: Dispatcher, generator: ReplyGenerator, assistant_id: String) -> JoinHandle<()> {
    tokio::spawn(run(dispatcher, generator, assistant_id))
}

async fn run(dispatcher: Dispatcher, generator: ReplyGenerator, assistant_id: String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let conn = ConnectionHandle::new(tx);

    dispatcher
        .dispatch(
            &conn,
            Event::Identify {
                user_id: assistant_id.clone(),
            },
        )
        .await;
    info!("assistant responder online as {}", assistant_id);

    while let Some(event) = rx.recv().await {
        let Event::Message {
            conversation_id,
            message,
            ..
        } = event
        else {
            continue;
        };
        // Only user messages in the assistant's own conversation; replying
        // to our own broadcasts would loop forever.
        if conversation_id != assistant_id || message.sender != Sender::User {
            continue;
        }

        set_typing(&dispatcher, &conn, &assistant_id, true).await;
        let reply = generator.generate(&message.text).await;
        set_typing(&dispatcher, &conn, &assistant_id, false).await;

        match reply {
            Ok(text) => {
                let reply_message = ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    text,
                    sender: Sender::Ai,
                    timestamp: Utc::now(),
                    status: None,
                };
                dispatcher
                    .dispatch(
                        &conn,
                        Event::Message {
                            conversation_id,
                            message: reply_message,
                            sender_id: Some(assistant_id.clone()),
                        },
                    )
                    .await;
            }
            Err(e) => warn!("assistant reply failed: {}", e),
        }
    }
}

async fn set_typing(
    dispatcher: &Dispatcher,
    conn: &ConnectionHandle,
    assistant_id: &str,
    is_typing: bool,
) {
    dispatcher
        .dispatch(
            conn,
            Event::Typing {
                conversation_id: assistant_id.to_string(),
                is_typing,
                sender_id: Some(assistant_id.to_string()),
            },
        )
        .await;
}
