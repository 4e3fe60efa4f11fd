//! Message channel: live message feed, sends, unread bookkeeping.

use chrono::Utc;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use vaultchat_store::{
    DocumentExt, DocumentStore, Query, StoreError, WriteBatch, error::Result as StoreResult,
    from_document, query::Direction, to_document,
};
use vaultchat_types::Message;

use crate::auth::AuthProvider;
use crate::error::{ChatError, Result};
use crate::subscription::{Subscription, SubscriptionGuard};
use crate::{ChatService, KEY_MESSAGES, paths};

impl<S: DocumentStore, A: AuthProvider> ChatService<S, A> {
    /// Open the live message feed for a conversation, oldest first.
    ///
    /// A service holds one message feed at a time: watching another
    /// conversation disposes the previous pump. Each delivered snapshot
    /// also clears the caller's unread count for this conversation;
    /// that write is fire-and-forget.
    pub async fn watch_messages(&self, chat_id: &str) -> Result<Subscription<Vec<Message>>> {
        let user = self.require_user()?;
        let store = self.store().clone();
        let chat_id = chat_id.to_string();
        let messages_collection = paths::chat_messages(&chat_id);
        let own_refs = paths::user_chats(&user.id);

        let mut changes = store.changes();
        let initial = load_messages(&store, &messages_collection).await?;
        mark_read(&store, &own_refs, &chat_id).await;
        let (tx, rx) = watch::channel(initial);

        let pump = tokio::spawn(async move {
            loop {
                let relevant = match changes.recv().await {
                    Ok(event) => event.collection == messages_collection,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "message feed lagged; refreshing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if !relevant {
                    continue;
                }

                match load_messages(&store, &messages_collection).await {
                    Ok(messages) => {
                        if tx.send(messages).is_err() {
                            return;
                        }
                        mark_read(&store, &own_refs, &chat_id).await;
                    }
                    Err(e) => warn!(error = %e, "message feed refresh failed"),
                }
            }
        });

        self.register_subscription(KEY_MESSAGES, SubscriptionGuard::new(pump));
        Ok(Subscription::new(rx))
    }

    /// Append a message and update both participants' bookkeeping.
    ///
    /// The message, the conversation's last-message fields, and the
    /// sender's reference go in one atomic batch. The receiver's unread
    /// increment is a read-then-write folded into that batch when the
    /// reference exists; when it does not, the reference is created
    /// (unread 1) *before* the batch, so a batch failure after that
    /// creation is reported as a partial write. Concurrent sends to the
    /// same receiver can race the read-modify-write and lose an
    /// increment; that matches the deployed behavior and is left as-is.
    pub async fn send_message(
        &self,
        chat_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message> {
        let user = self.require_user()?;
        if content.trim().is_empty() {
            return Err(ChatError::InvalidArgument("message content is empty".into()));
        }

        let sender_name = self.resolve_display_name(&user.id).await?;
        let message = Message::new(
            chat_id,
            user.id.as_str(),
            sender_name.as_str(),
            receiver_id,
            content,
            Utc::now(),
        );
        let sent_ms = message.sent_at.timestamp_millis();

        let own_refs = paths::user_chats(&user.id);
        let receiver_refs = paths::user_chats(receiver_id);

        let last_message_fields = to_document(&json!({
            "lastMessage": content,
            "lastMessageTimestamp": sent_ms,
        }))?;

        let mut batch = WriteBatch::new();
        batch.set(paths::chat_messages(chat_id), &message.id, to_document(&message)?);
        batch.update(paths::CHATS, chat_id, last_message_fields.clone());
        batch.update(&own_refs, chat_id, last_message_fields);

        // receiver side: read the current unread count, or materialise
        // the missing reference ahead of the batch
        let receiver_ref = self.store().get(&receiver_refs, chat_id).await?;
        let mut receiver_ref_created = false;
        match receiver_ref {
            Some(body) => {
                let unread = body.u32_field("unreadCount").unwrap_or(0);
                batch.update(
                    &receiver_refs,
                    chat_id,
                    to_document(&json!({
                        "lastMessage": content,
                        "lastMessageTimestamp": sent_ms,
                        "unreadCount": unread + 1,
                    }))?,
                );
            }
            None => {
                let created = to_document(&json!({
                    "chatId": chat_id,
                    "otherUserId": user.id,
                    "otherUserName": sender_name,
                    "lastMessage": content,
                    "lastMessageTimestamp": sent_ms,
                    "unreadCount": 1,
                }))?;
                self.store().set(&receiver_refs, chat_id, created).await?;
                receiver_ref_created = true;
                debug!(chat = chat_id, receiver = receiver_id, "receiver reference created");
            }
        }

        if let Err(e) = self.store().commit(batch).await {
            if receiver_ref_created {
                return Err(ChatError::PartialWrite(format!(
                    "receiver reference written but message batch failed: {e}"
                )));
            }
            return Err(match e {
                StoreError::NotFound => {
                    ChatError::NotFound(format!("conversation {chat_id} has no record to update"))
                }
                other => other.into(),
            });
        }

        info!(chat = chat_id, message = %message.id, "message sent");
        Ok(message)
    }
}

/// One full snapshot of a conversation's messages, oldest first.
async fn load_messages<S: DocumentStore>(
    store: &S,
    messages_collection: &str,
) -> StoreResult<Vec<Message>> {
    let docs = store
        .query(&Query::collection(messages_collection).order_by("timestamp", Direction::Ascending))
        .await?;

    let mut messages = Vec::with_capacity(docs.len());
    for doc in docs {
        match from_document(&doc.body) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(doc = %doc.id, error = %e, "skipping malformed message"),
        }
    }
    Ok(messages)
}

/// Clear the caller's unread count for a conversation. Failures are
/// logged, never surfaced: reading messages should not fail because
/// bookkeeping did.
async fn mark_read<S: DocumentStore>(store: &S, own_refs: &str, chat_id: &str) {
    let mut fields = vaultchat_store::Document::new();
    fields.insert("unreadCount".to_string(), 0.into());
    if let Err(e) = store.update(own_refs, chat_id, fields).await {
        warn!(chat = chat_id, error = %e, "failed to mark conversation read");
    }
}
