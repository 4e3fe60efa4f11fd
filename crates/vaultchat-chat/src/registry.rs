//! Chat registry: conversation creation, discovery, and the live list.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vaultchat_store::{
    DocumentExt, DocumentStore, Query, WriteBatch, error::Result as StoreResult, from_document,
    to_document,
};
use vaultchat_types::{ChatRef, Conversation};

use crate::auth::AuthProvider;
use crate::error::{ChatError, Result};
use crate::subscription::{Subscription, SubscriptionGuard};
use crate::{ChatService, KEY_CHAT_LIST, paths};

impl<S: DocumentStore, A: AuthProvider> ChatService<S, A> {
    /// Return the existing conversation with `with_id`, or create one.
    ///
    /// Uniqueness per pair is enforced on the read side: the caller's own
    /// reference namespace is checked first, and a hit short-circuits.
    /// Two principals racing to start the same chat before either
    /// reference lands can therefore still mint two conversations; that
    /// matches the deployed behavior and is left as-is.
    pub async fn find_or_create_chat(&self, with_id: &str, with_name: &str) -> Result<String> {
        let user = self.require_user()?;
        if with_id == user.id {
            return Err(ChatError::InvalidArgument(
                "cannot start a chat with yourself".into(),
            ));
        }

        let own_refs = paths::user_chats(&user.id);
        let existing = self
            .store()
            .query(
                &Query::collection(own_refs.clone())
                    .filter_eq("otherUserId", with_id)
                    .limit(1),
            )
            .await?;
        if let Some(chat_id) = existing.first().and_then(|doc| doc.body.str_field("chatId")) {
            debug!(chat = chat_id, with = with_id, "conversation already exists");
            return Ok(chat_id.to_string());
        }

        let own_name = self.resolve_display_name(&user.id).await?;
        let chat_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let conversation = Conversation::new(
            chat_id.clone(),
            vec![user.id.clone(), with_id.to_string()],
            HashMap::from([
                (user.id.clone(), own_name.clone()),
                (with_id.to_string(), with_name.to_string()),
            ]),
            now,
        );
        let own_ref = ChatRef::new(chat_id.clone(), with_id.to_string(), with_name.to_string(), now);
        let their_ref = ChatRef::new(chat_id.clone(), user.id.clone(), own_name, now);

        // conversation and both references land together or not at all
        let mut batch = WriteBatch::new();
        batch.set(paths::CHATS, &chat_id, to_document(&conversation)?);
        batch.set(&own_refs, &chat_id, to_document(&own_ref)?);
        batch.set(paths::user_chats(with_id), &chat_id, to_document(&their_ref)?);
        self.store().commit(batch).await?;

        info!(chat = %chat_id, with = with_id, "conversation created");
        Ok(chat_id)
    }

    /// Open a live view of the caller's conversations, newest activity
    /// first. Re-watching replaces the previous feed rather than stacking
    /// listeners. Last-message fields are refreshed from the shared
    /// conversation documents, so counterpart sends show up too.
    pub async fn watch_chats(&self) -> Result<Subscription<Vec<ChatRef>>> {
        let user = self.require_user()?;
        let store = self.store().clone();
        let own_refs = paths::user_chats(&user.id);

        // subscribe before the initial load so no change slips between
        let mut changes = store.changes();
        let initial = load_chat_list(&store, &own_refs).await?;
        let mut chat_ids: HashSet<String> = initial.iter().map(|r| r.chat_id.clone()).collect();
        let (tx, rx) = watch::channel(initial);

        let pump = tokio::spawn(async move {
            loop {
                let relevant = match changes.recv().await {
                    Ok(event) => {
                        event.collection == own_refs
                            || (event.collection == paths::CHATS && chat_ids.contains(&event.doc_id))
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "chat list feed lagged; refreshing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if !relevant {
                    continue;
                }

                match load_chat_list(&store, &own_refs).await {
                    Ok(list) => {
                        chat_ids = list.iter().map(|r| r.chat_id.clone()).collect();
                        if tx.send(list).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "chat list refresh failed"),
                }
            }
        });

        self.register_subscription(KEY_CHAT_LIST, SubscriptionGuard::new(pump));
        Ok(Subscription::new(rx))
    }
}

/// One full snapshot of a principal's chat list.
async fn load_chat_list<S: DocumentStore>(store: &S, refs_collection: &str) -> StoreResult<Vec<ChatRef>> {
    let docs = store.query(&Query::collection(refs_collection)).await?;

    let mut refs = Vec::with_capacity(docs.len());
    for doc in docs {
        if doc.body.bool_field("placeholder").unwrap_or(false) {
            continue;
        }
        let mut chat_ref: ChatRef = match from_document(&doc.body) {
            Ok(r) => r,
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "skipping malformed chat reference");
                continue;
            }
        };

        // the shared conversation document is the source of truth for
        // last-message fields once the counterpart starts writing
        if let Some(conversation) = store.get(paths::CHATS, &chat_ref.chat_id).await? {
            if let Some(text) = conversation.str_field("lastMessage") {
                chat_ref.last_message = text.to_string();
            }
            if let Some(at) = conversation.time_field("lastMessageTimestamp") {
                chat_ref.last_message_at = at;
            }
        }
        refs.push(chat_ref);
    }

    refs.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| a.chat_id.cmp(&b.chat_id))
    });
    Ok(refs)
}
