//! Chat coordination for the VaultChat collector app.
//!
//! Four concerns behind one service handle: session access, the user
//! directory (search + login upsert), the chat registry (find-or-create,
//! live chat list), and the message channel (live message feed, sends,
//! unread bookkeeping). Storage and auth are injected collaborators, so
//! the whole service runs identically over the in-memory store, the
//! SQLite store, or any remote document database implementing
//! [`vaultchat_store::DocumentStore`].

pub mod auth;
pub mod error;
pub mod paths;
pub mod subscription;

mod channel;
mod directory;
mod identity;
mod registry;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use vaultchat_store::DocumentStore;

use crate::subscription::SubscriptionGuard;

pub use auth::{AuthProvider, StaticAuth};
pub use error::{ChatError, Result};
pub use subscription::Subscription;
pub use vaultchat_types::{AuthUser, ChatRef, Conversation, Message, UNKNOWN_USER, UserProfile};

/// Subscription slot for the chat list; re-watching replaces the pump.
pub(crate) const KEY_CHAT_LIST: &str = "chat-list";
/// Subscription slot for the open conversation; a service holds at most
/// one message feed at a time.
pub(crate) const KEY_MESSAGES: &str = "messages";

/// The chat coordination service. Cheap to clone; all clones share the
/// same collaborators and subscription registry.
#[derive(Clone)]
pub struct ChatService<S, A> {
    inner: Arc<ServiceInner<S, A>>,
}

struct ServiceInner<S, A> {
    store: S,
    auth: A,
    subscriptions: Mutex<HashMap<String, SubscriptionGuard>>,
}

impl<S: DocumentStore, A: AuthProvider> ChatService<S, A> {
    pub fn new(store: S, auth: A) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                store,
                auth,
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn auth(&self) -> &A {
        &self.inner.auth
    }

    /// Park a pump under its slot, disposing whatever ran there before.
    pub(crate) fn register_subscription(&self, key: &str, guard: SubscriptionGuard) {
        match self.inner.subscriptions.lock() {
            Ok(mut subs) => {
                subs.insert(key.to_string(), guard);
            }
            Err(_) => warn!(key, "subscription registry poisoned; pump not tracked"),
        }
    }

    fn release_subscription(&self, key: &str) {
        if let Ok(mut subs) = self.inner.subscriptions.lock() {
            subs.remove(key);
        }
    }

    /// Stop the live chat-list feed, if any.
    pub fn stop_watching_chats(&self) {
        self.release_subscription(KEY_CHAT_LIST);
    }

    /// Stop the live message feed, if any.
    pub fn stop_watching_messages(&self) {
        self.release_subscription(KEY_MESSAGES);
    }

    /// Dispose every open subscription.
    pub fn shutdown(&self) {
        if let Ok(mut subs) = self.inner.subscriptions.lock() {
            subs.clear();
        }
    }
}
