//! Collection layout shared by every operation.
//!
//! `users/{uid}/chats` and `chats/{chatId}/messages` are flat collection
//! names in the store; the nesting is purely a naming convention.

/// Directory records, one per principal.
pub const USERS: &str = "users";

/// Shared conversation documents.
pub const CHATS: &str = "chats";

/// Reserved document id marking a lazily-created chat namespace.
/// All readers skip it.
pub const PLACEHOLDER_DOC: &str = "placeholder";

/// A principal's chat-reference namespace.
pub fn user_chats(user_id: &str) -> String {
    format!("users/{user_id}/chats")
}

/// A conversation's message log.
pub fn chat_messages(chat_id: &str) -> String {
    format!("chats/{chat_id}/messages")
}
