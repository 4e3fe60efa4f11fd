use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback shown wherever a display name cannot be resolved.
pub const UNKNOWN_USER: &str = "Unknown User";

// -- Auth --

/// The authenticated principal as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

// -- Directory --

/// A user directory search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

// -- Conversation --

/// The shared 1:1 chat document, stored once under the `chats` collection.
/// Participant lists and name snapshots are frozen at creation; only the
/// last-message fields change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub id: String,
    pub participants: Vec<String>,
    pub participant_names: HashMap<String, String>,
    pub last_message: String,
    #[serde(rename = "lastMessageTimestamp", with = "chrono::serde::ts_milliseconds")]
    pub last_message_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        id: String,
        participants: Vec<String>,
        participant_names: HashMap<String, String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            participants,
            participant_names,
            last_message: String::new(),
            last_message_at: created_at,
            created_at,
        }
    }

    /// The other participant's id, or an empty string if the given id is
    /// not a participant.
    pub fn counterpart_id(&self, current_user_id: &str) -> String {
        self.participants
            .iter()
            .find(|p| p.as_str() != current_user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The other participant's name snapshot.
    pub fn counterpart_name(&self, current_user_id: &str) -> String {
        let other = self.counterpart_id(current_user_id);
        self.participant_names
            .get(&other)
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }
}

// -- Chat reference --

/// Per-user denormalized pointer into a conversation, stored under
/// `users/{uid}/chats` with the conversation id as document id. The name
/// snapshot may drift from the live directory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    pub chat_id: String,
    pub other_user_id: String,
    pub other_user_name: String,
    /// Absent in partially-written records; readers treat that as empty.
    #[serde(default)]
    pub last_message: String,
    #[serde(
        rename = "lastMessageTimestamp",
        with = "chrono::serde::ts_milliseconds",
        default
    )]
    pub last_message_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ChatRef {
    pub fn new(
        chat_id: String,
        other_user_id: String,
        other_user_name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chat_id,
            other_user_id,
            other_user_name,
            last_message: String::new(),
            last_message_at: created_at,
            unread_count: 0,
        }
    }
}

// -- Message --

/// A single immutable chat entry, stored under `chats/{chatId}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            sent_at,
        }
    }
}
