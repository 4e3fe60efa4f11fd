pub mod models;

pub use models::{AuthUser, ChatRef, Conversation, Message, UserProfile, UNKNOWN_USER};
