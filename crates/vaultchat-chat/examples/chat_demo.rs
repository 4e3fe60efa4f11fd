//! Two principals chatting over a shared in-memory store.
//!
//! Run with `cargo run --example chat_demo`.

use tracing::info;

use vaultchat_chat::{AuthUser, ChatService, StaticAuth};
use vaultchat_store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_demo=info,vaultchat_chat=debug,vaultchat_store=info".into()),
        )
        .init();

    let store = MemoryStore::new();

    let ash_auth = StaticAuth::signed_in(AuthUser {
        id: "ash".into(),
        display_name: Some("Ash".into()),
        email: Some("ash@example.com".into()),
    });
    let misty_auth = StaticAuth::signed_in(AuthUser {
        id: "misty".into(),
        display_name: Some("Misty".into()),
        email: Some("misty@example.com".into()),
    });

    let ash = ChatService::new(store.clone(), ash_auth);
    let misty = ChatService::new(store, misty_auth);

    // every sign-in lands a searchable directory record
    ash.ensure_directory_entry().await?;
    misty.ensure_directory_entry().await?;

    let hits = ash.search_users("misty@example.com").await?;
    info!(?hits, "directory search");

    let chat_id = ash.find_or_create_chat("misty", "Misty").await?;
    let mut chat_list = ash.watch_chats().await?;
    let mut feed = misty.watch_messages(&chat_id).await?;

    ash.send_message(&chat_id, "misty", "Hey! Trade you a Staryu card?").await?;
    feed.changed().await;
    misty.send_message(&chat_id, "ash", "Only for your Pikachu.").await?;
    feed.changed().await;

    for message in feed.current() {
        info!(from = %message.sender_name, text = %message.content, "message");
    }

    chat_list.changed().await;
    for chat in chat_list.current() {
        info!(
            with = %chat.other_user_name,
            last = %chat.last_message,
            unread = chat.unread_count,
            "chat"
        );
    }

    ash.shutdown();
    misty.shutdown();
    Ok(())
}
