//! End-to-end scenarios over the in-memory store: two signed-in
//! principals sharing one backend, each through their own service.

use std::time::Duration;

use serde_json::json;
use tokio::time::{Instant, sleep, timeout};

use vaultchat_chat::{AuthUser, ChatError, ChatService, StaticAuth, Subscription, paths};
use vaultchat_store::{DocumentExt, DocumentStore, MemoryStore, Query};

const WAIT: Duration = Duration::from_secs(2);

fn ash() -> AuthUser {
    AuthUser {
        id: "a1".into(),
        display_name: Some("Ash".into()),
        email: Some("ash@example.com".into()),
    }
}

fn misty() -> AuthUser {
    AuthUser {
        id: "b1".into(),
        display_name: Some("Misty".into()),
        email: Some("misty@example.com".into()),
    }
}

/// Two services for two principals over one shared store, directory
/// records in place.
async fn two_principals() -> (ChatService<MemoryStore, StaticAuth>, ChatService<MemoryStore, StaticAuth>) {
    let store = MemoryStore::new();
    let a = ChatService::new(store.clone(), StaticAuth::signed_in(ash()));
    let b = ChatService::new(store, StaticAuth::signed_in(misty()));
    a.ensure_directory_entry().await.unwrap();
    b.ensure_directory_entry().await.unwrap();
    (a, b)
}

async fn unread_count(store: &MemoryStore, user_id: &str, chat_id: &str) -> Option<u32> {
    store
        .get(&paths::user_chats(user_id), chat_id)
        .await
        .unwrap()
        .and_then(|body| body.u32_field("unreadCount"))
}

/// Poll until the receiver's stored unread count reaches `want`.
async fn wait_for_unread(store: &MemoryStore, user_id: &str, chat_id: &str, want: u32) {
    let deadline = Instant::now() + WAIT;
    loop {
        if unread_count(store, user_id, chat_id).await == Some(want) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "unread count for {user_id}/{chat_id} never reached {want}"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until a subscription snapshot satisfies the predicate.
async fn wait_for_snapshot<T: Clone + Send + Sync + 'static>(
    sub: &mut Subscription<T>,
    mut pred: impl FnMut(&T) -> bool,
) -> T {
    let deadline = Instant::now() + WAIT;
    loop {
        let snapshot = sub.current();
        if pred(&snapshot) {
            return snapshot;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        assert!(!remaining.is_zero(), "subscription never produced the expected snapshot");
        let _ = timeout(remaining, sub.changed()).await;
    }
}

#[tokio::test]
async fn find_or_create_is_idempotent_per_pair() {
    let (a, _b) = two_principals().await;

    let first = a.find_or_create_chat("b1", "Misty").await.unwrap();
    let second = a.find_or_create_chat("b1", "Misty").await.unwrap();
    assert_eq!(first, second);

    let refs = a
        .store()
        .query(&Query::collection(paths::user_chats("a1")).filter_eq("otherUserId", "b1"))
        .await
        .unwrap();
    assert_eq!(refs.len(), 1, "exactly one reference per counterpart");
}

#[tokio::test]
async fn creation_writes_the_conversation_and_both_references() {
    let (a, _b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    let conversation = a.store().get(paths::CHATS, &chat_id).await.unwrap().unwrap();
    let participants: Vec<&str> = conversation["participants"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(participants, ["a1", "b1"]);
    assert_eq!(conversation["participantNames"]["a1"], "Ash");
    assert_eq!(conversation["participantNames"]["b1"], "Misty");
    assert_eq!(conversation.str_field("lastMessage"), Some(""));

    for (user, other, other_name) in [("a1", "b1", "Misty"), ("b1", "a1", "Ash")] {
        let chat_ref = a
            .store()
            .get(&paths::user_chats(user), &chat_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chat_ref.str_field("chatId"), Some(chat_id.as_str()));
        assert_eq!(chat_ref.str_field("otherUserId"), Some(other));
        assert_eq!(chat_ref.str_field("otherUserName"), Some(other_name));
        assert_eq!(chat_ref.str_field("lastMessage"), Some(""));
        assert_eq!(chat_ref.u32_field("unreadCount"), Some(0));
    }
}

#[tokio::test]
async fn self_chat_and_signed_out_calls_are_rejected() {
    let (a, _b) = two_principals().await;
    assert!(matches!(
        a.find_or_create_chat("a1", "Ash").await,
        Err(ChatError::InvalidArgument(_))
    ));

    let signed_out = ChatService::new(MemoryStore::new(), StaticAuth::signed_out());
    assert!(matches!(
        signed_out.find_or_create_chat("b1", "Misty").await,
        Err(ChatError::NotAuthenticated)
    ));
    assert!(matches!(
        signed_out.send_message("c1", "b1", "hi").await,
        Err(ChatError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn blank_messages_are_rejected_without_touching_the_store() {
    let (a, _b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();
    let conversation_before = a.store().get(paths::CHATS, &chat_id).await.unwrap();
    let ref_before = a.store().get(&paths::user_chats("b1"), &chat_id).await.unwrap();

    for content in ["", "   ", "\n\t"] {
        assert!(matches!(
            a.send_message(&chat_id, "b1", content).await,
            Err(ChatError::InvalidArgument(_))
        ));
    }

    let messages = a
        .store()
        .query(&Query::collection(paths::chat_messages(&chat_id)))
        .await
        .unwrap();
    assert!(messages.is_empty());
    assert_eq!(a.store().get(paths::CHATS, &chat_id).await.unwrap(), conversation_before);
    assert_eq!(
        a.store().get(&paths::user_chats("b1"), &chat_id).await.unwrap(),
        ref_before
    );
}

#[tokio::test]
async fn a_send_updates_the_message_log_and_both_sides_bookkeeping() {
    let (a, _b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    let sent = a.send_message(&chat_id, "b1", "Hello").await.unwrap();
    assert_eq!(sent.sender_id, "a1");
    assert_eq!(sent.sender_name, "Ash");
    assert_eq!(sent.receiver_id, "b1");

    let messages = a
        .store()
        .query(&Query::collection(paths::chat_messages(&chat_id)))
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body.str_field("content"), Some("Hello"));
    assert_eq!(messages[0].body.str_field("senderId"), Some("a1"));

    let conversation = a.store().get(paths::CHATS, &chat_id).await.unwrap().unwrap();
    assert_eq!(conversation.str_field("lastMessage"), Some("Hello"));

    assert_eq!(unread_count(a.store(), "a1", &chat_id).await, Some(0));
    assert_eq!(unread_count(a.store(), "b1", &chat_id).await, Some(1));

    a.send_message(&chat_id, "b1", "Anyone there?").await.unwrap();
    assert_eq!(unread_count(a.store(), "b1", &chat_id).await, Some(2));
}

#[tokio::test]
async fn sending_without_a_receiver_reference_materialises_it() {
    let (a, _b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    // simulate the receiver-side reference never having been written
    a.store()
        .delete(&paths::user_chats("b1"), &chat_id)
        .await
        .unwrap();

    a.send_message(&chat_id, "b1", "Hello").await.unwrap();

    let chat_ref = a
        .store()
        .get(&paths::user_chats("b1"), &chat_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chat_ref.u32_field("unreadCount"), Some(1));
    assert_eq!(chat_ref.str_field("otherUserId"), Some("a1"));
    assert_eq!(chat_ref.str_field("otherUserName"), Some("Ash"));
    assert_eq!(chat_ref.str_field("lastMessage"), Some("Hello"));
}

#[tokio::test]
async fn sending_into_a_missing_conversation_reports_not_found() {
    let (a, _b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    // the shared conversation document is gone but both references remain
    a.store().delete(paths::CHATS, &chat_id).await.unwrap();
    assert!(matches!(
        a.send_message(&chat_id, "b1", "hello?").await,
        Err(ChatError::NotFound(_))
    ));
}

#[tokio::test]
async fn a_batch_failure_after_the_receiver_write_is_a_partial_write() {
    let (a, _b) = two_principals().await;

    // no conversation exists at all: the send materialises the receiver
    // reference first, then the batch fails on the conversation update
    let err = a.send_message("no-such-chat", "b1", "hello?").await.unwrap_err();
    assert!(matches!(err, ChatError::PartialWrite(_)));

    // the stray receiver reference really did land
    let chat_ref = a
        .store()
        .get(&paths::user_chats("b1"), "no-such-chat")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chat_ref.u32_field("unreadCount"), Some(1));
}

#[tokio::test]
async fn the_message_feed_sees_counterpart_sends() {
    let (a, b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    let mut feed = a.watch_messages(&chat_id).await.unwrap();
    assert!(feed.current().is_empty());

    b.send_message(&chat_id, "a1", "Hi Ash!").await.unwrap();

    let snapshot = wait_for_snapshot(&mut feed, |msgs| !msgs.is_empty()).await;
    assert_eq!(snapshot.last().unwrap().content, "Hi Ash!");
    assert_eq!(snapshot.last().unwrap().sender_id, "b1");

    // the feed marked the conversation read for its owner
    wait_for_unread(a.store(), "a1", &chat_id, 0).await;
}

#[tokio::test]
async fn opening_the_feed_clears_the_unread_count() {
    let (a, b) = two_principals().await;
    let chat_id = a.find_or_create_chat("b1", "Misty").await.unwrap();

    a.send_message(&chat_id, "b1", "Hello").await.unwrap();
    assert_eq!(unread_count(a.store(), "b1", &chat_id).await, Some(1));

    let _feed = b.watch_messages(&chat_id).await.unwrap();
    wait_for_unread(b.store(), "b1", &chat_id, 0).await;
}

#[tokio::test]
async fn rewatching_disposes_the_previous_feed() {
    let (a, _b) = two_principals().await;
    let first_chat = a.find_or_create_chat("b1", "Misty").await.unwrap();

    let mut first = a.watch_messages(&first_chat).await.unwrap();
    let _second = a.watch_messages(&first_chat).await.unwrap();

    // the first pump is aborted, so its subscription reports disposal
    let disposed = timeout(WAIT, first.changed()).await.expect("pump was not disposed");
    assert!(!disposed);
}

#[tokio::test]
async fn the_chat_list_tracks_activity_and_skips_junk() {
    let (a, b) = two_principals().await;
    let misty_chat = a.find_or_create_chat("b1", "Misty").await.unwrap();

    // junk that the list must ignore
    a.store()
        .set(
            &paths::user_chats("a1"),
            "broken",
            json!({"otherUserName": "no ids here"}).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();

    let mut chats = a.watch_chats().await.unwrap();
    let initial = chats.current();
    assert_eq!(initial.len(), 1, "placeholder and malformed records are skipped");
    assert_eq!(initial[0].chat_id, misty_chat);
    assert_eq!(initial[0].other_user_name, "Misty");

    b.send_message(&misty_chat, "a1", "Free tonight?").await.unwrap();

    let snapshot = wait_for_snapshot(&mut chats, |list| {
        list.first().is_some_and(|c| c.last_message == "Free tonight?")
    })
    .await;
    assert_eq!(snapshot[0].chat_id, misty_chat);
}

#[tokio::test]
async fn the_chat_list_sorts_by_latest_activity() {
    let store = MemoryStore::new();
    let a = ChatService::new(store.clone(), StaticAuth::signed_in(ash()));
    let b = ChatService::new(store.clone(), StaticAuth::signed_in(misty()));
    let c = ChatService::new(
        store,
        StaticAuth::signed_in(AuthUser {
            id: "c1".into(),
            display_name: Some("Brock".into()),
            email: Some("brock@example.com".into()),
        }),
    );
    for svc in [&a, &b, &c] {
        svc.ensure_directory_entry().await.unwrap();
    }

    let misty_chat = a.find_or_create_chat("b1", "Misty").await.unwrap();
    let brock_chat = a.find_or_create_chat("c1", "Brock").await.unwrap();

    a.send_message(&misty_chat, "b1", "first").await.unwrap();
    sleep(Duration::from_millis(5)).await; // keep the millisecond timestamps distinct
    a.send_message(&brock_chat, "c1", "second").await.unwrap();

    let mut chats = a.watch_chats().await.unwrap();
    let snapshot = wait_for_snapshot(&mut chats, |list| {
        list.len() == 2 && list[0].last_message == "second"
    })
    .await;
    assert_eq!(snapshot[0].chat_id, brock_chat);
    assert_eq!(snapshot[1].chat_id, misty_chat);

    sleep(Duration::from_millis(5)).await;
    b.send_message(&misty_chat, "a1", "third").await.unwrap();
    let snapshot = wait_for_snapshot(&mut chats, |list| {
        list.first().is_some_and(|chat| chat.last_message == "third")
    })
    .await;
    assert_eq!(snapshot[0].chat_id, misty_chat);
}

#[tokio::test]
async fn session_sync_upserts_the_directory_on_sign_in() {
    let store = MemoryStore::new();
    let auth = StaticAuth::signed_out();
    let svc = ChatService::new(store.clone(), auth.clone());

    let sync = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.run_session_sync().await })
    };

    auth.sign_in(ash());

    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(record) = store.get(paths::USERS, "a1").await.unwrap() {
            assert_eq!(record.str_field("email"), Some("ash@example.com"));
            break;
        }
        assert!(Instant::now() < deadline, "directory record never appeared");
        sleep(Duration::from_millis(10)).await;
    }

    sync.abort();
}

#[tokio::test]
async fn search_is_empty_for_blank_queries_and_excludes_the_caller() {
    let (a, _b) = two_principals().await;

    assert!(a.search_users("  ").await.unwrap().is_empty());

    let hits = a.search_users("misty@example.com").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "b1");

    // the caller's own email resolves to nobody
    assert!(a.search_users("ash@example.com").await.unwrap().is_empty());
}
