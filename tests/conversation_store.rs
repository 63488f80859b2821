use serde_json::json;

use querypilot::domains::conversation::Role;
use querypilot::error::QueryPilotError;
use querypilot::interfaces::stores::ConversationStore;
use querypilot::providers::sqlite::SqliteStore;

async fn store() -> SqliteStore {
    SqliteStore::open_in_memory().await.unwrap()
}

#[tokio::test]
async fn save_message_creates_conversation_and_appends() {
    let store = store().await;
    store
        .save_message("c-1", "alice", "user", "total sales?", json!({}))
        .await
        .unwrap();
    store
        .save_message("c-1", "alice", "assistant", "SELECT ...", json!({"sql": "SELECT 1"}))
        .await
        .unwrap();

    let conversation = store.get_conversation("c-1", "alice").await.unwrap().unwrap();
    assert_eq!(conversation.user_id, "alice");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, Role::User);
    assert_eq!(conversation.messages[1].role, Role::Assistant);
    assert_eq!(conversation.messages[1].metadata, json!({"sql": "SELECT 1"}));
}

#[tokio::test]
async fn other_users_fail_closed() {
    let store = store().await;
    store
        .save_message("c-1", "alice", "user", "hello", json!({}))
        .await
        .unwrap();

    assert!(store.get_conversation("c-1", "bob").await.unwrap().is_none());
    assert!(!store.delete_conversation("c-1", "bob").await.unwrap());
    assert!(store
        .recent_messages("c-1", "bob", 10)
        .await
        .unwrap()
        .is_empty());
    assert!(store.list_conversations("bob", 10).await.unwrap().is_empty());

    // Writing into someone else's conversation is refused too.
    let err = store
        .save_message("c-1", "bob", "user", "mine now", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryPilotError::NotFound(_)));
    let conversation = store.get_conversation("c-1", "alice").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
}

#[tokio::test]
async fn missing_conversation_is_none_not_error() {
    let store = store().await;
    assert!(store.get_conversation("nope", "alice").await.unwrap().is_none());
    assert!(!store.delete_conversation("nope", "alice").await.unwrap());
}

#[tokio::test]
async fn delete_cascades_to_messages() {
    let store = store().await;
    store
        .save_message("c-1", "alice", "user", "one", json!({}))
        .await
        .unwrap();
    store
        .save_message("c-1", "alice", "assistant", "two", json!({}))
        .await
        .unwrap();

    assert!(store.delete_conversation("c-1", "alice").await.unwrap());
    assert!(store.get_conversation("c-1", "alice").await.unwrap().is_none());

    // Recreating the id starts from an empty message list.
    store
        .save_message("c-1", "alice", "user", "fresh", json!({}))
        .await
        .unwrap();
    let conversation = store.get_conversation("c-1", "alice").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].content, "fresh");
}

#[tokio::test]
async fn list_conversations_is_scoped_and_message_free() {
    let store = store().await;
    store
        .save_message("c-1", "alice", "user", "one", json!({}))
        .await
        .unwrap();
    store
        .save_message("c-2", "alice", "user", "two", json!({}))
        .await
        .unwrap();
    store
        .save_message("c-3", "bob", "user", "three", json!({}))
        .await
        .unwrap();

    let conversations = store.list_conversations("alice", 10).await.unwrap();
    assert_eq!(conversations.len(), 2);
    assert!(conversations.iter().all(|c| c.user_id == "alice"));
    assert!(conversations.iter().all(|c| c.messages.is_empty()));

    let limited = store.list_conversations("alice", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn recent_messages_returns_the_tail_in_order() {
    let store = store().await;
    for i in 0..5 {
        store
            .save_message("c-1", "alice", "user", &format!("m{i}"), json!({}))
            .await
            .unwrap();
    }

    let messages = store.recent_messages("c-1", "alice", 2).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "m3");
    assert_eq!(messages[1].content, "m4");
}
