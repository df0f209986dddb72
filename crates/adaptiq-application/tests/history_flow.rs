use adaptiq_application::{ChatHistoryService, ChatRecord};
use adaptiq_core::config::HistoryConfig;
use adaptiq_core::document::{DocumentStore, Query};
use adaptiq_core::session::{ChatMode, FeedbackUpdate, MessageRef, Partition, Sentiment};
use adaptiq_infrastructure::storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use adaptiq_infrastructure::{
    AppConfig, AsyncDirDocumentStore, InMemoryDocumentStore, KeyValueSessionCache,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> HistoryConfig {
    HistoryConfig::for_user("student-1")
}

#[tokio::test]
async fn test_end_to_end_feedback_scenario() {
    let service = ChatHistoryService::in_memory(config());

    let sid = service.force_new_session("Algebra", ChatMode::Chat);
    let exchange = service
        .save_chat_history(
            "Algebra",
            ChatMode::Chat,
            ChatRecord::exchange("What is x?", "x is a variable.").in_session(&sid),
        )
        .await
        .unwrap();

    let updated = service
        .update_message_feedback(
            "Algebra",
            ChatMode::Chat,
            &sid,
            &MessageRef::Timestamp(exchange.assistant_timestamp.clone()),
            &FeedbackUpdate::disliked(Some("too short".to_string())),
        )
        .await;
    assert!(updated);

    let session = service
        .get_conversation_session("Algebra", ChatMode::Chat, &sid)
        .await
        .unwrap();
    assert_eq!(session.messages.len(), 2);
    let feedback = session.messages[1].feedback.as_ref().unwrap();
    assert!(feedback.disliked);
    assert_eq!(feedback.inferred_sentiment, Sentiment::Negative);
    assert_eq!(feedback.text_feedback.as_deref(), Some("too short"));
    assert_eq!(session.feedback_stats.negative, 1);
}

#[tokio::test]
async fn test_remote_outage_falls_back_to_local_cache() {
    let remote = Arc::new(InMemoryDocumentStore::new());
    let service = ChatHistoryService::with_backends(
        Arc::new(KeyValueSessionCache::new(Arc::new(MemoryKeyValueStore::new()))),
        remote.clone(),
        config(),
    );

    remote.set_offline(true);
    let exchange = service
        .save_chat_history("Physics", ChatMode::Quiz, ChatRecord::exchange("Define force", "m * a"))
        .await
        .unwrap();

    let listed = service.get_chat_history("Physics", ChatMode::Quiz, None).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_message, "Define force");

    let ok = service
        .update_message_feedback(
            "Physics",
            ChatMode::Quiz,
            &exchange.session_id,
            &MessageRef::Id(exchange.assistant_message_id.clone()),
            &FeedbackUpdate::liked(),
        )
        .await;
    assert!(ok);

    let session = service
        .get_conversation_session("Physics", ChatMode::Quiz, &exchange.session_id)
        .await
        .unwrap();
    assert!(session.messages[1].feedback.as_ref().unwrap().liked);

    // the remote never saw the session
    remote.set_offline(false);
    assert!(remote.is_empty().await);
}

#[tokio::test]
async fn test_legacy_flat_history_is_upgraded_and_pushed() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.set(
        "chatHistory_Linear Algebra",
        json!([
            {"userMessage": "What is a matrix?", "botResponse": "A grid of numbers.", "timestamp": "2024-02-01T10:00:00Z"},
            {"userMessage": "And a vector?", "botResponse": "A single column.", "timestamp": "2024-02-01T10:02:00Z"},
            {"userMessage": "Eigenvalues?", "botResponse": "Scalars with Av = λv.", "timestamp": "2024-02-01T11:00:00Z"}
        ]),
    )
    .unwrap();
    let remote = Arc::new(InMemoryDocumentStore::new());
    let service = ChatHistoryService::with_backends(
        Arc::new(KeyValueSessionCache::new(kv.clone())),
        remote.clone(),
        config(),
    );

    let listed = service
        .get_chat_history("Linear Algebra", ChatMode::Chat, None)
        .await;

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].user_message, "Eigenvalues?");
    assert_eq!(listed[1].session.messages.len(), 4);
    assert!(kv.get("chatHistory_Linear Algebra").unwrap().is_none());
    assert!(kv.get("chatSessions_Linear Algebra").unwrap().is_some());
    assert_eq!(remote.len().await, 2);
}

#[tokio::test]
async fn test_clear_one_mode_keeps_the_other() {
    let service = ChatHistoryService::in_memory(config());
    service
        .save_chat_history("Algebra", ChatMode::Chat, ChatRecord::exchange("c", "c"))
        .await;
    service
        .save_chat_history("Algebra", ChatMode::Quiz, ChatRecord::exchange("q", "q"))
        .await;
    let old_quiz_sid = service.get_or_create_session_id("Algebra", ChatMode::Quiz);

    assert!(service.clear_chat_history("Algebra", Some(ChatMode::Quiz)).await);

    let all = service.get_all_chat_history("Algebra", None).await;
    assert_eq!(all.chat.len(), 1);
    assert!(all.quiz.is_empty());
    assert_ne!(
        service.get_or_create_session_id("Algebra", ChatMode::Quiz),
        old_quiz_sid
    );
}

#[tokio::test]
async fn test_file_backed_history_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let mut app_config = AppConfig::default();
    app_config.history = config();
    app_config.storage.data_dir = Some(temp_dir.path().to_path_buf());

    let sid = {
        let service = ChatHistoryService::open(&app_config).await.unwrap();
        let sid = service.force_new_session("Chemistry", ChatMode::Chat);
        service
            .save_chat_history("Chemistry", ChatMode::Chat, ChatRecord::exchange("pH?", "Acidity scale."))
            .await
            .unwrap();
        sid
    };

    let service = ChatHistoryService::open(&app_config).await.unwrap();
    assert_eq!(service.get_or_create_session_id("Chemistry", ChatMode::Chat), sid);
    let session = service
        .get_conversation_session("Chemistry", ChatMode::Chat, &sid)
        .await
        .unwrap();
    assert_eq!(session.title, "pH?");
    assert!(
        temp_dir
            .path()
            .join("documents/users/student-1/courses/chemistry/chatSessions")
            .is_dir()
    );
}

#[tokio::test]
async fn test_local_only_session_is_read_after_remote_loses_it() {
    let temp_dir = TempDir::new().unwrap();
    let remote = Arc::new(
        AsyncDirDocumentStore::new(temp_dir.path().join("documents"))
            .await
            .unwrap(),
    );
    let service = ChatHistoryService::with_backends(
        Arc::new(KeyValueSessionCache::new(Arc::new(FileKeyValueStore::new(
            temp_dir.path().join("cache.json"),
        )))),
        remote,
        config(),
    );

    let exchange = service
        .save_chat_history("Algebra", ChatMode::Chat, ChatRecord::exchange("q", "a"))
        .await
        .unwrap();
    std::fs::remove_dir_all(temp_dir.path().join("documents/users")).unwrap();

    let session = service
        .get_conversation_session("Algebra", ChatMode::Chat, &exchange.session_id)
        .await;
    assert!(session.is_some());
}

#[tokio::test]
async fn test_corrupt_cache_file_is_treated_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir.path().join("cache.json");
    std::fs::write(&cache_path, "{truncated").unwrap();
    let remote = Arc::new(InMemoryDocumentStore::new());
    remote.set_offline(true);
    let service = ChatHistoryService::with_backends(
        Arc::new(KeyValueSessionCache::new(Arc::new(FileKeyValueStore::new(cache_path)))),
        remote,
        config(),
    );

    let sid = service.get_or_create_session_id("Algebra", ChatMode::Chat);
    let exchange = service
        .save_chat_history("Algebra", ChatMode::Chat, ChatRecord::exchange("q", "a"))
        .await
        .unwrap();
    assert_eq!(exchange.session_id, sid);
    assert_eq!(service.get_or_create_session_id("Algebra", ChatMode::Chat), sid);

    let listed = service.get_chat_history("Algebra", ChatMode::Chat, None).await;
    assert_eq!(listed.len(), 1);

    let updated = service
        .update_message_feedback(
            "Algebra",
            ChatMode::Chat,
            &sid,
            &MessageRef::Id(exchange.assistant_message_id.clone()),
            &FeedbackUpdate::liked(),
        )
        .await;
    assert!(updated);
}

#[tokio::test]
async fn test_placeholder_like_text_is_stored_verbatim() {
    let remote = Arc::new(InMemoryDocumentStore::new());
    let service = ChatHistoryService::with_backends(
        Arc::new(KeyValueSessionCache::new(Arc::new(MemoryKeyValueStore::new()))),
        remote.clone(),
        config(),
    );

    let texts = ["__adaptiq_server_timestamp__", "__adaptiqServerTimestamp"];
    let exchange = service
        .save_chat_history("Algebra", ChatMode::Chat, ChatRecord::exchange(texts[0], texts[1]))
        .await
        .unwrap();

    let collection = Partition::new("Algebra", ChatMode::Chat).collection_path("student-1");
    let docs = remote.query(&collection, &Query::new()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].fields["title"], json!(texts[0]));
    assert_eq!(docs[0].fields["messages"][0]["content"], json!(texts[0]));
    assert_eq!(docs[0].fields["messages"][1]["content"], json!(texts[1]));

    let session = service
        .get_conversation_session("Algebra", ChatMode::Chat, &exchange.session_id)
        .await
        .unwrap();
    assert_eq!(session.title, texts[0]);
    assert_eq!(session.messages[0].content, texts[0]);
    assert_eq!(session.messages[1].content, texts[1]);
}
