//! Tests for [`vecsync_chat::session`] and [`vecsync_chat::store`]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockAssistantApi, Scripted};
use futures_util::StreamExt;
use tempfile::TempDir;

use vecsync_chat::assistant_api::AssistantApi;
use vecsync_chat::config::{Config, THREAD_ID_KEY};
use vecsync_chat::error::ChatError;
use vecsync_chat::session::ChatClient;
use vecsync_chat::store;
use vecsync_chat::types::{Annotation, MessageDelta, Role, RunEvent};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn test_config(dir: &TempDir) -> Config {
    Config {
        openai_api_key: "test-mock-key-not-real".to_string(),
        openai_base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
        store_name: "test_store".to_string(),
        settings_path: dir.path().join("settings.json"),
        poll_interval: Duration::from_millis(20),
    }
}

fn mock() -> Arc<MockAssistantApi> {
    Arc::new(MockAssistantApi::with_store(
        "test_store",
        &[("file-1", "paper.pdf"), ("file-2", "notes.md")],
    ))
}

fn client(api: &Arc<MockAssistantApi>, dir: &TempDir, new_conversation: bool) -> ChatClient {
    let api: Arc<dyn AssistantApi> = api.clone();
    ChatClient::new(test_config(dir), api, new_conversation)
}

// ── Bootstrap ─────────────────────────────────────────────────────────────────

/// Test 1: with no assistant, one is created for the store.
#[tokio::test]
async fn test_connect_creates_assistant() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let mut c = client(&api, &dir, false);

    let conn = c.connect().await.unwrap();
    assert_eq!(conn.assistant_id, "assistant_vecsync-test_store_1");
    assert_eq!(conn.files.display_name("file-1"), "paper.pdf");
    assert_eq!(conn.store.id, "vs_1");
}

/// Test 2: an existing vecsync assistant is reused.
#[tokio::test]
async fn test_connect_reuses_existing_assistant() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let existing = api.add_assistant("vecsync-1");
    let mut c = client(&api, &dir, false);

    let conn = c.connect().await.unwrap();
    assert_eq!(conn.assistant_id, existing);
    assert_eq!(api.assistant_ids(), vec![existing]);
}

/// Test 3: extra vecsync assistants are deleted; foreign ones are untouched.
#[tokio::test]
async fn test_connect_cleans_up_extra_assistants() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let first = api.add_assistant("vecsync-1");
    api.add_assistant("vecsync-2");
    let other = api.add_assistant("other-3");
    let mut c = client(&api, &dir, false);

    let conn = c.connect().await.unwrap();
    assert_eq!(conn.assistant_id, first);
    assert_eq!(api.assistant_ids(), vec![first, other]);
}

/// Test 4: list_assistants only returns vecsync assistants.
#[tokio::test]
async fn test_list_assistants_filters_prefix() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    api.add_assistant("vecsync-1");
    api.add_assistant("vecsync-2");
    api.add_assistant("other-3");
    let c = client(&api, &dir, false);

    assert_eq!(c.list_assistants().await.unwrap().len(), 2);
}

/// Test 5: a new thread is created and persisted when none is stored.
#[tokio::test]
async fn test_connect_creates_and_persists_thread() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let mut c = client(&api, &dir, false);

    let thread_id = c.connect().await.unwrap().thread_id.clone();
    assert_eq!(thread_id, "thread_1");
    assert_eq!(
        c.settings().get(THREAD_ID_KEY).unwrap().as_deref(),
        Some("thread_1")
    );
}

/// Test 6: a stored thread id is reused when the assistant already exists.
#[tokio::test]
async fn test_connect_reuses_stored_thread() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    api.add_assistant("vecsync-test_store");
    let mut c = client(&api, &dir, false);
    c.settings().set(THREAD_ID_KEY, "thread_42").unwrap();

    assert_eq!(c.connect().await.unwrap().thread_id, "thread_42");
}

/// Test 7: creating an assistant forgets the stored thread.
#[tokio::test]
async fn test_new_assistant_drops_stored_thread() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let mut c = client(&api, &dir, false);
    c.settings().set(THREAD_ID_KEY, "thread_stale").unwrap();

    assert_eq!(c.connect().await.unwrap().thread_id, "thread_1");
}

/// Test 8: --new-conversation ignores the stored thread.
#[tokio::test]
async fn test_new_conversation_forces_new_thread() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    api.add_assistant("vecsync-test_store");
    let mut c = client(&api, &dir, true);
    c.settings().set(THREAD_ID_KEY, "thread_old").unwrap();

    assert_eq!(c.connect().await.unwrap().thread_id, "thread_1");
    assert_eq!(
        c.settings().get(THREAD_ID_KEY).unwrap().as_deref(),
        Some("thread_1")
    );
}

/// Test 9: a missing store is reported by name.
#[tokio::test]
async fn test_connect_missing_store() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(MockAssistantApi::new());
    let mut c = client(&api, &dir, false);

    match c.connect().await {
        Err(ChatError::StoreNotFound(name)) => assert_eq!(name, "test_store"),
        other => panic!("Expected StoreNotFound, got: {:?}", other),
    }
}

/// Test 10: deleting the active assistant disconnects and forgets the thread.
#[tokio::test]
async fn test_delete_active_assistant_disconnects() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let mut c = client(&api, &dir, false);
    let assistant_id = c.connect().await.unwrap().assistant_id.clone();

    c.delete_assistant(&assistant_id).await.unwrap();

    assert!(!c.is_connected());
    assert!(api.assistant_ids().is_empty());
    assert_eq!(c.settings().get(THREAD_ID_KEY).unwrap(), None);
}

// ── Prompting ─────────────────────────────────────────────────────────────────

/// Test 11: console_prompt writes every fragment and returns the full answer.
#[tokio::test]
async fn test_console_prompt_writes_answer() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    api.script(vec![
        Scripted::Event(RunEvent::MessageDelta(MessageDelta::text(
            "Answer 【4:0†source】",
            vec![Annotation::file_citation("【4:0†source】", "file-2")],
        ))),
        Scripted::Event(RunEvent::MessageCompleted),
    ]);
    let mut c = client(&api, &dir, false);

    let mut out: Vec<u8> = Vec::new();
    let answer = c.console_prompt("question", &mut out).await.unwrap();

    assert_eq!(answer, "Answer [1][1] notes.md");
    assert_eq!(String::from_utf8(out).unwrap(), answer);
    assert!(c.is_connected(), "prompt connects lazily");
}

/// Test 12: ui_prompt yields cumulative markdown snapshots.
#[tokio::test]
async fn test_ui_prompt_snapshots() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    api.script(vec![
        Scripted::Event(RunEvent::MessageDelta(MessageDelta::text("One ", vec![]))),
        Scripted::Event(RunEvent::MessageDelta(MessageDelta::text(
            "two [s]",
            vec![Annotation::file_citation("[s]", "file-1")],
        ))),
        Scripted::Event(RunEvent::MessageCompleted),
    ]);
    let mut c = client(&api, &dir, false);

    let snapshots: Vec<String> = c.ui_prompt("q").await.unwrap().collect().await;
    assert_eq!(
        snapshots,
        vec![
            "One ".to_string(),
            "One two <sup>[1]</sup>".to_string(),
            "One two <sup>[1]</sup>\n\n**References**\n[1] paper.pdf".to_string(),
        ]
    );
}

/// Test 13: history is returned oldest first with roles preserved.
#[tokio::test]
async fn test_load_history_orders_messages() {
    let dir = TempDir::new().unwrap();
    let api = mock();
    let mut c = client(&api, &dir, false);
    let thread_id = c.connect().await.unwrap().thread_id.clone();

    api.push_message(&thread_id, Role::Assistant, 200, "second");
    api.push_message(&thread_id, Role::User, 100, "first");

    let history = c.load_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "first");
    assert_eq!(history[1].content, "second");
}

// ── Store commands ────────────────────────────────────────────────────────────

/// Test 14: store files are listed and deleted by store name.
#[tokio::test]
async fn test_store_list_and_delete() {
    let api = mock();

    let files = store::list_files(&*api, "test_store").await.unwrap();
    assert_eq!(files.len(), 2);

    let deleted = store::delete_all_files(&*api, "test_store").await.unwrap();
    assert_eq!(deleted, 2);
    assert!(store::list_files(&*api, "test_store")
        .await
        .unwrap()
        .is_empty());

    assert!(matches!(
        store::list_files(&*api, "missing").await,
        Err(ChatError::StoreNotFound(_))
    ));
}
