//! In-memory stand-in for the hosted assistant service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;

use vecsync_chat::assistant_api::{AssistantApi, RunEventStream};
use vecsync_chat::error::ChatError;
use vecsync_chat::types::{
    Assistant, MessageContent, Role, RunEvent, StoreFile, ThreadMessage, VectorStore,
};

/// One scripted item of the run stream.
#[derive(Debug, Clone)]
pub enum Scripted {
    Event(RunEvent),
    /// Transport failure surfaced as `Err` by the stream.
    Fail(String),
}

#[derive(Default)]
pub struct MockState {
    pub assistants: Vec<Assistant>,
    pub threads: Vec<String>,
    pub messages: HashMap<String, Vec<ThreadMessage>>,
    pub stores: Vec<VectorStore>,
    pub store_files: HashMap<String, Vec<StoreFile>>,
    pub run_script: Vec<Scripted>,
    pub stream_open_error: Option<String>,
    pub runs_started: usize,
    pub clock: i64,
}

#[derive(Default)]
pub struct MockAssistantApi {
    pub state: Mutex<MockState>,
}

impl MockAssistantApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock with one store holding `files` as `(id, name)` pairs.
    pub fn with_store(name: &str, files: &[(&str, &str)]) -> Self {
        let api = Self::new();
        {
            let mut state = api.state.lock().unwrap();
            let id = format!("vs_{}", state.stores.len() + 1);
            state.stores.push(VectorStore {
                id: id.clone(),
                name: Some(name.to_string()),
            });
            state.store_files.insert(
                id,
                files
                    .iter()
                    .map(|(id, name)| StoreFile {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                    .collect(),
            );
        }
        api
    }

    pub fn script(&self, items: Vec<Scripted>) {
        self.state.lock().unwrap().run_script = items;
    }

    pub fn add_assistant(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("assistant_{}_{}", name, state.assistants.len() + 1);
        state.assistants.push(Assistant {
            id: id.clone(),
            name: Some(name.to_string()),
        });
        id
    }

    pub fn push_message(&self, thread_id: &str, role: Role, created_at: i64, text: &str) {
        let mut state = self.state.lock().unwrap();
        let list = state.messages.entry(thread_id.to_string()).or_default();
        let id = format!("msg_{}", list.len() + 1);
        list.push(ThreadMessage {
            id,
            role,
            created_at,
            content: vec![MessageContent::text(text)],
        });
    }

    pub fn assistant_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.assistants.iter().map(|a| a.id.clone()).collect()
    }

    pub fn runs_started(&self) -> usize {
        self.state.lock().unwrap().runs_started
    }
}

#[async_trait]
impl AssistantApi for MockAssistantApi {
    async fn create_message(&self, thread_id: &str, content: &str) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        state.clock += 1;
        let created_at = state.clock;
        let list = state.messages.entry(thread_id.to_string()).or_default();
        let id = format!("msg_{}", list.len() + 1);
        list.push(ThreadMessage {
            id,
            role: Role::User,
            created_at,
            content: vec![MessageContent::text(content)],
        });
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatError> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.get(thread_id).cloned().unwrap_or_default())
    }

    async fn stream_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
    ) -> Result<RunEventStream, ChatError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = &state.stream_open_error {
            return Err(ChatError::Api(e.clone()));
        }
        state.runs_started += 1;
        let items: Vec<Result<RunEvent, ChatError>> = state
            .run_script
            .iter()
            .cloned()
            .map(|s| match s {
                Scripted::Event(e) => Ok(e),
                Scripted::Fail(msg) => Err(ChatError::Stream(msg)),
            })
            .collect();
        Ok(futures_util::stream::iter(items).boxed())
    }

    async fn create_thread(&self) -> Result<String, ChatError> {
        let mut state = self.state.lock().unwrap();
        let id = format!("thread_{}", state.threads.len() + 1);
        state.threads.push(id.clone());
        Ok(id)
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatError> {
        Ok(self.state.lock().unwrap().assistants.clone())
    }

    async fn create_assistant(
        &self,
        name: &str,
        _vector_store_id: &str,
    ) -> Result<Assistant, ChatError> {
        let id = self.add_assistant(name);
        Ok(Assistant {
            id,
            name: Some(name.to_string()),
        })
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ChatError> {
        self.state
            .lock()
            .unwrap()
            .assistants
            .retain(|a| a.id != assistant_id);
        Ok(())
    }

    async fn find_vector_store(&self, name: &str) -> Result<Option<VectorStore>, ChatError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stores
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_store_files(&self, store_id: &str) -> Result<Vec<StoreFile>, ChatError> {
        let state = self.state.lock().unwrap();
        Ok(state.store_files.get(store_id).cloned().unwrap_or_default())
    }

    async fn delete_store_file(&self, store_id: &str, file_id: &str) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        if let Some(files) = state.store_files.get_mut(store_id) {
            files.retain(|f| f.id != file_id);
        }
        Ok(())
    }
}
