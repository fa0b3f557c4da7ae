//! Connected chat session: resolves the vector store, the assistant and the
//! conversation thread, then runs prompts against them.
//!
//! # Bootstrap
//! 1. The vector store is looked up by name; a missing store is an error.
//! 2. Exactly one `vecsync-` assistant is kept per account. Extras are
//!    deleted; when none exists one is created for the store, and the stored
//!    thread id is dropped with it.
//! 3. The thread id comes from the settings file unless a new conversation is
//!    requested; otherwise a thread is created and persisted.
//! 4. The store's file list becomes the session's [`FileRegistry`].

use std::io::Write;
use std::sync::Arc;

use futures_util::Stream;

use crate::{
    assistant_api::AssistantApi,
    config::{Config, ASSISTANT_PREFIX, THREAD_ID_KEY},
    driver::{RunDriver, RunHandle},
    error::ChatError,
    formatter::{CitationFormatter, ConsoleFormatter, MarkdownFormatter},
    history,
    settings::Settings,
    types::{Assistant, ChatMessage, FileRegistry, VectorStore},
    ui,
};

/// Remote identifiers and file names resolved by [`ChatClient::connect`].
#[derive(Debug, Clone)]
pub struct Connection {
    pub store: VectorStore,
    pub assistant_id: String,
    pub thread_id: String,
    pub files: Arc<FileRegistry>,
}

/// Chat client bound to one vector store.
pub struct ChatClient {
    config: Config,
    api: Arc<dyn AssistantApi>,
    settings: Settings,
    new_conversation: bool,
    connection: Option<Connection>,
}

impl ChatClient {
    /// `new_conversation` forces a fresh thread on the next connect.
    pub fn new(config: Config, api: Arc<dyn AssistantApi>, new_conversation: bool) -> Self {
        let settings = Settings::new(config.settings_path.clone());
        Self {
            config,
            api,
            settings,
            new_conversation,
            connection: None,
        }
    }

    /// Name of the assistant owned by this store.
    pub fn assistant_name(&self) -> String {
        format!("{ASSISTANT_PREFIX}{}", self.config.store_name)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Resolve store, assistant, thread and files.
    ///
    /// # Errors
    /// [`ChatError::StoreNotFound`] when no store carries the configured name;
    /// any API or settings error.
    pub async fn connect(&mut self) -> Result<&Connection, ChatError> {
        let store = self
            .api
            .find_vector_store(&self.config.store_name)
            .await?
            .ok_or_else(|| ChatError::StoreNotFound(self.config.store_name.clone()))?;

        let assistant_id = self.resolve_assistant(&store).await?;
        let thread_id = self.resolve_thread().await?;
        let files = FileRegistry::from(self.api.list_store_files(&store.id).await?);
        tracing::info!(
            "connected to store '{}' ({} file(s)), assistant {}, thread {}",
            self.config.store_name,
            files.len(),
            assistant_id,
            thread_id
        );

        let connection = self.connection.insert(Connection {
            store,
            assistant_id,
            thread_id,
            files: Arc::new(files),
        });
        Ok(&*connection)
    }

    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    async fn ensure_connected(&mut self) -> Result<Connection, ChatError> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        Ok(self.connect().await?.clone())
    }

    async fn resolve_assistant(&self, store: &VectorStore) -> Result<String, ChatError> {
        let existing = self.list_assistants().await?;

        if existing.len() > 1 {
            tracing::warn!(
                "multiple vecsync assistants found in account; cleaning up {} extra(s)",
                existing.len() - 1
            );
            for extra in &existing[1..] {
                self.api.delete_assistant(&extra.id).await?;
            }
        }

        if let Some(first) = existing.first() {
            tracing::info!("assistant found remotely: {}", first.id);
            return Ok(first.id.clone());
        }

        let created = self
            .api
            .create_assistant(&self.assistant_name(), &store.id)
            .await?;
        // A thread started with a previous assistant is not reused.
        self.settings.remove(THREAD_ID_KEY)?;
        tracing::info!("assistant created: {}", created.id);
        Ok(created.id)
    }

    async fn resolve_thread(&mut self) -> Result<String, ChatError> {
        if self.new_conversation {
            // Only the first connect of this client is forced fresh.
            self.new_conversation = false;
        } else if let Some(id) = self.settings.get(THREAD_ID_KEY)? {
            tracing::info!("thread found: {}", id);
            return Ok(id);
        }

        let id = self.api.create_thread().await?;
        self.settings.set(THREAD_ID_KEY, &id)?;
        tracing::info!("conversation started: {}", id);
        Ok(id)
    }

    /// Every assistant in the account whose name carries the `vecsync-` prefix.
    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatError> {
        Ok(self
            .api
            .list_assistants()
            .await?
            .into_iter()
            .filter(|a| {
                a.name
                    .as_deref()
                    .is_some_and(|n| n.starts_with(ASSISTANT_PREFIX))
            })
            .collect())
    }

    /// Delete an assistant; deleting the active one also forgets its thread
    /// and disconnects.
    pub async fn delete_assistant(&mut self, assistant_id: &str) -> Result<(), ChatError> {
        self.api.delete_assistant(assistant_id).await?;

        let active = self
            .connection
            .as_ref()
            .is_some_and(|c| c.assistant_id == assistant_id);
        if active {
            self.settings.remove(THREAD_ID_KEY)?;
            self.disconnect();
        }
        Ok(())
    }

    /// Prior messages of the conversation thread, oldest first.
    pub async fn load_history(&mut self) -> Result<Vec<ChatMessage>, ChatError> {
        let connection = self.ensure_connected().await?;
        history::load_history(self.api.as_ref(), Some(&connection.thread_id)).await
    }

    /// Submit `prompt` and return the running answer.
    pub async fn prompt(
        &mut self,
        prompt: &str,
        formatter: Arc<dyn CitationFormatter>,
    ) -> Result<RunHandle, ChatError> {
        let connection = self.ensure_connected().await?;
        RunDriver::new(
            Arc::clone(&self.api),
            connection.thread_id,
            connection.assistant_id,
            connection.files,
        )
        .with_poll_interval(self.config.poll_interval)
        .submit(prompt, formatter)
        .await
    }

    /// Stream a plain-text answer into `out` as it arrives.
    ///
    /// Returns the full answer, bibliography included.
    pub async fn console_prompt<W: Write>(
        &mut self,
        prompt: &str,
        out: &mut W,
    ) -> Result<String, ChatError> {
        let mut run = self.prompt(prompt, Arc::new(ConsoleFormatter)).await?;

        let mut answer = String::new();
        while let Some(fragment) = run.next().await {
            out.write_all(fragment.as_bytes())?;
            out.flush()?;
            answer.push_str(&fragment);
        }
        run.finish().await?;
        Ok(answer)
    }

    /// Markdown answer as a stream of cumulative snapshots.
    pub async fn ui_prompt(
        &mut self,
        prompt: &str,
    ) -> Result<impl Stream<Item = String> + Send, ChatError> {
        let run = self.prompt(prompt, Arc::new(MarkdownFormatter)).await?;
        let (fragments, _task) = run.into_parts();
        Ok(ui::cumulative(fragments))
    }
}
