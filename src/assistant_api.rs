//! Hosted assistant service: the [`AssistantApi`] seam and its OpenAI
//! Assistants v2 implementation over reqwest.
//!
//! The service does all retrieval and generation; this module only moves
//! requests and decodes the run event stream (server-sent events). HTTP
//! failures are mapped to [`ChatError::Api`] with 401, 404, 429 and 5xx
//! singled out.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use crate::{
    config::{Config, ASSISTANT_INSTRUCTIONS, MAX_ERROR_BODY_LEN},
    error::ChatError,
    types::{Assistant, MessageDeltaEvent, RunEvent, StoreFile, ThreadMessage, VectorStore},
};

/// Ordered events of one streaming run.
pub type RunEventStream = BoxStream<'static, Result<RunEvent, ChatError>>;

/// Operations the chat client needs from the hosted assistant service.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Append a user message to `thread_id`.
    async fn create_message(&self, thread_id: &str, content: &str) -> Result<(), ChatError>;

    /// Every message of `thread_id`, in service order.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatError>;

    /// Start a run of `assistant_id` on `thread_id` and stream its events.
    ///
    /// Dropping the returned stream releases the underlying connection.
    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, ChatError>;

    async fn create_thread(&self) -> Result<String, ChatError>;

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatError>;

    /// Create a file-search assistant bound to `vector_store_id`.
    async fn create_assistant(
        &self,
        name: &str,
        vector_store_id: &str,
    ) -> Result<Assistant, ChatError>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ChatError>;

    async fn find_vector_store(&self, name: &str) -> Result<Option<VectorStore>, ChatError>;

    /// Files attached to a vector store, with display names resolved.
    async fn list_store_files(&self, store_id: &str) -> Result<Vec<StoreFile>, ChatError>;

    /// Detach a file from the store and delete the underlying file.
    async fn delete_store_file(&self, store_id: &str, file_id: &str) -> Result<(), ChatError>;
}

// ── OpenAI client ─────────────────────────────────────────────────────────────

/// Longest SSE line accepted from the run stream.
const MAX_SSE_LINE: usize = 1024 * 1024;

/// Page size for list endpoints.
const PAGE_LIMIT: u32 = 100;

/// HTTP client for the OpenAI Assistants v2 API.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.model.clone(),
        }
    }

    // ── Private helpers ────────────────────────────────────────────────────

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send the request and surface structured HTTP errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ChatError> {
        let response = request.send().await.map_err(ChatError::Http)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "(unreadable body)".to_string());
        Err(map_http_error(status.as_u16(), &error_body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ChatError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(ChatError::Http)
    }

    /// Follow `has_more` / `last_id` cursors until the list is exhausted.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ChatError> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut request = self
                .request(reqwest::Method::GET, path)
                .query(&[("limit", PAGE_LIMIT.to_string())]);
            if let Some(cursor) = &after {
                request = request.query(&[("after", cursor)]);
            }

            let page: ListPage<T> = self.send_json(request).await?;
            items.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
    #[serde(default)]
    filename: Option<String>,
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_message(&self, thread_id: &str, content: &str) -> Result<(), ChatError> {
        let request = self
            .request(reqwest::Method::POST, &format!("/threads/{thread_id}/messages"))
            .json(&json!({"role": "user", "content": content}));
        let _: IdOnly = self.send_json(request).await?;
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatError> {
        self.list_all(&format!("/threads/{thread_id}/messages")).await
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, ChatError> {
        let request = self
            .request(reqwest::Method::POST, &format!("/threads/{thread_id}/runs"))
            .json(&json!({"assistant_id": assistant_id, "stream": true}));
        let response = self.send(request).await?;
        tracing::debug!("run stream opened on thread {}", thread_id);

        let bytes = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));
        let lines = FramedRead::new(
            StreamReader::new(bytes),
            LinesCodec::new_with_max_length(MAX_SSE_LINE),
        );

        let events = futures_util::stream::unfold(
            (lines, SseDecoder::default()),
            |(mut lines, mut decoder)| async move {
                loop {
                    match lines.next().await {
                        None => return None,
                        Some(Err(e)) => {
                            let err = ChatError::Stream(format!("line decode failed: {e}"));
                            return Some((Err(err), (lines, decoder)));
                        }
                        Some(Ok(line)) => match decoder.feed(&line) {
                            Some(SseOutcome::Event(event)) => {
                                return Some((Ok(event), (lines, decoder)))
                            }
                            Some(SseOutcome::Finished) => return None,
                            None => continue,
                        },
                    }
                }
            },
        );
        Ok(events.boxed())
    }

    async fn create_thread(&self) -> Result<String, ChatError> {
        let request = self.request(reqwest::Method::POST, "/threads").json(&json!({}));
        let thread: IdOnly = self.send_json(request).await?;
        Ok(thread.id)
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatError> {
        self.list_all("/assistants").await
    }

    async fn create_assistant(
        &self,
        name: &str,
        vector_store_id: &str,
    ) -> Result<Assistant, ChatError> {
        let request = self.request(reqwest::Method::POST, "/assistants").json(&json!({
            "name": name,
            "instructions": ASSISTANT_INSTRUCTIONS,
            "tools": [{"type": "file_search"}],
            "tool_resources": {"file_search": {"vector_store_ids": [vector_store_id]}},
            "model": self.model,
        }));
        self.send_json(request).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ChatError> {
        let request = self.request(reqwest::Method::DELETE, &format!("/assistants/{assistant_id}"));
        self.send(request).await?;
        Ok(())
    }

    async fn find_vector_store(&self, name: &str) -> Result<Option<VectorStore>, ChatError> {
        let stores: Vec<VectorStore> = self.list_all("/vector_stores").await?;
        Ok(stores
            .into_iter()
            .find(|s| s.name.as_deref() == Some(name)))
    }

    async fn list_store_files(&self, store_id: &str) -> Result<Vec<StoreFile>, ChatError> {
        let attached: Vec<IdOnly> = self
            .list_all(&format!("/vector_stores/{store_id}/files"))
            .await?;

        let mut files = Vec::with_capacity(attached.len());
        for file in attached {
            let request = self.request(reqwest::Method::GET, &format!("/files/{}", file.id));
            let object: FileObject = self.send_json(request).await?;
            files.push(StoreFile {
                name: object.filename.unwrap_or_else(|| object.id.clone()),
                id: object.id,
            });
        }
        Ok(files)
    }

    async fn delete_store_file(&self, store_id: &str, file_id: &str) -> Result<(), ChatError> {
        let detach = self.request(
            reqwest::Method::DELETE,
            &format!("/vector_stores/{store_id}/files/{file_id}"),
        );
        self.send(detach).await?;
        let delete = self.request(reqwest::Method::DELETE, &format!("/files/{file_id}"));
        self.send(delete).await?;
        Ok(())
    }
}

// ── SSE decoding ──────────────────────────────────────────────────────────────

/// Result of feeding one SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseOutcome {
    Event(RunEvent),
    /// The service closed the run stream.
    Finished,
}

/// Line-oriented decoder for the run event stream.
///
/// Tracks the most recent `event:` name and decodes the `data:` payload that
/// follows it. Events the chat client does not use are dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
}

impl SseDecoder {
    pub fn feed(&mut self, line: &str) -> Option<SseOutcome> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            self.event = None;
            return None;
        }
        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();
        let name = self.event.take().unwrap_or_default();
        decode_event(&name, data)
    }
}

fn decode_event(name: &str, data: &str) -> Option<SseOutcome> {
    if data == "[DONE]" {
        return Some(SseOutcome::Finished);
    }
    match name {
        "thread.message.delta" => match serde_json::from_str::<MessageDeltaEvent>(data) {
            Ok(event) => Some(SseOutcome::Event(RunEvent::MessageDelta(event.delta))),
            Err(e) => {
                tracing::warn!("undecodable message delta skipped: {}", e);
                None
            }
        },
        "thread.message.completed" => Some(SseOutcome::Event(RunEvent::MessageCompleted)),
        "thread.run.failed" | "thread.run.cancelled" | "thread.run.expired" => {
            let status = name.trim_start_matches("thread.run.");
            let detail = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|v| {
                    v.pointer("/last_error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "no details".to_string());
            Some(SseOutcome::Event(RunEvent::Error(format!("run {status}: {detail}"))))
        }
        "error" => {
            let message = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .or_else(|| v.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| truncate_body(data));
            Some(SseOutcome::Event(RunEvent::Error(message)))
        }
        "done" => Some(SseOutcome::Finished),
        other => {
            tracing::trace!("ignoring run event '{}'", other);
            None
        }
    }
}

// ── HTTP error mapping ────────────────────────────────────────────────────────

/// Char-based truncation so a multi-byte boundary never panics.
fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LEN {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{truncated}…[truncated]")
    } else {
        body.to_string()
    }
}

fn map_http_error(status: u16, body: &str) -> ChatError {
    let safe_body = truncate_body(body);

    match status {
        401 => ChatError::Api("Unauthorized: check OPENAI_API_KEY".to_string()),
        404 => ChatError::Api(format!("Not found: {safe_body}")),
        429 => ChatError::Api("Rate limited by OpenAI API".to_string()),
        s if s >= 500 => ChatError::Api(format!("OpenAI server error {s}: {safe_body}")),
        s => ChatError::Api(format!("HTTP {s}: {safe_body}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
