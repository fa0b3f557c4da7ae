//! Run driver: binds one prompt to one streaming run.
//!
//! `submit` posts the user message, spawns a tokio task that opens the run
//! stream and feeds a fresh [`StreamHandler`], and hands the consumer half
//! back immediately so the caller can start draining while the run is still
//! in flight.
//!
//! The run stream is owned by the task and dropped when the task returns, so
//! the HTTP connection is released on completion and on every error path,
//! whether or not anyone is still pulling fragments.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::{
    assistant_api::{AssistantApi, RunEventStream},
    config::{DEFAULT_POLL_INTERVAL, MAX_PROMPT_LENGTH},
    error::ChatError,
    formatter::CitationFormatter,
    handler::{stream_handler, Fragments, StreamHandler},
    types::{FileRegistry, RunEvent},
};

/// Starts runs on one thread/assistant pair.
#[derive(Clone)]
pub struct RunDriver {
    api: Arc<dyn AssistantApi>,
    thread_id: String,
    assistant_id: String,
    files: Arc<FileRegistry>,
    poll_interval: Duration,
}

impl RunDriver {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        thread_id: impl Into<String>,
        assistant_id: impl Into<String>,
        files: Arc<FileRegistry>,
    ) -> Self {
        Self {
            api,
            thread_id: thread_id.into(),
            assistant_id: assistant_id.into(),
            files,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Send `prompt` and start streaming the assistant's answer.
    ///
    /// Returns as soon as the background run is spawned; the answer arrives
    /// through [`RunHandle::next`].
    ///
    /// # Errors
    /// [`ChatError::InputValidation`] for empty or oversized prompts; any
    /// error from posting the user message. Failures of the run itself are
    /// reported by [`RunHandle::finish`].
    pub async fn submit(
        &self,
        prompt: &str,
        formatter: Arc<dyn CitationFormatter>,
    ) -> Result<RunHandle, ChatError> {
        let prompt = validate_prompt(prompt)?;

        self.api.create_message(&self.thread_id, prompt).await?;

        let (handler, fragments) =
            stream_handler(Arc::clone(&self.files), formatter, self.poll_interval);

        let api = Arc::clone(&self.api);
        let thread_id = self.thread_id.clone();
        let assistant_id = self.assistant_id.clone();
        let task = tokio::spawn(async move {
            let result = drive_run(api, &thread_id, &assistant_id, handler).await;
            if let Err(e) = &result {
                tracing::error!("run on thread {} failed: {}", thread_id, e);
            }
            result
        });

        Ok(RunHandle { fragments, task })
    }
}

/// Reject prompts the service would refuse.
pub fn validate_prompt(prompt: &str) -> Result<&str, ChatError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InputValidation(
            "Prompt cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_PROMPT_LENGTH {
        return Err(ChatError::InputValidation(format!(
            "Prompt exceeds {MAX_PROMPT_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

/// Open the run stream and feed every event into `handler`.
///
/// Ends the handler exactly once: `on_done` on message completion, `abort`
/// on any failure or premature end of stream.
pub async fn drive_run(
    api: Arc<dyn AssistantApi>,
    thread_id: &str,
    assistant_id: &str,
    mut handler: StreamHandler,
) -> Result<(), ChatError> {
    let events = match api.stream_run(thread_id, assistant_id).await {
        Ok(events) => events,
        Err(e) => {
            handler.abort(&e.to_string());
            return Err(e);
        }
    };
    feed_events(events, &mut handler).await
}

async fn feed_events(
    mut events: RunEventStream,
    handler: &mut StreamHandler,
) -> Result<(), ChatError> {
    while let Some(event) = events.next().await {
        match event {
            Ok(RunEvent::MessageDelta(delta)) => handler.on_delta(&delta),
            Ok(RunEvent::MessageCompleted) => {
                handler.on_done();
                drain_trailing(events).await;
                return Ok(());
            }
            Ok(RunEvent::Error(message)) => {
                handler.abort(&message);
                return Err(ChatError::Stream(message));
            }
            Err(e) => {
                handler.abort(&e.to_string());
                return Err(e);
            }
        }
    }

    let reason = "stream ended before the message completed";
    handler.abort(reason);
    Err(ChatError::Stream(reason.to_string()))
}

/// Let the run reach its natural end after the answer is complete.
async fn drain_trailing(mut events: RunEventStream) {
    while let Some(event) = events.next().await {
        if let Err(e) = event {
            tracing::warn!("run stream error after completion: {}", e);
            break;
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Caller's side of one submitted prompt.
pub struct RunHandle {
    fragments: Fragments,
    task: JoinHandle<Result<(), ChatError>>,
}

impl RunHandle {
    /// Next answer fragment; see [`Fragments::next`].
    pub async fn next(&mut self) -> Option<String> {
        self.fragments.next().await
    }

    /// Wait for the background run and report how it ended.
    ///
    /// Remaining fragments are discarded; the run itself is never cancelled.
    pub async fn finish(self) -> Result<(), ChatError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ChatError::Stream(format!("run task failed: {e}"))),
        }
    }

    /// Split into the fragment sequence and the background task.
    pub fn into_parts(self) -> (Fragments, JoinHandle<Result<(), ChatError>>) {
        (self.fragments, self.task)
    }
}
