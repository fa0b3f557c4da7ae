//! Conversation history for display before a new run starts.

use crate::{
    assistant_api::AssistantApi,
    error::ChatError,
    types::{ChatMessage, ThreadMessage},
};

/// Fetch every prior message of `thread_id`, oldest first.
///
/// A missing thread id means a fresh conversation and yields no history.
pub async fn load_history(
    api: &dyn AssistantApi,
    thread_id: Option<&str>,
) -> Result<Vec<ChatMessage>, ChatError> {
    let Some(thread_id) = thread_id else {
        return Ok(Vec::new());
    };
    let messages = api.list_messages(thread_id).await?;
    tracing::debug!("loaded {} message(s) from thread {}", messages.len(), thread_id);
    Ok(flatten_history(messages))
}

/// Stable-sort by creation time and join each message's text blocks.
pub fn flatten_history(mut messages: Vec<ThreadMessage>) -> Vec<ChatMessage> {
    messages.sort_by_key(|m| m.created_at);
    messages
        .into_iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m
                .content
                .iter()
                .filter(|c| c.kind == "text")
                .filter_map(|c| c.text.as_ref())
                .map(|t| t.value.as_str())
                .collect(),
        })
        .collect()
}
