//! Shared types: assistant-service wire payloads and the citation data model.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Streaming payloads ────────────────────────────────────────────────────────

/// One event of a streaming assistant run, already decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Incremental text and/or citation annotations of the message being written.
    MessageDelta(MessageDelta),
    /// The message is complete; no further deltas follow for it.
    MessageCompleted,
    /// The service reported a failure in-band.
    Error(String),
}

/// Envelope of a `thread.message.delta` SSE payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub delta: MessageDelta,
}

/// The `delta` object: zero or more content blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<DeltaContent>,
}

impl MessageDelta {
    /// A delta holding a single text block.
    pub fn text(value: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            content: vec![DeltaContent::text(0, value, annotations)],
        }
    }
}

/// A single content block of a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaContent {
    #[serde(default)]
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<DeltaText>,
}

impl DeltaContent {
    pub fn text(index: u32, value: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            index,
            kind: "text".to_string(),
            text: Some(DeltaText {
                value: Some(value.into()),
                annotations,
            }),
        }
    }

    /// Text payload of this block, `None` for non-text blocks.
    pub fn as_text(&self) -> Option<&DeltaText> {
        if self.kind == "text" {
            self.text.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_annotations")]
    pub annotations: Vec<Annotation>,
}

/// An annotation attached to a text block.
///
/// Every field is optional on the wire; [`Annotation::file_citation`] decides
/// whether the annotation is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Raw marker as it appears in the text, e.g. `【4:0†source】`.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_citation: Option<FileCitation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCitation {
    #[serde(default)]
    pub file_id: Option<String>,
}

impl Annotation {
    pub fn file_citation(marker: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            kind: "file_citation".to_string(),
            text: Some(marker.into()),
            file_citation: Some(FileCitation {
                file_id: Some(file_id.into()),
            }),
        }
    }

    /// `(marker, file_id)` when this is a complete file citation.
    pub fn as_file_citation(&self) -> Option<(&str, &str)> {
        if self.kind != "file_citation" {
            return None;
        }
        let marker = self.text.as_deref().filter(|m| !m.is_empty())?;
        let file_id = self
            .file_citation
            .as_ref()
            .and_then(|c| c.file_id.as_deref())
            .filter(|id| !id.is_empty())?;
        Some((marker, file_id))
    }
}

/// Decode annotations one by one so a single malformed entry is dropped
/// instead of failing the whole delta.
fn lenient_annotations<'de, D>(deserializer: D) -> Result<Vec<Annotation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Annotation>(value) {
            Ok(a) => Some(a),
            Err(e) => {
                tracing::warn!("dropping malformed annotation: {}", e);
                None
            }
        })
        .collect())
}

// ── Thread history ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

/// A stored message of a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<MessageText>,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(MessageText {
                value: value.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
}

/// One entry of the displayed conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

// ── Remote resources ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A file attached to a vector store, with its display name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    pub id: String,
    pub name: String,
}

// ── Citation data model ───────────────────────────────────────────────────────

/// File id → display name for the connected vector store.
///
/// Built once per session and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    names: HashMap<String, String>,
}

impl FileRegistry {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Display name of `file_id`, or the raw id when the file is unknown.
    pub fn display_name<'a>(&'a self, file_id: &'a str) -> &'a str {
        self.names.get(file_id).map(String::as_str).unwrap_or(file_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<StoreFile>> for FileRegistry {
    fn from(files: Vec<StoreFile>) -> Self {
        Self::new(files.into_iter().map(|f| (f.id, f.name)).collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FileRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Cited file → citation index, numbered by first citation.
///
/// # Invariants
/// - Indices start at 1 and are dense: the n-th distinct file cited gets `n`.
/// - Append-only: an index, once assigned, never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTable {
    order: Vec<String>,
    index: HashMap<String, usize>,
}

impl AnnotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `file_id`, assigning `len() + 1` on first citation.
    pub fn cite(&mut self, file_id: &str) -> usize {
        if let Some(&i) = self.index.get(file_id) {
            return i;
        }
        self.order.push(file_id.to_string());
        let i = self.order.len();
        self.index.insert(file_id.to_string(), i);
        i
    }

    pub fn get(&self, file_id: &str) -> Option<usize> {
        self.index.get(file_id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(index, file_id)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.order
            .iter()
            .enumerate()
            .map(|(i, id)| (i + 1, id.as_str()))
    }
}
