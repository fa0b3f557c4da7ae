//! Stream event handler: turns run deltas into ordered, citation-resolved
//! text fragments.
//!
//! The handler is split in two halves joined by an unbounded FIFO channel:
//!
//! ```text
//! run task ──on_delta/on_done──▶ StreamHandler ──tx──▶ [ channel ] ──rx──▶ Fragments ──next()──▶ caller
//! ```
//!
//! [`StreamHandler`] is the single producer. It owns the annotation table and
//! is moved into the background run task. [`Fragments`] is the single
//! consumer; it waits in bounded slices so the caller can stop pulling at any
//! time.
//!
//! # Invariants
//! - Fragments are yielded in exactly the order they were pushed.
//! - After `on_done` the bibliography is the last fragment; nothing follows it.
//! - `Active → Inactive` happens once and never reverts.
//! - Citation indices are assigned by first citation and never reassigned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::{
    config::DEFAULT_POLL_INTERVAL,
    formatter::CitationFormatter,
    types::{AnnotationTable, FileRegistry, MessageDelta},
};

/// Item carried by the output channel.
#[derive(Debug)]
enum ChannelItem {
    Text(String),
    /// Terminal sentinel: the run ended without a bibliography.
    End,
}

/// Create a connected producer/consumer pair for one run.
pub fn stream_handler(
    files: Arc<FileRegistry>,
    formatter: Arc<dyn CitationFormatter>,
    poll_interval: Duration,
) -> (StreamHandler, Fragments) {
    let (tx, rx) = mpsc::unbounded_channel();
    let active = Arc::new(AtomicBool::new(true));

    let handler = StreamHandler {
        files,
        formatter,
        annotations: AnnotationTable::new(),
        tx: Some(tx),
        active: Arc::clone(&active),
    };
    let fragments = Fragments {
        rx,
        active,
        poll_interval,
        exhausted: false,
    };
    (handler, fragments)
}

// ── Producer ──────────────────────────────────────────────────────────────────

/// Producer half: receives run events and enqueues display fragments.
pub struct StreamHandler {
    files: Arc<FileRegistry>,
    formatter: Arc<dyn CitationFormatter>,
    annotations: AnnotationTable,
    /// `None` once inactive; dropping the sender closes the channel.
    tx: Option<mpsc::UnboundedSender<ChannelItem>>,
    active: Arc<AtomicBool>,
}

impl StreamHandler {
    /// Handler/consumer pair with the default one-second poll interval.
    pub fn new(
        files: Arc<FileRegistry>,
        formatter: Arc<dyn CitationFormatter>,
    ) -> (Self, Fragments) {
        stream_handler(files, formatter, DEFAULT_POLL_INTERVAL)
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    /// Citation numbering assigned so far.
    pub fn annotations(&self) -> &AnnotationTable {
        &self.annotations
    }

    /// Resolve the citations of one delta and enqueue its text as one fragment.
    ///
    /// Annotations are numbered in the order given. Every occurrence of each
    /// raw marker is replaced in every text block of this delta. Two distinct
    /// markers citing the same file are substituted independently, so they
    /// render as `"[1] [1]"`; they are never merged.
    ///
    /// Annotations that are not complete file citations are skipped; the
    /// surrounding text is still emitted.
    pub fn on_delta(&mut self, delta: &MessageDelta) {
        if !self.is_active() {
            tracing::debug!("delta received after completion, ignoring");
            return;
        }

        // marker → formatted citation, scoped to this delta
        let mut pending: Vec<(&str, String)> = Vec::new();

        for block in delta.content.iter().filter_map(|b| b.as_text()) {
            for annotation in &block.annotations {
                match annotation.as_file_citation() {
                    Some((marker, file_id)) => {
                        let index = self.annotations.cite(file_id);
                        pending.push((marker, self.formatter.format_citation(index)));
                    }
                    None if annotation.kind == "file_citation" => {
                        tracing::warn!(
                            "skipping file citation without marker text or file id: {:?}",
                            annotation
                        );
                    }
                    None => {
                        tracing::debug!("ignoring '{}' annotation", annotation.kind);
                    }
                }
            }
        }

        let fragment: String = delta
            .content
            .iter()
            .filter_map(|b| b.as_text())
            .map(|block| {
                let mut text = block.value.clone().unwrap_or_default();
                for (marker, citation) in &pending {
                    text = text.replace(marker, citation);
                }
                text
            })
            .collect();

        self.push(ChannelItem::Text(fragment));
    }

    /// Enqueue the bibliography and become inactive.
    pub fn on_done(&mut self) {
        if !self.is_active() {
            tracing::debug!("duplicate completion ignored");
            return;
        }
        let references = self
            .formatter
            .format_references(&self.annotations, &self.files);
        self.push(ChannelItem::Text(references));
        self.deactivate();
        tracing::debug!("run complete: {} file(s) cited", self.annotations.len());
    }

    /// Terminate without a bibliography after an upstream failure.
    pub fn abort(&mut self, reason: &str) {
        if !self.is_active() {
            return;
        }
        tracing::warn!("run aborted: {}", reason);
        self.push(ChannelItem::End);
        self.deactivate();
    }

    fn push(&self, item: ChannelItem) {
        if let Some(tx) = &self.tx {
            // Consumer gone: the run keeps going to natural completion.
            if tx.send(item).is_err() {
                tracing::trace!("fragment consumer dropped");
            }
        }
    }

    fn deactivate(&mut self) {
        self.active.store(false, Ordering::Release);
        self.tx = None;
    }
}

impl Drop for StreamHandler {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

// ── Consumer ──────────────────────────────────────────────────────────────────

/// Consumer half: a lazy, single-pass sequence of fragments.
pub struct Fragments {
    rx: mpsc::UnboundedReceiver<ChannelItem>,
    active: Arc<AtomicBool>,
    poll_interval: Duration,
    exhausted: bool,
}

impl Fragments {
    /// Next fragment in enqueue order, or `None` once the run has finished
    /// and every fragment has been drained.
    ///
    /// Waits at most `poll_interval` per attempt; an elapsed wait is retried.
    /// After the first `None` every later call returns `None` immediately.
    pub async fn next(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }
        loop {
            match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
                Ok(Some(ChannelItem::Text(text))) => return Some(text),
                Ok(Some(ChannelItem::End)) | Ok(None) => {
                    self.finish();
                    return None;
                }
                Err(_elapsed) => {
                    if !self.active.load(Ordering::Acquire) && self.rx.is_empty() {
                        self.finish();
                        return None;
                    }
                }
            }
        }
    }

    /// Whether the producer is still receiving events.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Drain every remaining fragment.
    pub async fn collect_all(mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(fragment) = self.next().await {
            out.push(fragment);
        }
        out
    }

    /// Adapt into a [`Stream`] of fragments.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send {
        futures_util::stream::unfold(self, |mut fragments| async move {
            fragments.next().await.map(|f| (f, fragments))
        })
    }

    fn finish(&mut self) {
        self.exhausted = true;
        self.rx.close();
    }
}
