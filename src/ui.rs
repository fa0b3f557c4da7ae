//! Response generator for chat widgets.
//!
//! Widgets re-render the whole assistant message on every tick, so the
//! fragment sequence is turned into a stream of growing snapshots.

use futures_util::Stream;

use crate::handler::Fragments;
use crate::types::{ChatMessage, Role};

/// Cumulative response text, one snapshot per fragment.
pub fn cumulative(fragments: Fragments) -> impl Stream<Item = String> + Send {
    futures_util::stream::unfold(
        (fragments, String::new()),
        |(mut fragments, mut response)| async move {
            let fragment = fragments.next().await?;
            response.push_str(&fragment);
            Some((response.clone(), (fragments, response)))
        },
    )
}

/// Part of `snapshot` not yet shown, given `shown` bytes already rendered.
pub fn unseen_suffix(snapshot: &str, shown: usize) -> &str {
    snapshot.get(shown..).unwrap_or("")
}

/// Render prior messages as a markdown transcript.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "**You**",
                Role::Assistant => "**Assistant**",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
