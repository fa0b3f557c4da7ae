//! Citation and bibliography formatting for the two output surfaces.
//!
//! Both formatters number identically; only the markup differs. Formatting is
//! pure: the output depends on the arguments alone.

use crate::types::{AnnotationTable, FileRegistry};

/// Turns citation indices and the final annotation table into display text.
pub trait CitationFormatter: Send + Sync {
    /// Inline replacement for a citation marker.
    fn format_citation(&self, index: usize) -> String;

    /// Trailing bibliography for every file cited during the run.
    ///
    /// An empty table yields an empty string.
    fn format_references(&self, table: &AnnotationTable, files: &FileRegistry) -> String;
}

/// Plain text for the terminal: `[1]` inline, `[1] paper.pdf` per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleFormatter;

impl CitationFormatter for ConsoleFormatter {
    fn format_citation(&self, index: usize) -> String {
        format!("[{index}]")
    }

    fn format_references(&self, table: &AnnotationTable, files: &FileRegistry) -> String {
        table
            .iter()
            .map(|(i, id)| format!("[{i}] {}", files.display_name(id)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Markdown for chat widgets: superscript citations and a bold references header.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl CitationFormatter for MarkdownFormatter {
    fn format_citation(&self, index: usize) -> String {
        format!("<sup>[{index}]</sup>")
    }

    fn format_references(&self, table: &AnnotationTable, files: &FileRegistry) -> String {
        if table.is_empty() {
            return String::new();
        }
        let lines = table
            .iter()
            .map(|(i, id)| format!("[{i}] {}", files.display_name(id)))
            .collect::<Vec<_>>()
            // trailing double space forces a markdown line break
            .join("  \n");
        format!("\n\n**References**\n{lines}")
    }
}
