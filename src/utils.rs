use std::path::Path;

use crate::error::Result;

/// Reads a file and returns its content. Abstracted so the webhook secret
/// source is swappable (local disk vs. a mounted secret volume).
pub trait FileReader: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
}

/// FileReader backed by the local filesystem.
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }
}

/// Escape a response message for safe inclusion in an HTML context.
/// Response bodies are plain text but must never reflect payload content
/// verbatim.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a label set for log and response messages, e.g. `[self-hosted, Linux]`.
pub fn format_labels(labels: &[String]) -> String {
    format!("[{}]", labels.join(", "))
}
