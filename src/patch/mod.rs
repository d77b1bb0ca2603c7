//! Surgical documentation patches
//!
//! A patch replaces one exact snippet in a [`Document`] and refuses to act when
//! the snippet is missing or occurs more than once. Nothing is written to disk
//! until [`Document::save`] is called.

use crate::error::{Error, Result};
use serde::Serialize;
use similar::TextDiff;
use std::path::{Path, PathBuf};

/// An owned, mutable documentation buffer
#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    content: String,
    dirty: bool,
}

impl Document {
    /// In-memory document with no backing file
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            path: None,
            content: content.into(),
            dirty: false,
        }
    }

    /// Read a document from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            content,
            dirty: false,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the buffer changed since it was opened or last saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the whole buffer
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.content = content;
            self.dirty = true;
        }
    }

    /// Write the buffer back to its file if it changed
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            std::fs::write(path, &self.content)?;
            tracing::debug!("Wrote {}", path.display());
        }
        self.dirty = false;
        Ok(())
    }

    /// Unified diff from `before` to the current buffer
    pub fn diff(&self, before: &str) -> String {
        let name = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "document".to_string());

        TextDiff::from_lines(before, self.content.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", name), &format!("b/{}", name))
            .to_string()
    }
}

/// What [`apply`] had to do to make the snippet match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    /// The match only succeeded after CRLF to LF normalization;
    /// the buffer is now LF-only.
    pub normalized: bool,
}

/// Caller-facing patch result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<PatchOutcome>> for PatchResult {
    fn from(result: Result<PatchOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                message: Some(if outcome.normalized {
                    "patched (line endings normalized to LF)".to_string()
                } else {
                    "patched".to_string()
                }),
                error: None,
            },
            Err(e) => Self {
                success: false,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Replace the single occurrence of `original` with `replacement`
///
/// Counts exact matches first; only when there are none does it retry with
/// CRLF normalized to LF on both sides. Uniqueness is checked on whichever
/// variant matched. On error the document is untouched.
pub fn apply(doc: &mut Document, original: &str, replacement: &str) -> Result<PatchOutcome> {
    if original.is_empty() {
        return Err(Error::SnippetNotFound);
    }

    match count_occurrences(&doc.content, original) {
        1 => {
            let patched = doc.content.replacen(original, replacement, 1);
            doc.set_content(patched);
            return Ok(PatchOutcome { normalized: false });
        }
        0 => {}
        count => return Err(Error::AmbiguousSnippet { count }),
    }

    let content = doc.content.replace("\r\n", "\n");
    let original = original.replace("\r\n", "\n");
    let replacement = replacement.replace("\r\n", "\n");

    match count_occurrences(&content, &original) {
        0 => Err(Error::SnippetNotFound),
        1 => {
            doc.set_content(content.replacen(original.as_str(), &replacement, 1));
            tracing::debug!("Patched after normalizing line endings");
            Ok(PatchOutcome { normalized: true })
        }
        count => Err(Error::AmbiguousSnippet { count }),
    }
}

/// Count matches of `needle`, including ones that overlap
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    let step = needle.chars().next().map_or(1, char::len_utf8);
    let mut count = 0;
    let mut pos = 0;
    while let Some(hit) = haystack[pos..].find(needle) {
        count += 1;
        pos += hit + step;
    }
    count
}
