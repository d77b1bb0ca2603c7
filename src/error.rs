//! Error types for the drift-detection core
//!
//! Per-entry failures (parse, missing file, missing symbol) are carried as
//! data by the drift detector; only persistence failures abort a run.

use std::path::PathBuf;

/// Result alias used by the core modules
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by extraction, anchors, patching and the entry store
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source text could not be parsed
    #[error("parse error in {}: {reason}", file.display())]
    Parse { file: PathBuf, reason: String },

    /// The referenced symbol is not exported by the file
    ///
    /// Renders as the bare `Unresolvable` reason.
    #[error("symbol not found")]
    SymbolNotFound { file: PathBuf, symbol: String },

    /// The referenced source file does not exist
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A code reference without a `#` separator
    #[error("malformed code reference `{reference}`: expected `<file>#<symbol>`")]
    MalformedRef { reference: String },

    /// An anchor marker that cannot be paired or is otherwise invalid
    #[error("malformed anchor at line {}: {reason}", line + 1)]
    MalformedAnchor { line: usize, reason: String },

    /// No anchor carries the requested id
    #[error("anchor not found: {id}")]
    AnchorNotFound { id: String },

    /// The snippet to replace matches more than one location
    #[error("snippet found {count} times in the document; add more surrounding context so it matches exactly one location")]
    AmbiguousSnippet { count: usize },

    /// The snippet to replace does not occur in the document
    #[error("snippet not found in the document")]
    SnippetNotFound,

    /// No entry carries the requested id
    #[error("entry not found: {id}")]
    EntryNotFound { id: String },

    /// Reading or writing the entry collection failed
    #[error("failed to persist {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    /// No grammar is registered for this file extension
    #[error("unsupported language: .{ext}")]
    UnsupportedLanguage { ext: String },

    /// Underlying I/O error
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error for a file
    pub fn parse(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error for the entry collection
    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_snippet_names_count() {
        let err = Error::AmbiguousSnippet { count: 2 };
        assert!(err.to_string().contains("2 times"));
    }

    #[test]
    fn test_malformed_anchor_reports_one_based_line() {
        let err = Error::MalformedAnchor {
            line: 4,
            reason: "unterminated start marker".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed anchor at line 5: unterminated start marker"
        );
    }

    #[test]
    fn test_symbol_not_found_reason_is_fixed() {
        let err = Error::SymbolNotFound {
            file: PathBuf::from("src/math.ts"),
            symbol: "add".to_string(),
        };
        assert_eq!(err.to_string(), "symbol not found");
    }
}
