//! doctype - Documentation drift detection for TypeScript
//!
//! This library links documented code symbols to anchored regions of Markdown,
//! detects when a symbol's public signature changes, and applies exact,
//! unambiguous edits to the affected documentation.

pub mod anchor;
pub mod cli;
pub mod drift;
pub mod error;
pub mod map;
pub mod patch;
pub mod repo;
pub mod scan;
pub mod signature;

/// Re-export commonly used types
pub use drift::{DriftDetector, DriftRun, DriftStatus};
pub use error::{Error, Result};
pub use map::{CodeRef, DocRef, Entry, MapManager};
pub use patch::Document;
pub use repo::Project;
pub use signature::{Fingerprint, Signature, SignatureExtractor, SymbolType};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "doctype";
