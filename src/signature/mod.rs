//! Signature extraction, canonicalization and fingerprinting
//!
//! This module turns TypeScript source into stable fingerprints:
//! - Exported symbols are extracted with tree-sitter
//! - Their signature text is canonicalized so formatting does not matter
//! - The canonical form is hashed with SHA-256

pub mod canonical;
pub mod extractor;
pub mod hasher;

pub use canonical::canonicalize;
pub use extractor::{Language, SignatureExtractor};
pub use hasher::{hash, hash_text, Fingerprint};

use serde::{Deserialize, Serialize};

/// Kind of exported symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "class")]
    Class,
    #[serde(rename = "interface")]
    Interface,
    #[serde(rename = "type")]
    TypeAlias,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "variable")]
    Variable,
    #[serde(rename = "const")]
    Const,
}

impl SymbolType {
    /// Stable lower-case name, also used in fingerprint input
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Class => "class",
            SymbolType::Interface => "interface",
            SymbolType::TypeAlias => "type",
            SymbolType::Enum => "enum",
            SymbolType::Variable => "variable",
            SymbolType::Const => "const",
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The public shape of one exported symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// Declared name (`default` for anonymous default exports)
    pub symbol_name: String,
    /// Kind of symbol
    pub symbol_type: SymbolType,
    /// Canonical signature text
    pub signature_text: String,
    /// Whether the symbol is exported
    pub is_exported: bool,
}

impl Signature {
    /// Create a signature, canonicalizing the raw text
    pub fn new(symbol_name: &str, symbol_type: SymbolType, raw_text: &str, is_exported: bool) -> Self {
        Self {
            symbol_name: symbol_name.to_string(),
            symbol_type,
            signature_text: canonicalize(raw_text),
            is_exported,
        }
    }

    /// Fingerprint of this signature
    pub fn fingerprint(&self) -> Fingerprint {
        hash(self)
    }
}

/// Find the first signature with the given symbol name
pub fn find_symbol<'a>(signatures: &'a [Signature], symbol_name: &str) -> Option<&'a Signature> {
    signatures.iter().find(|s| s.symbol_name == symbol_name)
}
