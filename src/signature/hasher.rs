//! Signature fingerprinting
//!
//! A fingerprint is the SHA-256 of
//! `name:<name>|type:<type>|exported:<bool>|signature:<text>`.
//! The field order and separators are part of the on-disk contract: changing
//! them invalidates every stored fingerprint.

use super::{canonicalize, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest (e.g. read from the map file)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for display
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute a stable hash for content
fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a signature in the fixed fingerprint field order
fn serialize(signature: &Signature) -> String {
    format!(
        "name:{}|type:{}|exported:{}|signature:{}",
        signature.symbol_name,
        signature.symbol_type.as_str(),
        signature.is_exported,
        signature.signature_text
    )
}

/// Fingerprint a signature
pub fn hash(signature: &Signature) -> Fingerprint {
    Fingerprint(sha256_hex(&serialize(signature)))
}

/// Fingerprint raw signature text, bypassing the symbol metadata
pub fn hash_text(raw: &str) -> Fingerprint {
    Fingerprint(sha256_hex(&canonicalize(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SymbolType;

    fn sig(text: &str) -> Signature {
        Signature::new("test", SymbolType::Function, text, true)
    }

    #[test]
    fn test_hash_is_deterministic_and_256_bit() {
        let a = hash(&sig("function test(): void"));
        let b = hash(&sig("function test(): void"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_serialization_field_order() {
        let s = sig("function test(): void");
        assert_eq!(
            serialize(&s),
            "name:test|type:function|exported:true|signature:function test(): void"
        );
        assert_eq!(hash(&s).as_str(), sha256_hex(&serialize(&s)));
    }

    #[test]
    fn test_different_signatures_different_hashes() {
        assert_ne!(
            hash(&sig("function test(): void")),
            hash(&sig("function test(): string"))
        );
    }

    #[test]
    fn test_metadata_is_part_of_the_hash() {
        let function = sig("x");
        let mut constant = function.clone();
        constant.symbol_type = SymbolType::Const;
        let mut hidden = function.clone();
        hidden.is_exported = false;

        assert_ne!(hash(&function), hash(&constant));
        assert_ne!(hash(&function), hash(&hidden));
    }

    #[test]
    fn test_hash_text_ignores_formatting() {
        assert_eq!(
            hash_text("function f(a:number)"),
            hash_text("function f( a : number ) // trailing")
        );
    }

    #[test]
    fn test_short() {
        let fp = Fingerprint::from_hex("0123456789abcdef");
        assert_eq!(fp.short(), "01234567");
        assert_eq!(Fingerprint::from_hex("abc").short(), "abc");
    }
}
