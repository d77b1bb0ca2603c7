//! Drift detection engine
//!
//! Documentation drifts when the signature of the symbol it describes changes.
//! Each stored entry is re-extracted, re-hashed and compared with the
//! fingerprint recorded when the docs were last written.

mod detector;

pub use detector::DriftDetector;

use crate::map::{Entry, MapManager};
use crate::signature::{Fingerprint, Signature};
use serde::Serialize;

/// Classification of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DriftStatus {
    /// Fingerprint unchanged
    Stable,
    /// Fingerprint changed since the docs were written
    #[serde(rename_all = "camelCase")]
    Drifted {
        old_fingerprint: Fingerprint,
        new_fingerprint: Fingerprint,
        /// Rebuilt from the stored signature text when available
        old_signature: Option<Signature>,
        new_signature: Signature,
    },
    /// The symbol could not be analyzed
    Unresolvable { reason: String },
}

impl DriftStatus {
    pub fn is_stable(&self) -> bool {
        matches!(self, DriftStatus::Stable)
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self, DriftStatus::Drifted { .. })
    }

    pub fn is_unresolvable(&self) -> bool {
        matches!(self, DriftStatus::Unresolvable { .. })
    }
}

impl std::fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftStatus::Stable => write!(f, "STABLE"),
            DriftStatus::Drifted { .. } => write!(f, "DRIFTED"),
            DriftStatus::Unresolvable { .. } => write!(f, "UNRESOLVED"),
        }
    }
}

/// Result for a single entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDrift {
    pub entry_id: String,
    #[serde(flatten)]
    pub status: DriftStatus,
}

/// A per-entry failure that did not stop the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub entry_id: String,
    pub file_path: String,
    pub message: String,
}

/// Flat description of one drifted entry, for reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub id: String,
    pub symbol_name: String,
    pub code_file_path: String,
    pub doc_file_path: String,
    /// 1-based line of the anchor start marker
    pub doc_line: usize,
    pub old_fingerprint: Fingerprint,
    pub new_fingerprint: Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_signature: Option<String>,
    pub new_signature: String,
}

impl DriftReport {
    fn new(entry: &Entry, status: &DriftStatus) -> Option<Self> {
        let DriftStatus::Drifted {
            old_fingerprint,
            new_fingerprint,
            old_signature,
            new_signature,
        } = status
        else {
            return None;
        };

        Some(Self {
            id: entry.id.clone(),
            symbol_name: entry.code_ref.symbol_name.clone(),
            code_file_path: entry.code_ref.file_path.clone(),
            doc_file_path: entry.doc_ref.file_path.clone(),
            doc_line: entry.doc_ref.start_line + 1,
            old_fingerprint: old_fingerprint.clone(),
            new_fingerprint: new_fingerprint.clone(),
            old_signature: old_signature.as_ref().map(|s| s.signature_text.clone()),
            new_signature: new_signature.signature_text.clone(),
        })
    }
}

/// Counts over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriftSummary {
    pub total: usize,
    pub stable: usize,
    pub drifted: usize,
    pub unresolved: usize,
    pub errors: usize,
}

/// Outcome of checking every entry
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftRun {
    /// One result per entry, in store order
    pub results: Vec<EntryDrift>,
    pub errors: Vec<RunError>,
}

impl DriftRun {
    pub fn summary(&self) -> DriftSummary {
        DriftSummary {
            total: self.results.len(),
            stable: self.results.iter().filter(|r| r.status.is_stable()).count(),
            drifted: self.results.iter().filter(|r| r.status.is_drifted()).count(),
            unresolved: self
                .results
                .iter()
                .filter(|r| r.status.is_unresolvable())
                .count(),
            errors: self.errors.len(),
        }
    }

    /// No drift and nothing unresolved
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| r.status.is_stable())
    }

    /// Result for one entry
    pub fn status_of(&self, entry_id: &str) -> Option<&DriftStatus> {
        self.results
            .iter()
            .find(|r| r.entry_id == entry_id)
            .map(|r| &r.status)
    }

    /// Reports for every drifted entry
    pub fn reports(&self, store: &MapManager) -> Vec<DriftReport> {
        self.results
            .iter()
            .filter_map(|r| {
                let entry = store.entry_by_id(&r.entry_id)?;
                DriftReport::new(entry, &r.status)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SymbolType;

    fn drifted() -> DriftStatus {
        DriftStatus::Drifted {
            old_fingerprint: Fingerprint::from_hex("aaaa"),
            new_fingerprint: Fingerprint::from_hex("bbbb"),
            old_signature: None,
            new_signature: Signature::new("add", SymbolType::Function, "function add()", true),
        }
    }

    #[test]
    fn test_summary_counts_each_status() {
        let run = DriftRun {
            results: vec![
                EntryDrift {
                    entry_id: "a".into(),
                    status: DriftStatus::Stable,
                },
                EntryDrift {
                    entry_id: "b".into(),
                    status: drifted(),
                },
                EntryDrift {
                    entry_id: "c".into(),
                    status: DriftStatus::Unresolvable {
                        reason: "file not found".into(),
                    },
                },
            ],
            errors: Vec::new(),
        };

        let summary = run.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.stable, 1);
        assert_eq!(summary.drifted, 1);
        assert_eq!(summary.unresolved, 1);
        assert!(!run.is_clean());
        assert!(run.status_of("b").unwrap().is_drifted());
    }

    #[test]
    fn test_unresolved_only_is_not_clean() {
        let run = DriftRun {
            results: vec![EntryDrift {
                entry_id: "a".into(),
                status: DriftStatus::Unresolvable {
                    reason: "symbol not found".into(),
                },
            }],
            errors: Vec::new(),
        };
        assert_eq!(run.summary().drifted, 0);
        assert!(!run.is_clean());
    }

    #[test]
    fn test_status_serializes_tagged() {
        let json = serde_json::to_value(EntryDrift {
            entry_id: "e1".into(),
            status: drifted(),
        })
        .unwrap();
        assert_eq!(json["entryId"], "e1");
        assert_eq!(json["status"], "drifted");
        assert_eq!(json["oldFingerprint"], "aaaa");
    }
}
