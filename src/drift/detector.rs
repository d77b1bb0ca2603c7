//! Main drift detection engine
//!
//! Analyzes each referenced source file once, then classifies every entry
//! against its stored fingerprint.

use super::{DriftRun, DriftStatus, EntryDrift, RunError};
use crate::error::{Error, Result};
use crate::map::{Entry, MapManager};
use crate::signature::{find_symbol, Signature, SignatureExtractor};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of files analyzed at once
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Drift detection engine
#[derive(Debug, Clone)]
pub struct DriftDetector {
    /// Directory that `CodeRef` file paths are relative to
    base_path: PathBuf,
    concurrency: usize,
}

impl DriftDetector {
    /// Create a detector resolving code paths against `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit how many files are analyzed concurrently
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Check a single entry synchronously
    pub fn check_entry(
        &self,
        extractor: &mut SignatureExtractor,
        entry: &Entry,
        store: &MapManager,
    ) -> DriftStatus {
        let analysis = extractor.extract_file(&self.base_path.join(&entry.code_ref.file_path));
        classify(entry, &analysis, store).0
    }

    /// Check every entry in the store
    ///
    /// Files are analyzed in parallel on the blocking pool, bounded by the
    /// configured concurrency. Results come back in store order. A failure on
    /// one file only affects the entries that reference it.
    pub async fn detect_all(&self, store: &MapManager) -> DriftRun {
        let mut seen = HashSet::new();
        let files: Vec<String> = store
            .entries()
            .iter()
            .map(|e| e.code_ref.file_path.clone())
            .filter(|f| seen.insert(f.clone()))
            .collect();

        tracing::info!(
            "Checking {} entries across {} files",
            store.len(),
            files.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for file in files {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let path = self.base_path.join(&file);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let analysis = SignatureExtractor::new().and_then(|mut x| x.extract_file(&path));
                (file, analysis)
            });
        }

        let mut analyses: HashMap<String, Result<Vec<Signature>>> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((file, analysis)) => {
                    analyses.insert(file, analysis);
                }
                Err(e) => tracing::warn!("Analysis task failed: {}", e),
            }
        }

        let mut run = DriftRun::default();
        for entry in store.entries() {
            let (status, error) = match analyses.get(&entry.code_ref.file_path) {
                Some(analysis) => classify(entry, analysis, store),
                None => (
                    DriftStatus::Unresolvable {
                        reason: "analysis did not complete".to_string(),
                    },
                    None,
                ),
            };

            if let Some(error) = error {
                run.errors.push(error);
            }
            run.results.push(EntryDrift {
                entry_id: entry.id.clone(),
                status,
            });
        }

        let summary = run.summary();
        tracing::info!(
            "Drift check complete: {} stable, {} drifted, {} unresolved",
            summary.stable,
            summary.drifted,
            summary.unresolved
        );

        run
    }
}

/// Classify one entry given the analysis of its file
fn classify(
    entry: &Entry,
    analysis: &Result<Vec<Signature>>,
    store: &MapManager,
) -> (DriftStatus, Option<RunError>) {
    let signatures = match analysis {
        Ok(signatures) => signatures,
        Err(Error::FileNotFound { .. }) => {
            tracing::warn!(
                "{}: file not found: {}",
                entry.id,
                entry.code_ref.file_path
            );
            return (unresolvable("file not found"), None);
        }
        Err(e) => {
            tracing::warn!("{}: {}", entry.id, e);
            let error = RunError {
                entry_id: entry.id.clone(),
                file_path: entry.code_ref.file_path.clone(),
                message: e.to_string(),
            };
            return (unresolvable(e.to_string()), Some(error));
        }
    };

    let Some(current) = find_symbol(signatures, &entry.code_ref.symbol_name) else {
        let err = Error::SymbolNotFound {
            file: entry.code_ref.file_path.clone().into(),
            symbol: entry.code_ref.symbol_name.clone(),
        };
        tracing::warn!("{}: {}: {}", entry.id, err, entry.code_ref);
        return (unresolvable(err.to_string()), None);
    };

    let new_fingerprint = current.fingerprint();
    if !store.has_drift(&entry.id, &new_fingerprint) {
        return (DriftStatus::Stable, None);
    }

    tracing::debug!(
        "{} drifted: {} -> {}",
        entry.code_ref,
        entry.code_signature_hash.short(),
        new_fingerprint.short()
    );

    // The stored text has no type of its own; assume the symbol kept its kind.
    let old_signature = entry
        .code_signature_text
        .as_ref()
        .map(|text| Signature {
            symbol_name: current.symbol_name.clone(),
            symbol_type: current.symbol_type,
            signature_text: text.clone(),
            is_exported: current.is_exported,
        });

    let status = DriftStatus::Drifted {
        old_fingerprint: entry.code_signature_hash.clone(),
        new_fingerprint,
        old_signature,
        new_signature: current.clone(),
    };
    (status, None)
}

fn unresolvable(reason: impl Into<String>) -> DriftStatus {
    DriftStatus::Unresolvable {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CodeRef, DocRef};
    use tempfile::TempDir;

    const ORIGINAL: &str = "export function add(a: number, b: number): number {\n  return a + b;\n}\n";

    fn entry_for(id: &str, file: &str, symbol: &str, source: &str) -> Entry {
        let mut extractor = SignatureExtractor::new().unwrap();
        let signature = extractor
            .extract_source(source)
            .unwrap()
            .into_iter()
            .find(|s| s.symbol_name == symbol)
            .unwrap();

        Entry::new(
            id,
            CodeRef::new(file, symbol),
            signature.fingerprint(),
            Some(signature.signature_text),
            DocRef {
                file_path: "docs/math.md".to_string(),
                start_line: 0,
                end_line: 2,
            },
            "Adds two numbers.",
        )
    }

    fn setup(source: &str) -> (TempDir, MapManager) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/math.ts"), source).unwrap();

        let mut store = MapManager::load(dir.path().join("doctype-map.json")).unwrap();
        store.add_entry(entry_for("e1", "src/math.ts", "add", ORIGINAL));
        (dir, store)
    }

    #[test]
    fn test_unchanged_signature_is_stable() {
        let (dir, store) = setup(ORIGINAL);
        let detector = DriftDetector::new(dir.path());
        let mut extractor = SignatureExtractor::new().unwrap();

        let status = detector.check_entry(&mut extractor, &store.entries()[0], &store);
        assert_eq!(status, DriftStatus::Stable);
    }

    #[test]
    fn test_added_parameter_drifts_and_reformat_does_not() {
        let (dir, store) = setup(ORIGINAL);
        let detector = DriftDetector::new(dir.path());
        let mut extractor = SignatureExtractor::new().unwrap();
        let path = dir.path().join("src/math.ts");

        std::fs::write(
            &path,
            "export function add(a: number, b: number, c: number): number {\n  return a + b + c;\n}\n",
        )
        .unwrap();
        let status = detector.check_entry(&mut extractor, &store.entries()[0], &store);
        match status {
            DriftStatus::Drifted {
                old_fingerprint,
                new_fingerprint,
                old_signature,
                new_signature,
            } => {
                assert_ne!(old_fingerprint, new_fingerprint);
                assert_eq!(
                    old_signature.unwrap().signature_text,
                    "function add(a: number, b: number): number"
                );
                assert_eq!(
                    new_signature.signature_text,
                    "function add(a: number, b: number, c: number): number"
                );
            }
            other => panic!("expected drift, got {other:?}"),
        }

        std::fs::write(
            &path,
            "export function add(\n  a: number,\n  b: number // second\n): number {\n  return a + b;\n}\n",
        )
        .unwrap();
        let status = detector.check_entry(&mut extractor, &store.entries()[0], &store);
        assert_eq!(status, DriftStatus::Stable);
    }

    #[test]
    fn test_missing_file_and_symbol_are_unresolvable() {
        let (dir, mut store) = setup(ORIGINAL);
        store.add_entry(entry_for(
            "e2",
            "src/gone.ts",
            "add",
            ORIGINAL,
        ));
        store.add_entry(entry_for(
            "e3",
            "src/math.ts",
            "subtract",
            "export function subtract(a: number, b: number): number { return a - b; }",
        ));

        let detector = DriftDetector::new(dir.path());
        let mut extractor = SignatureExtractor::new().unwrap();

        let missing_file = detector.check_entry(&mut extractor, &store.entries()[1], &store);
        assert_eq!(
            missing_file,
            DriftStatus::Unresolvable {
                reason: "file not found".to_string()
            }
        );

        let missing_symbol = detector.check_entry(&mut extractor, &store.entries()[2], &store);
        assert_eq!(
            missing_symbol,
            DriftStatus::Unresolvable {
                reason: "symbol not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_detect_all_keeps_going_and_preserves_order() {
        let (dir, mut store) = setup(ORIGINAL);
        std::fs::write(dir.path().join("src/broken.ts"), "export function (((").unwrap();
        store.add_entry(entry_for("e2", "src/broken.ts", "add", ORIGINAL));
        store.add_entry(entry_for("e3", "src/math.ts", "add", ORIGINAL));
        store.add_entry(entry_for("e4", "src/missing.ts", "add", ORIGINAL));

        let run = DriftDetector::new(dir.path())
            .with_concurrency(2)
            .detect_all(&store)
            .await;

        let ids: Vec<&str> = run.results.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3", "e4"]);

        assert!(run.status_of("e1").unwrap().is_stable());
        assert!(run.status_of("e2").unwrap().is_unresolvable());
        assert!(run.status_of("e3").unwrap().is_stable());
        assert!(run.status_of("e4").unwrap().is_unresolvable());

        assert_eq!(run.errors.len(), 1);
        assert_eq!(run.errors[0].entry_id, "e2");
        assert!(run.errors[0].message.contains("parse error"));

        let summary = run.summary();
        assert_eq!(summary.stable, 2);
        assert_eq!(summary.unresolved, 2);
        assert!(!run.is_clean());
    }

    #[tokio::test]
    async fn test_detect_all_reports_drift() {
        let (dir, store) = setup(ORIGINAL);
        std::fs::write(
            dir.path().join("src/math.ts"),
            "export function add(a: string, b: number): number { return 0; }",
        )
        .unwrap();

        let run = DriftDetector::new(dir.path()).detect_all(&store).await;
        let reports = run.reports(&store);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "e1");
        assert_eq!(reports[0].symbol_name, "add");
        assert_eq!(reports[0].doc_line, 1);
        assert!(reports[0].new_signature.contains("a: string"));
    }
}
