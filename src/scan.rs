//! Project scan
//!
//! Seeds documentation for a project: one anchor and one entry per exported
//! symbol that is not tracked yet. Running it again only picks up new symbols.

use crate::anchor::{self, InsertOptions};
use crate::map::{CodeRef, DocRef, Entry, MapManager};
use crate::repo::Project;
use crate::signature::{Signature, SignatureExtractor};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// What a scan did
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub symbols_found: usize,
    pub anchors_created: usize,
    /// Symbols that already had an entry or an anchor
    pub already_tracked: usize,
    /// Documentation files written
    pub docs_written: Vec<String>,
    /// Source files that could not be analyzed, with the reason
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub file_path: String,
    pub message: String,
}

/// Scan every tracked source file and anchor its exported symbols
pub fn scan_project(project: &Project, store: &mut MapManager) -> Result<ScanSummary> {
    let files = project.list_code_files()?;
    let mut extractor = SignatureExtractor::new()?;
    let mut summary = ScanSummary::default();

    // Documentation file -> symbols to anchor in it
    let mut pending: BTreeMap<String, Vec<(CodeRef, Signature)>> = BTreeMap::new();

    for file in &files {
        let path = project.code_root().join(file);
        let signatures = match extractor.extract_file(&path) {
            Ok(signatures) => signatures,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", file, e);
                summary.failures.push(ScanFailure {
                    file_path: file.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        summary.files_scanned += 1;
        let mut seen = HashSet::new();
        for signature in signatures {
            // Overloads share a name; only the first one is tracked.
            if !seen.insert(signature.symbol_name.clone()) {
                continue;
            }
            summary.symbols_found += 1;

            let code_ref = CodeRef::new(file.as_str(), signature.symbol_name.as_str());
            if store.entry_by_code_ref(&code_ref).is_some() {
                summary.already_tracked += 1;
                continue;
            }
            pending
                .entry(project.doc_path_for(file))
                .or_default()
                .push((code_ref, signature));
        }
    }

    let options = InsertOptions {
        create_section: project.config().anchor.create_section,
        placeholder: project.config().anchor.placeholder.clone(),
    };

    for (doc_file, symbols) in pending {
        let created = anchor_document(project.root(), &doc_file, symbols, &options, store)?;
        summary.already_tracked += created.skipped;
        if created.inserted > 0 {
            summary.anchors_created += created.inserted;
            summary.docs_written.push(doc_file);
        }
    }

    tracing::info!(
        "Scanned {} files: {} symbols, {} new anchors",
        summary.files_scanned,
        summary.symbols_found,
        summary.anchors_created
    );

    Ok(summary)
}

struct Anchored {
    inserted: usize,
    skipped: usize,
}

/// Append anchors for `symbols` to one documentation file and record entries
fn anchor_document(
    project_dir: &Path,
    doc_file: &str,
    symbols: Vec<(CodeRef, Signature)>,
    options: &InsertOptions,
    store: &mut MapManager,
) -> Result<Anchored> {
    let doc_path = project_dir.join(doc_file);
    let mut content = match std::fs::read_to_string(&doc_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let title = symbols
                .first()
                .map(|(code_ref, _)| code_ref.file_path.clone())
                .unwrap_or_default();
            format!("# {}\n", title)
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {:?}", doc_path));
        }
    };

    let existing: HashSet<String> = anchor::get_existing_code_refs(&content).into_iter().collect();
    let mut result = Anchored {
        inserted: 0,
        skipped: 0,
    };

    for (code_ref, signature) in symbols {
        if existing.contains(&code_ref.to_string()) {
            result.skipped += 1;
            continue;
        }

        let inserted = anchor::insert(&content, &code_ref, options);
        let body = anchor::find(&inserted.content, &inserted.anchor_id)
            .map(|a| a.content)
            .unwrap_or_default();

        store.add_entry(Entry::new(
            inserted.anchor_id.as_str(),
            code_ref,
            signature.fingerprint(),
            Some(signature.signature_text.clone()),
            DocRef {
                file_path: doc_file.to_string(),
                start_line: inserted.start_line,
                end_line: inserted.end_line,
            },
            body,
        ));
        content = inserted.content;
        result.inserted += 1;
    }

    if result.inserted > 0 {
        if let Some(parent) = doc_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        std::fs::write(&doc_path, &content)
            .with_context(|| format!("Failed to write {:?}", doc_path))?;
    }

    Ok(result)
}
