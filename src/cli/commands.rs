//! Command implementations

use crate::anchor;
use crate::drift::{DriftDetector, DriftReport, DriftRun, DriftStatus, DriftSummary, RunError};
use crate::error::Error;
use crate::map::{DocRef, EntryUpdate, MapManager};
use crate::patch::{self, Document, PatchResult};
use crate::repo::{to_slash, Config, Project};
use crate::scan::{scan_project, ScanSummary};
use crate::signature::{Fingerprint, Signature, SignatureExtractor};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Initialize doctype in a project and anchor its exported symbols
pub fn init(path: &Path, force: bool) -> Result<ScanSummary> {
    let mut project = Project::open(path)?;

    if project.is_initialized() && !force {
        anyhow::bail!("doctype already initialized. Use --force to re-initialize.");
    }

    project.init_doctype_dir()?;

    let config = Config {
        project_name: Some(project.name()),
        ..project.config().clone()
    };
    config.save(project.root())?;
    project.set_config(config);

    let mut store = MapManager::load(project.map_path())?;
    let summary = scan_project(&project, &mut store)?;
    store.save()?;

    tracing::info!("Initialized doctype in {:?}", project.root());
    Ok(summary)
}

/// An entry that could not be checked
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReport {
    pub id: String,
    pub code_ref: String,
    pub reason: String,
}

/// Everything `check` found
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub summary: DriftSummary,
    pub drifted: Vec<DriftReport>,
    pub unresolved: Vec<UnresolvedReport>,
    pub errors: Vec<RunError>,
}

impl CheckReport {
    fn new(run: &DriftRun, store: &MapManager) -> Self {
        let unresolved = run
            .results
            .iter()
            .filter_map(|r| match &r.status {
                DriftStatus::Unresolvable { reason } => Some(UnresolvedReport {
                    id: r.entry_id.clone(),
                    code_ref: store
                        .entry_by_id(&r.entry_id)
                        .map(|e| e.code_ref.to_string())
                        .unwrap_or_default(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        Self {
            summary: run.summary(),
            drifted: run.reports(store),
            unresolved,
            errors: run.errors.clone(),
        }
    }

    /// No drift and nothing unresolved
    pub fn is_clean(&self) -> bool {
        self.summary.drifted == 0 && self.summary.unresolved == 0
    }
}

/// Check every entry for drift
pub fn check(path: &Path) -> Result<CheckReport> {
    let project = open_initialized(path)?;
    let store = MapManager::load(project.map_path())?;
    let run = run_detection(&project, &store)?;
    Ok(CheckReport::new(&run, &store))
}

/// What `fix` did to one entry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum FixAction {
    /// The anchored region was replaced with new text
    Replaced,
    /// Only the stored fingerprint was refreshed
    Rebaselined,
    /// Nothing was changed
    Skipped { reason: String },
}

/// Per-entry result of `fix`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOutcome {
    pub entry_id: String,
    pub code_ref: String,
    pub doc_file: String,
    #[serde(flatten)]
    pub action: FixAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Options for `fix`
#[derive(Debug, Clone, Default)]
pub struct FixRequest {
    pub id: Option<String>,
    pub content: Option<String>,
    pub dry_run: bool,
}

/// Bring drifted entries back in sync
///
/// With content, the anchored region is replaced and the entry re-baselined;
/// without, only the fingerprint is re-baselined.
pub fn fix(path: &Path, request: &FixRequest) -> Result<Vec<FixOutcome>> {
    let project = open_initialized(path)?;
    let mut store = MapManager::load(project.map_path())?;

    if let Some(id) = &request.id {
        if store.entry_by_id(id).is_none() {
            return Err(Error::EntryNotFound { id: id.clone() }.into());
        }
    }

    let run = run_detection(&project, &store)?;
    let targets: Vec<(String, Signature)> = run
        .results
        .iter()
        .filter(|r| request.id.as_deref().map_or(true, |id| id == r.entry_id))
        .filter_map(|r| match &r.status {
            DriftStatus::Drifted { new_signature, .. } => {
                Some((r.entry_id.clone(), new_signature.clone()))
            }
            _ => None,
        })
        .collect();

    if request.content.is_some() && request.id.is_none() && targets.len() > 1 {
        anyhow::bail!(
            "{} entries drifted; replacement content applies to one entry. Pass --id.",
            targets.len()
        );
    }

    let mut outcomes = Vec::new();
    for (id, signature) in targets {
        let outcome = fix_entry(&project, &mut store, &id, &signature, request)?;
        outcomes.push(outcome);
    }

    let changed = outcomes
        .iter()
        .any(|o| !matches!(o.action, FixAction::Skipped { .. }));
    if changed && !request.dry_run {
        store.save()?;
    }

    Ok(outcomes)
}

fn fix_entry(
    project: &Project,
    store: &mut MapManager,
    id: &str,
    signature: &Signature,
    request: &FixRequest,
) -> Result<FixOutcome> {
    let entry = store
        .entry_by_id(id)
        .cloned()
        .ok_or_else(|| Error::EntryNotFound { id: id.to_string() })?;

    let doc_file = entry.doc_ref.file_path.clone();
    let mut outcome = FixOutcome {
        entry_id: id.to_string(),
        code_ref: entry.code_ref.to_string(),
        doc_file: doc_file.clone(),
        action: FixAction::Rebaselined,
        diff: None,
    };

    let mut doc = match Document::open(project.root().join(&doc_file)) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("{}: {}", id, e);
            outcome.action = FixAction::Skipped {
                reason: e.to_string(),
            };
            return Ok(outcome);
        }
    };
    let before = doc.content().to_string();

    if let Some(text) = &request.content {
        match anchor::replace_content(doc.content(), id, text) {
            Ok(replaced) => {
                doc.set_content(replaced.content);
                outcome.action = FixAction::Replaced;
            }
            Err(e) => {
                tracing::warn!("{}: {}", id, e);
                outcome.action = FixAction::Skipped {
                    reason: e.to_string(),
                };
                return Ok(outcome);
            }
        }
    }

    let Some(found) = anchor::find(doc.content(), id) else {
        outcome.action = FixAction::Skipped {
            reason: Error::AnchorNotFound { id: id.to_string() }.to_string(),
        };
        return Ok(outcome);
    };

    if doc.is_dirty() {
        outcome.diff = Some(doc.diff(&before));
    }
    if request.dry_run {
        return Ok(outcome);
    }

    doc.save()
        .with_context(|| format!("Failed to write {}", doc_file))?;
    store.update_entry(
        id,
        EntryUpdate {
            code_signature_hash: Some(signature.fingerprint()),
            code_signature_text: Some(signature.signature_text.clone()),
            doc_ref: Some(DocRef {
                file_path: doc_file.clone(),
                start_line: found.start_line,
                end_line: found.end_line,
            }),
            original_markdown_content: Some(found.content),
        },
    )?;
    store.refresh_doc_refs(&doc_file, doc.content());

    tracing::info!("Fixed {} in {}", entry.code_ref, doc_file);
    Ok(outcome)
}

/// Result of a surgical patch, with a preview diff on success
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    #[serde(flatten)]
    pub result: PatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Replace one exact snippet in a documentation file
///
/// The file is written only when the snippet matched exactly once. Entries
/// anchored in the file have their line spans and stored bodies refreshed.
pub fn patch(path: &Path, doc_file: &Path, old: &str, new: &str, dry_run: bool) -> Result<PatchReport> {
    let project = Project::open(path)?;
    let doc_path = project.root().join(doc_file);
    let mut doc = Document::open(&doc_path)
        .with_context(|| format!("Failed to open {:?}", doc_path))?;
    let before = doc.content().to_string();

    let applied = patch::apply(&mut doc, old, new);
    let diff = applied.as_ref().ok().map(|_| doc.diff(&before));
    let result = PatchResult::from(applied);

    if result.success && !dry_run {
        doc.save()?;
        refresh_entries_for(&project, &doc_path, &before, doc.content())?;
    }

    Ok(PatchReport { result, diff })
}

/// Re-sync entries after a document changed outside of `fix`
///
/// Line spans follow the anchors, and every anchor whose body changed has its
/// stored markdown content replaced.
fn refresh_entries_for(project: &Project, doc_path: &Path, before: &str, after: &str) -> Result<()> {
    if !project.map_path().exists() {
        return Ok(());
    }
    let Ok(relative) = doc_path.strip_prefix(project.root()) else {
        return Ok(());
    };
    let doc_file = to_slash(relative);

    let mut store = MapManager::load(project.map_path())?;
    let mut changed = store.refresh_doc_refs(&doc_file, after) > 0;

    let old_anchors = anchor::parse(before).anchors;
    let edited: Vec<(String, String)> = anchor::parse(after)
        .anchors
        .into_iter()
        .filter(|a| {
            old_anchors
                .iter()
                .find(|old| old.id == a.id)
                .map_or(true, |old| old.content != a.content)
        })
        .map(|a| (a.id, a.content))
        .collect();

    for (id, content) in edited {
        if !store
            .entry_by_id(&id)
            .is_some_and(|e| e.doc_ref.file_path == doc_file)
        {
            continue;
        }
        store.update_entry(
            &id,
            EntryUpdate {
                original_markdown_content: Some(content),
                ..Default::default()
            },
        )?;
        changed = true;
    }

    if changed {
        store.save()?;
    }
    Ok(())
}

/// One exported symbol with its fingerprint
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedSymbol {
    #[serde(flatten)]
    pub signature: Signature,
    pub fingerprint: Fingerprint,
}

/// Extract and fingerprint the exported symbols of a source file
pub fn analyze(path: &Path, file: &Path) -> Result<Vec<AnalyzedSymbol>> {
    let target = path.join(file);
    let mut extractor = SignatureExtractor::new()?;
    let signatures = extractor
        .extract_file(&target)
        .with_context(|| format!("Failed to analyze {:?}", target))?;

    Ok(signatures
        .into_iter()
        .map(|signature| AnalyzedSymbol {
            fingerprint: signature.fingerprint(),
            signature,
        })
        .collect())
}

fn open_initialized(path: &Path) -> Result<Project> {
    let project = Project::open(path)?;
    if !project.is_initialized() {
        anyhow::bail!("doctype not initialized. Run 'doctype init' first.");
    }
    Ok(project)
}

fn run_detection(project: &Project, store: &MapManager) -> Result<DriftRun> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let detector =
        DriftDetector::new(project.code_root()).with_concurrency(project.config().concurrency);
    Ok(runtime.block_on(detector.detect_all(store)))
}

/// Print any report as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print an init summary in text format
pub fn print_scan_text(summary: &ScanSummary) {
    println!("✓ Initialized doctype");
    println!("  Files scanned: {}", summary.files_scanned);
    println!("  Exported symbols: {}", summary.symbols_found);
    println!("  Anchors created: {}", summary.anchors_created);
    if summary.already_tracked > 0 {
        println!("  Already tracked: {}", summary.already_tracked);
    }
    for doc in &summary.docs_written {
        println!("  Wrote {}", doc);
    }
    for failure in &summary.failures {
        println!("  ✗ {}: {}", failure.file_path, failure.message);
    }
}

/// Print a drift report in text format
pub fn print_check_text(report: &CheckReport, quiet: bool) {
    let s = &report.summary;
    if report.is_clean() {
        println!("✓ No drift detected ({} entries checked)", s.total);
        return;
    }

    println!(
        "Checked {} entries: {} stable, {} drifted, {} unresolved",
        s.total, s.stable, s.drifted, s.unresolved
    );
    if quiet {
        return;
    }

    if !report.drifted.is_empty() {
        println!("\nDrifted:");
        println!("========\n");
    }
    for drift in &report.drifted {
        println!(
            "⚠ {} ({}) documented in {}:{}",
            drift.symbol_name, drift.code_file_path, drift.doc_file_path, drift.doc_line
        );
        if let Some(old) = &drift.old_signature {
            println!("   - {}", old);
        }
        println!("   + {}", drift.new_signature);
        println!(
            "   Hash: {} -> {}",
            drift.old_fingerprint.short(),
            drift.new_fingerprint.short()
        );
        println!("   ID: {}", drift.id);
        println!();
    }

    if !report.unresolved.is_empty() {
        println!("\nUnresolved:");
        println!("===========\n");
    }
    for unresolved in &report.unresolved {
        println!("✗ {}: {}", unresolved.code_ref, unresolved.reason);
        println!("   ID: {}", unresolved.id);
    }
}

/// Print fix outcomes in text format
pub fn print_fix_text(outcomes: &[FixOutcome], dry_run: bool) {
    if outcomes.is_empty() {
        println!("Nothing to fix.");
        return;
    }

    for outcome in outcomes {
        match &outcome.action {
            FixAction::Replaced => println!(
                "✓ Updated {} for {}",
                outcome.doc_file, outcome.code_ref
            ),
            FixAction::Rebaselined => println!(
                "✓ Re-baselined {} ({})",
                outcome.code_ref, outcome.doc_file
            ),
            FixAction::Skipped { reason } => {
                println!("✗ Skipped {}: {}", outcome.code_ref, reason)
            }
        }
        if let Some(diff) = &outcome.diff {
            print!("{}", diff);
        }
    }

    if dry_run {
        println!("\n(dry run: nothing was written)");
    }
}

/// Print a patch result in text format
pub fn print_patch_text(report: &PatchReport, dry_run: bool) {
    if let Some(diff) = &report.diff {
        print!("{}", diff);
    }
    match (&report.result.error, dry_run) {
        (Some(error), _) => println!("✗ Patch failed: {}", error),
        (None, true) => println!("✓ Patch applies cleanly (dry run: nothing was written)"),
        (None, false) => println!("✓ Patched"),
    }
}

/// Print analyzed symbols in text format
pub fn print_analysis_text(file: &Path, symbols: &[AnalyzedSymbol]) {
    println!("Code Analysis: {:?}", file);
    println!("================\n");

    if symbols.is_empty() {
        println!("No exported symbols.");
        return;
    }

    for symbol in symbols {
        let sig = &symbol.signature;
        println!("Symbol: {} ({})", sig.symbol_name, sig.symbol_type);
        println!("  Signature: {}", sig.signature_text);
        println!("  Fingerprint: {}", symbol.fingerprint);
        println!();
    }
}
