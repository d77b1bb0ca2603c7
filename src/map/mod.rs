//! Entry store
//!
//! Owns the `doctype-map.json` collection that links code symbols to anchored
//! documentation regions. The whole collection is read and written as one unit.

use crate::anchor;
use crate::error::{Error, Result};
use crate::signature::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current on-disk format version
pub const MAP_VERSION: &str = "1.0.0";

/// A symbol in a source file, written `file_path#symbol_name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRef {
    /// Path relative to the project root
    pub file_path: String,
    pub symbol_name: String,
}

impl CodeRef {
    pub fn new(file_path: impl Into<String>, symbol_name: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            symbol_name: symbol_name.into(),
        }
    }
}

impl std::fmt::Display for CodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.file_path, self.symbol_name)
    }
}

/// Location of an anchor in a documentation file
///
/// Lines are 0-indexed: `start_line` is the start marker, `end_line` the end marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRef {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One tracked code/documentation link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Anchor id, shared with the markers in the documentation
    pub id: String,
    pub code_ref: CodeRef,
    /// Fingerprint of the signature the docs were last written against
    pub code_signature_hash: Fingerprint,
    /// Canonical signature text behind `code_signature_hash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_signature_text: Option<String>,
    pub doc_ref: DocRef,
    /// Anchor body at the time of the last update
    pub original_markdown_content: String,
    /// Milliseconds since the UNIX epoch
    pub last_updated: i64,
}

impl Entry {
    /// Build a fresh entry stamped with the current time
    pub fn new(
        id: impl Into<String>,
        code_ref: CodeRef,
        code_signature_hash: Fingerprint,
        code_signature_text: Option<String>,
        doc_ref: DocRef,
        original_markdown_content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            code_ref,
            code_signature_hash,
            code_signature_text,
            doc_ref,
            original_markdown_content: original_markdown_content.into(),
            last_updated: now_millis(),
        }
    }
}

/// Partial update applied by [`MapManager::update_entry`]
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub code_signature_hash: Option<Fingerprint>,
    pub code_signature_text: Option<String>,
    pub doc_ref: Option<DocRef>,
    pub original_markdown_content: Option<String>,
}

/// The persisted collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctypeMap {
    pub version: String,
    pub entries: Vec<Entry>,
}

impl Default for DoctypeMap {
    fn default() -> Self {
        Self {
            version: MAP_VERSION.to_string(),
            entries: Vec::new(),
        }
    }
}

/// Handle over one `doctype-map.json`
///
/// There is no internal locking: a process holds a single manager and is the
/// only writer for the duration of a run.
#[derive(Debug)]
pub struct MapManager {
    path: PathBuf,
    map: DoctypeMap,
}

impl MapManager {
    /// Load the collection at `path`, or start an empty one if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let map = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| Error::persistence(&path, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No map at {}, starting empty", path.display());
                DoctypeMap::default()
            }
            Err(e) => return Err(Error::persistence(&path, e)),
        };

        Ok(Self { path, map })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format version of the loaded collection
    pub fn version(&self) -> &str {
        &self.map.version
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[Entry] {
        &self.map.entries
    }

    pub fn len(&self) -> usize {
        self.map.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.entries.is_empty()
    }

    /// Add an entry
    pub fn add_entry(&mut self, entry: Entry) {
        tracing::debug!("Adding entry {} for {}", entry.id, entry.code_ref);
        self.map.entries.push(entry);
    }

    /// Look up an entry by id
    pub fn entry_by_id(&self, id: &str) -> Option<&Entry> {
        self.map.entries.iter().find(|e| e.id == id)
    }

    /// First entry tracking the given code reference
    pub fn entry_by_code_ref(&self, code_ref: &CodeRef) -> Option<&Entry> {
        self.map.entries.iter().find(|e| &e.code_ref == code_ref)
    }

    /// Entries whose anchors live in the given documentation file
    pub fn entries_for_doc(&self, doc_path: &str) -> Vec<&Entry> {
        self.map
            .entries
            .iter()
            .filter(|e| e.doc_ref.file_path == doc_path)
            .collect()
    }

    /// Apply a partial update and stamp `last_updated`
    pub fn update_entry(&mut self, id: &str, update: EntryUpdate) -> Result<&Entry> {
        let entry = self
            .map
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::EntryNotFound { id: id.to_string() })?;

        if let Some(hash) = update.code_signature_hash {
            entry.code_signature_hash = hash;
        }
        if let Some(text) = update.code_signature_text {
            entry.code_signature_text = Some(text);
        }
        if let Some(doc_ref) = update.doc_ref {
            entry.doc_ref = doc_ref;
        }
        if let Some(content) = update.original_markdown_content {
            entry.original_markdown_content = content;
        }
        entry.last_updated = now_millis();

        Ok(entry)
    }

    /// Whether `candidate` differs from the stored fingerprint
    ///
    /// Unknown ids count as drifted.
    pub fn has_drift(&self, id: &str, candidate: &Fingerprint) -> bool {
        self.entry_by_id(id)
            .map_or(true, |e| &e.code_signature_hash != candidate)
    }

    /// Re-sync the line spans of every entry anchored in `doc_path`
    ///
    /// Returns how many entries moved.
    pub fn refresh_doc_refs(&mut self, doc_path: &str, doc_text: &str) -> usize {
        let anchors = anchor::parse(doc_text).anchors;
        let mut moved = 0;

        for entry in self
            .map
            .entries
            .iter_mut()
            .filter(|e| e.doc_ref.file_path == doc_path)
        {
            let Some(found) = anchors.iter().find(|a| a.id == entry.id) else {
                continue;
            };
            if entry.doc_ref.start_line != found.start_line
                || entry.doc_ref.end_line != found.end_line
            {
                entry.doc_ref.start_line = found.start_line;
                entry.doc_ref.end_line = found.end_line;
                moved += 1;
            }
        }

        moved
    }

    /// Write the collection atomically (temp file, then rename)
    pub fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.map).map_err(|e| Error::persistence(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::persistence(&self.path, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| Error::persistence(&self.path, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::persistence(&self.path, e))?;

        tracing::debug!("Saved {} entries to {}", self.len(), self.path.display());
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, hash: &str) -> Entry {
        Entry::new(
            id,
            CodeRef::new("src/math.ts", "add"),
            Fingerprint::from_hex(hash),
            Some("function add(a: number, b: number): number".to_string()),
            DocRef {
                file_path: "docs/math.md".to_string(),
                start_line: 2,
                end_line: 4,
            },
            "Adds two numbers.",
        )
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let manager = MapManager::load(dir.path().join("doctype-map.json")).unwrap();
        assert!(manager.is_empty());
        assert_eq!(manager.version(), MAP_VERSION);
    }

    #[test]
    fn test_load_malformed_json_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doctype-map.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = MapManager::load(&path).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doctype-map.json");

        let mut manager = MapManager::load(&path).unwrap();
        manager.add_entry(entry("e1", "aaaa"));
        manager.save().unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let reloaded = MapManager::load(&path).unwrap();
        assert_eq!(reloaded.entries(), manager.entries());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = serde_json::to_value(DoctypeMap {
            version: MAP_VERSION.to_string(),
            entries: vec![entry("e1", "aaaa")],
        })
        .unwrap();

        let first = &json["entries"][0];
        assert_eq!(first["codeRef"]["filePath"], "src/math.ts");
        assert_eq!(first["codeSignatureHash"], "aaaa");
        assert_eq!(first["docRef"]["startLine"], 2);
        assert!(first["lastUpdated"].is_i64());
        assert_eq!(json["version"], "1.0.0");
    }

    #[test]
    fn test_update_entry_is_partial() {
        let mut manager = MapManager::load("unused.json").unwrap();
        manager.add_entry(entry("e1", "aaaa"));

        let updated = manager
            .update_entry(
                "e1",
                EntryUpdate {
                    code_signature_hash: Some(Fingerprint::from_hex("bbbb")),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.code_signature_hash.as_str(), "bbbb");
        assert_eq!(updated.original_markdown_content, "Adds two numbers.");

        let err = manager.update_entry("nope", EntryUpdate::default()).unwrap_err();
        assert!(matches!(err, Error::EntryNotFound { .. }));
    }

    #[test]
    fn test_has_drift_is_monotonic() {
        let mut manager = MapManager::load("unused.json").unwrap();
        manager.add_entry(entry("e1", "aaaa"));

        let stored = Fingerprint::from_hex("aaaa");
        let other = Fingerprint::from_hex("bbbb");
        assert!(!manager.has_drift("e1", &stored));
        assert!(manager.has_drift("e1", &other));
        assert!(manager.has_drift("unknown", &stored));
    }

    #[test]
    fn test_lookup_helpers() {
        let mut manager = MapManager::load("unused.json").unwrap();
        manager.add_entry(entry("e1", "aaaa"));
        let mut other = entry("e2", "cccc");
        other.doc_ref.file_path = "docs/other.md".to_string();
        manager.add_entry(other);

        assert_eq!(manager.entries_for_doc("docs/math.md").len(), 1);
        assert_eq!(
            manager
                .entry_by_code_ref(&CodeRef::new("src/math.ts", "add"))
                .map(|e| e.id.as_str()),
            Some("e1")
        );
        assert!(manager.entry_by_id("e3").is_none());
    }

    #[test]
    fn test_refresh_doc_refs_follows_anchor() {
        let mut manager = MapManager::load("unused.json").unwrap();
        manager.add_entry(entry("e1", "aaaa"));

        let doc = format!(
            "# Math\n\nmore\nintro\n{}\nbody\n{}\n",
            anchor::start_marker("e1", "src/math.ts#add"),
            anchor::end_marker("e1")
        );
        assert_eq!(manager.refresh_doc_refs("docs/math.md", &doc), 1);

        let refreshed = manager.entry_by_id("e1").unwrap();
        assert_eq!(refreshed.doc_ref.start_line, 4);
        assert_eq!(refreshed.doc_ref.end_line, 6);
        assert_eq!(manager.refresh_doc_refs("docs/math.md", &doc), 0);
    }
}
