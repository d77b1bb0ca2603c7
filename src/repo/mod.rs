//! Project layout and file discovery
//!
//! A project is a directory with an optional `.doctype/config.toml`. All
//! documentation paths are relative to the project directory; code paths are
//! relative to the configured `project_root`.

mod config;

pub use config::{AnchorConfig, Config, PathFilter, DOCTYPE_DIR};

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// A project being tracked
#[derive(Debug, Clone)]
pub struct Project {
    /// Project directory
    root: PathBuf,
    /// Project configuration
    config: Config,
}

impl Project {
    /// Open the project at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            anyhow::bail!("Project directory not found: {:?}", root);
        }

        let config = Config::load_or_default(&root)?;
        Ok(Self { root, config })
    }

    /// Get the project directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the project configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the in-memory configuration
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Display name of the project
    pub fn name(&self) -> String {
        if let Some(name) = &self.config.project_name {
            return name.clone();
        }
        std::fs::canonicalize(&self.root)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string())
    }

    /// Get the path to the .doctype directory
    pub fn doctype_dir(&self) -> PathBuf {
        self.root.join(DOCTYPE_DIR)
    }

    /// Whether `init` has been run here
    pub fn is_initialized(&self) -> bool {
        Config::path(&self.root).exists()
    }

    /// Initialize the .doctype directory if it doesn't exist
    pub fn init_doctype_dir(&self) -> Result<PathBuf> {
        let doctype_dir = self.doctype_dir();
        if !doctype_dir.exists() {
            std::fs::create_dir_all(&doctype_dir)
                .with_context(|| format!("Failed to create {:?}", doctype_dir))?;
        }
        Ok(doctype_dir)
    }

    /// Directory that code references are relative to
    pub fn code_root(&self) -> PathBuf {
        self.root.join(&self.config.project_root)
    }

    /// Path of the entry collection
    pub fn map_path(&self) -> PathBuf {
        self.root.join(&self.config.map_file)
    }

    /// Documentation file (relative to the project) for a source file
    ///
    /// `src/utils/math.ts` maps to `docs/src/utils/math.md`.
    pub fn doc_path_for(&self, code_file: &str) -> String {
        let stem = Path::new(code_file).with_extension("md");
        to_slash(&Path::new(&self.config.docs_folder).join(stem))
    }

    /// List tracked source files, relative to the code root, sorted
    pub fn list_code_files(&self) -> Result<Vec<String>> {
        let filter = self.config.path_filter()?;
        let code_root = self.code_root();
        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(&code_root)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_str().unwrap_or("");
                e.depth() == 0
                    || (!name.starts_with('.') && name != "target" && name != "node_modules")
            })
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = to_slash(entry.path().strip_prefix(&code_root)?);
            if filter.is_code_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        tracing::debug!("Found {} source files under {:?}", files.len(), code_root);
        Ok(files)
    }
}

/// Render a relative path with `/` separators, dropping `.` components
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_list_code_files_applies_patterns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/math.ts", "export const x = 1;");
        write(dir.path(), "src/ui/Button.tsx", "export const y = 2;");
        write(dir.path(), "src/types.d.ts", "export declare const z: number;");
        write(dir.path(), "node_modules/dep/index.ts", "export const w = 3;");
        write(dir.path(), ".hidden/secret.ts", "export const v = 4;");
        write(dir.path(), "README.md", "# hi");

        let project = Project::open(dir.path()).unwrap();
        assert_eq!(
            project.list_code_files().unwrap(),
            vec!["src/math.ts", "src/ui/Button.tsx"]
        );
    }

    #[test]
    fn test_paths_follow_config() {
        let dir = TempDir::new().unwrap();
        let mut project = Project::open(dir.path()).unwrap();
        assert!(!project.is_initialized());
        assert_eq!(project.map_path(), dir.path().join("doctype-map.json"));
        assert_eq!(project.doc_path_for("src/utils/math.ts"), "docs/src/utils/math.md");

        project.set_config(Config {
            docs_folder: "./guide".to_string(),
            project_root: "packages/core".to_string(),
            ..Config::default()
        });
        assert_eq!(project.doc_path_for("index.ts"), "guide/index.md");
        assert_eq!(project.code_root(), dir.path().join("packages/core"));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Project::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("./docs/a.md")), "docs/a.md");
        assert_eq!(to_slash(Path::new("../x/y.ts")), "../x/y.ts");
    }
}
