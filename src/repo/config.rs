//! Project configuration for doctype

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the per-project state directory
pub const DOCTYPE_DIR: &str = ".doctype";

/// Configuration for a project being tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Display name (defaults to the directory name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Root that code references are relative to
    #[serde(default = "default_project_root")]
    pub project_root: String,

    /// Where `init` writes documentation files
    #[serde(default = "default_docs_folder")]
    pub docs_folder: String,

    /// Entry collection path, relative to the project directory
    #[serde(default = "default_map_file")]
    pub map_file: String,

    /// Patterns for source files to track (glob patterns)
    #[serde(default = "default_code_patterns")]
    pub code_patterns: Vec<String>,

    /// Patterns to ignore (glob patterns)
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// How many files the drift detector analyzes at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Anchor insertion settings
    #[serde(default)]
    pub anchor: AnchorConfig,
}

/// Settings for newly inserted anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Add a `## Symbol` heading above each anchor
    #[serde(default = "default_create_section")]
    pub create_section: bool,

    /// Initial anchor body
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            create_section: default_create_section(),
            placeholder: default_placeholder(),
        }
    }
}

fn default_project_root() -> String {
    ".".to_string()
}

fn default_docs_folder() -> String {
    "docs".to_string()
}

fn default_map_file() -> String {
    "doctype-map.json".to_string()
}

fn default_code_patterns() -> Vec<String> {
    vec!["*.ts".to_string(), "*.tsx".to_string()]
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules/**".to_string(),
        "**/node_modules/**".to_string(),
        "dist/**".to_string(),
        "build/**".to_string(),
        ".git/**".to_string(),
        ".doctype/**".to_string(),
        "*.d.ts".to_string(),
        "*.test.ts".to_string(),
        "*.spec.ts".to_string(),
    ]
}

fn default_concurrency() -> usize {
    8
}

fn default_create_section() -> bool {
    true
}

fn default_placeholder() -> String {
    "TODO: Add documentation for this symbol".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: None,
            project_root: default_project_root(),
            docs_folder: default_docs_folder(),
            map_file: default_map_file(),
            code_patterns: default_code_patterns(),
            ignore_patterns: default_ignore_patterns(),
            concurrency: default_concurrency(),
            anchor: AnchorConfig::default(),
        }
    }
}

impl Config {
    /// Path of the config file inside a project
    pub fn path(project_dir: &Path) -> std::path::PathBuf {
        project_dir.join(DOCTYPE_DIR).join("config.toml")
    }

    /// Load configuration from the project or return defaults
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = Self::path(project_dir);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the project
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let doctype_dir = project_dir.join(DOCTYPE_DIR);
        std::fs::create_dir_all(&doctype_dir)?;

        let config_path = doctype_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Compile the code and ignore patterns
    pub fn path_filter(&self) -> Result<PathFilter> {
        Ok(PathFilter {
            code: build_globset(&self.code_patterns)?,
            ignore: build_globset(&self.ignore_patterns)?,
        })
    }
}

/// Compiled file selection patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    code: GlobSet,
    ignore: GlobSet,
}

impl PathFilter {
    /// Check if a relative path should be ignored
    pub fn should_ignore(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }

    /// Check if a relative path is a tracked source file
    pub fn is_code_file(&self, path: &str) -> bool {
        self.code.is_match(path) && !self.should_ignore(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("Failed to compile glob patterns")
}
