use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "esm-rewrite.json";

/// Configuration for the import rewrite stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Marker prepended to every resolved filesystem path.
    pub fs_prefix: String,

    /// Suffix appended to stylesheet specifiers so they load as scripts.
    pub asset_suffix: String,

    /// Inline comment marker that silences the dynamic-expression warning.
    pub ignore_marker: String,

    /// Importer extensions that are never rewritten (source maps, metadata).
    pub skip_extensions: Vec<String>,

    /// Extensions (without the dot) recognized as stylesheet requests.
    pub stylesheet_extensions: Vec<String>,

    /// Extensions probed by the filesystem resolver, in order.
    pub resolve_extensions: Vec<String>,

    /// `package.json` fields consulted for a package entry point, in order.
    pub main_fields: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            fs_prefix: "/@fs/".to_string(),
            asset_suffix: ".js".to_string(),
            ignore_marker: "@vite-ignore".to_string(),
            skip_extensions: strings(&[".map", ".json"]),
            stylesheet_extensions: strings(&[
                "css", "less", "sass", "scss", "styl", "stylus", "pcss", "postcss",
            ]),
            resolve_extensions: strings(&[".mjs", ".js", ".ts", ".jsx", ".tsx", ".json"]),
            main_fields: strings(&["module", "main"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl RewriteConfig {
    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from an explicit path, or from `esm-rewrite.json` in `cwd`
    /// when present. Falls back to defaults when no file exists.
    pub fn discover(cwd: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            };
            return Self::from_file(&path);
        }

        let candidate: PathBuf = cwd.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Set the marker prefix.
    #[must_use]
    pub fn with_fs_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.fs_prefix = prefix.into();
        self
    }

    /// Set the stylesheet suffix.
    #[must_use]
    pub fn with_asset_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.asset_suffix = suffix.into();
        self
    }

    /// Set the ignore marker.
    #[must_use]
    pub fn with_ignore_marker(mut self, marker: impl Into<String>) -> Self {
        self.ignore_marker = marker.into();
        self
    }
}
