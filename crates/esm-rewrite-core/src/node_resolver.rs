//! `node_modules` lookup for bare specifiers.
//!
//! Supports:
//! - Package names, scoped names, and deep imports (`pkg/sub/path`)
//! - `node_modules` lookup walking up from the importer
//! - `package.json` `exports` root entry (string or conditions) and main fields
//! - Extension and `index.*` probing

use crate::config::RewriteConfig;
use crate::resolve::{ResolveError, ResolvedId, Resolver};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Conditions consulted in a conditional `exports` object, in order.
const EXPORT_CONDITIONS: &[&str] = &["import", "module", "browser", "default"];

/// Resolves bare specifiers against `node_modules` directories on disk.
#[derive(Debug, Clone)]
pub struct NodeModulesResolver {
    extensions: Vec<String>,
    main_fields: Vec<String>,
}

impl NodeModulesResolver {
    #[must_use]
    pub fn new(config: &RewriteConfig) -> Self {
        Self {
            extensions: config.resolve_extensions.clone(),
            main_fields: config.main_fields.clone(),
        }
    }

    /// Resolve `id` from the module at `importer`.
    pub async fn resolve_path(
        &self,
        id: &str,
        importer: &Path,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let Some((name, subpath)) = split_package(id) else {
            return Ok(None);
        };
        let from = importer.parent().unwrap_or(importer);

        for dir in from.ancestors() {
            let package_dir = dir.join("node_modules").join(name);
            if !is_dir(&package_dir).await {
                continue;
            }

            let found = match subpath {
                Some(sub) => self.probe(&package_dir.join(sub)).await,
                None => self.package_entry(&package_dir).await?,
            };
            tracing::trace!(
                specifier = id,
                package_dir = %package_dir.display(),
                found = found.is_some(),
                "node_modules lookup"
            );
            return match found {
                Some(path) => Ok(Some(normalize(&path).await)),
                None => Ok(None),
            };
        }

        Ok(None)
    }

    /// Entry file of a package directory.
    async fn package_entry(&self, package_dir: &Path) -> Result<Option<PathBuf>, ResolveError> {
        let manifest_path = package_dir.join("package.json");
        let manifest = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(content) => Some(serde_json::from_str::<Value>(&content).map_err(|source| {
                ResolveError::PackageJson {
                    path: manifest_path.clone(),
                    source,
                }
            })?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ResolveError::Io {
                    path: manifest_path,
                    source,
                })
            }
        };

        if let Some(manifest) = &manifest {
            let entry = exports_root(manifest).or_else(|| {
                self.main_fields
                    .iter()
                    .find_map(|field| manifest.get(field).and_then(Value::as_str))
            });
            if let Some(entry) = entry {
                if let Some(found) = self.probe(&package_dir.join(entry)).await {
                    return Ok(Some(found));
                }
            }
        }

        Ok(self.probe(&package_dir.join("index")).await)
    }

    /// Probe `base` as a file, with each extension, then as a directory index.
    async fn probe(&self, base: &Path) -> Option<PathBuf> {
        if is_file(base).await {
            return Some(base.to_path_buf());
        }

        for ext in &self.extensions {
            let candidate = PathBuf::from(format!("{}{ext}", base.display()));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }

        for ext in &self.extensions {
            let candidate = base.join(format!("index{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }

        None
    }
}

impl Resolver for NodeModulesResolver {
    fn resolve<'a>(
        &'a self,
        id: &'a str,
        importer: &'a str,
    ) -> BoxFuture<'a, Result<Option<ResolvedId>, ResolveError>> {
        async move {
            let resolved = self.resolve_path(id, Path::new(importer)).await?;
            Ok(resolved.map(|path| ResolvedId::new(path.to_string_lossy())))
        }
        .boxed()
    }
}

/// Split a bare id into package name and optional subpath.
fn split_package(id: &str) -> Option<(&str, Option<&str>)> {
    let name_end = if id.starts_with('@') {
        let scope_end = id.find('/')?;
        id[scope_end + 1..]
            .find('/')
            .map_or(id.len(), |idx| scope_end + 1 + idx)
    } else {
        id.find('/').unwrap_or(id.len())
    };

    let name = &id[..name_end];
    if name.is_empty() || name.ends_with('/') {
        return None;
    }
    let subpath = id[name_end..].trim_start_matches('/');
    Some((name, (!subpath.is_empty()).then_some(subpath)))
}

/// Root entry of a package's `exports` field.
fn exports_root(manifest: &Value) -> Option<&str> {
    let exports = manifest.get("exports")?;
    match exports {
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            map.get(".").and_then(conditional_target)
        }
        other => conditional_target(other),
    }
}

fn conditional_target(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => EXPORT_CONDITIONS
            .iter()
            .find_map(|cond| map.get(*cond).and_then(conditional_target)),
        Value::Array(items) => items.iter().find_map(conditional_target),
        _ => None,
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

async fn normalize(path: &Path) -> PathBuf {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    dunce::simplified(&canonical).to_path_buf()
}
