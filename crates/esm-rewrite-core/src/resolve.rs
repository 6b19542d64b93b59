//! Bridge to the external bare-specifier resolver.

use crate::diagnostics::RewriteWarning;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A resolver's answer: a normalized filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
}

impl ResolvedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Failure inside a resolver. The rewrite stage treats it like "not found".
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package.json at {path}: {source}")]
    PackageJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Maps a bare module id to a location on disk.
pub trait Resolver: Send + Sync {
    /// Resolve `id` as imported from `importer`.
    ///
    /// `Ok(None)` means the id could not be found.
    fn resolve<'a>(
        &'a self,
        id: &'a str,
        importer: &'a str,
    ) -> BoxFuture<'a, Result<Option<ResolvedId>, ResolveError>>;
}

/// Build the server-addressable form of a resolved path: the marker prefix
/// followed by the path with forward slashes.
#[must_use]
pub fn resolved_path_form(fs_prefix: &str, path: &str) -> String {
    format!("{fs_prefix}{path}").replace('\\', "/")
}

/// Runs resolutions for one invocation and accounts the time spent in them.
pub struct ResolutionBridge<'r> {
    resolver: &'r dyn Resolver,
    fs_prefix: &'r str,
    calls: usize,
    elapsed: Duration,
}

impl<'r> ResolutionBridge<'r> {
    pub fn new(resolver: &'r dyn Resolver, fs_prefix: &'r str) -> Self {
        Self {
            resolver,
            fs_prefix,
            calls: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Resolve a bare id to its rewritten form.
    ///
    /// Resolver misses and resolver errors come back as warnings.
    pub async fn resolve(&mut self, id: &str, importer: &str) -> Result<String, RewriteWarning> {
        let started = Instant::now();
        let result = self.resolver.resolve(id, importer).await;
        let spent = started.elapsed();
        self.calls += 1;
        self.elapsed += spent;

        match result {
            Ok(Some(resolved)) => {
                tracing::trace!(
                    importer,
                    specifier = id,
                    resolved = %resolved.id,
                    elapsed_ms = crate::diagnostics::millis(spent),
                    "resolved bare import"
                );
                Ok(resolved_path_form(self.fs_prefix, &resolved.id))
            }
            Ok(None) => Err(RewriteWarning::UnresolvedBareSpecifier {
                importer: importer.to_string(),
                id: id.to_string(),
            }),
            Err(source) => Err(RewriteWarning::ResolverFailed {
                importer: importer.to_string(),
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Number of resolver calls made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Total time spent waiting on the resolver.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
