//! Warnings and timing telemetry for the rewrite stage.
//!
//! Every failure inside the stage is reported as a [`RewriteWarning`]; none of
//! them abort the host pipeline. Timing is accumulated in process-wide
//! counters that have no influence on the output.

use crate::patch::PatchError;
use crate::resolve::ResolveError;
use crate::scan::ScanError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Non-fatal problem found while rewriting one module.
#[derive(Debug, Error)]
pub enum RewriteWarning {
    #[error(
        "failed to scan imports in {importer}: {error}. \
         The file may use syntax this scanner does not understand \
         (for example JSX or TypeScript-only constructs); transform it to plain JavaScript first"
    )]
    ScanFailure { importer: String, error: ScanError },

    #[error("failed to resolve import \"{id}\" from {importer}; it is left as-is")]
    UnresolvedBareSpecifier { importer: String, id: String },

    #[error("resolver failed for import \"{id}\" from {importer}: {source}")]
    ResolverFailed {
        importer: String,
        id: String,
        #[source]
        source: ResolveError,
    },

    #[error(
        "dynamic import of `{expression}` in {importer} cannot be analyzed and is left as-is; \
         add /* {marker} */ inside the call to silence this warning"
    )]
    IgnoredDynamicExpression {
        importer: String,
        expression: String,
        marker: String,
    },

    #[error("could not rewrite \"{id}\" in {importer}: {source}")]
    InvalidEdit {
        importer: String,
        id: String,
        #[source]
        source: PatchError,
    },
}

impl RewriteWarning {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ScanFailure { .. } => "SCAN_FAILURE",
            Self::UnresolvedBareSpecifier { .. } => "UNRESOLVED_BARE_SPECIFIER",
            Self::ResolverFailed { .. } => "RESOLVER_FAILED",
            Self::IgnoredDynamicExpression { .. } => "IGNORED_DYNAMIC_EXPRESSION",
            Self::InvalidEdit { .. } => "INVALID_EDIT",
        }
    }

    /// The module the warning was raised for.
    #[must_use]
    pub fn importer(&self) -> &str {
        match self {
            Self::ScanFailure { importer, .. }
            | Self::UnresolvedBareSpecifier { importer, .. }
            | Self::ResolverFailed { importer, .. }
            | Self::IgnoredDynamicExpression { importer, .. }
            | Self::InvalidEdit { importer, .. } => importer,
        }
    }

    /// Log the warning.
    pub fn emit(&self) {
        tracing::warn!(importer = %self.importer(), code = self.code(), "{}", self);
    }
}

static INVOCATIONS: AtomicU64 = AtomicU64::new(0);
static REWRITTEN: AtomicU64 = AtomicU64::new(0);
static TOTAL_NANOS: AtomicU64 = AtomicU64::new(0);
static RESOLVE_NANOS: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the process-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Modules that went through the stage (skipped modules excluded).
    pub invocations: u64,
    /// Modules whose text was changed.
    pub rewritten: u64,
    pub total_nanos: u64,
    /// Time spent waiting on the resolver.
    pub resolve_nanos: u64,
}

impl Stats {
    #[must_use]
    pub fn total_time(&self) -> Duration {
        Duration::from_nanos(self.total_nanos)
    }

    #[must_use]
    pub fn resolve_time(&self) -> Duration {
        Duration::from_nanos(self.resolve_nanos)
    }
}

/// Record one finished invocation.
pub fn record(total: Duration, resolve: Duration, changed: bool) {
    INVOCATIONS.fetch_add(1, Ordering::Relaxed);
    if changed {
        REWRITTEN.fetch_add(1, Ordering::Relaxed);
    }
    TOTAL_NANOS.fetch_add(saturating_nanos(total), Ordering::Relaxed);
    RESOLVE_NANOS.fetch_add(saturating_nanos(resolve), Ordering::Relaxed);
}

/// Current counter values.
#[must_use]
pub fn stats() -> Stats {
    Stats {
        invocations: INVOCATIONS.load(Ordering::Relaxed),
        rewritten: REWRITTEN.load(Ordering::Relaxed),
        total_nanos: TOTAL_NANOS.load(Ordering::Relaxed),
        resolve_nanos: RESOLVE_NANOS.load(Ordering::Relaxed),
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Milliseconds as a float, for log fields and JSON output.
#[must_use]
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
