#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

//! Import specifier rewriting for an unbundled development server.
//!
//! One call to [`ImportTransform::transform`] takes the text of a module and
//! the path that imported it, finds every import specifier, resolves bare
//! package names to files on disk and marks stylesheet imports as script
//! modules. Only the specifier regions change.

pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod node_resolver;
pub mod patch;
pub mod resolve;
pub mod scan;
pub mod skip;
pub mod transform;
pub mod version;

pub use config::RewriteConfig;
pub use diagnostics::{stats, RewriteWarning, Stats};
pub use error::Error;
pub use node_resolver::NodeModulesResolver;
pub use resolve::{resolved_path_form, ResolveError, ResolvedId, Resolver};
pub use scan::{ImportOccurrence, OccurrenceKind, ScanError};
pub use transform::{ImportTransform, TransformOutput};
pub use version::VERSION;
