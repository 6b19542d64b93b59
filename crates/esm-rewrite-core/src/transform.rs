//! Import rewriting for unbundled module serving.
//!
//! Scans one module for import specifiers and rewrites, in place:
//! - bare specifiers (`lodash`) to the resolved file behind the fs prefix
//!   (`/@fs//abs/node_modules/lodash/lodash.js`);
//! - stylesheet specifiers (`./app.css`) to their script form (`./app.css.js`).
//!
//! Every byte outside the rewritten specifiers is preserved.

use crate::classify::{classify, Decision};
use crate::config::RewriteConfig;
use crate::diagnostics::{self, RewriteWarning};
use crate::error::Error;
use crate::patch::{EditBuffer, PatchError};
use crate::resolve::{ResolutionBridge, Resolver};
use crate::scan;
use crate::skip::{SkipPredicate, StylesheetMatcher};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of running the stage on one module.
#[derive(Debug)]
pub struct TransformOutput<'a> {
    /// Borrowed when nothing changed, owned when rewritten.
    pub code: Cow<'a, str>,
    pub warnings: Vec<RewriteWarning>,
    /// Time spent waiting on the resolver.
    pub resolve_time: Duration,
    pub total_time: Duration,
}

impl<'a> TransformOutput<'a> {
    fn unchanged(code: &'a str) -> Self {
        Self {
            code: Cow::Borrowed(code),
            warnings: Vec::new(),
            resolve_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }

    /// Whether any specifier was rewritten.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self.code, Cow::Owned(_))
    }

    #[must_use]
    pub fn into_code(self) -> Cow<'a, str> {
        self.code
    }
}

/// The import rewrite stage.
///
/// Holds no per-module state, so one instance can serve concurrent
/// invocations for different modules.
pub struct ImportTransform {
    config: RewriteConfig,
    skip: SkipPredicate,
    resolver: Arc<dyn Resolver>,
}

impl ImportTransform {
    /// Create the stage with the given config and resolver.
    pub fn new(config: RewriteConfig, resolver: Arc<dyn Resolver>) -> Result<Self, Error> {
        let stylesheets = StylesheetMatcher::new(&config.stylesheet_extensions)?;
        let skip = SkipPredicate::new(&config, stylesheets);
        Ok(Self {
            config,
            skip,
            resolver,
        })
    }

    /// Whether `importer` bypasses the stage.
    #[must_use]
    pub fn should_skip(&self, importer: &str) -> bool {
        self.skip.should_skip(importer)
    }

    /// Rewrite the imports of `code`, imported as `importer`.
    ///
    /// Returns `None` when the module is not eligible for this stage at all.
    /// Otherwise the output always carries usable code: failures leave the
    /// affected specifier (or the whole module) untouched and are reported in
    /// `warnings`.
    pub async fn transform<'a>(
        &self,
        code: &'a str,
        importer: &str,
    ) -> Option<TransformOutput<'a>> {
        if self.skip.should_skip(importer) {
            return None;
        }

        let started = Instant::now();
        let mut output = TransformOutput::unchanged(code);

        let occurrences = match scan::init().await.scan(code) {
            Ok(occurrences) => occurrences,
            Err(error) => {
                let warning = RewriteWarning::ScanFailure {
                    importer: importer.to_string(),
                    error,
                };
                warning.emit();
                output.warnings.push(warning);
                return Some(finish(output, started, importer));
            }
        };

        if occurrences.is_empty() {
            tracing::trace!(importer, "no imports found");
            return Some(finish(output, started, importer));
        }

        let stylesheets = self.skip.stylesheets();
        let mut bridge = ResolutionBridge::new(self.resolver.as_ref(), &self.config.fs_prefix);
        let mut buffer: Option<EditBuffer<'a>> = None;

        for occurrence in &occurrences {
            let classified = classify(occurrence, code, stylesheets, &self.config.ignore_marker);
            let target = classified.specifier.target();

            match classified.decision {
                Decision::Skip => continue,
                Decision::Ignore => {
                    tracing::trace!(
                        importer,
                        expression = classified.id,
                        "ignoring dynamic import"
                    );
                    continue;
                }
                Decision::WarnIgnoredDynamic => {
                    let warning = RewriteWarning::IgnoredDynamicExpression {
                        importer: importer.to_string(),
                        expression: classified.id.to_string(),
                        marker: self.config.ignore_marker.clone(),
                    };
                    warning.emit();
                    output.warnings.push(warning);
                    continue;
                }
                Decision::ResolveBare
                | Decision::SuffixAsset
                | Decision::ResolveBareAndSuffixAsset => {}
            }

            let mut edits: Vec<Result<(), PatchError>> = Vec::with_capacity(2);

            if classified.decision.resolves() {
                match bridge.resolve(classified.id, importer).await {
                    Ok(form) => {
                        let buffer = buffer.get_or_insert_with(|| EditBuffer::new(code));
                        edits.push(buffer.overwrite(target.start, target.end, form));
                    }
                    Err(warning) => {
                        warning.emit();
                        output.warnings.push(warning);
                    }
                }
            }

            if classified.decision.suffixes() {
                let buffer = buffer.get_or_insert_with(|| EditBuffer::new(code));
                edits.push(buffer.append(target.end, self.config.asset_suffix.as_str()));
            }

            for source in edits.into_iter().filter_map(Result::err) {
                let warning = RewriteWarning::InvalidEdit {
                    importer: importer.to_string(),
                    id: classified.id.to_string(),
                    source,
                };
                warning.emit();
                output.warnings.push(warning);
            }
        }

        output.resolve_time = bridge.elapsed();
        tracing::trace!(importer, resolutions = bridge.calls(), "resolution finished");
        if let Some(buffer) = buffer.filter(|b| !b.is_empty()) {
            tracing::trace!(importer, edits = buffer.len(), "applying import rewrites");
            output.code = Cow::Owned(buffer.finish());
        }

        Some(finish(output, started, importer))
    }
}

fn finish<'a>(
    mut output: TransformOutput<'a>,
    started: Instant,
    importer: &str,
) -> TransformOutput<'a> {
    output.total_time = started.elapsed();
    diagnostics::record(output.total_time, output.resolve_time, output.is_changed());
    tracing::debug!(
        importer,
        changed = output.is_changed(),
        warnings = output.warnings.len(),
        total_ms = diagnostics::millis(output.total_time),
        resolve_ms = diagnostics::millis(output.resolve_time),
        "import rewrite finished"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::testing::MapResolver;

    fn stage(resolver: MapResolver) -> (ImportTransform, Arc<MapResolver>) {
        let resolver = Arc::new(resolver);
        let transform = ImportTransform::new(RewriteConfig::default(), resolver.clone()).unwrap();
        (transform, resolver)
    }

    fn lodash() -> MapResolver {
        MapResolver::default().with("lodash", "/abs/node_modules/lodash/lodash.js")
    }

    #[tokio::test]
    async fn test_rewrite_static_bare_specifier() {
        let (stage, _) = stage(lodash());
        let out = stage.transform("import 'lodash'", "/src/main.js").await.unwrap();
        assert_eq!(out.code, "import '/@fs//abs/node_modules/lodash/lodash.js'");
        assert!(out.is_changed());
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_untouched_bytes_are_preserved() {
        let (stage, _) = stage(lodash());
        let code = "// header\nimport _ from \"lodash\" ;\n\nconst x = _.chunk([1, 2], 1);\n";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(
            out.code,
            "// header\nimport _ from \"/@fs//abs/node_modules/lodash/lodash.js\" ;\n\nconst x = _.chunk([1, 2], 1);\n"
        );
    }

    #[tokio::test]
    async fn test_no_imports_returns_original() {
        let (stage, resolver) = stage(lodash());
        let code = "export const answer = 42;";
        let out = stage.transform(code, "/src/answer.js").await.unwrap();
        assert!(matches!(out.code, Cow::Borrowed(c) if std::ptr::eq(c, code)));
        assert!(!out.is_changed());
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_path_like_specifiers_skip_resolution() {
        let (stage, resolver) = stage(lodash());
        let code = "import a from './a.js'; import b from '/b.js'; import('../c.js');";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert!(!out.is_changed());
        assert_eq!(out.code, code);
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stylesheet_suffix() {
        let (stage, resolver) = stage(lodash());
        let out = stage.transform("import './app.css'", "/src/main.js").await.unwrap();
        assert_eq!(out.code, "import './app.css.js'");
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bare_stylesheet_resolves_and_suffixes() {
        let resolver =
            MapResolver::default().with("normalize.css", "/abs/nm/normalize.css/normalize.css");
        let (stage, _) = stage(resolver);
        let out = stage.transform("import 'normalize.css';", "/src/main.js").await.unwrap();
        assert_eq!(out.code, "import '/@fs//abs/nm/normalize.css/normalize.css.js';");
    }

    #[tokio::test]
    async fn test_literal_dynamic_import_matches_static() {
        let (stage, _) = stage(lodash());
        let out = stage
            .transform("const m = import(/* chunk */ \"lodash\");", "/src/main.js")
            .await
            .unwrap();
        assert_eq!(
            out.code,
            "const m = import(/* chunk */ \"/@fs//abs/node_modules/lodash/lodash.js\");"
        );
    }

    #[tokio::test]
    async fn test_dynamic_stylesheet_suffix_stays_inside_quotes() {
        let (stage, _) = stage(lodash());
        let out = stage.transform("import('./theme.scss')", "/src/main.js").await.unwrap();
        assert_eq!(out.code, "import('./theme.scss.js')");
    }

    #[tokio::test]
    async fn test_dynamic_expression_warns_without_edit() {
        let (stage, resolver) = stage(lodash());
        let code = "import(someVar)";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(out.code, code);
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            &out.warnings[0],
            RewriteWarning::IgnoredDynamicExpression { expression, .. } if expression == "someVar"
        ));
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_import_meta_and_marker_are_silent() {
        let (stage, _) = stage(lodash());
        let code = "const u = import.meta.url; import(/* @vite-ignore */ path);";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(out.code, code);
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_import_meta_property_still_warns() {
        let (stage, _) = stage(lodash());
        let code = "const mod = import(import.meta.url);";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(out.code, code);
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            &out.warnings[0],
            RewriteWarning::IgnoredDynamicExpression { expression, .. }
                if expression == "import.meta.url"
        ));
    }

    #[tokio::test]
    async fn test_marker_inside_string_does_not_silence() {
        let (stage, _) = stage(lodash());
        let out = stage
            .transform("import(flag ? '@vite-ignore' : dyn);", "/src/main.js")
            .await
            .unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code(), "IGNORED_DYNAMIC_EXPRESSION");
    }

    #[tokio::test]
    async fn test_division_and_regex_do_not_block_rewrite() {
        let (stage, _) = stage(lodash());
        let code = "import 'lodash';\nlet i = 0; const half = i++ / 2;\nif (ok) /'/.test(s);\n";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert!(out.warnings.is_empty());
        assert_eq!(
            out.code,
            "import '/@fs//abs/node_modules/lodash/lodash.js';\nlet i = 0; const half = i++ / 2;\nif (ok) /'/.test(s);\n"
        );
    }

    #[tokio::test]
    async fn test_import_method_is_silent() {
        let (stage, resolver) = stage(lodash());
        let code = "class Loader { import(spec) { return spec; } }\nconst o = { import() {} };";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert!(out.warnings.is_empty());
        assert!(!out.is_changed());
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_bare_is_left_and_processing_continues() {
        let (stage, _) = stage(lodash());
        let code = "import 'missing'; import 'lodash';";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(
            out.code,
            "import 'missing'; import '/@fs//abs/node_modules/lodash/lodash.js';"
        );
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code(), "UNRESOLVED_BARE_SPECIFIER");
    }

    #[tokio::test]
    async fn test_resolver_error_is_warning() {
        let (stage, _) = stage(MapResolver::default().failing("broken"));
        let out = stage.transform("import 'broken';", "/src/main.js").await.unwrap();
        assert!(!out.is_changed());
        assert_eq!(out.warnings[0].code(), "RESOLVER_FAILED");
    }

    #[tokio::test]
    async fn test_scan_failure_returns_original() {
        let (stage, resolver) = stage(lodash());
        let code = "import x from 'lodash';\nconst el = <p>don't</p>;";
        let out = stage.transform(code, "/src/App.jsx").await.unwrap();
        assert_eq!(out.code, code);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code(), "SCAN_FAILURE");
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_skipped_importers_return_none() {
        let (stage, _) = stage(lodash());
        assert!(stage.transform("import 'lodash'", "/src/main.js.map").await.is_none());
        assert!(stage.transform("import 'lodash'", "/src/app.css").await.is_none());
        assert!(stage.transform("import 'lodash'", "/src/app.css.js").await.is_none());
    }

    #[tokio::test]
    async fn test_resolution_is_sequential_in_source_order() {
        let resolver = MapResolver::default()
            .with("a", "/nm/a.js")
            .with("b", "/nm/b.js")
            .with("c", "/nm/c.js");
        let (stage, resolver) = stage(resolver);
        let code = "import 'a'; export * from 'b'; import('c');";
        let out = stage.transform(code, "/src/main.js").await.unwrap();
        assert_eq!(
            out.code,
            "import '/@fs//nm/a.js'; export * from '/@fs//nm/b.js'; import('/@fs//nm/c.js');"
        );
        assert_eq!(*resolver.seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rerun_on_output_is_stable() {
        let (stage, resolver) = stage(lodash());
        let first = stage
            .transform("import 'lodash'; import './a.js';", "/src/main.js")
            .await
            .unwrap()
            .into_code()
            .into_owned();
        let calls = resolver.call_count();
        let second = stage.transform(&first, "/src/main.js").await.unwrap();
        assert!(!second.is_changed());
        assert_eq!(resolver.call_count(), calls);
    }

    #[tokio::test]
    async fn test_concurrent_invocations() {
        let (stage, _) = stage(lodash());
        let stage = Arc::new(stage);
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let stage = stage.clone();
                tokio::spawn(async move {
                    let code = format!("import 'lodash'; export const n = {i};");
                    let importer = format!("/src/m{i}.js");
                    let rewritten = stage
                        .transform(&code, &importer)
                        .await
                        .map(|out| out.into_code().into_owned());
                    rewritten
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let code = task.await.unwrap().unwrap();
            assert_eq!(
                code,
                format!("import '/@fs//abs/node_modules/lodash/lodash.js'; export const n = {i};")
            );
        }
    }
}
