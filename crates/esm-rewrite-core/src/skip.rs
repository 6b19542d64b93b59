//! Fast checks on the importer's identity.

use crate::config::RewriteConfig;
use regex_lite::Regex;

/// Matches stylesheet requests: a known stylesheet extension followed by the
/// end of the id or a `?` query.
#[derive(Debug, Clone)]
pub struct StylesheetMatcher {
    pattern: Regex,
}

impl StylesheetMatcher {
    /// Build a matcher for the given extensions (without leading dots).
    pub fn new(extensions: &[String]) -> Result<Self, regex_lite::Error> {
        let alternatives: Vec<String> = extensions
            .iter()
            .map(|ext| regex_lite::escape(ext.trim_start_matches('.')))
            .collect();
        let pattern = Regex::new(&format!(r"\.(?:{})(?:$|\?)", alternatives.join("|")))?;
        Ok(Self { pattern })
    }

    /// Whether `id` refers to a stylesheet.
    #[must_use]
    pub fn is_asset_request(&self, id: &str) -> bool {
        self.pattern.is_match(id)
    }
}

/// Decides whether a module is bypassed by the rewrite stage entirely.
#[derive(Debug, Clone)]
pub struct SkipPredicate {
    skip_extensions: Vec<String>,
    asset_suffix: String,
    stylesheets: StylesheetMatcher,
}

impl SkipPredicate {
    pub fn new(config: &RewriteConfig, stylesheets: StylesheetMatcher) -> Self {
        Self {
            skip_extensions: config.skip_extensions.clone(),
            asset_suffix: config.asset_suffix.clone(),
            stylesheets,
        }
    }

    /// The stylesheet matcher shared with the rewrite decisions.
    #[must_use]
    pub fn stylesheets(&self) -> &StylesheetMatcher {
        &self.stylesheets
    }

    /// Returns true if the stage must not run for `importer`.
    #[must_use]
    pub fn should_skip(&self, importer: &str) -> bool {
        let reason = if self
            .skip_extensions
            .iter()
            .any(|ext| importer.ends_with(ext.as_str()))
        {
            "non-rewritable extension"
        } else if self.stylesheets.is_asset_request(importer) {
            "stylesheet request"
        } else if importer
            .strip_suffix(self.asset_suffix.as_str())
            .is_some_and(|stripped| self.stylesheets.is_asset_request(stripped))
        {
            "stylesheet module already suffixed"
        } else {
            return false;
        };

        tracing::trace!(importer, reason, "skipping import rewrite");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicate() -> SkipPredicate {
        let config = RewriteConfig::default();
        let matcher = StylesheetMatcher::new(&config.stylesheet_extensions).unwrap();
        SkipPredicate::new(&config, matcher)
    }

    #[test]
    fn test_stylesheet_matcher() {
        let matcher = StylesheetMatcher::new(&RewriteConfig::default().stylesheet_extensions)
            .unwrap();
        assert!(matcher.is_asset_request("./app.css"));
        assert!(matcher.is_asset_request("/src/theme.scss"));
        assert!(matcher.is_asset_request("./a.less?inline"));
        assert!(!matcher.is_asset_request("./app.css.js"));
        assert!(!matcher.is_asset_request("./cssutils.js"));
        assert!(!matcher.is_asset_request("lodash"));
    }

    #[test]
    fn test_extensions_with_dots_are_accepted() {
        let matcher = StylesheetMatcher::new(&[".css".to_string()]).unwrap();
        assert!(matcher.is_asset_request("x.css"));
    }

    #[test]
    fn test_skips_map_and_metadata() {
        let p = predicate();
        assert!(p.should_skip("/src/main.js.map"));
        assert!(p.should_skip("/package.json"));
    }

    #[test]
    fn test_skips_stylesheets() {
        let p = predicate();
        assert!(p.should_skip("/src/app.css"));
        assert!(p.should_skip("/src/app.module.scss?used"));
    }

    #[test]
    fn test_skips_suffixed_stylesheets() {
        let p = predicate();
        assert!(p.should_skip("/src/app.css.js"));
    }

    #[test]
    fn test_runs_on_scripts() {
        let p = predicate();
        assert!(!p.should_skip("/src/main.js"));
        assert!(!p.should_skip("/src/App.tsx"));
        assert!(!p.should_skip("/src/styles.js"));
    }
}
