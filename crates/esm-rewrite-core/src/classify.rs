//! Per-occurrence rewrite decisions.
//!
//! Turns a raw [`ImportOccurrence`] into a [`Specifier`] (static, literal
//! dynamic, or expression dynamic) and decides what the rewrite stage does
//! with it.

use crate::scan::{ImportOccurrence, OccurrenceKind};
use crate::skip::StylesheetMatcher;
use std::borrow::Cow;

/// Byte range in the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// An occurrence after dynamic-argument analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    /// Specifier of a static import/export; the span excludes the quotes.
    Static(Span),
    /// `import('…')` with a single string literal argument. `span` is the
    /// whole argument list, `inner` the literal's content between its quotes.
    DynamicLiteral { span: Span, inner: Span },
    /// `import(expr)` or `import.meta`.
    DynamicExpression(Span),
}

impl Specifier {
    /// The region edits are applied to.
    #[must_use]
    pub fn target(&self) -> Span {
        match *self {
            Self::Static(span) | Self::DynamicExpression(span) => span,
            Self::DynamicLiteral { inner, .. } => inner,
        }
    }
}

/// What the rewrite stage does with one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Eligible, but path-like and not a stylesheet: nothing to do.
    Skip,
    ResolveBare,
    SuffixAsset,
    ResolveBareAndSuffixAsset,
    /// Unanalyzable dynamic expression; warn and leave untouched.
    WarnIgnoredDynamic,
    /// `import.meta` or explicitly marked; leave untouched silently.
    Ignore,
}

impl Decision {
    #[must_use]
    pub fn resolves(self) -> bool {
        matches!(self, Self::ResolveBare | Self::ResolveBareAndSuffixAsset)
    }

    #[must_use]
    pub fn suffixes(self) -> bool {
        matches!(self, Self::SuffixAsset | Self::ResolveBareAndSuffixAsset)
    }
}

/// A classified occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'a> {
    pub specifier: Specifier,
    /// Module id: the unquoted literal for static and literal-dynamic
    /// specifiers, the raw expression text otherwise.
    pub id: &'a str,
    pub decision: Decision,
}

/// Classify one occurrence of `source`.
#[must_use]
pub fn classify<'a>(
    occurrence: &ImportOccurrence,
    source: &'a str,
    stylesheets: &StylesheetMatcher,
    ignore_marker: &str,
) -> Classified<'a> {
    let span = Span::new(occurrence.start, occurrence.end);
    let specifier = match occurrence.kind {
        OccurrenceKind::Static => Specifier::Static(span),
        OccurrenceKind::Dynamic { .. } | OccurrenceKind::ImportMeta => {
            dynamic_specifier(span, source)
        }
    };

    let id = match specifier {
        Specifier::Static(span) | Specifier::DynamicExpression(span) => span.text(source),
        Specifier::DynamicLiteral { inner, .. } => inner.text(source),
    };

    let decision = match specifier {
        Specifier::DynamicExpression(_) => {
            if id == "import.meta" || has_marker_comment(id, ignore_marker) {
                Decision::Ignore
            } else {
                Decision::WarnIgnoredDynamic
            }
        }
        Specifier::Static(_) | Specifier::DynamicLiteral { .. } => {
            match (is_bare(id), stylesheets.is_asset_request(id)) {
                (true, true) => Decision::ResolveBareAndSuffixAsset,
                (true, false) => Decision::ResolveBare,
                (false, true) => Decision::SuffixAsset,
                (false, false) => Decision::Skip,
            }
        }
    };

    Classified {
        specifier,
        id,
        decision,
    }
}

fn dynamic_specifier(span: Span, source: &str) -> Specifier {
    let raw = span.text(source);
    let stripped = strip_comments(raw);
    let literal = stripped.trim();
    if !is_single_string_literal(literal) {
        return Specifier::DynamicExpression(span);
    }

    // Comments were only removed outside the literal, so it appears verbatim
    // right after the leading whitespace and comments of the raw text.
    let quote = span.start + leading_trivia_len(raw);
    let inner = Span::new(quote + 1, quote + literal.len() - 1);
    Specifier::DynamicLiteral { span, inner }
}

/// A bare specifier names a package rather than a path.
#[must_use]
pub fn is_bare(id: &str) -> bool {
    !id.is_empty() && !id.starts_with(['/', '.'])
}

/// Remove block and line comments, leaving string and template contents
/// untouched.
#[must_use]
pub fn strip_comments(text: &str) -> Cow<'_, str> {
    let comments = comment_ranges(text);
    if comments.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut copied_from = 0;
    for (start, end) in comments {
        out.push_str(&text[copied_from..start]);
        copied_from = end;
    }
    out.push_str(&text[copied_from..]);
    Cow::Owned(out)
}

/// Whether a comment in `text` carries `marker`. Strings do not count.
#[must_use]
pub fn has_marker_comment(text: &str, marker: &str) -> bool {
    !marker.is_empty()
        && comment_ranges(text)
            .into_iter()
            .any(|(start, end)| text[start..end].contains(marker))
}

/// Byte ranges of the block and line comments in `text`, delimiters included.
fn comment_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    if !text.contains("/*") && !text.contains("//") {
        return ranges;
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |idx| i + 2 + idx + 2);
                ranges.push((i, end));
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = text[i..].find('\n').map_or(bytes.len(), |idx| i + idx);
                ranges.push((i, end));
                i = end;
            }
            _ => i += 1,
        }
    }
    ranges
}

/// Exactly one single- or double-quoted string literal and nothing else.
fn is_single_string_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let Some(&quote) = bytes.first() else {
        return false;
    };
    if quote != b'\'' && quote != b'"' {
        return false;
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' | b'\r' => return false,
            c if c == quote => return i == bytes.len() - 1,
            _ => i += 1,
        }
    }
    false
}

/// Length of leading whitespace and comments.
fn leading_trivia_len(text: &str) -> usize {
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |idx| &after[idx + 2..]);
        } else if let Some(after) = trimmed.strip_prefix("//") {
            rest = after.find('\n').map_or("", |idx| &after[idx..]);
        } else {
            return text.len() - trimmed.len();
        }
    }
}
