//! Module specifier scanner.
//!
//! Walks JavaScript/TypeScript module source and records the span of every
//! static import/export specifier, dynamic `import()` argument and
//! `import.meta` reference without building an AST. Comments, strings,
//! template literals and regular expression literals are skipped so that
//! `import` appearing inside them is never reported.

use thiserror::Error;
use tokio::sync::OnceCell;

/// Keywords after which a `/` starts a regular expression literal.
const KEYWORDS_BEFORE_REGEX: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Keywords whose parenthesized head ends a statement prefix, so a `/`
/// after the closing `)` starts a regular expression.
const CONTROL_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

/// How an occurrence was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceKind {
    /// `import x from '…'`, `import '…'`, `export … from '…'`.
    Static,
    /// `import(…)`; `args_start` is the offset of the opening parenthesis.
    Dynamic { args_start: usize },
    /// `import.meta`.
    ImportMeta,
}

/// One module reference found in the source.
///
/// For static occurrences `start..end` covers the specifier between its
/// quotes. For dynamic occurrences it covers the whole argument list between
/// the parentheses. For `import.meta` it covers the expression itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOccurrence {
    pub start: usize,
    pub end: usize,
    pub kind: OccurrenceKind,
}

impl ImportOccurrence {
    /// Offset where the dynamic call's argument list begins, if dynamic.
    #[must_use]
    pub fn dynamic_index(&self) -> Option<usize> {
        match self.kind {
            OccurrenceKind::Static => None,
            OccurrenceKind::Dynamic { args_start } => Some(args_start),
            OccurrenceKind::ImportMeta => Some(self.start),
        }
    }

    /// Source text covered by this occurrence.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Scanner failure. The source cannot be tokenized with this scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct ScanError {
    pub offset: usize,
    pub kind: ScanErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated template literal")]
    UnterminatedTemplate,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated regular expression")]
    UnterminatedRegex,
    #[error("unterminated dynamic import")]
    UnterminatedImport,
    #[error("unexpected closing `{0}`")]
    UnexpectedClose(char),
    #[error("unclosed bracket")]
    UnclosedBracket,
}

impl ScanError {
    fn new(offset: usize, kind: ScanErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Byte classification tables shared by every scan.
///
/// Built once per process by [`init`].
pub struct ScanTables {
    ident_start: [bool; 256],
    ident_part: [bool; 256],
}

impl ScanTables {
    fn build() -> Self {
        let mut ident_start = [false; 256];
        let mut ident_part = [false; 256];
        for b in 0..=255u8 {
            let start = b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80;
            ident_start[usize::from(b)] = start;
            ident_part[usize::from(b)] = start || b.is_ascii_digit();
        }
        Self {
            ident_start,
            ident_part,
        }
    }

    /// Scan source text for import occurrences, in source order.
    pub fn scan(&self, source: &str) -> Result<Vec<ImportOccurrence>, ScanError> {
        Scanner::new(self, source).run()
    }
}

static TABLES: OnceCell<ScanTables> = OnceCell::const_new();

/// Initialize the scanner.
///
/// Safe to call any number of times from concurrent tasks; all callers share
/// the single initialization.
pub async fn init() -> &'static ScanTables {
    TABLES
        .get_or_init(|| async {
            tracing::debug!("initializing specifier scanner");
            ScanTables::build()
        })
        .await
}

/// Initialize (if needed) and scan `source`.
pub async fn scan(source: &str) -> Result<Vec<ImportOccurrence>, ScanError> {
    init().await.scan(source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    /// `control` marks the head of `if (…)`, `while (…)` and the like.
    Paren { control: bool },
    Square,
    Brace,
    TemplateExpr,
    /// Argument list of a recorded `import(…)`.
    ///
    /// `method_like` is set when the call could instead be a method named
    /// `import` in a class or object body.
    DynamicImport { index: usize, method_like: bool },
}

/// Last significant token, used to tell regex literals from division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Punct(u8),
    Word { start: usize, end: usize },
    Spread,
    Value,
    /// The `)` closing a control statement head.
    ControlHead,
}

struct Scanner<'a> {
    tables: &'a ScanTables,
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<(Bracket, usize)>,
    prev: Prev,
    occurrences: Vec<ImportOccurrence>,
    open_dynamic: usize,
}

impl<'a> Scanner<'a> {
    fn new(tables: &'a ScanTables, src: &'a str) -> Self {
        Self {
            tables,
            src,
            bytes: src.as_bytes(),
            pos: 0,
            stack: Vec::new(),
            prev: Prev::Start,
            occurrences: Vec::new(),
            open_dynamic: 0,
        }
    }

    fn run(mut self) -> Result<Vec<ImportOccurrence>, ScanError> {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' => match self.bytes.get(self.pos + 1) {
                    Some(b'/') => self.pos = self.line_comment_end(self.pos),
                    Some(b'*') => self.pos = self.block_comment_end(self.pos)?,
                    _ if self.regex_allowed() => {
                        self.skip_regex()?;
                        self.prev = Prev::Value;
                    }
                    _ => {
                        self.pos += 1;
                        self.prev = Prev::Punct(b);
                    }
                },
                b'\'' | b'"' => {
                    self.pos = self.string_end(self.pos)? + 1;
                    self.prev = Prev::Value;
                }
                b'`' => {
                    let start = self.pos;
                    self.pos += 1;
                    self.skip_template_chunk(start)?;
                }
                b'(' => {
                    let control = self.prev_word_in(CONTROL_KEYWORDS);
                    self.open(Bracket::Paren { control });
                }
                b'[' => self.open(Bracket::Square),
                b'{' => self.open(Bracket::Brace),
                b')' | b']' | b'}' => self.close(b)?,
                b'.' if self.src[self.pos..].starts_with("...") => {
                    self.pos += 3;
                    self.prev = Prev::Spread;
                }
                b'0'..=b'9' => {
                    while self
                        .bytes
                        .get(self.pos)
                        .is_some_and(|&c| self.tables.ident_part[usize::from(c)] || c == b'.')
                    {
                        self.pos += 1;
                    }
                    self.prev = Prev::Value;
                }
                _ if self.tables.ident_start[usize::from(b)] => self.word()?,
                b'+' | b'-' if self.bytes.get(self.pos + 1) == Some(&b) => {
                    self.pos += 2;
                    // Postfix `++`/`--` leaves a value behind; prefix does not.
                    self.prev = if self.ends_value() {
                        Prev::Value
                    } else {
                        Prev::Punct(b)
                    };
                }
                _ => {
                    self.pos += 1;
                    self.prev = Prev::Punct(b);
                }
            }
        }

        if let Some(&(bracket, offset)) = self.stack.last() {
            let kind = match bracket {
                Bracket::DynamicImport { .. } => ScanErrorKind::UnterminatedImport,
                Bracket::TemplateExpr => ScanErrorKind::UnterminatedTemplate,
                _ => ScanErrorKind::UnclosedBracket,
            };
            return Err(ScanError::new(offset, kind));
        }

        Ok(self.occurrences)
    }

    fn open(&mut self, bracket: Bracket) {
        self.stack.push((bracket, self.pos));
        self.prev = Prev::Punct(self.bytes[self.pos]);
        self.pos += 1;
    }

    fn close(&mut self, b: u8) -> Result<(), ScanError> {
        let unexpected = ScanError::new(self.pos, ScanErrorKind::UnexpectedClose(char::from(b)));
        let Some((bracket, _)) = self.stack.pop() else {
            return Err(unexpected);
        };

        match (bracket, b) {
            (Bracket::Paren { control: true }, b')') => {
                self.pos += 1;
                self.prev = Prev::ControlHead;
            }
            (Bracket::Paren { control: false }, b')') | (Bracket::Square, b']') => {
                self.pos += 1;
                self.prev = Prev::Value;
            }
            (Bracket::Brace, b'}') => {
                self.pos += 1;
                self.prev = Prev::Punct(b);
            }
            (Bracket::DynamicImport { index, method_like }, b')') => {
                self.occurrences[index].end = self.pos;
                self.open_dynamic -= 1;
                self.pos += 1;
                self.prev = Prev::Value;
                // `import(…) {` is a method definition, not a module load.
                if method_like && self.bytes.get(self.skip_trivia(self.pos)?) == Some(&b'{') {
                    self.occurrences.truncate(index);
                }
            }
            (Bracket::TemplateExpr, b'}') => {
                let start = self.pos;
                self.pos += 1;
                self.skip_template_chunk(start)?;
            }
            _ => return Err(unexpected),
        }
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        match self.prev {
            Prev::Start | Prev::Spread | Prev::ControlHead => true,
            Prev::Value | Prev::Punct(b')' | b']') => false,
            Prev::Punct(_) => true,
            Prev::Word { .. } => self.prev_word_in(KEYWORDS_BEFORE_REGEX),
        }
    }

    fn prev_word_in(&self, words: &[&str]) -> bool {
        match self.prev {
            Prev::Word { start, end } => words.contains(&&self.src[start..end]),
            _ => false,
        }
    }

    /// Whether the previous token completes an operand.
    fn ends_value(&self) -> bool {
        match self.prev {
            Prev::Value | Prev::Punct(b')' | b']') => true,
            Prev::Word { .. } => !self.prev_word_in(KEYWORDS_BEFORE_REGEX),
            Prev::Start | Prev::Spread | Prev::ControlHead | Prev::Punct(_) => false,
        }
    }

    /// Whether `import` at the current token could name a method.
    fn in_member_position(&self) -> bool {
        matches!(self.prev, Prev::Punct(b'{' | b';' | b'}' | b','))
            && matches!(self.stack.last(), Some((Bracket::Brace, _)))
    }

    fn word(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        let end = self.ident_end(start);
        self.pos = end;

        // Property names (`foo.import`) are never keywords.
        if self.prev == Prev::Punct(b'.') {
            self.prev = Prev::Value;
            return Ok(());
        }

        match &self.src[start..end] {
            "import" => self.import_keyword(start, end),
            "export" => self.export_keyword(start, end),
            _ => {
                self.prev = Prev::Word { start, end };
                Ok(())
            }
        }
    }

    fn import_keyword(&mut self, kw_start: usize, kw_end: usize) -> Result<(), ScanError> {
        let next = self.skip_trivia(kw_end)?;
        match self.bytes.get(next) {
            Some(b'(') => {
                let method_like = self.in_member_position();
                let bracket = match self.record(
                    next + 1,
                    next + 1,
                    OccurrenceKind::Dynamic { args_start: next },
                ) {
                    Some(index) => {
                        self.open_dynamic += 1;
                        Bracket::DynamicImport { index, method_like }
                    }
                    None => Bracket::Paren { control: false },
                };
                self.stack.push((bracket, next));
                self.pos = next + 1;
                self.prev = Prev::Punct(b'(');
            }
            Some(b'.') => {
                let name_start = self.skip_trivia(next + 1)?;
                let name_end = self.ident_end(name_start);
                if &self.src[name_start..name_end] == "meta" {
                    self.record(kw_start, name_end, OccurrenceKind::ImportMeta);
                    self.pos = name_end;
                }
                self.prev = Prev::Value;
            }
            _ => match self.from_clause(next, true)? {
                Some((start, end)) => {
                    self.record(start, end, OccurrenceKind::Static);
                    self.pos = end + 1;
                    self.prev = Prev::Value;
                }
                None => {
                    self.prev = Prev::Word {
                        start: kw_start,
                        end: kw_end,
                    };
                }
            },
        }
        Ok(())
    }

    fn export_keyword(&mut self, kw_start: usize, kw_end: usize) -> Result<(), ScanError> {
        if let Some((start, end)) = self.from_clause(kw_end, false)? {
            self.record(start, end, OccurrenceKind::Static);
            self.pos = end + 1;
            self.prev = Prev::Value;
        } else {
            self.prev = Prev::Word {
                start: kw_start,
                end: kw_end,
            };
        }
        Ok(())
    }

    /// Recognize the clause following `import`/`export` up to its `from '…'`
    /// specifier (or a bare `'…'` for side-effect imports).
    ///
    /// Returns the specifier span between the quotes, or `None` when the
    /// statement does not reference a module.
    fn from_clause(
        &self,
        start: usize,
        allow_side_effect: bool,
    ) -> Result<Option<(usize, usize)>, ScanError> {
        let mut i = start;
        let mut consumed = false;
        let mut after_from = false;

        loop {
            i = self.skip_trivia(i)?;
            let Some(&b) = self.bytes.get(i) else {
                return Ok(None);
            };

            match b {
                b'\'' | b'"' => {
                    if after_from || (allow_side_effect && !consumed) {
                        let end = self.string_end(i)?;
                        return Ok(Some((i + 1, end)));
                    }
                    return Ok(None);
                }
                _ if after_from => return Ok(None),
                b'{' => {
                    let Some(end) = self.named_bindings_end(i)? else {
                        return Ok(None);
                    };
                    i = end;
                    consumed = true;
                }
                b'*' | b',' => {
                    i += 1;
                    consumed = true;
                }
                _ if self.tables.ident_start[usize::from(b)] => {
                    let end = self.ident_end(i);
                    if consumed && &self.src[i..end] == "from" {
                        after_from = true;
                    } else {
                        consumed = true;
                    }
                    i = end;
                }
                _ => return Ok(None),
            }
        }
    }

    /// End (exclusive) of a `{ a, b as c, "d-e" as f }` binding list.
    fn named_bindings_end(&self, open: usize) -> Result<Option<usize>, ScanError> {
        let mut i = open + 1;
        loop {
            i = self.skip_trivia(i)?;
            match self.bytes.get(i) {
                None | Some(b'{') => return Ok(None),
                Some(b'}') => return Ok(Some(i + 1)),
                Some(b'\'' | b'"') => i = self.string_end(i)? + 1,
                Some(_) => i += 1,
            }
        }
    }

    fn record(&mut self, start: usize, end: usize, kind: OccurrenceKind) -> Option<usize> {
        // Nothing inside a dynamic import argument is reported on its own.
        if self.open_dynamic > 0 {
            return None;
        }
        self.occurrences.push(ImportOccurrence { start, end, kind });
        Some(self.occurrences.len() - 1)
    }

    fn ident_end(&self, mut i: usize) -> usize {
        while self
            .bytes
            .get(i)
            .is_some_and(|&c| self.tables.ident_part[usize::from(c)])
        {
            i += 1;
        }
        i
    }

    /// Skip whitespace and comments starting at `i`.
    fn skip_trivia(&self, mut i: usize) -> Result<usize, ScanError> {
        loop {
            match (self.bytes.get(i), self.bytes.get(i + 1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c), _) => i += 1,
                (Some(b'/'), Some(b'/')) => i = self.line_comment_end(i),
                (Some(b'/'), Some(b'*')) => i = self.block_comment_end(i)?,
                _ => return Ok(i),
            }
        }
    }

    fn line_comment_end(&self, start: usize) -> usize {
        self.src[start..]
            .find('\n')
            .map_or(self.bytes.len(), |idx| start + idx)
    }

    fn block_comment_end(&self, start: usize) -> Result<usize, ScanError> {
        self.src[start + 2..]
            .find("*/")
            .map(|idx| start + 2 + idx + 2)
            .ok_or(ScanError::new(start, ScanErrorKind::UnterminatedComment))
    }

    /// Offset of the closing quote of the string starting at `start`.
    fn string_end(&self, start: usize) -> Result<usize, ScanError> {
        let quote = self.bytes[start];
        let mut i = start + 1;
        loop {
            match self.bytes.get(i) {
                Some(b'\\') => i += 2,
                Some(&c) if c == quote => return Ok(i),
                Some(b'\n' | b'\r') | None => {
                    return Err(ScanError::new(start, ScanErrorKind::UnterminatedString))
                }
                Some(_) => i += 1,
            }
        }
    }

    /// Skip template text up to the closing backtick or the next `${`.
    fn skip_template_chunk(&mut self, start: usize) -> Result<(), ScanError> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b'\\') => self.pos += 2,
                Some(b'`') => {
                    self.pos += 1;
                    self.prev = Prev::Value;
                    return Ok(());
                }
                Some(b'$') if self.bytes.get(self.pos + 1) == Some(&b'{') => {
                    self.stack.push((Bracket::TemplateExpr, self.pos));
                    self.pos += 2;
                    self.prev = Prev::Punct(b'{');
                    return Ok(());
                }
                Some(_) => self.pos += 1,
                None => return Err(ScanError::new(start, ScanErrorKind::UnterminatedTemplate)),
            }
        }
    }

    fn skip_regex(&mut self) -> Result<(), ScanError> {
        let start = self.pos;
        let mut in_class = false;
        self.pos += 1;
        loop {
            match self.bytes.get(self.pos) {
                Some(b'\\') => self.pos += 2,
                Some(b'[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some(b'/') if !in_class => {
                    self.pos = self.ident_end(self.pos + 1);
                    return Ok(());
                }
                Some(b'\n' | b'\r') | None => {
                    return Err(ScanError::new(start, ScanErrorKind::UnterminatedRegex))
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}
