//! Positional text edits over an immutable source.
//!
//! Edits are expressed in the coordinates of the original text and must be
//! recorded in ascending, non-overlapping order. Nothing is copied until
//! [`EditBuffer::finish`] materializes the result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Overwrite {
        start: usize,
        end: usize,
        text: String,
    },
    Append {
        offset: usize,
        text: String,
    },
}

impl Edit {
    fn start(&self) -> usize {
        match self {
            Self::Overwrite { start, .. } => *start,
            Self::Append { offset, .. } => *offset,
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Overwrite { text, .. } | Self::Append { text, .. } => text,
        }
    }
}

/// Rejected edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("edit at {offset} precedes or overlaps the previous edit ending at {cursor}")]
    OutOfOrder { offset: usize, cursor: usize },
    #[error("offset {offset} is past the end of the source ({len} bytes)")]
    OutOfBounds { offset: usize, len: usize },
    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },
    #[error("range {start}..{end} is inverted")]
    InvertedRange { start: usize, end: usize },
}

/// Append/overwrite buffer over an original source string.
#[derive(Debug)]
pub struct EditBuffer<'a> {
    original: &'a str,
    edits: Vec<Edit>,
    /// End of the region touched by the last edit.
    cursor: usize,
}

impl<'a> EditBuffer<'a> {
    #[must_use]
    pub fn new(original: &'a str) -> Self {
        Self {
            original,
            edits: Vec::new(),
            cursor: 0,
        }
    }

    /// Replace `start..end` of the original text with `text`.
    pub fn overwrite(
        &mut self,
        start: usize,
        end: usize,
        text: impl Into<String>,
    ) -> Result<(), PatchError> {
        if start > end {
            return Err(PatchError::InvertedRange { start, end });
        }
        self.check_offset(start)?;
        self.check_offset(end)?;
        self.edits.push(Edit::Overwrite {
            start,
            end,
            text: text.into(),
        });
        self.cursor = end;
        Ok(())
    }

    /// Insert `text` immediately after `offset` of the original text.
    pub fn append(&mut self, offset: usize, text: impl Into<String>) -> Result<(), PatchError> {
        self.check_offset(offset)?;
        self.edits.push(Edit::Append {
            offset,
            text: text.into(),
        });
        self.cursor = offset;
        Ok(())
    }

    fn check_offset(&self, offset: usize) -> Result<(), PatchError> {
        if offset < self.cursor {
            return Err(PatchError::OutOfOrder {
                offset,
                cursor: self.cursor,
            });
        }
        if offset > self.original.len() {
            return Err(PatchError::OutOfBounds {
                offset,
                len: self.original.len(),
            });
        }
        if !self.original.is_char_boundary(offset) {
            return Err(PatchError::NotCharBoundary { offset });
        }
        Ok(())
    }

    /// Number of recorded edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply every edit and return the resulting text.
    #[must_use]
    pub fn finish(self) -> String {
        let added: usize = self.edits.iter().map(|e| e.text().len()).sum();
        let mut out = String::with_capacity(self.original.len() + added);
        let mut pos = 0;

        for edit in &self.edits {
            out.push_str(&self.original[pos..edit.start()]);
            out.push_str(edit.text());
            pos = match edit {
                Edit::Overwrite { end, .. } => *end,
                Edit::Append { offset, .. } => *offset,
            };
        }

        out.push_str(&self.original[pos..]);
        out
    }
}
