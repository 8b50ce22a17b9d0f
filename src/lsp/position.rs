//! Coordinate translation between editor offsets and service positions.
//!
//! Editor side: byte offsets into the buffer, or one-indexed
//! `EditorPosition`s for widgets that count lines and columns from 1.
//! Service side: zero-indexed `lsp_types::Position`, characters counted in
//! UTF-16 code units. Nothing outside this module converts between them.

use std::ops::Range as Span;

use lsp_types::{Position, Range};

/// Line table over a document, built once per query.
#[derive(Debug)]
pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Service position of a byte offset. Out-of-range offsets clamp to the
    /// end of the document, offsets inside a character snap back to its start.
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = self.floor_boundary(offset.min(self.text.len()));
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let character = self.text[start..offset].encode_utf16().count();
        Position::new(line as u32, character as u32)
    }

    /// Byte offset of a service position: locate the line, then walk the
    /// character offset forward. Never exceeds the document length, even
    /// when the service describes text the editor no longer has.
    pub fn offset_of(&self, pos: Position) -> usize {
        let Some(&start) = self.line_starts.get(pos.line as usize) else {
            return self.text.len();
        };
        let mut units = 0u32;
        for (i, c) in self.text[start..].char_indices() {
            if units >= pos.character {
                return start + i;
            }
            units += c.len_utf16() as u32;
        }
        self.text.len()
    }

    /// Byte span of a service range, with `end >= start`.
    pub fn span_of(&self, range: Range) -> Span<usize> {
        let from = self.offset_of(range.start);
        let to = self.offset_of(range.end).max(from);
        from..to
    }

    /// Byte offset of a one-indexed editor position.
    pub fn offset_at(&self, pos: EditorPosition) -> usize {
        self.offset_of(pos.to_service())
    }

    /// One-indexed editor range covering a byte span.
    pub fn editor_range(&self, span: Span<usize>) -> EditorRange {
        EditorRange::from_service(Range::new(
            self.position_of(span.start),
            self.position_of(span.end),
        ))
    }

    fn floor_boundary(&self, mut offset: usize) -> usize {
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}

/// One-indexed position, as used by full-featured editor widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorPosition {
    pub line_number: u32,
    pub column: u32,
}

impl EditorPosition {
    pub fn new(line_number: u32, column: u32) -> Self {
        Self {
            line_number,
            column,
        }
    }

    pub fn from_service(pos: Position) -> Self {
        Self::new(pos.line + 1, pos.character + 1)
    }

    pub fn to_service(self) -> Position {
        Position::new(
            self.line_number.saturating_sub(1),
            self.column.saturating_sub(1),
        )
    }
}

/// One-indexed range in editor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorRange {
    pub start: EditorPosition,
    pub end: EditorPosition,
}

impl EditorRange {
    pub fn from_service(range: Range) -> Self {
        Self {
            start: EditorPosition::from_service(range.start),
            end: EditorPosition::from_service(range.end),
        }
    }
}
