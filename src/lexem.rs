//! Core positioned-input records shared by the lexer, term feeder and matcher.

use serde::Serialize;

/// Rule for deriving a lexeme's ordinal position from neighboring anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionBind {
    /// Gets its own ordinal position (a new anchor).
    #[default]
    Content,
    /// Takes the ordinal of the nearest following anchor; dropped if none.
    Successor,
    /// Takes the ordinal of the nearest preceding anchor; dropped if none.
    Predecessor,
    /// A run of unique items collapses into the position of the last one
    /// before the next content anchor.
    Unique,
}

/// Byte address of a match boundary: `(segment, offset)`, ordered
/// lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Address {
    pub segment: u32,
    pub offset: usize,
}

impl Address {
    pub fn new(segment: u32, offset: usize) -> Self {
        Self { segment, offset }
    }
}

/// An atomic, positioned, typed input unit consumed by the matcher.
/// Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexem {
    /// Lexeme type id (a term id or a symbol id).
    pub id: u32,
    /// Dense ordinal coordinate used for matching; 1-based.
    pub ordpos: u32,
    /// Caller-assigned segment number of the source span.
    pub segment: u32,
    /// Byte offset of the source span within its segment.
    pub offset: usize,
    /// Byte length of the source span.
    pub size: usize,
}

impl Lexem {
    pub fn new(id: u32, ordpos: u32, segment: u32, offset: usize, size: usize) -> Self {
        Self {
            id,
            ordpos,
            segment,
            offset,
            size,
        }
    }

    pub fn start(&self) -> Address {
        Address::new(self.segment, self.offset)
    }

    pub fn end(&self) -> Address {
        Address::new(self.segment, self.offset + self.size)
    }
}
