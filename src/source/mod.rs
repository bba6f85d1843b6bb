pub mod source_map;
pub use source_map::SourceMap;

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Used for bytes that have no source, e.g. hand-assembled chunks.
    /// Distinct from any real span, including an empty one at offset 0.
    pub const UNKNOWN: Span = Span { start: usize::MAX, end: usize::MAX };

    pub fn new(range: std::ops::Range<usize>) -> Self {
        Span { start: range.start, end: range.end }
    }

    pub fn is_unknown(self) -> bool {
        self == Span::UNKNOWN
    }
}
