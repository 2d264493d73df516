// SPDX-License-Identifier: AGPL-3.0-or-later

//! Byte spans over the source buffer.
//!
//! Every token and AST node carries one of these. Offsets stay absolute even
//! inside template-literal interpolations, so a span can always be sliced out
//! of the original buffer or turned into a line:column pair for diagnostics.

/// A half-open byte range `[start, end)` into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-width span, used for the end-of-input token.
    pub const fn empty(at: u32) -> Self {
        Self { start: at, end: at }
    }

    /// Placeholder for state that exists before anything was consumed.
    pub const fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// The smallest span covering both `self` and `other`. Statement and
    /// expression spans are built by folding this over their parts.
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The range form, for slicing the source buffer.
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Where this span starts, as a 1-based line:column pair.
    ///
    /// Derived by rescanning the buffer prefix: the line is one more than
    /// the number of newlines before `start`, the column counts characters
    /// since the last newline.
    pub fn location(&self, source: &str) -> Location {
        let prefix = source.get(..self.start as usize).unwrap_or(source);
        let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let line_start = prefix.rfind('\n').map(|at| at + 1).unwrap_or(0);
        let col = prefix[line_start..].chars().count() as u32 + 1;
        Location { line, col }
    }
}

/// A 1-based line:column position, produced by [`Span::location`] and
/// rendered as `line:col` in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_covers_both() {
        let folded = Span::new(4, 9).merge(Span::new(12, 20)).merge(Span::new(0, 2));
        assert_eq!(folded, Span::new(0, 20));
    }

    #[test]
    fn test_location_first_line() {
        let source = "let abc = 1;";
        assert_eq!(Span::new(0, 3).location(source).to_string(), "1:1");
        assert_eq!(Span::new(4, 7).location(source).to_string(), "1:5");
    }

    #[test]
    fn test_location_counts_lines() {
        let source = "a;\nbb;\n\nccc;";
        assert_eq!(Span::new(3, 5).location(source).to_string(), "2:1");
        assert_eq!(Span::new(8, 11).location(source).to_string(), "4:1");
    }

    #[test]
    fn test_location_columns_are_characters() {
        // The ü is two bytes but one column.
        let source = "let ü = 1;\nx";
        let x_at = source.rfind('x').expect("missing x") as u32;
        assert_eq!(Span::empty(x_at).location(source).to_string(), "2:1");
        let eq_at = source.find('=').expect("missing =") as u32;
        assert_eq!(Span::empty(eq_at).location(source).to_string(), "1:7");
    }
}
