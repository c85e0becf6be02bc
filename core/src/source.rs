//! Source spans for located diagnostics.
//!
//! Every user-actionable error carries a span sufficient to highlight the
//! exact offending token or sub-expression. Multi-line spans are reported as
//! (startLine,startCol)-(endLine,endCol).

use crate::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A location range inside one source unit. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub source: SourceId,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceSpan {
    /// Create a span covering a range within one source.
    pub fn new(
        source: impl Into<SourceId>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            source: source.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Create a span covering a single point.
    pub fn point(source: impl Into<SourceId>, line: u32, column: u32) -> Self {
        Self::new(source, line, column, line, column)
    }

    pub fn is_multi_line(&self) -> bool {
        self.start_line != self.end_line
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_multi_line() {
            write!(
                f,
                "{}:({},{})-({},{})",
                self.source, self.start_line, self.start_column, self.end_line, self.end_column
            )
        } else if self.start_column != self.end_column {
            write!(
                f,
                "{} line:{} column:{}-{}",
                self.source, self.start_line, self.start_column, self.end_column
            )
        } else {
            write!(
                f,
                "{} line:{} column:{}",
                self.source, self.start_line, self.start_column
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_span_display() {
        let span = SourceSpan::point("/a.loam", 3, 7);
        assert_eq!(span.to_string(), "/a.loam line:3 column:7");
    }

    #[test]
    fn test_single_line_range_display() {
        let span = SourceSpan::new("/a.loam", 3, 7, 3, 12);
        assert_eq!(span.to_string(), "/a.loam line:3 column:7-12");
    }

    #[test]
    fn test_multi_line_range_display() {
        let span = SourceSpan::new("/a.loam", 3, 7, 5, 2);
        assert_eq!(span.to_string(), "/a.loam:(3,7)-(5,2)");
    }
}
