//! Common error types for LOAM.

use crate::SourceSpan;

/// A semantic validation failure: type mismatch, multiplicity mismatch,
/// unresolved reference, duplicate definition. Always user-actionable, so it
/// carries the best source span available (the offending node's own, or its
/// closest ancestor's).
#[derive(Debug, Clone)]
pub struct CompilationError {
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl CompilationError {
    pub fn new(message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn located(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(message, Some(span))
    }

    pub fn unlocated(message: impl Into<String>) -> Self {
        Self::new(message, None)
    }

    pub fn line(&self) -> Option<u32> {
        self.span.as_ref().map(|s| s.start_line)
    }

    pub fn column(&self) -> Option<u32> {
        self.span.as_ref().map(|s| s.start_column)
    }
}

impl std::fmt::Display for CompilationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(f, "Compilation error at {}: {}", span, self.message),
            None => write!(f, "Compilation error: {}", self.message),
        }
    }
}

impl std::error::Error for CompilationError {}

/// Result type for semantic compilation steps.
pub type CompilationResult<T> = Result<T, CompilationError>;

/// A parse error with location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: SourceSpan,
    pub expected: Option<Vec<String>>,
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
            expected: None,
            found: None,
        }
    }

    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn unexpected_eof(span: SourceSpan, expected: &str) -> Self {
        Self {
            message: format!("unexpected end of input, expected {}", expected),
            span,
            expected: Some(vec![expected.to_string()]),
            found: Some("end of input".to_string()),
        }
    }

    pub fn unexpected_token(span: SourceSpan, expected: &str, found: &str) -> Self {
        Self {
            message: format!("expected {}, found {}", expected, found),
            span,
            expected: Some(vec![expected.to_string()]),
            found: Some(found.to_string()),
        }
    }

    pub fn line(&self) -> u32 {
        self.span.start_line
    }

    pub fn column(&self) -> u32 {
        self.span.start_column
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at {}: {}", self.span, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;
