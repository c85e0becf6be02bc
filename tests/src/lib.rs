//! Shared harness for LOAM integration scenarios.

mod workspace;

pub use workspace::*;

pub mod prelude {
    pub use crate::{assert_located, Workspace};
    pub use loam_compiler::{CompilerError, CompilerOptions, IncrementalCompiler};
    pub use loam_core::{Multiplicity, NodeId, NodeKind, SourceId};
    pub use loam_pipeline::ValidationMode;
}

use loam_compiler::CompilerError;

/// Assert an error message and its exact source location.
pub fn assert_located(error: &CompilerError, message_part: &str, line: u32, column: u32) {
    let rendered = error.to_string();
    assert!(
        rendered.contains(message_part),
        "expected message containing '{}', got '{}'",
        message_part,
        rendered
    );
    let (found_line, found_column) = match error {
        CompilerError::Parse(e) => (Some(e.line()), Some(e.column())),
        CompilerError::Compilation(e) => (e.line(), e.column()),
        other => panic!("expected a located error, got '{}'", other),
    };
    assert_eq!(found_line, Some(line), "wrong line in '{}'", rendered);
    assert_eq!(found_column, Some(column), "wrong column in '{}'", rendered);
}
