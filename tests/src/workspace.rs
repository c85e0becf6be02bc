//! A scripted compiler workspace for scenario tests.

use loam_compiler::{CompilerError, CompilerOptions, CompilerResult, IncrementalCompiler};
use loam_core::NodeId;
use loam_pipeline::ValidationMode;

/// Wraps an incremental compiler with the LOAM grammar and scenario-friendly
/// helpers.
pub struct Workspace {
    pub compiler: IncrementalCompiler,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// A workspace with deep validation (the default).
    pub fn new() -> Self {
        Self {
            compiler: IncrementalCompiler::with_loam(CompilerOptions::default())
                .expect("valid parser library"),
        }
    }

    /// A workspace with shallow validation.
    pub fn shallow() -> Self {
        Self {
            compiler: IncrementalCompiler::with_loam(
                CompilerOptions::default().with_validation(ValidationMode::Shallow),
            )
            .expect("valid parser library"),
        }
    }

    /// Add several sources and compile them as one batch.
    pub fn compile_batch(&mut self, sources: &[(&str, &str)]) -> CompilerResult<()> {
        for (path, content) in sources {
            self.compiler.add(path, content);
        }
        self.compiler.compile()
    }

    /// Add a single source and compile.
    pub fn compile_source(&mut self, path: &str, content: &str) -> CompilerResult<()> {
        self.compiler.compile_source(path, content)
    }

    /// Update a source and compile.
    pub fn update_source(&mut self, path: &str, content: &str) -> CompilerResult<()> {
        self.compiler.update(path, content);
        self.compiler.compile()
    }

    /// Delete a source and compile.
    pub fn delete_source(&mut self, path: &str) -> CompilerResult<()> {
        self.compiler.delete(path);
        self.compiler.compile()
    }

    /// Delete several sources and compile them as one batch.
    pub fn delete_batch(&mut self, paths: &[&str]) -> CompilerResult<()> {
        for path in paths {
            self.compiler.delete(path);
        }
        self.compiler.compile()
    }

    /// A compile that is expected to fail, returning the error.
    pub fn compile_source_err(&mut self, path: &str, content: &str) -> CompilerError {
        self.compiler
            .compile_source(path, content)
            .expect_err("expected compilation to fail")
    }

    /// Resolve a user path, panicking when absent.
    pub fn node(&self, path: &str) -> NodeId {
        self.compiler
            .get_by_user_path(path)
            .unwrap_or_else(|| panic!("'{}' not found in graph", path))
    }

    pub fn has(&self, path: &str) -> bool {
        self.compiler.get_by_user_path(path).is_some()
    }

    pub fn fingerprint(&self) -> String {
        self.compiler.graph().fingerprint()
    }

    pub fn node_count(&self) -> usize {
        self.compiler.graph().node_count()
    }

    pub fn source_count(&self) -> usize {
        self.compiler.source_count()
    }
}
