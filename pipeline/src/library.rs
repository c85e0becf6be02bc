//! The parser contract and the parser library.
//!
//! Grammars plug into the compiler as `SourceParser` implementations; each
//! one enumerates the processors, validators, unload walkers and unbinders
//! the pipeline must register on its behalf.

use crate::{Matcher, PipelineResult, Processor, Unbinder, UnloadWalker, Validator};
use loam_core::{CompilationError, NodeId, SourceId};
use loam_transaction::Transaction;

/// A grammar that turns source text into graph nodes. `parse` appends the
/// newly created top-level nodes (including the source's import group) and
/// raises a located parse error on malformed input.
pub trait SourceParser {
    fn name(&self) -> &'static str;

    fn parse(
        &self,
        text: &str,
        source: &SourceId,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<Vec<NodeId>>;

    fn processors(&self) -> Vec<Box<dyn Processor>>;

    fn validators(&self) -> Vec<Box<dyn Validator>>;

    fn unload_walkers(&self) -> Vec<Box<dyn UnloadWalker>>;

    fn unbinders(&self) -> Vec<Box<dyn Unbinder>>;
}

/// Registry of grammars, and the factory for the pipeline matcher.
#[derive(Default)]
pub struct ParserLibrary {
    parsers: Vec<Box<dyn SourceParser>>,
}

impl ParserLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(mut self, parser: Box<dyn SourceParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn register(&mut self, parser: Box<dyn SourceParser>) {
        self.parsers.push(parser);
    }

    pub fn get_parser(&self, name: &str) -> Option<&dyn SourceParser> {
        self.parsers
            .iter()
            .find(|p| p.name() == name)
            .map(Box::as_ref)
    }

    pub fn parsers(&self) -> impl Iterator<Item = &dyn SourceParser> {
        self.parsers.iter().map(Box::as_ref)
    }

    /// Reject duplicate parser names.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut seen = std::collections::HashSet::new();
        for parser in &self.parsers {
            if !seen.insert(parser.name()) {
                return Err(crate::PipelineError::Compilation(
                    CompilationError::unlocated(format!(
                        "Invalid parser library: duplicate parser '{}'",
                        parser.name()
                    )),
                ));
            }
        }
        Ok(())
    }

    /// Build the pipeline matcher from every registered parser's handlers.
    pub fn build_matcher(&self) -> Matcher {
        let mut matcher = Matcher::new();
        for parser in &self.parsers {
            for processor in parser.processors() {
                matcher.register_processor(processor);
            }
            for validator in parser.validators() {
                matcher.register_validator(validator);
            }
            for walker in parser.unload_walkers() {
                matcher.register_unload_walker(walker);
            }
            for unbinder in parser.unbinders() {
                matcher.register_unbinder(unbinder);
            }
        }
        matcher
    }
}
