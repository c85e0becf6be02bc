//! LOAM Grammar
//!
//! The one in-scope textual grammar: classes, associations, enumerations,
//! functions and profiles, with imports, stereotype applications, generic
//! type parameters and multiplicities. Parsing builds graph nodes directly
//! inside the compile transaction; cross-element references become import
//! stubs resolved by the process phase.

mod ast;
mod builder;
mod lexer;
mod parser;

pub use ast::*;
pub use builder::*;
pub use lexer::*;
pub use parser::*;

use loam_core::{NodeId, SourceId};
use loam_pipeline::{
    AssociationProcessor, AssociationUnbinder, AssociationUnloadWalker, AssociationValidator,
    ClassUnloadWalker, ClassValidator, EnumerationProcessor, EnumerationUnloadWalker,
    EnumerationValidator, FunctionUnloadWalker, FunctionValidator, ImportGroupUnloadWalker,
    ImportStubProcessor, ImportStubUnbinder, ParameterUnloadWalker, PipelineResult, Processor,
    ProfileUnloadWalker, ProfileValidator, PropertyUnloadWalker, PropertyValidator, SourceParser,
    Unbinder, UnloadWalker, Validator,
};
use loam_transaction::Transaction;

/// The LOAM model grammar, pluggable into the compiler's parser library.
#[derive(Debug, Default)]
pub struct LoamParser;

impl LoamParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for LoamParser {
    fn name(&self) -> &'static str {
        "loam"
    }

    fn parse(
        &self,
        text: &str,
        source: &SourceId,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<Vec<NodeId>> {
        let model = parse_model(text, source)?;
        GraphBuilder::new(source.clone()).build(&model, txn)
    }

    fn processors(&self) -> Vec<Box<dyn Processor>> {
        vec![
            Box::new(ImportStubProcessor),
            Box::new(EnumerationProcessor),
            Box::new(AssociationProcessor),
        ]
    }

    fn validators(&self) -> Vec<Box<dyn Validator>> {
        vec![
            Box::new(ClassValidator),
            Box::new(EnumerationValidator),
            Box::new(AssociationValidator),
            Box::new(PropertyValidator),
            Box::new(FunctionValidator),
            Box::new(ProfileValidator),
        ]
    }

    fn unload_walkers(&self) -> Vec<Box<dyn UnloadWalker>> {
        vec![
            Box::new(ClassUnloadWalker),
            Box::new(PropertyUnloadWalker),
            Box::new(AssociationUnloadWalker),
            Box::new(EnumerationUnloadWalker),
            Box::new(FunctionUnloadWalker),
            Box::new(ParameterUnloadWalker),
            Box::new(ProfileUnloadWalker),
            Box::new(ImportGroupUnloadWalker),
        ]
    }

    fn unbinders(&self) -> Vec<Box<dyn Unbinder>> {
        vec![Box::new(ImportStubUnbinder), Box::new(AssociationUnbinder)]
    }
}
