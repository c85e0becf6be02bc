//! The matcher: kind-to-handler registry.
//!
//! Handlers are resolved once at registration time against the node-kind
//! tag, never via runtime classifier inspection. Each kind takes at most one
//! processor, one unload walker and one unbinder; validators stack in
//! registration order.

use crate::{Processor, Unbinder, UnloadWalker, Validator};
use loam_core::NodeKind;
use std::collections::HashMap;

/// Registry of per-kind handlers for all four pipeline phases.
#[derive(Default)]
pub struct Matcher {
    processors: HashMap<NodeKind, Box<dyn Processor>>,
    validators: HashMap<NodeKind, Vec<Box<dyn Validator>>>,
    unload_walkers: HashMap<NodeKind, Box<dyn UnloadWalker>>,
    unbinders: HashMap<NodeKind, Box<dyn Unbinder>>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor; the last registration for a kind wins.
    pub fn register_processor(&mut self, processor: Box<dyn Processor>) {
        self.processors.insert(processor.kind(), processor);
    }

    /// Register a validator; validators for one kind run in registration
    /// order.
    pub fn register_validator(&mut self, validator: Box<dyn Validator>) {
        self.validators
            .entry(validator.kind())
            .or_default()
            .push(validator);
    }

    pub fn register_unload_walker(&mut self, walker: Box<dyn UnloadWalker>) {
        self.unload_walkers.insert(walker.kind(), walker);
    }

    pub fn register_unbinder(&mut self, unbinder: Box<dyn Unbinder>) {
        self.unbinders.insert(unbinder.kind(), unbinder);
    }

    /// The zero-or-one processor for a kind.
    pub fn processor_for(&self, kind: NodeKind) -> Option<&dyn Processor> {
        self.processors.get(&kind).map(Box::as_ref)
    }

    /// The validators for a kind, in registration order.
    pub fn validators_for(&self, kind: NodeKind) -> &[Box<dyn Validator>] {
        self.validators
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn unload_walker_for(&self, kind: NodeKind) -> Option<&dyn UnloadWalker> {
        self.unload_walkers.get(&kind).map(Box::as_ref)
    }

    pub fn unbinder_for(&self, kind: NodeKind) -> Option<&dyn Unbinder> {
        self.unbinders.get(&kind).map(Box::as_ref)
    }
}
