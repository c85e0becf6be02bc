//! The incremental compiler: transactional compile cycles over source units.

use crate::{CompilerError, CompilerResult, Context, ContextEntry, Source, SourceRegistry};
use loam_core::{CompilationError, NodeId, NodeKind, SourceId};
use loam_graph::InstanceGraph;
use loam_parser::LoamParser;
use loam_pipeline::{
    collect_owned, run_processors, run_unbinders, run_validators, Matcher, ParserLibrary,
    ProcessorState, ValidationMode,
};
use loam_transaction::{Transaction, TransactionManager};
use std::collections::HashSet;
use tracing::{debug, info};

/// Compile-cycle options.
#[derive(Debug, Clone, Copy)]
pub struct CompilerOptions {
    /// Validation depth for each cycle. Deep walks every reachable value;
    /// shallow is the faster structural mode for partial recompiles.
    pub validation: ValidationMode,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            validation: ValidationMode::Deep,
        }
    }
}

impl CompilerOptions {
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }
}

/// A queued change to the source set.
#[derive(Debug, Clone)]
enum SourceEvent {
    Add { id: SourceId, content: String },
    Update { id: SourceId, content: String },
    Delete { id: SourceId },
}

impl SourceEvent {
    fn id(&self) -> &SourceId {
        match self {
            SourceEvent::Add { id, .. }
            | SourceEvent::Update { id, .. }
            | SourceEvent::Delete { id } => id,
        }
    }
}

/// The incremental compiler. Owns the instance graph, the source registry
/// and the committed-element context; every compile cycle runs inside one
/// transaction and commits or rolls back as a single atomic step.
pub struct IncrementalCompiler {
    graph: InstanceGraph,
    registry: SourceRegistry,
    context: Context,
    library: ParserLibrary,
    matcher: Matcher,
    manager: TransactionManager,
    options: CompilerOptions,
    pending: Vec<SourceEvent>,
}

impl IncrementalCompiler {
    /// Build a compiler over a parser library.
    pub fn new(library: ParserLibrary, options: CompilerOptions) -> CompilerResult<Self> {
        library.validate()?;
        let matcher = library.build_matcher();
        Ok(Self {
            graph: InstanceGraph::new(),
            registry: SourceRegistry::new(),
            context: Context::new(),
            library,
            matcher,
            manager: TransactionManager::new(),
            options,
            pending: Vec::new(),
        })
    }

    /// Build a compiler with the LOAM grammar registered.
    pub fn with_loam(options: CompilerOptions) -> CompilerResult<Self> {
        Self::new(
            ParserLibrary::new().with_parser(Box::new(LoamParser::new())),
            options,
        )
    }

    // ========== Accessors ==========

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn source(&self, id: &SourceId) -> Option<&Source> {
        self.registry.get(id)
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    pub fn parser_library(&self) -> &ParserLibrary {
        &self.library
    }

    /// Resolve a top level element or user path.
    pub fn get_core_instance(&self, path: &str) -> Option<NodeId> {
        self.graph.get_core_instance(path)
    }

    /// Resolve a user path through the package tree.
    pub fn get_by_user_path(&self, path: &str) -> Option<NodeId> {
        self.graph.get_by_user_path(path)
    }

    /// Drop all compiled state and start from a fresh pre-seeded graph.
    pub fn reset(&mut self) {
        self.graph = InstanceGraph::new();
        self.registry.clear();
        self.context.clear();
        self.manager.clear();
        self.pending.clear();
    }

    // ========== Source Events ==========

    /// Queue a new source for the next compile cycle.
    pub fn add(&mut self, path: &str, content: &str) {
        self.pending.push(SourceEvent::Add {
            id: SourceId::new(path),
            content: content.to_string(),
        });
    }

    /// Queue new content for an existing source.
    pub fn update(&mut self, path: &str, content: &str) {
        self.pending.push(SourceEvent::Update {
            id: SourceId::new(path),
            content: content.to_string(),
        });
    }

    /// Queue a source deletion.
    pub fn delete(&mut self, path: &str) {
        self.pending.push(SourceEvent::Delete {
            id: SourceId::new(path),
        });
    }

    /// Add and compile in one step.
    pub fn compile_source(&mut self, path: &str, content: &str) -> CompilerResult<()> {
        self.add(path, content);
        self.compile()
    }

    /// Run one compile cycle over the queued source events. On failure the
    /// transaction rolls back and neither the graph, the indexes nor the
    /// source registry observe any change; the first unrecoverable error
    /// surfaces verbatim.
    pub fn compile(&mut self) -> CompilerResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut events = std::mem::take(&mut self.pending);
        events.sort_by(|a, b| a.id().cmp(b.id()));
        self.check_events(&events)?;
        self.run_cycle(&events)
    }

    fn check_events(&self, events: &[SourceEvent]) -> CompilerResult<()> {
        let mut seen: HashSet<&SourceId> = HashSet::new();
        for event in events {
            if !seen.insert(event.id()) {
                return Err(CompilerError::Compilation(CompilationError::unlocated(
                    format!("Multiple events for source '{}' in one batch", event.id()),
                )));
            }
            match event {
                SourceEvent::Add { id, .. } => {
                    if self.registry.contains(id) {
                        return Err(CompilerError::Compilation(CompilationError::unlocated(
                            format!("Source '{}' already exists", id),
                        )));
                    }
                }
                SourceEvent::Update { id, .. } | SourceEvent::Delete { id } => {
                    if !self.registry.contains(id) {
                        return Err(CompilerError::Compilation(CompilationError::unlocated(
                            format!("Source '{}' does not exist", id),
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn run_cycle(&mut self, events: &[SourceEvent]) -> CompilerResult<()> {
        info!(events = events.len(), "compile cycle starting");

        let changed: HashSet<&SourceId> = events.iter().map(SourceEvent::id).collect();
        let to_parse: Vec<(&SourceId, &str)> = events
            .iter()
            .filter_map(|e| match e {
                SourceEvent::Add { id, content } | SourceEvent::Update { id, content } => {
                    Some((id, content.as_str()))
                }
                SourceEvent::Delete { .. } => None,
            })
            .collect();
        let removals: Vec<SourceId> = events
            .iter()
            .filter_map(|e| match e {
                SourceEvent::Update { id, .. } | SourceEvent::Delete { id } => Some(id.clone()),
                SourceEvent::Add { .. } => None,
            })
            .filter(|id| self.registry.get(id).map(|s| s.compiled).unwrap_or(false))
            .collect();

        // The whole cycle runs inside one transaction; dropping it on any
        // error path rolls every mutation back.
        let mut txn = Transaction::open(&self.manager, &mut self.graph, true);
        let binding = txn.bind_current()?;

        // ----- Unload: invalidate exactly the changed sources' nodes plus
        // every node holding a resolved edge into them.
        let mut unload_set: HashSet<NodeId> = HashSet::new();
        let mut unload_tops: Vec<NodeId> = Vec::new();
        for id in &removals {
            if let Some(source) = self.registry.get(id) {
                let subtree = collect_owned(txn.graph(), &self.matcher, &source.nodes);
                unload_set.extend(subtree.iter().copied());
                unload_tops.extend(source.nodes.iter().copied());
            }
        }

        let mut dependent_owners: Vec<NodeId> = Vec::new();
        for source in self.registry.iter() {
            if changed.contains(&source.id) {
                continue;
            }
            for &stub in &source.stubs {
                if let Some(target) = txn.graph().to_one(stub, "resolved") {
                    if unload_set.contains(&target) {
                        if let Some(owner) = txn.graph().to_one(stub, "owner") {
                            debug!(
                                stub = txn.graph().node_name(stub),
                                owner = %txn.graph().user_path(owner),
                                "reference invalidated"
                            );
                            dependent_owners.push(owner);
                        }
                    }
                }
            }
        }
        dependent_owners.sort_unstable();
        dependent_owners.dedup();
        let dependent_subtrees = collect_owned(txn.graph(), &self.matcher, &dependent_owners);

        let mut unbind_targets: Vec<NodeId> = unload_set.iter().copied().collect();
        unbind_targets.extend(dependent_subtrees.iter().copied());
        run_unbinders(&mut txn, &self.matcher, &unbind_targets)?;

        for &node in &dependent_subtrees {
            txn.clear_validated(node)?;
        }

        // Context entries must be captured while the nodes still exist.
        let mut context_removals: Vec<ContextEntry> = Vec::new();
        for &top in &unload_tops {
            let packageable = txn
                .graph()
                .get_node(top)
                .map(|n| n.kind.is_packageable())
                .unwrap_or(false);
            if packageable {
                if let Some(entry) = ContextEntry::capture(txn.graph(), top) {
                    context_removals.push(entry);
                }
            }
        }

        let mut ordered_unload: Vec<NodeId> = unload_set.iter().copied().collect();
        ordered_unload.sort_unstable();
        for &node in &ordered_unload {
            txn.mark_for_deletion(node)?;
        }
        let mut emptied_packages: Vec<NodeId> = Vec::new();
        for &top in &unload_tops {
            if let Some(parent) = txn.graph().parent_of(top) {
                txn.remove_package_child(parent, top)?;
                emptied_packages.push(parent);
            }
        }
        for &node in &ordered_unload {
            txn.remove_node(node)?;
        }
        prune_empty_packages(&mut txn, emptied_packages)?;

        // ----- Parse: deterministic order by path; the primary grammar
        // handles whole sources.
        let parser = self
            .library
            .parsers()
            .next()
            .ok_or_else(|| {
                CompilerError::Compilation(CompilationError::unlocated(
                    "No parser registered in the parser library",
                ))
            })?;
        let mut parsed: Vec<(SourceId, String, Vec<NodeId>)> = Vec::new();
        for (id, content) in &to_parse {
            debug!(source = %id, "parsing");
            let nodes = parser.parse(content, id, &mut txn)?;
            parsed.push(((*id).clone(), content.to_string(), nodes));
        }

        // ----- Process: resolve references and derived edges over the new
        // subtrees plus the invalidated dependents.
        let mut state = ProcessorState::new();
        for source in self.registry.iter() {
            if changed.contains(&source.id) {
                continue;
            }
            if let Some(group) = source.import_group {
                state.register_import_group(source.id.clone(), group);
            }
        }
        for (id, _, nodes) in &parsed {
            if let Some(group) = find_import_group(txn.graph(), nodes) {
                state.register_import_group(id.clone(), group);
            }
        }

        let mut to_process: Vec<NodeId> = dependent_subtrees.clone();
        for (_, _, nodes) in &parsed {
            to_process.extend(collect_owned(txn.graph(), &self.matcher, nodes));
        }
        run_processors(&mut txn, &self.matcher, &to_process, &mut state)?;

        // ----- Validate: any failure aborts the phase and the cycle.
        run_validators(&mut txn, &self.matcher, &to_process, self.options.validation)?;
        if self.options.validation == ValidationMode::Deep {
            txn.graph().validate_integrity()?;
        }

        // ----- Commit: seal the graph, then move the registry and context
        // forward; failures can no longer occur on this path.
        let mut new_sources: Vec<Source> = Vec::new();
        let mut context_additions: Vec<ContextEntry> = Vec::new();
        for (id, content, nodes) in parsed {
            let subtree = collect_owned(txn.graph(), &self.matcher, &nodes);
            let stubs: Vec<NodeId> = subtree
                .iter()
                .copied()
                .filter(|&n| txn.graph().get_node(n).map(|d| d.kind) == Some(NodeKind::ImportStub))
                .collect();
            let import_group = find_import_group(txn.graph(), &nodes);
            for &top in &nodes {
                let packageable = txn
                    .graph()
                    .get_node(top)
                    .map(|n| n.kind.is_packageable())
                    .unwrap_or(false);
                if packageable {
                    if let Some(entry) = ContextEntry::capture(txn.graph(), top) {
                        context_additions.push(entry);
                    }
                }
            }
            let mut source = Source::new(id, content);
            source.nodes = nodes;
            source.import_group = import_group;
            source.stubs = stubs;
            source.compiled = true;
            new_sources.push(source);
        }

        txn.commit()?;
        drop(binding);
        drop(txn);

        for event in events {
            if let SourceEvent::Delete { id } = event {
                self.registry.remove(id);
            }
        }
        for source in new_sources {
            if let Some(existing) = self.registry.get_mut(&source.id) {
                *existing = source;
            } else {
                self.registry.insert(source);
            }
        }
        for entry in &context_removals {
            self.context.unregister(entry);
        }
        for entry in &context_additions {
            self.context.register(entry)?;
        }

        info!("compile cycle committed");
        Ok(())
    }
}

fn find_import_group(graph: &InstanceGraph, nodes: &[NodeId]) -> Option<NodeId> {
    nodes
        .iter()
        .copied()
        .find(|&n| graph.get_node(n).map(|d| d.kind) == Some(NodeKind::ImportGroup))
}

/// Remove auto-created packages that lost their last child, walking up
/// toward Root.
fn prune_empty_packages(
    txn: &mut Transaction<'_, '_>,
    packages: Vec<NodeId>,
) -> CompilerResult<()> {
    for mut package in packages {
        loop {
            let prunable = package != txn.graph().root()
                && txn.graph().edges(package, "children").is_empty()
                && txn
                    .graph()
                    .get_node(package)
                    .map(|n| n.kind == NodeKind::Package && n.span.is_none())
                    .unwrap_or(false);
            if !prunable {
                break;
            }
            let parent = match txn.graph().parent_of(package) {
                Some(p) => p,
                None => break,
            };
            txn.remove_package_child(parent, package)?;
            txn.remove_node(package)?;
            package = parent;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> IncrementalCompiler {
        IncrementalCompiler::with_loam(CompilerOptions::default()).unwrap()
    }

    // ========== TEST: compile_single_source ==========
    #[test]
    fn test_compile_single_source() {
        // GIVEN a compiler and a class source
        let mut compiler = compiler();

        // WHEN compiled
        compiler
            .compile_source("/model/person.loam", "Class model::Person { name: String[1]; }")
            .unwrap();

        // THEN the class is resolvable and registered
        let person = compiler.get_by_user_path("model::Person").unwrap();
        assert!(compiler.graph().is_validated(person));
        assert_eq!(compiler.context().get_by_path("model::Person"), Some(person));
        assert!(compiler.source(&SourceId::new("/model/person.loam")).unwrap().compiled);
    }

    // ========== TEST: failed_compile_rolls_everything_back ==========
    #[test]
    fn test_failed_compile_rolls_everything_back() {
        // GIVEN a compiled graph
        let mut compiler = compiler();
        compiler
            .compile_source("/a.loam", "Class model::A { name: String[1]; }")
            .unwrap();
        let nodes_before = compiler.graph().node_count();
        let print_before = compiler.graph().fingerprint();

        // WHEN a source referencing a missing type fails to compile
        let err = compiler
            .compile_source("/b.loam", "Class model::B { other: model::Missing[1]; }")
            .unwrap_err();

        // THEN the error is located and the graph and registry are untouched
        assert!(err.to_string().contains("Missing has not been defined!"));
        assert_eq!(compiler.graph().node_count(), nodes_before);
        assert_eq!(compiler.graph().fingerprint(), print_before);
        assert!(compiler.source(&SourceId::new("/b.loam")).is_none());
        assert_eq!(compiler.source_count(), 1);
    }

    // ========== TEST: cross_source_reference_resolves ==========
    #[test]
    fn test_cross_source_reference_resolves() {
        let mut compiler = compiler();
        compiler
            .compile_source("/colour.loam", "Enum model::Colour { RED, GREEN }")
            .unwrap();
        compiler
            .compile_source(
                "/paint.loam",
                "Class model::Paint { colour: model::Colour[1]; }",
            )
            .unwrap();

        let paint = compiler.get_by_user_path("model::Paint").unwrap();
        let property = compiler.graph().edges(paint, "properties")[0];
        let gt = loam_inference::declared_generic_type(compiler.graph(), property).unwrap();
        let resolved = compiler.graph().resolve_ref(gt.raw_type().unwrap());
        assert_eq!(compiler.get_by_user_path("model::Colour"), Some(resolved));
    }

    // ========== TEST: delete_removes_nodes_and_prunes_packages ==========
    #[test]
    fn test_delete_removes_nodes_and_prunes_packages() {
        let mut compiler = compiler();
        let empty_print = compiler.graph().fingerprint();
        compiler
            .compile_source("/a.loam", "Class deep::nested::A { name: String[1]; }")
            .unwrap();
        assert!(compiler.get_by_user_path("deep::nested::A").is_some());

        compiler.delete("/a.loam");
        compiler.compile().unwrap();

        assert!(compiler.get_by_user_path("deep::nested::A").is_none());
        assert!(compiler.get_by_user_path("deep::nested").is_none());
        assert!(compiler.get_by_user_path("deep").is_none());
        assert_eq!(compiler.graph().fingerprint(), empty_print);
        assert_eq!(compiler.source_count(), 0);
    }

    // ========== TEST: update_rewires_dependents ==========
    #[test]
    fn test_update_rewires_dependents() {
        // GIVEN a class whose property references an enum in another source
        let mut compiler = compiler();
        compiler
            .compile_source("/colour.loam", "Enum model::Colour { RED }")
            .unwrap();
        compiler
            .compile_source(
                "/paint.loam",
                "Class model::Paint { colour: model::Colour[1]; }",
            )
            .unwrap();

        // WHEN the enum source is updated with a new value set
        compiler.update("/colour.loam", "Enum model::Colour { RED, BLUE }");
        compiler.compile().unwrap();

        // THEN the dependent's reference resolves to the new enumeration node
        let colour = compiler.get_by_user_path("model::Colour").unwrap();
        assert_eq!(compiler.graph().edges(colour, "values").len(), 2);
        let paint = compiler.get_by_user_path("model::Paint").unwrap();
        let property = compiler.graph().edges(paint, "properties")[0];
        let gt = loam_inference::declared_generic_type(compiler.graph(), property).unwrap();
        assert_eq!(
            compiler.graph().resolve_ref(gt.raw_type().unwrap()),
            colour
        );
    }

    // ========== TEST: deleting_referenced_source_fails_and_rolls_back ==========
    #[test]
    fn test_deleting_referenced_source_fails_and_rolls_back() {
        let mut compiler = compiler();
        compiler
            .compile_source("/colour.loam", "Enum model::Colour { RED }")
            .unwrap();
        compiler
            .compile_source(
                "/paint.loam",
                "Class model::Paint { colour: model::Colour[1]; }",
            )
            .unwrap();
        let print_before = compiler.graph().fingerprint();

        // WHEN the enum source is deleted while still referenced
        compiler.delete("/colour.loam");
        let err = compiler.compile().unwrap_err();

        // THEN the failure names the missing element and everything rolls back
        assert!(err.to_string().contains("Colour has not been defined!"));
        assert_eq!(compiler.graph().fingerprint(), print_before);
        assert!(compiler.source(&SourceId::new("/colour.loam")).is_some());
    }

    // ========== TEST: add_existing_source_rejected ==========
    #[test]
    fn test_add_existing_source_rejected() {
        let mut compiler = compiler();
        compiler.compile_source("/a.loam", "Enum m::E { A }").unwrap();
        let err = compiler.compile_source("/a.loam", "Enum m::E { B }").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
