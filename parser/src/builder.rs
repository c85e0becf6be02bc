//! Graph construction from the parsed AST.
//!
//! Every cross-element reference becomes an import stub carrying the textual
//! path and the reference's span; the process phase resolves them. Generated
//! node names are deterministic per source, so byte-identical content always
//! reproduces byte-identical structure.

use crate::{
    AssociationDef, ClassDef, ElementDef, EnumDef, ExprDef, FunctionDef, ModelDef, ProfileDef,
    PropertyDef, StereotypeRef, TypeRef,
};
use loam_core::{
    CompilationError, GenericType, Multiplicity, NodeId, NodeKind, SourceId, SourceSpan, Value,
};
use loam_graph::Payload;
use loam_pipeline::{PipelineError, PipelineResult};
use loam_transaction::{Transaction, TransactionError};
use std::collections::HashSet;

/// Builds graph nodes for one parsed source file.
pub struct GraphBuilder {
    source: SourceId,
    counter: u64,
}

impl GraphBuilder {
    pub fn new(source: SourceId) -> Self {
        Self { source, counter: 0 }
    }

    /// Build the model into the graph, returning the top-level nodes (the
    /// import group first, then each element in declaration order).
    pub fn build(
        mut self,
        model: &ModelDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<Vec<NodeId>> {
        let mut result = Vec::with_capacity(model.elements.len() + 1);
        result.push(self.build_import_group(model, txn)?);
        for element in &model.elements {
            let id = match element {
                ElementDef::Class(def) => self.build_class(def, txn)?,
                ElementDef::Enum(def) => self.build_enum(def, txn)?,
                ElementDef::Association(def) => self.build_association(def, txn)?,
                ElementDef::Function(def) => self.build_function(def, txn)?,
                ElementDef::Profile(def) => self.build_profile(def, txn)?,
            };
            result.push(id);
        }
        Ok(result)
    }

    fn next_name(&mut self, tag: &str) -> String {
        self.counter += 1;
        format!("@{}#{}", tag, self.counter)
    }

    fn build_import_group(
        &mut self,
        model: &ModelDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let group = txn.create_node(
            Some("@imports"),
            NodeKind::ImportGroup,
            Some(SourceSpan::point(self.source.clone(), 1, 1)),
        )?;
        for import in &model.imports {
            let literal = txn.create_node(
                Some(&self.next_name("import")),
                NodeKind::Literal,
                Some(import.span.clone()),
            )?;
            txn.set_payload(literal, Payload::Literal(Value::String(import.path.clone())))?;
            txn.add_edge(group, "imports", literal)?;
        }
        Ok(group)
    }

    /// Place an element into its package, translating duplicate-name and
    /// invalid-name failures into located compilation errors.
    fn install_element(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        package: &str,
        element: NodeId,
        span: &SourceSpan,
    ) -> PipelineResult<()> {
        let package = txn
            .get_or_create_package(package)
            .map_err(|e| located(e, span))?;
        txn.add_package_child(package, element)
            .map_err(|e| located(e, span))?;
        Ok(())
    }

    // ========== Stubs, Terms & Literals ==========

    fn new_stub(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        path: &str,
        span: &SourceSpan,
        owner: NodeId,
    ) -> PipelineResult<NodeId> {
        let stub = txn.create_node(
            Some(&self.next_name("stub")),
            NodeKind::ImportStub,
            Some(span.clone()),
        )?;
        txn.set_payload(
            stub,
            Payload::Stub {
                path: path.to_string(),
            },
        )?;
        txn.set_edges(stub, "owner", vec![owner])?;
        Ok(stub)
    }

    fn build_generic_type(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        type_ref: &TypeRef,
        owner: NodeId,
        type_params: &HashSet<String>,
    ) -> PipelineResult<GenericType> {
        if !type_ref.path.contains("::") && type_params.contains(&type_ref.path) {
            return Ok(GenericType::Parameter(type_ref.path.clone()));
        }
        let stub = self.new_stub(txn, &type_ref.path, &type_ref.span, owner)?;
        let mut type_args = Vec::with_capacity(type_ref.type_args.len());
        for arg in &type_ref.type_args {
            type_args.push(self.build_generic_type(txn, arg, owner, type_params)?);
        }
        let mult_args = type_ref
            .mult_args
            .iter()
            .map(|m| m.multiplicity.clone())
            .collect();
        Ok(GenericType::Concrete {
            raw_type: stub,
            type_args,
            mult_args,
        })
    }

    fn attach_terms(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        owner: NodeId,
        generic_type: GenericType,
        multiplicity: Multiplicity,
        span: &SourceSpan,
    ) -> PipelineResult<()> {
        let gt_node = txn.create_node(
            Some(&self.next_name("type")),
            NodeKind::GenericType,
            Some(span.clone()),
        )?;
        txn.set_payload(gt_node, Payload::GenericType(generic_type))?;
        txn.set_edges(owner, "genericType", vec![gt_node])?;

        let mult_node = txn.create_node(
            Some(&self.next_name("multiplicity")),
            NodeKind::Multiplicity,
            Some(span.clone()),
        )?;
        txn.set_payload(mult_node, Payload::Multiplicity(multiplicity))?;
        txn.set_edges(owner, "multiplicity", vec![mult_node])?;
        Ok(())
    }

    fn build_expr(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        expr: &ExprDef,
        owner: NodeId,
    ) -> PipelineResult<NodeId> {
        match expr {
            ExprDef::Literal(value, span) => {
                let literal = txn.create_node(
                    Some(&self.next_name("literal")),
                    NodeKind::Literal,
                    Some(span.clone()),
                )?;
                txn.set_payload(literal, Payload::Literal(value.clone()))?;
                if let Some(primitive) = txn.graph().primitive(value.primitive_type_name()) {
                    txn.set_classifier(literal, primitive)?;
                }
                Ok(literal)
            }
            ExprDef::Reference(path, span) => self.new_stub(txn, path, span, owner),
        }
    }

    fn build_stereotypes(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        stereotypes: &[StereotypeRef],
        owner: NodeId,
    ) -> PipelineResult<()> {
        for stereo in stereotypes {
            let path = format!("{}.{}", stereo.profile, stereo.stereotype);
            let stub = self.new_stub(txn, &path, &stereo.span, owner)?;
            txn.add_edge(owner, "stereotypes", stub)?;
        }
        Ok(())
    }

    fn build_property(
        &mut self,
        txn: &mut Transaction<'_, '_>,
        def: &PropertyDef,
        owner: NodeId,
        type_params: &HashSet<String>,
    ) -> PipelineResult<NodeId> {
        let property =
            txn.create_node(Some(&def.name), NodeKind::Property, Some(def.span.clone()))?;
        let generic_type = self.build_generic_type(txn, &def.type_ref, owner, type_params)?;
        self.attach_terms(
            txn,
            property,
            generic_type,
            def.multiplicity.multiplicity.clone(),
            &def.span,
        )?;
        if let Some(default) = &def.default {
            let value = self.build_expr(txn, default, owner)?;
            txn.set_edges(property, "defaultValue", vec![value])?;
        }
        Ok(property)
    }

    // ========== Elements ==========

    fn build_class(
        &mut self,
        def: &ClassDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let class = txn.create_node(Some(&def.name), NodeKind::Class, Some(def.span.clone()))?;
        self.install_element(txn, &def.package, class, &def.span)?;

        let type_params: HashSet<String> =
            def.type_params.iter().map(|(name, _)| name.clone()).collect();
        for (name, span) in &def.type_params {
            let param = txn.create_node(Some(name), NodeKind::TypeParameter, Some(span.clone()))?;
            txn.add_edge(class, "typeParameters", param)?;
        }

        for supertype in &def.supertypes {
            let stub = self.new_stub(txn, &supertype.path, &supertype.span, class)?;
            txn.add_edge(class, "generalizations", stub)?;
        }

        self.build_stereotypes(txn, &def.stereotypes, class)?;

        for prop in &def.properties {
            let property = self.build_property(txn, prop, class, &type_params)?;
            txn.add_edge(class, "properties", property)?;
        }
        Ok(class)
    }

    fn build_enum(
        &mut self,
        def: &EnumDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let enumeration =
            txn.create_node(Some(&def.name), NodeKind::Enumeration, Some(def.span.clone()))?;
        self.install_element(txn, &def.package, enumeration, &def.span)?;
        for (value_name, value_span) in &def.values {
            let value =
                txn.create_node(Some(value_name), NodeKind::EnumValue, Some(value_span.clone()))?;
            txn.add_edge(enumeration, "values", value)?;
        }
        Ok(enumeration)
    }

    fn build_association(
        &mut self,
        def: &AssociationDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let association =
            txn.create_node(Some(&def.name), NodeKind::Association, Some(def.span.clone()))?;
        self.install_element(txn, &def.package, association, &def.span)?;
        let no_params = HashSet::new();
        for end in &def.ends {
            let property = self.build_property(txn, end, association, &no_params)?;
            txn.add_edge(association, "properties", property)?;
        }
        Ok(association)
    }

    fn build_function(
        &mut self,
        def: &FunctionDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let function =
            txn.create_node(Some(&def.name), NodeKind::Function, Some(def.span.clone()))?;
        self.install_element(txn, &def.package, function, &def.span)?;

        let type_params: HashSet<String> =
            def.type_params.iter().map(|(name, _)| name.clone()).collect();
        for (name, span) in &def.type_params {
            let param = txn.create_node(Some(name), NodeKind::TypeParameter, Some(span.clone()))?;
            txn.add_edge(function, "typeParameters", param)?;
        }
        for (name, span) in &def.mult_params {
            let param = txn.create_node(Some(name), NodeKind::TypeParameter, Some(span.clone()))?;
            txn.add_edge(function, "multiplicityParameters", param)?;
        }

        for param_def in &def.parameters {
            let parameter = txn.create_node(
                Some(&param_def.name),
                NodeKind::Parameter,
                Some(param_def.span.clone()),
            )?;
            let generic_type =
                self.build_generic_type(txn, &param_def.type_ref, function, &type_params)?;
            self.attach_terms(
                txn,
                parameter,
                generic_type,
                param_def.multiplicity.multiplicity.clone(),
                &param_def.span,
            )?;
            txn.add_edge(function, "parameters", parameter)?;
        }

        let return_type = self.build_generic_type(txn, &def.return_type, function, &type_params)?;
        let return_gt = txn.create_node(
            Some(&self.next_name("returnType")),
            NodeKind::GenericType,
            Some(def.return_type.span.clone()),
        )?;
        txn.set_payload(return_gt, Payload::GenericType(return_type))?;
        txn.set_edges(function, "returnType", vec![return_gt])?;

        let return_mult = txn.create_node(
            Some(&self.next_name("returnMultiplicity")),
            NodeKind::Multiplicity,
            Some(def.return_multiplicity.span.clone()),
        )?;
        txn.set_payload(
            return_mult,
            Payload::Multiplicity(def.return_multiplicity.multiplicity.clone()),
        )?;
        txn.set_edges(function, "returnMultiplicity", vec![return_mult])?;

        self.build_stereotypes(txn, &def.stereotypes, function)?;

        if let Some(body) = &def.body {
            let expression = self.build_expr(txn, body, function)?;
            txn.add_edge(function, "expressions", expression)?;
        }
        Ok(function)
    }

    fn build_profile(
        &mut self,
        def: &ProfileDef,
        txn: &mut Transaction<'_, '_>,
    ) -> PipelineResult<NodeId> {
        let profile =
            txn.create_node(Some(&def.name), NodeKind::Profile, Some(def.span.clone()))?;
        self.install_element(txn, &def.package, profile, &def.span)?;
        for (name, span) in &def.stereotypes {
            let stereotype =
                txn.create_node(Some(name), NodeKind::Stereotype, Some(span.clone()))?;
            txn.add_edge(profile, "stereotypes", stereotype)?;
        }
        for (name, span) in &def.tags {
            let tag = txn.create_node(Some(name), NodeKind::Tag, Some(span.clone()))?;
            txn.add_edge(profile, "tags", tag)?;
        }
        Ok(profile)
    }
}

/// A graph-level failure during building is a user error at a known span
/// (duplicate element, invalid package name).
fn located(error: TransactionError, span: &SourceSpan) -> PipelineError {
    match error {
        TransactionError::Graph(graph_error) => PipelineError::Compilation(
            CompilationError::located(graph_error.to_string(), span.clone()),
        ),
        other => PipelineError::Transaction(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_model;
    use loam_graph::InstanceGraph;
    use loam_transaction::TransactionManager;

    fn build_source(graph: &mut InstanceGraph, text: &str) -> Vec<NodeId> {
        let manager = TransactionManager::new();
        let source = SourceId::new("/test.loam");
        let model = parse_model(text, &source).unwrap();
        let mut txn = Transaction::open(&manager, graph, true);
        let nodes = GraphBuilder::new(source).build(&model, &mut txn).unwrap();
        txn.commit().unwrap();
        nodes
    }

    // ========== TEST: build_class_installs_into_package ==========
    #[test]
    fn test_build_class_installs_into_package() {
        let mut graph = InstanceGraph::new();
        build_source(&mut graph, "Class model::Person { name: String[1]; }");

        let person = graph.get_by_user_path("model::Person").unwrap();
        assert_eq!(graph.get_node(person).unwrap().kind, NodeKind::Class);
        let properties = graph.edges(person, "properties");
        assert_eq!(properties.len(), 1);
        assert_eq!(graph.node_name(properties[0]), "name");

        // The property type is a stub carrying the referenced path
        let gt_node = graph.to_one(properties[0], "genericType").unwrap();
        let gt = graph.get_node(gt_node).unwrap().generic_type().unwrap();
        let raw = gt.raw_type().unwrap();
        assert_eq!(graph.get_node(raw).unwrap().stub_path(), Some("String"));
    }

    // ========== TEST: duplicate_element_is_located_error ==========
    #[test]
    fn test_duplicate_element_is_located_error() {
        let mut graph = InstanceGraph::new();
        let manager = TransactionManager::new();
        let source = SourceId::new("/dup.loam");
        let text = "Class model::Person {}\nClass model::Person {}";
        let model = parse_model(text, &source).unwrap();
        let mut txn = Transaction::open(&manager, &mut graph, true);
        let err = GraphBuilder::new(source).build(&model, &mut txn).unwrap_err();

        match err {
            PipelineError::Compilation(e) => {
                assert!(e.message.contains("'Person' already exists"));
                assert_eq!(e.line(), Some(2));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    // ========== TEST: byte_identical_sources_build_identical_structure ==========
    #[test]
    fn test_byte_identical_sources_build_identical_structure() {
        let text = "Enum model::Colour { RED, GREEN }\nClass model::Paint { colour: model::Colour[1]; }";
        let mut g1 = InstanceGraph::new();
        build_source(&mut g1, text);
        let mut g2 = InstanceGraph::new();
        build_source(&mut g2, text);
        assert_eq!(g1.fingerprint(), g2.fingerprint());
    }
}
