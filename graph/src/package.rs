//! Package tree and metamodel bootstrap.
//!
//! The Root package, the primitive types and the metamodel classes are
//! pre-seeded and cannot be created or removed by user action. Each metamodel
//! class declares its property slots so the generic deep validator has real
//! slot data to check against, meta-circularly (`Class` is classified by
//! itself).

use crate::{GraphError, GraphResult, GraphStructureError, InstanceGraph, Payload};
use loam_core::{GenericType, Multiplicity, NodeId, NodeKind};
use regex_lite::Regex;
use std::sync::OnceLock;

/// Names of the pre-seeded primitive types.
pub const PRIMITIVE_TYPE_NAMES: [&str; 5] = ["Integer", "Float", "Boolean", "String", "Date"];

/// Result of a package lookup-or-create: the resolved package plus any
/// packages newly created along the path, so a transaction can undo them.
#[derive(Debug, Clone)]
pub struct PackageCreation {
    pub package: NodeId,
    pub created: Vec<NodeId>,
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("valid pattern"))
}

/// Whether a string is acceptable as a user-defined package segment or
/// element name. `Root` is reserved.
pub fn is_valid_user_segment(segment: &str) -> bool {
    segment != "Root" && segment_pattern().is_match(segment)
}

impl InstanceGraph {
    // ==================== Package Operations ====================

    /// Find or create the package at `path` (e.g. `a::b`), creating missing
    /// segments. Package creation is the one racy entry point of the graph;
    /// the exclusive borrow is the critical section that keeps two callers
    /// from racing to create the same namespace segment.
    pub fn get_or_create_package(&mut self, path: &str) -> GraphResult<PackageCreation> {
        let mut current = self.root;
        let mut created = Vec::new();
        if path.is_empty() {
            return Ok(PackageCreation {
                package: current,
                created,
            });
        }
        for segment in path.split("::") {
            if segment.is_empty() {
                return Err(GraphError::InvalidPackageName(path.to_string()));
            }
            if segment == "Root" {
                return Err(GraphError::ReservedName(segment.to_string()));
            }
            match self.find_child(current, segment) {
                Some(child) => {
                    if self
                        .get_node(child)
                        .map(|n| n.kind != NodeKind::Package)
                        .unwrap_or(true)
                    {
                        return Err(GraphError::DuplicateChildName {
                            package: self.user_path(current),
                            child: segment.to_string(),
                        });
                    }
                    current = child;
                }
                None => {
                    if !segment_pattern().is_match(segment) {
                        return Err(GraphError::InvalidPackageName(segment.to_string()));
                    }
                    let pkg = self.create_node(Some(segment), NodeKind::Package, None);
                    self.add_package_child(current, pkg)?;
                    created.push(pkg);
                    current = pkg;
                }
            }
        }
        Ok(PackageCreation {
            package: current,
            created,
        })
    }

    /// Link `child` under `package`, rejecting duplicate simple names.
    pub fn add_package_child(&mut self, package: NodeId, child: NodeId) -> GraphResult<()> {
        let child_name = self.node(child)?.name.clone();
        if child_name.is_empty() {
            return Err(GraphError::InvalidPackageName(child_name));
        }
        if self.find_child(package, &child_name).is_some() {
            return Err(GraphError::DuplicateChildName {
                package: self.user_path(package),
                child: child_name,
            });
        }
        self.add_edge(package, "children", child)?;
        self.parents.insert(child, package);
        Ok(())
    }

    /// Unlink `child` from `package`, dropping the reverse-navigation entry.
    pub fn remove_package_child(&mut self, package: NodeId, child: NodeId) -> GraphResult<()> {
        let children: Vec<NodeId> = self
            .edges(package, "children")
            .iter()
            .copied()
            .filter(|&c| c != child)
            .collect();
        self.set_edges(package, "children", children)?;
        if self.parents.get(&child) == Some(&package) {
            self.parents.remove(&child);
        }
        Ok(())
    }

    /// Re-establish the reverse-navigation entry for a child that was
    /// relinked during a rollback.
    pub fn relink_parent(&mut self, child: NodeId, package: NodeId) {
        self.parents.insert(child, package);
    }

    /// The child of a package with the given simple name.
    pub fn find_child(&self, package: NodeId, name: &str) -> Option<NodeId> {
        self.edges(package, "children")
            .iter()
            .copied()
            .find(|&c| self.node_name(c) == name)
    }

    /// Resolve a user path like `a::b::Person`. Top level elements resolve
    /// by simple name.
    pub fn get_by_user_path(&self, path: &str) -> Option<NodeId> {
        if path == "Root" {
            return Some(self.root);
        }
        if let Some(&top) = self.top_levels.get(path) {
            return Some(top);
        }
        let mut current = self.root;
        for segment in path.split("::") {
            current = self.find_child(current, segment)?;
        }
        Some(current)
    }

    /// The user path of a node: its reference-id within this graph instance.
    pub fn user_path(&self, id: NodeId) -> String {
        if id == self.root {
            return "Root".to_string();
        }
        let mut segments = vec![self.node_name(id).to_string()];
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if parent == self.root {
                segments.reverse();
                return segments.join("::");
            }
            segments.push(self.node_name(parent).to_string());
            current = parent;
        }
        segments.reverse();
        segments.join("::")
    }

    /// Check package/parent side-index consistency across the whole graph.
    /// An inconsistency means the pipeline itself corrupted the tree, so the
    /// failure is a `GraphStructureError`.
    pub fn validate_integrity(&self) -> Result<(), GraphStructureError> {
        for id in self.all_node_ids().collect::<Vec<_>>() {
            for &child in self.edges(id, "children") {
                if self.get_node(child).is_none() {
                    return Err(GraphStructureError::new(
                        format!(
                            "Package '{}' references missing child {}",
                            self.user_path(id),
                            child
                        ),
                        None,
                    ));
                }
                if self.parent_of(child) != Some(id) {
                    return Err(GraphStructureError::new(
                        format!(
                            "Child '{}' of package '{}' has inconsistent parent entry",
                            self.node_name(child),
                            self.user_path(id)
                        ),
                        None,
                    ));
                }
            }
        }
        Ok(())
    }
}

// ==================== Bootstrap ====================

/// Seed the Root package, primitives, metamodel classes and their declared
/// slots into a fresh graph.
pub(crate) fn bootstrap(graph: &mut InstanceGraph) {
    // Metamodel classes, one per node kind, classified by Class itself.
    for &kind in NodeKind::all() {
        let id = graph.create_node(Some(kind.meta_class_name()), NodeKind::Class, None);
        graph.meta.insert(kind, id);
        graph.top_levels.insert(kind.meta_class_name().to_string(), id);
    }
    let class_meta = graph.meta[&NodeKind::Class];
    for &meta in graph.meta.clone().values() {
        graph.set_classifier(meta, class_meta).ok();
    }

    // The universal supertype and the bottom type.
    let any = graph.create_node(Some("Any"), NodeKind::Class, None);
    graph.set_classifier(any, class_meta).ok();
    graph.any_class = any;
    graph.top_levels.insert("Any".to_string(), any);

    let nil = graph.create_node(Some("Nil"), NodeKind::Class, None);
    graph.set_classifier(nil, class_meta).ok();
    graph.nil_class = nil;
    graph.top_levels.insert("Nil".to_string(), nil);

    // The Root package.
    let root = graph.create_node(Some("Root"), NodeKind::Package, None);
    graph.set_classifier(root, graph.meta[&NodeKind::Package]).ok();
    graph.root = root;

    // Primitive types.
    let primitive_meta = graph.meta[&NodeKind::PrimitiveType];
    for name in PRIMITIVE_TYPE_NAMES {
        let id = graph.create_node(Some(name), NodeKind::PrimitiveType, None);
        graph.set_classifier(id, primitive_meta).ok();
        graph.top_levels.insert(name.to_string(), id);
    }

    declare_meta_slots(graph);
}

/// Declare the property slots of each metamodel class.
fn declare_meta_slots(graph: &mut InstanceGraph) {
    let any = graph.any_class;
    let class = graph.meta[&NodeKind::Class];
    let property = graph.meta[&NodeKind::Property];
    let type_parameter = graph.meta[&NodeKind::TypeParameter];
    let stereotype = graph.meta[&NodeKind::Stereotype];
    let tag = graph.meta[&NodeKind::Tag];
    let parameter = graph.meta[&NodeKind::Parameter];
    let generic_type = graph.meta[&NodeKind::GenericType];
    let multiplicity = graph.meta[&NodeKind::Multiplicity];
    let literal = graph.meta[&NodeKind::Literal];

    let many = Multiplicity::zero_many();
    let one = Multiplicity::one();
    let opt = Multiplicity::zero_one();

    let slots: &[(NodeKind, &[(&str, NodeId, Multiplicity)])] = &[
        (NodeKind::Package, &[("children", any, many.clone())]),
        (
            NodeKind::Class,
            &[
                ("properties", property, many.clone()),
                ("propertiesFromAssociations", property, many.clone()),
                ("generalizations", class, many.clone()),
                ("typeParameters", type_parameter, many.clone()),
                ("stereotypes", stereotype, many.clone()),
            ],
        ),
        (
            NodeKind::Property,
            &[
                ("genericType", generic_type, one.clone()),
                ("multiplicity", multiplicity, one.clone()),
                ("defaultValue", any, opt.clone()),
            ],
        ),
        (
            NodeKind::Association,
            &[("properties", property, Multiplicity::range(2, Some(2)))],
        ),
        (NodeKind::Enumeration, &[("values", any, many.clone())]),
        (
            NodeKind::Function,
            &[
                ("parameters", parameter, many.clone()),
                ("returnType", generic_type, one.clone()),
                ("returnMultiplicity", multiplicity, one.clone()),
                ("typeParameters", type_parameter, many.clone()),
                ("multiplicityParameters", type_parameter, many.clone()),
                ("expressions", any, many.clone()),
                ("stereotypes", stereotype, many.clone()),
            ],
        ),
        (
            NodeKind::Parameter,
            &[
                ("genericType", generic_type, one.clone()),
                ("multiplicity", multiplicity, one.clone()),
            ],
        ),
        (
            NodeKind::Profile,
            &[
                ("stereotypes", stereotype, many.clone()),
                ("tags", tag, many.clone()),
            ],
        ),
        (NodeKind::ImportGroup, &[("imports", literal, many.clone())]),
        (
            NodeKind::ImportStub,
            &[("owner", any, opt.clone()), ("resolved", any, opt.clone())],
        ),
    ];

    for (kind, declared) in slots {
        let meta = graph.meta[kind];
        let mut props = Vec::with_capacity(declared.len());
        for (name, raw_type, mult) in declared.iter() {
            props.push(declare_slot(graph, name, *raw_type, mult.clone()));
        }
        graph.set_edges(meta, "properties", props).ok();
    }
}

/// Create one declared property with its generic-type and multiplicity nodes.
fn declare_slot(
    graph: &mut InstanceGraph,
    name: &str,
    raw_type: NodeId,
    mult: Multiplicity,
) -> NodeId {
    let prop = graph.create_node(Some(name), NodeKind::Property, None);
    let gt = graph.create_node(Some(&format!("{}$type", name)), NodeKind::GenericType, None);
    graph
        .set_payload(gt, Payload::GenericType(GenericType::simple(raw_type)))
        .ok();
    let m = graph.create_node(
        Some(&format!("{}$multiplicity", name)),
        NodeKind::Multiplicity,
        None,
    );
    graph.set_payload(m, Payload::Multiplicity(mult)).ok();
    graph.set_edges(prop, "genericType", vec![gt]).ok();
    graph.set_edges(prop, "multiplicity", vec![m]).ok();
    prop
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== TEST: bootstrap_seeds_top_levels ==========
    #[test]
    fn test_bootstrap_seeds_top_levels() {
        let graph = InstanceGraph::new();
        assert!(graph.get_core_instance("Integer").is_some());
        assert!(graph.get_core_instance("String").is_some());
        assert!(graph.get_core_instance("Class").is_some());
        assert!(graph.get_core_instance("Root").is_some());
        assert!(graph.get_core_instance("Any").is_some());
    }

    // ========== TEST: class_meta_is_classified_by_itself ==========
    #[test]
    fn test_class_meta_is_classified_by_itself() {
        let graph = InstanceGraph::new();
        let class = graph.meta_class(NodeKind::Class);
        assert_eq!(graph.get_node(class).unwrap().classifier, Some(class));
    }

    // ========== TEST: get_or_create_package_creates_segments ==========
    #[test]
    fn test_get_or_create_package_creates_segments() {
        let mut graph = InstanceGraph::new();
        let creation = graph.get_or_create_package("model::domain").unwrap();
        assert_eq!(creation.created.len(), 2);
        assert_eq!(graph.user_path(creation.package), "model::domain");

        // Second lookup reuses the packages
        let again = graph.get_or_create_package("model::domain").unwrap();
        assert_eq!(again.package, creation.package);
        assert!(again.created.is_empty());
    }

    // ========== TEST: root_is_reserved ==========
    #[test]
    fn test_root_is_reserved() {
        let mut graph = InstanceGraph::new();
        assert!(matches!(
            graph.get_or_create_package("Root::a"),
            Err(GraphError::ReservedName(_))
        ));
        assert!(!is_valid_user_segment("Root"));
        assert!(is_valid_user_segment("model"));
        assert!(!is_valid_user_segment(""));
        assert!(!is_valid_user_segment("9model"));
    }

    // ========== TEST: duplicate_child_rejected ==========
    #[test]
    fn test_duplicate_child_rejected() {
        let mut graph = InstanceGraph::new();
        let pkg = graph.get_or_create_package("model").unwrap().package;
        let a = graph.create_node(Some("Person"), NodeKind::Class, None);
        let b = graph.create_node(Some("Person"), NodeKind::Class, None);
        graph.add_package_child(pkg, a).unwrap();
        assert!(matches!(
            graph.add_package_child(pkg, b),
            Err(GraphError::DuplicateChildName { .. })
        ));
    }

    // ========== TEST: user_path_round_trip ==========
    #[test]
    fn test_user_path_round_trip() {
        let mut graph = InstanceGraph::new();
        let pkg = graph.get_or_create_package("a::b").unwrap().package;
        let class = graph.create_node(Some("Person"), NodeKind::Class, None);
        graph.add_package_child(pkg, class).unwrap();

        assert_eq!(graph.user_path(class), "a::b::Person");
        assert_eq!(graph.get_by_user_path("a::b::Person"), Some(class));
    }

    // ========== TEST: meta_slots_declared ==========
    #[test]
    fn test_meta_slots_declared() {
        let graph = InstanceGraph::new();
        let class_meta = graph.meta_class(NodeKind::Class);
        let slot = graph.declared_property(class_meta, "properties").unwrap();
        let gt_node = graph.to_one(slot, "genericType").unwrap();
        let raw = graph
            .get_node(gt_node)
            .unwrap()
            .generic_type()
            .unwrap()
            .raw_type()
            .unwrap();
        assert_eq!(raw, graph.meta_class(NodeKind::Property));

        let integrity = graph.validate_integrity();
        assert!(integrity.is_ok());
    }
}
