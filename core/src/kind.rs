//! Node kinds.
//!
//! Every node in the instance graph belongs to exactly one kind. Kinds are
//! the tagged union driving matcher dispatch: handlers are registered per
//! kind at pipeline construction, so routing a node never inspects its
//! classifier at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Package,
    PrimitiveType,
    Class,
    Property,
    Association,
    Enumeration,
    EnumValue,
    Function,
    Parameter,
    Profile,
    Stereotype,
    Tag,
    TypeParameter,
    GenericType,
    Multiplicity,
    ImportGroup,
    ImportStub,
    Literal,
}

impl NodeKind {
    /// The name of the pre-seeded metamodel class that classifies nodes of
    /// this kind.
    pub fn meta_class_name(&self) -> &'static str {
        match self {
            NodeKind::Package => "Package",
            NodeKind::PrimitiveType => "PrimitiveType",
            NodeKind::Class => "Class",
            NodeKind::Property => "Property",
            NodeKind::Association => "Association",
            NodeKind::Enumeration => "Enumeration",
            NodeKind::EnumValue => "EnumValue",
            NodeKind::Function => "Function",
            NodeKind::Parameter => "Parameter",
            NodeKind::Profile => "Profile",
            NodeKind::Stereotype => "Stereotype",
            NodeKind::Tag => "Tag",
            NodeKind::TypeParameter => "TypeParameter",
            NodeKind::GenericType => "GenericType",
            NodeKind::Multiplicity => "Multiplicity",
            NodeKind::ImportGroup => "ImportGroup",
            NodeKind::ImportStub => "ImportStub",
            NodeKind::Literal => "Literal",
        }
    }

    /// Whether nodes of this kind can be addressed by a user path
    /// (`a::b::Person`) and live in the package tree.
    pub fn is_packageable(&self) -> bool {
        matches!(
            self,
            NodeKind::Package
                | NodeKind::Class
                | NodeKind::Association
                | NodeKind::Enumeration
                | NodeKind::Function
                | NodeKind::Profile
        )
    }

    /// Whether nodes of this kind can classify other nodes as a type
    /// (appear as the raw type of a generic type).
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::Class | NodeKind::Enumeration | NodeKind::PrimitiveType
        )
    }

    /// All kinds, in registration order.
    pub fn all() -> &'static [NodeKind] {
        &[
            NodeKind::Package,
            NodeKind::PrimitiveType,
            NodeKind::Class,
            NodeKind::Property,
            NodeKind::Association,
            NodeKind::Enumeration,
            NodeKind::EnumValue,
            NodeKind::Function,
            NodeKind::Parameter,
            NodeKind::Profile,
            NodeKind::Stereotype,
            NodeKind::Tag,
            NodeKind::TypeParameter,
            NodeKind::GenericType,
            NodeKind::Multiplicity,
            NodeKind::ImportGroup,
            NodeKind::ImportStub,
            NodeKind::Literal,
        ]
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meta_class_name())
    }
}
