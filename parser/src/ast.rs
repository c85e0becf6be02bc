//! AST for the LOAM grammar.

use loam_core::{Multiplicity, SourceSpan, Value};

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub imports: Vec<ImportDef>,
    pub elements: Vec<ElementDef>,
}

/// An `import a::b::*;` or `import a::b::C;` line.
#[derive(Debug, Clone)]
pub struct ImportDef {
    pub path: String,
    pub span: SourceSpan,
}

/// A top-level model element.
#[derive(Debug, Clone)]
pub enum ElementDef {
    Class(ClassDef),
    Enum(EnumDef),
    Association(AssociationDef),
    Function(FunctionDef),
    Profile(ProfileDef),
}

impl ElementDef {
    pub fn span(&self) -> &SourceSpan {
        match self {
            ElementDef::Class(d) => &d.span,
            ElementDef::Enum(d) => &d.span,
            ElementDef::Association(d) => &d.span,
            ElementDef::Function(d) => &d.span,
            ElementDef::Profile(d) => &d.span,
        }
    }
}

/// A type reference: qualified path or type-parameter name, with optional
/// type and multiplicity arguments.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub path: String,
    pub type_args: Vec<TypeRef>,
    pub mult_args: Vec<MultRef>,
    pub span: SourceSpan,
}

/// A multiplicity term with its span.
#[derive(Debug, Clone)]
pub struct MultRef {
    pub multiplicity: Multiplicity,
    pub span: SourceSpan,
}

/// A stereotype application `<<profile.stereotype>>`.
#[derive(Debug, Clone)]
pub struct StereotypeRef {
    pub profile: String,
    pub stereotype: String,
    pub span: SourceSpan,
}

/// A property or association end.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub type_ref: TypeRef,
    pub multiplicity: MultRef,
    pub default: Option<ExprDef>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub package: String,
    pub name: String,
    pub type_params: Vec<(String, SourceSpan)>,
    pub supertypes: Vec<TypeRef>,
    pub stereotypes: Vec<StereotypeRef>,
    pub properties: Vec<PropertyDef>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub package: String,
    pub name: String,
    pub values: Vec<(String, SourceSpan)>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct AssociationDef {
    pub package: String,
    pub name: String,
    pub ends: Vec<PropertyDef>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub type_ref: TypeRef,
    pub multiplicity: MultRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub package: String,
    pub name: String,
    pub type_params: Vec<(String, SourceSpan)>,
    pub mult_params: Vec<(String, SourceSpan)>,
    pub parameters: Vec<ParamDef>,
    pub return_type: TypeRef,
    pub return_multiplicity: MultRef,
    pub body: Option<ExprDef>,
    pub stereotypes: Vec<StereotypeRef>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ProfileDef {
    pub package: String,
    pub name: String,
    pub stereotypes: Vec<(String, SourceSpan)>,
    pub tags: Vec<(String, SourceSpan)>,
    pub span: SourceSpan,
}

/// A body or default-value expression: a literal, or a reference to an
/// element or dotted member (`Colour.RED`).
#[derive(Debug, Clone)]
pub enum ExprDef {
    Literal(Value, SourceSpan),
    Reference(String, SourceSpan),
}

impl ExprDef {
    pub fn span(&self) -> &SourceSpan {
        match self {
            ExprDef::Literal(_, span) => span,
            ExprDef::Reference(_, span) => span,
        }
    }
}
