//! Recursive-descent parser for the LOAM grammar.

use crate::{
    AssociationDef, ClassDef, ElementDef, EnumDef, ExprDef, FunctionDef, ImportDef, ModelDef,
    MultRef, ParamDef, ProfileDef, PropertyDef, StereotypeRef, Token, TokenKind, TypeRef,
};
use loam_core::{Multiplicity, ParseError, ParseResult, SourceId, SourceSpan, Value};

/// Parse one LOAM source file.
pub fn parse_model(text: &str, source: &SourceId) -> ParseResult<ModelDef> {
    let tokens = crate::tokenize(text, source)?;
    Parser::new(tokens).parse_model()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Set when a `>>` token was split to satisfy a single `>`; the second
    /// half is consumed next.
    pending_gt: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            pending_gt: false,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        if self.pending_gt {
            &TokenKind::Gt
        } else {
            &self.current().kind
        }
    }

    fn span(&self) -> SourceSpan {
        self.current().span.clone()
    }

    fn advance(&mut self) -> Token {
        if self.pending_gt {
            self.pending_gt = false;
            let span = self.span();
            self.pos += 1;
            return Token {
                kind: TokenKind::Gt,
                span,
            };
        }
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected_token(
                self.span(),
                kind.name(),
                self.current_kind().name(),
            ))
        }
    }

    /// Consume one `>`, splitting a `>>` token when needed (nested generics).
    fn expect_gt(&mut self) -> ParseResult<()> {
        if self.pending_gt {
            self.advance();
            return Ok(());
        }
        match &self.current().kind {
            TokenKind::Gt => {
                self.advance();
                Ok(())
            }
            TokenKind::StereoClose => {
                self.pending_gt = true;
                Ok(())
            }
            other => Err(ParseError::unexpected_token(
                self.span(),
                "'>'",
                other.name(),
            )),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, SourceSpan)> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok((name, token.span))
            }
            other => Err(ParseError::unexpected_token(
                self.span(),
                "identifier",
                other.name(),
            )),
        }
    }

    // ========== Model ==========

    fn parse_model(mut self) -> ParseResult<ModelDef> {
        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            imports.push(self.parse_import()?);
        }
        let mut elements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            elements.push(self.parse_element()?);
        }
        Ok(ModelDef { imports, elements })
    }

    fn parse_import(&mut self) -> ParseResult<ImportDef> {
        let start = self.expect(TokenKind::Import)?;
        let mut path = self.expect_ident()?.0;
        while self.eat(&TokenKind::PathSep) {
            if self.eat(&TokenKind::Star) {
                path.push_str("::*");
                break;
            }
            path.push_str("::");
            path.push_str(&self.expect_ident()?.0);
        }
        self.expect(TokenKind::Semi)?;
        Ok(ImportDef {
            path,
            span: start.span,
        })
    }

    fn parse_element(&mut self) -> ParseResult<ElementDef> {
        match self.current_kind() {
            TokenKind::Class => Ok(ElementDef::Class(self.parse_class()?)),
            TokenKind::Enum => Ok(ElementDef::Enum(self.parse_enum()?)),
            TokenKind::Association => Ok(ElementDef::Association(self.parse_association()?)),
            TokenKind::Function => Ok(ElementDef::Function(self.parse_function()?)),
            TokenKind::Profile => Ok(ElementDef::Profile(self.parse_profile()?)),
            other => Err(ParseError::unexpected_token(
                self.span(),
                "Class, Enum, Association, function or Profile",
                other.name(),
            )),
        }
    }

    /// A qualified element name `a::b::Name`, split into package and name.
    fn parse_qualified_name(&mut self) -> ParseResult<(String, String, SourceSpan)> {
        let (first, span) = self.expect_ident()?;
        let mut segments = vec![first];
        while self.check(&TokenKind::PathSep) {
            self.advance();
            segments.push(self.expect_ident()?.0);
        }
        let name = segments.pop().unwrap_or_default();
        Ok((segments.join("::"), name, span))
    }

    /// A reference path `a::b::C` with an optional dotted member `.RED`.
    fn parse_reference_path(&mut self) -> ParseResult<(String, SourceSpan)> {
        let (first, span) = self.expect_ident()?;
        let mut path = first;
        while self.check(&TokenKind::PathSep) {
            self.advance();
            path.push_str("::");
            path.push_str(&self.expect_ident()?.0);
        }
        if self.eat(&TokenKind::Dot) {
            path.push('.');
            path.push_str(&self.expect_ident()?.0);
        }
        Ok((path, span))
    }

    // ========== Types & Multiplicities ==========

    fn parse_type_ref(&mut self) -> ParseResult<TypeRef> {
        let (first, span) = self.expect_ident()?;
        let mut path = first;
        while self.check(&TokenKind::PathSep) {
            self.advance();
            path.push_str("::");
            path.push_str(&self.expect_ident()?.0);
        }
        let mut type_args = Vec::new();
        let mut mult_args = Vec::new();
        if self.eat(&TokenKind::Lt) {
            loop {
                type_args.push(self.parse_type_ref()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            if self.eat(&TokenKind::Pipe) {
                loop {
                    mult_args.push(self.parse_bare_multiplicity()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect_gt()?;
        }
        Ok(TypeRef {
            path,
            type_args,
            mult_args,
            span,
        })
    }

    /// A multiplicity in brackets: `[1]`, `[0..1]`, `[*]`, `[1..*]`, `[m]`.
    fn parse_multiplicity(&mut self) -> ParseResult<MultRef> {
        let start = self.expect(TokenKind::LBracket)?;
        let mult = self.parse_multiplicity_body()?;
        self.expect(TokenKind::RBracket)?;
        Ok(MultRef {
            multiplicity: mult,
            span: start.span,
        })
    }

    /// A multiplicity without brackets, used inside type arguments.
    fn parse_bare_multiplicity(&mut self) -> ParseResult<MultRef> {
        let span = self.span();
        let mult = self.parse_multiplicity_body()?;
        Ok(MultRef {
            multiplicity: mult,
            span,
        })
    }

    fn parse_multiplicity_body(&mut self) -> ParseResult<Multiplicity> {
        match self.current_kind().clone() {
            TokenKind::Star => {
                self.advance();
                Ok(Multiplicity::zero_many())
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Multiplicity::Parameter(name))
            }
            TokenKind::Int(lower) if lower >= 0 => {
                self.advance();
                if self.eat(&TokenKind::Range) {
                    match self.current_kind().clone() {
                        TokenKind::Star => {
                            self.advance();
                            Ok(Multiplicity::range(lower as u64, None))
                        }
                        TokenKind::Int(upper) if upper >= 0 => {
                            self.advance();
                            Ok(Multiplicity::range(lower as u64, Some(upper as u64)))
                        }
                        other => Err(ParseError::unexpected_token(
                            self.span(),
                            "integer or '*'",
                            other.name(),
                        )),
                    }
                } else {
                    Ok(Multiplicity::range(lower as u64, Some(lower as u64)))
                }
            }
            other => Err(ParseError::unexpected_token(
                self.span(),
                "multiplicity",
                other.name(),
            )),
        }
    }

    fn parse_stereotypes(&mut self) -> ParseResult<Vec<StereotypeRef>> {
        let mut stereotypes = Vec::new();
        if self.eat(&TokenKind::StereoOpen) {
            loop {
                let (profile, span) = self.expect_ident()?;
                self.expect(TokenKind::Dot)?;
                let (stereotype, _) = self.expect_ident()?;
                stereotypes.push(StereotypeRef {
                    profile,
                    stereotype,
                    span,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::StereoClose)?;
        }
        Ok(stereotypes)
    }

    // ========== Elements ==========

    fn parse_class(&mut self) -> ParseResult<ClassDef> {
        self.expect(TokenKind::Class)?;
        let (package, name, span) = self.parse_qualified_name()?;

        let mut type_params = Vec::new();
        if self.eat(&TokenKind::Lt) {
            loop {
                type_params.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_gt()?;
        }

        let mut supertypes = Vec::new();
        if self.eat(&TokenKind::Extends) {
            loop {
                supertypes.push(self.parse_type_ref()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let stereotypes = self.parse_stereotypes()?;

        self.expect(TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            properties.push(self.parse_property()?);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(ClassDef {
            package,
            name,
            type_params,
            supertypes,
            stereotypes,
            properties,
            span,
        })
    }

    fn parse_property(&mut self) -> ParseResult<PropertyDef> {
        let (name, span) = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let type_ref = self.parse_type_ref()?;
        let multiplicity = self.parse_multiplicity()?;
        let default = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(PropertyDef {
            name,
            type_ref,
            multiplicity,
            default,
            span,
        })
    }

    fn parse_enum(&mut self) -> ParseResult<EnumDef> {
        self.expect(TokenKind::Enum)?;
        let (package, name, span) = self.parse_qualified_name()?;
        self.expect(TokenKind::LBrace)?;
        let mut values = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                values.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(EnumDef {
            package,
            name,
            values,
            span,
        })
    }

    fn parse_association(&mut self) -> ParseResult<AssociationDef> {
        self.expect(TokenKind::Association)?;
        let (package, name, span) = self.parse_qualified_name()?;
        self.expect(TokenKind::LBrace)?;
        let mut ends = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            ends.push(self.parse_property()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(AssociationDef {
            package,
            name,
            ends,
            span,
        })
    }

    fn parse_function(&mut self) -> ParseResult<FunctionDef> {
        self.expect(TokenKind::Function)?;
        let (package, name, span) = self.parse_qualified_name()?;

        let mut type_params = Vec::new();
        let mut mult_params = Vec::new();
        if self.eat(&TokenKind::Lt) {
            if !self.check(&TokenKind::Pipe) {
                loop {
                    type_params.push(self.expect_ident()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            if self.eat(&TokenKind::Pipe) {
                loop {
                    mult_params.push(self.expect_ident()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect_gt()?;
        }

        self.expect(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (param_name, param_span) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let type_ref = self.parse_type_ref()?;
                let multiplicity = self.parse_multiplicity()?;
                parameters.push(ParamDef {
                    name: param_name,
                    type_ref,
                    multiplicity,
                    span: param_span,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::Colon)?;
        let return_type = self.parse_type_ref()?;
        let return_multiplicity = self.parse_multiplicity()?;

        let stereotypes = self.parse_stereotypes()?;

        let body = if self.eat(&TokenKind::LBrace) {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RBrace)?;
            Some(expr)
        } else {
            self.expect(TokenKind::Semi)?;
            None
        };

        Ok(FunctionDef {
            package,
            name,
            type_params,
            mult_params,
            parameters,
            return_type,
            return_multiplicity,
            body,
            stereotypes,
            span,
        })
    }

    fn parse_profile(&mut self) -> ParseResult<ProfileDef> {
        self.expect(TokenKind::Profile)?;
        let (package, name, span) = self.parse_qualified_name()?;
        self.expect(TokenKind::LBrace)?;
        let mut stereotypes = Vec::new();
        let mut tags = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (section, section_span) = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            self.expect(TokenKind::LBracket)?;
            let mut names = Vec::new();
            if !self.check(&TokenKind::RBracket) {
                loop {
                    names.push(self.expect_ident()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RBracket)?;
            self.expect(TokenKind::Semi)?;
            match section.as_str() {
                "stereotypes" => stereotypes.extend(names),
                "tags" => tags.extend(names),
                other => {
                    return Err(ParseError::new(
                        format!("expected 'stereotypes' or 'tags', found '{}'", other),
                        section_span,
                    ))
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ProfileDef {
            package,
            name,
            stereotypes,
            tags,
            span,
        })
    }

    fn parse_expr(&mut self) -> ParseResult<ExprDef> {
        let span = self.span();
        match self.current_kind().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(ExprDef::Literal(Value::Integer(i), span))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(ExprDef::Literal(Value::Float(x), span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(ExprDef::Literal(Value::String(s), span))
            }
            TokenKind::Date(d) => {
                self.advance();
                Ok(ExprDef::Literal(Value::Date(d), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(ExprDef::Literal(Value::Boolean(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(ExprDef::Literal(Value::Boolean(false), span))
            }
            TokenKind::Ident(_) => {
                let (path, span) = self.parse_reference_path()?;
                Ok(ExprDef::Reference(path, span))
            }
            other => Err(ParseError::unexpected_token(
                self.span(),
                "expression",
                other.name(),
            )),
        }
    }
}
