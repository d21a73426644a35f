//! Recursive-descent parser for the type-spec grammar.
//!
//! ```text
//! Type      := Sequence
//! Sequence  := Atom ( ('|' | '&') Atom )*
//! Atom      := '(' Type ')' | Symbol Compound? | Constant
//! Compound  := '(' Type? ')'          -- list / reference / record only
//! ```
//!
//! `|` builds a `oneof`, `&` a `union`; the first operator seen decides the
//! kind of the whole sequence. Symbols dispatch through a closed keyword table,
//! then the catalog, then the capitalized-name heuristic, then `unknown`.
pub mod literal;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::TypeCatalog;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::model::{self, Base, Literal, Node, Params, Type, TypeId};

static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*").unwrap());
static QUALIFIER_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*").unwrap());
/// Last dotted segment capitalized: `Shape`, `geo.Point`.
static CUSTOM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*\.)*[A-Z][A-Za-z0-9_]*$").unwrap());

// ------------------------------- Keywords -------------------------------- //

/// Grammar keywords, matched after alias resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Scalar(&'static str),
    Null,
    True,
    False,
    List,
    Reference,
    OneOf,
    Union,
    Record,
}

impl Keyword {
    pub fn lookup(name: &str) -> Option<Keyword> {
        if let Some(s) = model::SCALARS.iter().find(|s| **s == name) {
            return Some(Keyword::Scalar(*s));
        }
        Some(match name {
            "null" => Keyword::Null,
            "true" => Keyword::True,
            "false" => Keyword::False,
            model::LIST => Keyword::List,
            model::REFERENCE => Keyword::Reference,
            model::ONEOF => Keyword::OneOf,
            model::UNION => Keyword::Union,
            model::RECORD => Keyword::Record,
            _ => return None,
        })
    }
}

/// What a symbol would parse to, without touching the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Keyword(Keyword),
    Registered(Base),
    Custom,
    Unknown,
}

pub fn is_custom_name(name: &str) -> bool { CUSTOM_NAME.is_match(name) }

/// Whether `text` is one whole symbol (used to spot bare type names in prose).
pub fn is_symbol(text: &str) -> bool {
    SYMBOL.find(text).is_some_and(|m| m.end() == text.len())
}

// -------------------------------- Parser --------------------------------- //

pub struct TypeParser<'c> {
    catalog: &'c mut TypeCatalog,
}

impl<'c> TypeParser<'c> {
    pub fn new(catalog: &'c mut TypeCatalog) -> Self { Self { catalog } }

    /// Parse a whole spec; only a comment may follow the type.
    pub fn parse_type(&mut self, spec: &str) -> Result<TypeId> {
        let mut cur = Cursor::new(spec);
        let id = self.parse_sequence(&mut cur)?;
        self.expect_end(&mut cur)?;
        Ok(id)
    }

    /// Parse a type and hand back whatever text follows it.
    pub fn parse_type_partial<'s>(&mut self, spec: &'s str) -> Result<(TypeId, &'s str)> {
        let mut cur = Cursor::new(spec);
        let id = self.parse_sequence(&mut cur)?;
        Ok((id, cur.rest()))
    }

    /// `type (',' key (':' value)?)*`, as written after `name :` in a block.
    pub fn parse_declaration(&mut self, spec: &str) -> Result<(TypeId, Params)> {
        let mut cur = Cursor::new(spec);
        let id = self.parse_sequence(&mut cur)?;
        let params = self.parse_qualifiers(&mut cur)?;
        self.expect_end(&mut cur)?;
        Ok((id, params))
    }

    fn expect_end(&self, cur: &mut Cursor<'_>) -> Result<()> {
        cur.skip_ws();
        if cur.is_eof() || cur.rest().starts_with(self.catalog.comment_marker()) {
            return Ok(());
        }
        Err(Error::invalid_spec(cur.text(), cur.pos(), "unexpected trailing text"))
    }

    fn parse_sequence(&mut self, cur: &mut Cursor<'_>) -> Result<TypeId> {
        let first = self.parse_atom(cur)?;
        let mut op: Option<char> = None;
        let mut items = vec![first];
        loop {
            let save = cur.pos();
            cur.skip_ws();
            match cur.peek() {
                Some(c @ ('|' | '&')) => {
                    cur.read();
                    op.get_or_insert(c);
                    items.push(self.parse_atom(cur)?);
                }
                _ => {
                    cur.seek(save);
                    break;
                }
            }
        }
        let Some(op) = op else { return Ok(first) };
        let mut seq = Type::compound(if op == '|' { model::ONEOF } else { model::UNION })?;
        seq.set_children(items.into_iter().map(Node::Type).collect())?;
        Ok(self.catalog.alloc(seq))
    }

    fn parse_atom(&mut self, cur: &mut Cursor<'_>) -> Result<TypeId> {
        cur.skip_ws();
        let start = cur.pos();
        if cur.peek() == Some('(') {
            cur.read();
            let id = self.parse_sequence(cur)?;
            if !cur.eat(')') {
                return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ')'"));
            }
            return Ok(id);
        }
        if let Some(id) = self.parse_symbol(cur)? {
            return Ok(id);
        }
        if let Some(lit) = literal::parse_constant(self.catalog.aliases(), self.catalog.comment_marker(), cur)? {
            return Ok(self.catalog.alloc(Type::constant(lit)));
        }
        Err(Error::invalid_spec(cur.text(), start, "expected a type"))
    }

    fn parse_symbol(&mut self, cur: &mut Cursor<'_>) -> Result<Option<TypeId>> {
        let Some(m) = SYMBOL.find(cur.rest()) else { return Ok(None) };
        let raw = m.as_str();
        cur.advance(raw.len());
        let name = self.catalog.resolve_alias(raw).to_string();

        let ty = match self.catalog.classify_symbol(&name) {
            SymbolKind::Keyword(kw) => return self.parse_keyword(kw, cur).map(Some),
            SymbolKind::Registered(Base::Extension) => Type::extension(&name, None),
            SymbolKind::Registered(_) => Type::record(&name),
            SymbolKind::Custom => {
                let id = self.catalog.alloc(Type::record(&name));
                self.catalog.ensure_provisional(&name, id);
                return Ok(Some(id));
            }
            SymbolKind::Unknown => Type::unknown(&name),
        };
        Ok(Some(self.catalog.alloc(ty)))
    }

    fn parse_keyword(&mut self, kw: Keyword, cur: &mut Cursor<'_>) -> Result<TypeId> {
        let ty = match kw {
            Keyword::Scalar(name) => Type::scalar(name),
            Keyword::Null => Type::constant(Literal::Null),
            Keyword::True => Type::constant(Literal::Boolean(true)),
            Keyword::False => Type::constant(Literal::Boolean(false)),
            Keyword::OneOf => Type::compound(model::ONEOF)?,
            Keyword::Union => Type::compound(model::UNION)?,
            Keyword::List | Keyword::Reference => {
                let name = if kw == Keyword::List { model::LIST } else { model::REFERENCE };
                let mut ty = Type::compound(name)?;
                if let Some(inner) = self.parse_compound_arg(cur)? {
                    ty.set_inner(Node::Type(inner))?;
                }
                ty
            }
            Keyword::Record => {
                let at = cur.pos();
                if self.parse_compound_arg(cur)?.is_some() {
                    return Err(Error::structure(format!(
                        "record(...) at column {} cannot take a bare type; declare named fields instead",
                        at + 1
                    )));
                }
                Type::compound(model::RECORD)?
            }
        };
        Ok(self.catalog.alloc(ty))
    }

    /// `'(' Type? ')'` directly after a compound keyword.
    fn parse_compound_arg(&mut self, cur: &mut Cursor<'_>) -> Result<Option<TypeId>> {
        if !cur.eat('(') { return Ok(None); }
        if cur.eat(')') { return Ok(None); }
        let inner = self.parse_sequence(cur)?;
        if !cur.eat(')') {
            return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ')'"));
        }
        Ok(Some(inner))
    }

    fn parse_qualifiers(&mut self, cur: &mut Cursor<'_>) -> Result<Params> {
        let mut params = Params::new();
        loop {
            cur.skip_ws();
            if cur.is_eof() || cur.rest().starts_with(self.catalog.comment_marker()) {
                return Ok(params);
            }
            if !cur.eat(',') {
                return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ',' before qualifier"));
            }
            cur.skip_ws();
            let at = cur.pos();
            let Some(m) = QUALIFIER_KEY.find(cur.rest()) else {
                return Err(Error::invalid_spec(cur.text(), at, "expected a qualifier name"));
            };
            let key = m.as_str().to_string();
            cur.advance(key.len());
            let value = if cur.eat(':') {
                cur.skip_ws();
                literal::parse_value(self.catalog.aliases(), self.catalog.comment_marker(), cur)?
            } else {
                Literal::Boolean(true)
            };
            if params.insert(key.clone(), value).is_some() {
                return Err(Error::invalid_spec(cur.text(), at, format!("qualifier {key:?} given twice")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Kind, INTEGER};

    fn cat() -> TypeCatalog { TypeCatalog::new() }

    #[test]
    fn scalars_through_aliases() {
        let mut c = cat();
        let a = c.parse_type("int").unwrap();
        let b = c.parse_type("integer").unwrap();
        assert_eq!(c.ty(a), c.ty(b));
        assert_eq!(c.ty(a).name, INTEGER);
    }

    #[test]
    fn list_of_int() {
        let mut c = cat();
        let id = c.parse_type("list(int)").unwrap();
        let list = c.ty(id);
        assert_eq!(list.kind(), Kind::List);
        let inner = list.inner().unwrap().id();
        assert_eq!(c.ty(inner).name, INTEGER);
        let empty = c.parse_type("array()").unwrap();
        assert!(c.ty(empty).inner().is_none());
    }

    #[test]
    fn parenthesized_constants_build_oneof() {
        let mut c = cat();
        let id = c.parse_type("('m'|'f'|'o')").unwrap();
        let ty = c.ty(id);
        assert_eq!(ty.kind(), Kind::OneOf);
        let lits: Vec<_> = ty.alternatives().iter()
            .map(|n| c.ty(n.id()).literal().cloned().unwrap())
            .collect();
        assert_eq!(lits, vec![
            Literal::String("m".into()),
            Literal::String("f".into()),
            Literal::String("o".into()),
        ]);
    }

    #[test]
    fn first_operator_fixes_sequence_kind() {
        let mut c = cat();
        let id = c.parse_type("int & str | bool").unwrap();
        assert_eq!(c.ty(id).kind(), Kind::Union);
        assert_eq!(c.ty(id).alternatives().len(), 3);
    }

    #[test]
    fn reference_to_custom_name_is_provisional_record() {
        let mut c = cat();
        let id = c.parse_type("ref(Shape)").unwrap();
        let inner = c.ty(id).inner().unwrap().id();
        assert_eq!(c.ty(inner).kind(), Kind::Record);
        assert_eq!(c.get_provisional("Shape"), Some(inner));
        assert_eq!(c.get("Shape"), None);
    }

    #[test]
    fn lowercase_names_are_forward_references() {
        let mut c = cat();
        let id = c.parse_type("widget").unwrap();
        assert_eq!(c.ty(id).kind(), Kind::Unknown);
        assert_eq!(c.ty(id).name, "widget");
    }

    #[test]
    fn declaration_with_qualifiers() {
        let mut c = cat();
        let (id, params) = c.parse_declaration("int, optional, default: 3  # note").unwrap();
        assert_eq!(c.ty(id).name, INTEGER);
        assert!(params.optional());
        assert_eq!(params.default_value(), Some(&Literal::Integer(3)));
    }

    #[test]
    fn bare_qualifier_values_stop_at_comments() {
        let mut c = cat();
        let (_, params) = c.parse_declaration("str, default: pending  # placeholder").unwrap();
        assert_eq!(params.default_value(), Some(&Literal::String("pending".into())));

        let config = crate::config::Config { comment_marker: "--".into(), ..Default::default() };
        let mut c = TypeCatalog::with_config(&config).unwrap();
        let (_, params) = c.parse_declaration("str, unit: km--per-hour, optional -- speed").unwrap();
        assert_eq!(params.get("unit"), Some(&Literal::String("km".into())));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn literal_only_spellings_name_types() {
        let mut c = cat();
        let on = c.register_type(Type::record("on")).unwrap();
        let id = c.parse_type("list(on)").unwrap();
        assert_eq!(c.ty(c.ty(id).inner().unwrap().id()).name, "on");
        assert_eq!(c.ty(on).kind(), Kind::Record);
        let (_, params) = c.parse_declaration("bool, default: off").unwrap();
        assert_eq!(params.default_value(), Some(&Literal::Boolean(false)));
    }

    #[test]
    fn constant_before_qualifiers() {
        let mut c = cat();
        let (id, params) = c.parse_declaration("42, min: -1, examples: [1, 'two']").unwrap();
        assert_eq!(c.ty(id).literal(), Some(&Literal::Integer(42)));
        assert_eq!(params.get("min"), Some(&Literal::Integer(-1)));
        assert_eq!(params.get("examples"), Some(&Literal::List(vec![
            Literal::Integer(1),
            Literal::String("two".into()),
        ])));
    }

    #[test]
    fn partial_parse_returns_remainder() {
        let mut c = cat();
        let (_, rest) = c.parse_type_partial("str, optional").unwrap();
        assert_eq!(rest, ", optional");
    }

    #[test]
    fn trailing_text_is_rejected_when_complete() {
        let mut c = cat();
        let err = c.parse_type("int str").unwrap_err();
        match err {
            Error::InvalidSpecification { column, context, .. } => {
                assert_eq!(column, 5);
                assert!(context.contains("str"));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(c.parse_type("list(int").is_err());
        assert!(c.parse_type("").is_err());
        assert!(c.parse_type("int, optional").is_err());
    }

    #[test]
    fn record_takes_no_bare_type() {
        let mut c = cat();
        assert!(c.parse_type("dict()").is_ok());
        assert!(matches!(c.parse_type("record(int)"), Err(Error::StructureViolation(_))));
    }

    #[test]
    fn duplicate_qualifier_is_rejected() {
        let mut c = cat();
        assert!(c.parse_declaration("int, optional, optional").is_err());
    }

    #[test]
    fn custom_name_heuristic() {
        assert!(is_custom_name("Shape"));
        assert!(is_custom_name("geo.Point"));
        assert!(!is_custom_name("shape"));
        assert!(!is_custom_name("Geo.point"));
        assert!(is_symbol("geo.Point"));
        assert!(!is_symbol("list(int)"));
    }
}
