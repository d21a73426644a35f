//! Schema tree: `Type` nodes, `TypeRef` pointers and their payload rules.
//!
//! Types are owned by the catalog arena and addressed by `TypeId`; a
//! `TypeRef` holds the id, never a copy, so two sites that mention the same
//! canonical type hold equal ids.
pub mod literal;

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};

pub use literal::Literal;

// ------------------------------- Names ----------------------------------- //

pub const ANY: &str = "any";
pub const BYTE: &str = "byte";
pub const BYTES: &str = "bytes";
pub const BOOLEAN: &str = "boolean";
pub const INTEGER: &str = "integer";
pub const NUMBER: &str = "number";
pub const STRING: &str = "string";

pub const ONEOF: &str = "oneof";
pub const UNION: &str = "union";
pub const LIST: &str = "list";
pub const REFERENCE: &str = "reference";
pub const RECORD: &str = "record";

pub const SCALARS: [&str; 7] = [ANY, BYTE, BYTES, BOOLEAN, INTEGER, NUMBER, STRING];

// ------------------------------- Handles --------------------------------- //

/// Stable index of a `Type` in a catalog arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Base {
    Scalar,
    Compound,
    Record,
    Constant,
    Extension,
    Unknown,
}

impl Base {
    pub fn as_str(self) -> &'static str {
        match self {
            Base::Scalar => "scalar",
            Base::Compound => "compound",
            Base::Record => "record",
            Base::Constant => "constant",
            Base::Extension => "extension",
            Base::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// `base` and `name` folded into one closed set, for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Scalar,
    Constant,
    OneOf,
    Union,
    List,
    Reference,
    /// `record` compound: an anonymous dict-like shape.
    AnonRecord,
    /// `record` base: a named shape.
    Record,
    Extension,
    Unknown,
}

// ------------------------------- Payload --------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Empty,
    Fields(Vec<TypeRef>),
    Alternatives(Vec<Node>),
    Inner(Option<Box<Node>>),
    Literal(Literal),
}

/// A child slot: either a bare type or a pointer carrying site information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Type(TypeId),
    Ref(TypeRef),
}

impl Node {
    pub fn id(&self) -> TypeId {
        match self {
            Node::Type(id) => *id,
            Node::Ref(r) => r.ty,
        }
    }

    pub fn as_type_ref(&self) -> Option<&TypeRef> {
        match self {
            Node::Ref(r) => Some(r),
            Node::Type(_) => None,
        }
    }

    pub fn into_ref(self) -> TypeRef {
        match self {
            Node::Ref(r) => r,
            Node::Type(id) => TypeRef::new(id),
        }
    }
}

/// Mutable view of one child slot, used by tree walks.
pub enum SlotMut<'a> {
    Id(&'a mut TypeId),
    Ref(&'a mut TypeRef),
}

impl<'a> SlotMut<'a> {
    pub fn from_node(node: &'a mut Node) -> Self {
        match node {
            Node::Type(id) => SlotMut::Id(id),
            Node::Ref(r) => SlotMut::Ref(r),
        }
    }

    pub fn id(&self) -> TypeId {
        match self {
            SlotMut::Id(id) => **id,
            SlotMut::Ref(r) => r.ty,
        }
    }
}

// --------------------------------- Type ---------------------------------- //

pub type Meta = IndexMap<String, String>;

#[derive(Debug, Clone)]
pub struct Type {
    pub base: Base,
    pub name: String,
    pub doc: Option<String>,
    value: Value,
    /// Provenance and other annotations; ignored by equality.
    pub meta: Meta,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.name == other.name
            && self.doc == other.doc
            && self.value == other.value
    }
}

impl Eq for Type {}

impl Type {
    fn with(base: Base, name: &str, value: Value) -> Self {
        Self { base, name: name.to_string(), doc: None, value, meta: Meta::new() }
    }

    pub fn scalar(name: &str) -> Self { Self::with(Base::Scalar, name, Value::Empty) }

    pub fn constant(lit: Literal) -> Self {
        let name = lit.kind();
        Self::with(Base::Constant, name, Value::Literal(lit))
    }

    /// Empty compound of the given kind name (`list`, `oneof`, …).
    pub fn compound(name: &str) -> Result<Self> {
        let value = match name {
            ONEOF | UNION => Value::Alternatives(Vec::new()),
            LIST | REFERENCE => Value::Inner(None),
            RECORD => Value::Fields(Vec::new()),
            other => return Err(Error::structure(format!("unknown compound kind {other:?}"))),
        };
        Ok(Self::with(Base::Compound, name, value))
    }

    pub fn record(name: &str) -> Self { Self::with(Base::Record, name, Value::Fields(Vec::new())) }

    pub fn extension(name: &str, inner: Option<Node>) -> Self {
        Self::with(Base::Extension, name, Value::Inner(inner.map(Box::new)))
    }

    pub fn unknown(name: &str) -> Self { Self::with(Base::Unknown, name, Value::Empty) }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = non_empty(doc.into());
        self
    }

    pub fn kind(&self) -> Kind {
        match (self.base, self.name.as_str()) {
            (Base::Scalar, _) => Kind::Scalar,
            (Base::Constant, _) => Kind::Constant,
            (Base::Compound, ONEOF) => Kind::OneOf,
            (Base::Compound, UNION) => Kind::Union,
            (Base::Compound, LIST) => Kind::List,
            (Base::Compound, REFERENCE) => Kind::Reference,
            (Base::Compound, _) => Kind::AnonRecord,
            (Base::Record, _) => Kind::Record,
            (Base::Extension, _) => Kind::Extension,
            (Base::Unknown, _) => Kind::Unknown,
        }
    }

    pub fn value(&self) -> &Value { &self.value }

    /// `record` and `extension` bases carry a catalog-wide name.
    pub fn is_named(&self) -> bool { matches!(self.base, Base::Record | Base::Extension) }

    pub fn is_record_like(&self) -> bool { matches!(self.kind(), Kind::Record | Kind::AnonRecord) }

    pub fn supports_children(&self) -> bool { self.is_record_like() || self.kind() == Kind::List }

    pub fn fields(&self) -> &[TypeRef] {
        match &self.value {
            Value::Fields(fs) => fs,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeRef> {
        self.fields().iter().find(|f| f.name.as_deref() == Some(name))
    }

    pub fn inner(&self) -> Option<&Node> {
        match &self.value {
            Value::Inner(inner) => inner.as_deref(),
            _ => None,
        }
    }

    pub fn alternatives(&self) -> &[Node] {
        match &self.value {
            Value::Alternatives(xs) => xs,
            _ => &[],
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.value {
            Value::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Whether this node declares anything beyond its kind and name.
    pub fn has_content(&self) -> bool {
        match &self.value {
            Value::Empty => false,
            Value::Fields(fs) => !fs.is_empty(),
            Value::Alternatives(xs) => !xs.is_empty(),
            Value::Inner(inner) => inner.is_some(),
            Value::Literal(_) => true,
        }
    }

    /// Ids of every direct child, in declaration order.
    pub fn child_ids(&self) -> Vec<TypeId> {
        match &self.value {
            Value::Empty | Value::Literal(_) => Vec::new(),
            Value::Fields(fs) => fs.iter().map(|f| f.ty).collect(),
            Value::Alternatives(xs) => xs.iter().map(Node::id).collect(),
            Value::Inner(inner) => inner.iter().map(|n| n.id()).collect(),
        }
    }

    pub fn slots_mut(&mut self) -> Vec<SlotMut<'_>> {
        match &mut self.value {
            Value::Empty | Value::Literal(_) => Vec::new(),
            Value::Fields(fs) => fs.iter_mut().map(SlotMut::Ref).collect(),
            Value::Alternatives(xs) => xs.iter_mut().map(SlotMut::from_node).collect(),
            Value::Inner(inner) => inner.iter_mut().map(|n| SlotMut::from_node(n)).collect(),
        }
    }

    // ------------------------- checked mutators -------------------------- //

    pub fn push_field(&mut self, field: TypeRef) -> Result<()> {
        let name = match field.name.as_deref() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => return Err(Error::structure(format!("record {:?} has a field without a name", self.name))),
        };
        let owner = self.name.clone();
        match &mut self.value {
            Value::Fields(fs) => {
                if fs.iter().any(|f| f.name.as_deref() == Some(name.as_str())) {
                    return Err(Error::structure(format!("record {owner:?} declares field {name:?} twice")));
                }
                fs.push(field);
                Ok(())
            }
            _ => Err(Error::structure(format!("{owner:?} cannot hold fields"))),
        }
    }

    pub fn set_fields(&mut self, fields: Vec<TypeRef>) -> Result<()> {
        if !self.is_record_like() {
            return Err(Error::structure(format!("{:?} cannot hold fields", self.name)));
        }
        self.value = Value::Fields(Vec::new());
        for f in fields { self.push_field(f)?; }
        Ok(())
    }

    pub fn set_inner(&mut self, node: Node) -> Result<()> {
        let owner = self.name.clone();
        match &mut self.value {
            Value::Inner(slot @ None) => {
                *slot = Some(Box::new(node));
                Ok(())
            }
            Value::Inner(Some(_)) => Err(Error::structure(format!("{owner:?} takes at most one child"))),
            _ => Err(Error::structure(format!("{owner:?} cannot hold a single child"))),
        }
    }

    pub fn push_alternative(&mut self, node: Node) -> Result<()> {
        match &mut self.value {
            Value::Alternatives(xs) => {
                xs.push(node);
                Ok(())
            }
            _ => Err(Error::structure(format!("{:?} cannot hold alternatives", self.name))),
        }
    }

    /// Replace all children, enforcing the payload rule of this kind.
    pub fn set_children(&mut self, children: Vec<Node>) -> Result<()> {
        match self.kind() {
            Kind::Record | Kind::AnonRecord => {
                let mut fields = Vec::with_capacity(children.len());
                for c in children {
                    match c {
                        Node::Ref(r) => fields.push(r),
                        Node::Type(_) => {
                            return Err(Error::structure(format!(
                                "record {:?} children must be named fields", self.name
                            )));
                        }
                    }
                }
                self.set_fields(fields)
            }
            Kind::List | Kind::Reference | Kind::Extension => {
                if children.len() > 1 {
                    return Err(Error::structure(format!(
                        "{:?} takes at most one child, got {}", self.name, children.len()
                    )));
                }
                self.value = Value::Inner(children.into_iter().next().map(Box::new));
                Ok(())
            }
            Kind::OneOf | Kind::Union => {
                self.value = Value::Alternatives(children);
                Ok(())
            }
            Kind::Scalar | Kind::Constant | Kind::Unknown => {
                if children.is_empty() {
                    Ok(())
                } else {
                    Err(Error::structure(format!("{} {:?} cannot hold children", self.base, self.name)))
                }
            }
        }
    }
}

// -------------------------------- TypeRef -------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub ty: TypeId,
    pub name: Option<String>,
    pub doc: Option<String>,
    pub params: Params,
}

impl TypeRef {
    pub fn new(ty: TypeId) -> Self { Self { ty, name: None, doc: None, params: Params::default() } }

    pub fn named(name: impl Into<String>, ty: TypeId) -> Self {
        Self { name: Some(name.into()), ..Self::new(ty) }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = non_empty(doc.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Qualifiers attached at a use site: `optional`, `default`, access flags,
/// and open-ended ones such as `min`/`max`. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(IndexMap<String, Literal>);

impl Params {
    pub const OPTIONAL: &'static str = "optional";
    pub const DEFAULT: &'static str = "default";

    pub fn new() -> Self { Self::default() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn get(&self, key: &str) -> Option<&Literal> { self.0.get(key) }
    pub fn contains(&self, key: &str) -> bool { self.0.contains_key(key) }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Literal)> { self.0.iter() }

    pub fn insert(&mut self, key: impl Into<String>, value: Literal) -> Option<Literal> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Literal> { self.0.shift_remove(key) }

    pub fn flag(&self, key: &str) -> Option<bool> { self.get(key).and_then(Literal::as_bool) }

    pub fn optional(&self) -> bool { self.flag(Self::OPTIONAL).unwrap_or(false) }

    pub fn default_value(&self) -> Option<&Literal> { self.get(Self::DEFAULT) }
}

impl FromIterator<(String, Literal)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Literal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

// -------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_meta() {
        let mut a = Type::scalar(INTEGER).with_doc("count");
        let b = Type::scalar(INTEGER).with_doc("count");
        a.meta.insert("source".into(), "ext.txt".into());
        assert_eq!(a, b);
        assert_ne!(a, Type::scalar(INTEGER));
    }

    #[test]
    fn record_children_must_be_named() {
        let mut rec = Type::record("Shape");
        let err = rec.set_children(vec![Node::Type(TypeId(0))]).unwrap_err();
        assert!(matches!(err, Error::StructureViolation(_)));
        let err = rec.push_field(TypeRef::new(TypeId(0))).unwrap_err();
        assert!(matches!(err, Error::StructureViolation(_)));
        rec.push_field(TypeRef::named("sides", TypeId(0))).unwrap();
        assert_eq!(rec.fields().len(), 1);
        assert!(rec.push_field(TypeRef::named("sides", TypeId(1))).is_err());
    }

    #[test]
    fn single_child_kinds_reject_a_second_child() {
        let mut list = Type::compound(LIST).unwrap();
        list.set_inner(Node::Type(TypeId(1))).unwrap();
        assert!(list.set_inner(Node::Type(TypeId(2))).is_err());
        let err = list.set_children(vec![Node::Type(TypeId(1)), Node::Type(TypeId(2))]).unwrap_err();
        assert!(matches!(err, Error::StructureViolation(_)));
    }

    #[test]
    fn scalars_hold_nothing() {
        let mut s = Type::scalar(STRING);
        assert!(s.set_children(vec![]).is_ok());
        assert!(s.set_children(vec![Node::Type(TypeId(0))]).is_err());
        assert!(!s.has_content());
    }

    #[test]
    fn kind_folds_base_and_name() {
        assert_eq!(Type::compound(RECORD).unwrap().kind(), Kind::AnonRecord);
        assert_eq!(Type::record("Shape").kind(), Kind::Record);
        assert_eq!(Type::constant(Literal::Integer(3)).name, INTEGER);
        assert!(Type::compound("tuple").is_err());
    }

    #[test]
    fn params_compare_as_maps() {
        let mut a = Params::new();
        a.insert("optional", Literal::Boolean(true));
        a.insert("min", Literal::Integer(0));
        let b: Params = [
            ("min".to_string(), Literal::Integer(0)),
            ("optional".to_string(), Literal::Boolean(true)),
        ].into_iter().collect();
        assert_eq!(a, b);
        assert!(a.optional());
    }
}
