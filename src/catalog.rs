//! The type catalog: arena, canonical and provisional name maps, aliases,
//! pending merge buckets and the forwarding table.
//!
//! A catalog is the only mutable state in the crate. It is passed around as
//! `&mut TypeCatalog`; nothing here is global.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::alias::AliasTable;
use crate::block::{BlockParser, Entries, Entry};
use crate::channel::Channel;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grammar::{self, Keyword, SymbolKind, TypeParser};
use crate::model::{Base, Kind, Node, Params, Type, TypeId, Value};

pub const DEFAULT_COMMENT_MARKER: &str = "#";

/// One staged occurrence of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub id: TypeId,
    pub channel: Channel,
}

/// Where a retired id now points, plus the doc that site keeps for itself.
#[derive(Debug, Clone)]
pub(crate) struct Rebind {
    pub target: TypeId,
    pub site_doc: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Options {
    pub comment_marker: String,
    pub custom_types: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { comment_marker: DEFAULT_COMMENT_MARKER.to_string(), custom_types: true }
    }
}

#[derive(Debug, Clone)]
pub struct TypeCatalog {
    pub(crate) arena: Vec<Type>,
    pub(crate) canonical: HashMap<String, TypeId>,
    pub(crate) provisional: HashMap<String, TypeId>,
    pub(crate) aliases: AliasTable,
    pub(crate) pending: IndexMap<String, Vec<Declaration>>,
    pub(crate) forward: HashMap<TypeId, Rebind>,
    pub(crate) options: Options,
}

impl Default for TypeCatalog {
    fn default() -> Self { Self::new() }
}

impl TypeCatalog {
    /// Empty catalog with the builtin alias spellings.
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            canonical: HashMap::new(),
            provisional: HashMap::new(),
            aliases: AliasTable::builtin(),
            pending: IndexMap::new(),
            forward: HashMap::new(),
            options: Options::default(),
        }
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.options.comment_marker = config.comment_marker.clone();
        catalog.options.custom_types = config.custom_types;
        for (target, spellings) in &config.aliases {
            for spelling in spellings {
                catalog.add_alias(spelling, target)?;
            }
        }
        Ok(catalog)
    }

    // ------------------------------ arena -------------------------------- //

    pub(crate) fn alloc(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.arena.len() as u32);
        self.arena.push(ty);
        id
    }

    /// Panics on an id from another catalog.
    pub fn ty(&self, id: TypeId) -> &Type { &self.arena[id.index()] }

    pub(crate) fn ty_mut(&mut self, id: TypeId) -> &mut Type { &mut self.arena[id.index()] }

    // ----------------------------- lookups ------------------------------- //

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.canonical.get(self.resolve_alias(name)).copied()
    }

    pub fn get_provisional(&self, name: &str) -> Option<TypeId> {
        self.provisional.get(self.resolve_alias(name)).copied()
    }

    /// Canonical names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.canonical.keys().map(String::as_str) }

    pub fn aliases(&self) -> &AliasTable { &self.aliases }

    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str { self.aliases.resolve(name) }

    pub fn comment_marker(&self) -> &str { &self.options.comment_marker }

    pub fn pending_names(&self) -> impl Iterator<Item = &str> { self.pending.keys().map(String::as_str) }

    /// Base of a registered name, canonical first.
    fn named_base(&self, name: &str) -> Option<Base> {
        self.canonical.get(name).or_else(|| self.provisional.get(name)).map(|id| self.ty(*id).base)
    }

    pub(crate) fn classify_symbol(&self, name: &str) -> SymbolKind {
        if let Some(kw) = Keyword::lookup(name) {
            return SymbolKind::Keyword(kw);
        }
        if let Some(base) = self.named_base(name) {
            return SymbolKind::Registered(base);
        }
        if self.options.custom_types && grammar::is_custom_name(name) {
            return SymbolKind::Custom;
        }
        SymbolKind::Unknown
    }

    /// Record `id` as the provisional definition of `name` unless the name is
    /// already known.
    pub(crate) fn ensure_provisional(&mut self, name: &str, id: TypeId) {
        if self.canonical.contains_key(name) || self.provisional.contains_key(name) {
            return;
        }
        trace!(name, %id, "provisional forward reference");
        self.provisional.insert(name.to_string(), id);
    }

    /// Canonical lookup, else provisional with promotion.
    pub(crate) fn lookup_promote(&mut self, name: &str) -> Option<TypeId> {
        let name = self.resolve_alias(name).to_string();
        if let Some(id) = self.canonical.get(&name) {
            return Some(*id);
        }
        let id = self.provisional.remove(&name)?;
        debug!(name = %name, %id, "promoting provisional type");
        self.canonical.insert(name, id);
        Some(id)
    }

    // --------------------------- registration ---------------------------- //

    fn check_registrable(&self, ty: &Type) -> Result<()> {
        if !ty.is_named() {
            return Err(Error::structure(format!(
                "only record and extension types can be registered, got {} {:?}",
                ty.base, ty.name
            )));
        }
        if self.aliases.is_alias(&ty.name) {
            return Err(Error::AliasConflict {
                alias: ty.name.clone(),
                reason: "type name is already an alias spelling".into(),
            });
        }
        if self.canonical.contains_key(&ty.name) {
            return Err(Error::DuplicateType(ty.name.clone()));
        }
        Ok(())
    }

    /// Register a finished definition. A provisional entry of the same name
    /// is overwritten in place so earlier references stay valid.
    pub fn register_type(&mut self, ty: Type) -> Result<TypeId> {
        self.check_registrable(&ty)?;
        let name = ty.name.clone();
        let id = match self.provisional.remove(&name) {
            Some(id) => {
                self.arena[id.index()] = ty;
                id
            }
            None => self.alloc(ty),
        };
        debug!(name = %name, %id, "registered canonical type");
        self.canonical.insert(name, id);
        Ok(id)
    }

    pub fn register_provisional(&mut self, ty: Type) -> Result<TypeId> {
        self.check_registrable(&ty)?;
        if self.provisional.contains_key(&ty.name) {
            return Err(Error::DuplicateType(ty.name.clone()));
        }
        let name = ty.name.clone();
        let id = self.alloc(ty);
        self.provisional.insert(name, id);
        Ok(id)
    }

    /// Install `ty` as the provisional definition of its name.
    ///
    /// `origin` is the arena id `ty` was built from, if any. An existing
    /// provisional entry is reused when it is `origin` or an empty shell; a
    /// staged site is left to the merge engine and the name is remapped.
    fn define_provisional(&mut self, ty: Type, origin: Option<TypeId>) -> Result<TypeId> {
        self.check_registrable(&ty)?;
        let name = ty.name.clone();
        let Some(pid) = self.provisional.get(&name).copied() else {
            let id = self.alloc(ty);
            self.provisional.insert(name, id);
            return Ok(id);
        };
        let shell = self.ty(pid);
        if origin == Some(pid) || (shell.doc.is_none() && !shell.has_content()) {
            self.arena[pid.index()] = ty;
            return Ok(pid);
        }
        if self.is_staged(pid) {
            let id = self.alloc(ty);
            self.provisional.insert(name, id);
            return Ok(id);
        }
        Err(Error::DuplicateType(name))
    }

    fn is_staged(&self, id: TypeId) -> bool {
        self.pending.values().flatten().any(|d| d.id == id)
    }

    pub fn add_alias(&mut self, source: &str, target: &str) -> Result<()> {
        if self.canonical.contains_key(source) || self.provisional.contains_key(source) {
            return Err(Error::AliasConflict {
                alias: source.to_string(),
                reason: "is already a registered type name".into(),
            });
        }
        self.aliases.add(source, target)
    }

    // ------------------------------ parsing ------------------------------ //

    pub fn parse_type(&mut self, spec: &str) -> Result<TypeId> {
        TypeParser::new(self).parse_type(spec)
    }

    pub fn parse_type_partial<'s>(&mut self, spec: &'s str) -> Result<(TypeId, &'s str)> {
        TypeParser::new(self).parse_type_partial(spec)
    }

    pub fn parse_declaration(&mut self, spec: &str) -> Result<(TypeId, Params)> {
        TypeParser::new(self).parse_declaration(spec)
    }

    /// Lazily parse an attribute block, staging each declaration under
    /// `channel` as it is yielded.
    pub fn parse_block(&mut self, text: &str, channel: Channel) -> Entries<'_> {
        BlockParser::new(self, channel).entries(text)
    }

    pub fn parse(&mut self, text: &str, channel: Channel) -> Result<Entry> {
        BlockParser::new(self, channel).parse(text)
    }

    pub fn parse_multi(&mut self, text: &str, channel: Channel) -> Result<Vec<Entry>> {
        BlockParser::new(self, channel).parse_multi(text)
    }

    /// Parse a block of `Name : spec` definitions into provisional types.
    ///
    /// Anonymous records become `record` types of that name; anything else is
    /// wrapped as an `extension`. Bare standalone names define themselves.
    pub fn load_extension_text(&mut self, text: &str, source: Option<&str>) -> Result<Vec<TypeId>> {
        let entries = BlockParser::detached(self).eager(true).entries(text).collect::<Result<Vec<_>>>()?;
        let mut loaded = Vec::new();
        for entry in entries {
            let Some(Node::Ref(site)) = entry.node else { continue };
            let doc = join_docs([entry.doc, site.doc.clone()]);
            let inner = self.ty(site.ty).clone();

            let (mut ty, origin) = match site.name {
                None => (inner, Some(site.ty)),
                Some(name) if inner.is_named() && inner.name == name => (inner, Some(site.ty)),
                Some(name) if inner.kind() == Kind::AnonRecord => {
                    let mut rec = Type::record(&name);
                    rec.set_fields(inner.fields().to_vec())?;
                    rec.doc = inner.doc;
                    (rec, None)
                }
                Some(name) => (Type::extension(&name, Some(Node::Type(site.ty))), None),
            };
            ty.doc = join_docs([ty.doc.take(), doc]);
            if let Some(label) = source {
                ty.meta.insert("source".into(), label.to_string());
            }
            let name = ty.name.clone();
            let id = self.define_provisional(ty, origin)?;
            debug!(name = %name, %id, source, "loaded extension type");
            loaded.push(id);
        }
        Ok(loaded)
    }

    // --------------------------- merge & deref --------------------------- //

    pub(crate) fn stage(&mut self, name: &str, decl: Declaration) {
        trace!(name, id = %decl.id, channel = %decl.channel, "staged declaration");
        self.pending.entry(name.to_string()).or_default().push(decl);
    }

    /// Merge every pending declaration into canonical types, then resolve all
    /// forward references reachable from the catalog.
    pub fn merge_pending(&mut self) -> Result<()> { crate::merge::merge_pending(self) }

    pub fn dereference(&mut self, node: &mut Node) -> Result<()> { crate::deref::dereference(self, node) }

    pub fn render(&self, node: &Node) -> String { crate::render::render_node(self, node) }

    pub fn render_type(&self, id: TypeId) -> String { crate::render::render_type(self, id) }

    pub(crate) fn forward_to(&mut self, from: TypeId, target: TypeId, site_doc: Option<String>) {
        if from == target { return; }
        trace!(%from, %target, "forwarding retired id");
        self.forward.insert(from, Rebind { target, site_doc });
    }

    /// Final id after following the forwarding chain.
    pub(crate) fn follow(&self, mut id: TypeId) -> TypeId {
        while let Some(rb) = self.forward.get(&id) {
            id = rb.target;
        }
        id
    }

    /// Structural equivalence. Named types compare by base and name; the rest
    /// compare by shape, ignoring `meta`.
    pub fn equivalent(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.follow(a), self.follow(b));
        if a == b {
            return true;
        }
        let (ta, tb) = (self.ty(a), self.ty(b));
        if ta.base != tb.base || ta.name != tb.name {
            return false;
        }
        if ta.is_named() || ta.base == Base::Unknown {
            return true;
        }
        if ta.doc != tb.doc {
            return false;
        }
        match (ta.value(), tb.value()) {
            (Value::Fields(x), Value::Fields(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y).all(|(l, r)| {
                        l.name == r.name && l.doc == r.doc && l.params == r.params && self.equivalent(l.ty, r.ty)
                    })
            }
            (Value::Alternatives(x), Value::Alternatives(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(l, r)| self.node_equivalent(l, r))
            }
            (Value::Inner(x), Value::Inner(y)) => match (x, y) {
                (None, None) => true,
                (Some(l), Some(r)) => self.node_equivalent(l, r),
                _ => false,
            },
            (x, y) => x == y,
        }
    }

    fn node_equivalent(&self, a: &Node, b: &Node) -> bool {
        let site = |n: &Node| n.as_type_ref().map(|r| (r.name.clone(), r.doc.clone(), r.params.clone()));
        let bare = (None, None, Params::new());
        site(a).unwrap_or(bare.clone()) == site(b).unwrap_or(bare) && self.equivalent(a.id(), b.id())
    }
}

/// Join the non-empty docs with a blank line between them.
pub(crate) fn join_docs<I: IntoIterator<Item = Option<String>>>(docs: I) -> Option<String> {
    let parts: Vec<String> = docs.into_iter().flatten().filter(|d| !d.trim().is_empty()).collect();
    if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Literal, TypeRef, INTEGER};

    #[test]
    fn register_and_lookup_through_alias() {
        let mut c = TypeCatalog::new();
        let id = c.register_type(Type::record("Person")).unwrap();
        c.add_alias("Human", "Person").unwrap();
        assert_eq!(c.get("Person"), Some(id));
        assert_eq!(c.get("Human"), Some(id));
        assert!(matches!(c.register_type(Type::record("Person")), Err(Error::DuplicateType(_))));
    }

    #[test]
    fn only_named_types_register() {
        let mut c = TypeCatalog::new();
        assert!(matches!(c.register_type(Type::unknown("x")), Err(Error::StructureViolation(_))));
        assert!(c.register_type(Type::scalar(INTEGER)).is_err());
    }

    #[test]
    fn alias_cannot_shadow_a_type_name() {
        let mut c = TypeCatalog::new();
        c.register_type(Type::record("Person")).unwrap();
        assert!(matches!(c.add_alias("Person", "Human"), Err(Error::AliasConflict { .. })));
        assert!(matches!(c.register_type(Type::record("int")), Err(Error::AliasConflict { .. })));
    }

    #[test]
    fn registering_over_a_provisional_keeps_its_id() {
        let mut c = TypeCatalog::new();
        let early = c.parse_type("Shape").unwrap();
        assert_eq!(c.get_provisional("Shape"), Some(early));
        let id = c.register_type(Type::record("Shape").with_doc("A shape.")).unwrap();
        assert_eq!(id, early);
        assert_eq!(c.get_provisional("Shape"), None);
        assert_eq!(c.ty(early).doc.as_deref(), Some("A shape."));
    }

    #[test]
    fn provisional_is_promoted_on_lookup() {
        let mut c = TypeCatalog::new();
        let id = c.register_provisional(Type::record("Point")).unwrap();
        assert!(matches!(c.register_provisional(Type::record("Point")), Err(Error::DuplicateType(_))));
        assert_eq!(c.lookup_promote("Point"), Some(id));
        assert_eq!(c.get("Point"), Some(id));
        assert_eq!(c.get_provisional("Point"), None);
    }

    #[test]
    fn extension_text_defines_provisional_types() {
        let mut c = TypeCatalog::new();
        let text = "\
Color : ('red' | 'green')
    A primary-ish color.

Point : dict
    x : int
    y : int
";
        let ids = c.load_extension_text(text, Some("ext.txt")).unwrap();
        assert_eq!(ids.len(), 2);
        let color = c.ty(c.get_provisional("Color").unwrap());
        assert_eq!(color.kind(), Kind::Extension);
        assert_eq!(color.doc.as_deref(), Some("A primary-ish color."));
        assert_eq!(color.meta.get("source").map(String::as_str), Some("ext.txt"));
        let point = c.ty(c.get_provisional("Point").unwrap());
        assert_eq!(point.kind(), Kind::Record);
        assert_eq!(point.fields().len(), 2);
    }

    #[test]
    fn equivalence_is_structural_for_anonymous_types() {
        let mut c = TypeCatalog::new();
        let a = c.parse_type("list(int)").unwrap();
        let b = c.parse_type("array(integer)").unwrap();
        let d = c.parse_type("list(str)").unwrap();
        assert!(c.equivalent(a, b));
        assert!(!c.equivalent(a, d));
        let x = c.alloc(Type::record("Shape"));
        let y = c.alloc(Type::record("Shape").with_doc("other"));
        assert!(c.equivalent(x, y));
    }

    #[test]
    fn field_sites_count_in_equivalence() {
        let mut c = TypeCatalog::new();
        let int = c.parse_type("int").unwrap();
        let mut p = Params::new();
        p.insert("optional", Literal::Boolean(true));
        let mut r1 = Type::compound("record").unwrap();
        r1.push_field(TypeRef::named("n", int)).unwrap();
        let mut r2 = Type::compound("record").unwrap();
        r2.push_field(TypeRef::named("n", int).with_params(p)).unwrap();
        let (a, b) = (c.alloc(r1.clone()), c.alloc(r2));
        assert!(!c.equivalent(a, b));
        let a2 = c.alloc(r1);
        assert!(c.equivalent(a, a2));
    }

    #[test]
    fn join_docs_skips_blanks() {
        assert_eq!(join_docs([None, Some("a".into()), Some("  ".into()), Some("b".into())]).as_deref(), Some("a\n\nb"));
        assert_eq!(join_docs([None, None]), None);
    }
}
