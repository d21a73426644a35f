//! Merge engine: one canonical definition per name out of every pending
//! declaration of it.
//!
//! Per name the steps are
//! 1. base check over declarations that say anything,
//! 2. documentation merge (common suffix, remainders demoted to the sites),
//! 3. field union with conflict checks and, across channels, access flags,
//! 4. installation under a canonical id, with every other site forwarded.
pub mod docs;

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::catalog::{join_docs, Declaration, TypeCatalog};
use crate::channel::Channel;
use crate::deref;
use crate::error::{Error, Result};
use crate::model::{Base, Literal, Meta, Node, Type, TypeId, TypeRef};
use crate::render;

pub(crate) fn merge_pending(catalog: &mut TypeCatalog) -> Result<()> {
    let pending = std::mem::take(&mut catalog.pending);
    for (name, decls) in pending {
        merge_name(catalog, &name, decls)?;
    }
    deref::resolve_catalog(catalog)
}

struct Merged {
    ty: Type,
    /// Doc each site keeps for itself once the canonical doc is factored out.
    site_docs: HashMap<TypeId, String>,
}

fn is_ref_only(ty: &Type) -> bool { ty.doc.is_none() && !ty.has_content() }

fn merge_name(catalog: &mut TypeCatalog, name: &str, decls: Vec<Declaration>) -> Result<()> {
    let staged: HashSet<TypeId> = decls.iter().map(|d| d.id).collect();
    let canonical = catalog.canonical.get(name).copied();
    let existing = canonical.or_else(|| catalog.provisional.get(name).copied());

    let mut sites = decls;
    if let Some(ex) = existing {
        if !staged.contains(&ex) && !is_ref_only(catalog.ty(ex)) {
            sites.insert(0, Declaration { id: ex, channel: Channel::Unscoped });
        }
    }

    let full: Vec<Declaration> = sites.iter().copied().filter(|d| !is_ref_only(catalog.ty(d.id))).collect();
    let bases: BTreeSet<String> = full.iter().map(|d| catalog.ty(d.id).base.to_string()).collect();
    if bases.len() > 1 {
        return Err(Error::BaseMismatch { name: name.to_string(), bases });
    }
    let base = full.first().or(sites.first()).map(|d| catalog.ty(d.id).base).unwrap_or(Base::Record);
    debug!(name, sites = sites.len(), full = full.len(), %base, "merging type");

    let merged = if full.is_empty() {
        None
    } else if base == Base::Extension {
        Some(merge_extension(catalog, name, &full)?)
    } else {
        Some(merge_record(catalog, name, &full)?)
    };

    let target = match existing {
        Some(ex) if canonical.is_some() || !staged.contains(&ex) => Some(ex),
        _ => None,
    };
    let (cid, mut site_docs) = match (target, merged) {
        (Some(t), Some(mut m)) => {
            // the definition is not forwarded anywhere, so its remainder stays on it
            if let Some(own) = m.site_docs.remove(&t) {
                m.ty.doc = join_docs([Some(own), m.ty.doc.take()]);
            }
            *catalog.ty_mut(t) = m.ty;
            (t, m.site_docs)
        }
        (Some(t), None) => (t, HashMap::new()),
        (None, Some(m)) => (catalog.alloc(m.ty), m.site_docs),
        (None, None) => {
            let shell = if base == Base::Extension { Type::extension(name, None) } else { Type::record(name) };
            (catalog.alloc(shell), HashMap::new())
        }
    };

    catalog.provisional.remove(name);
    catalog.canonical.insert(name.to_string(), cid);
    for site in &sites {
        catalog.forward_to(site.id, cid, site_docs.remove(&site.id));
    }
    debug!(name, id = %cid, "canonical type installed");
    Ok(())
}

// ------------------------------ documentation ----------------------------- //

/// Canonical doc plus per-site remainders.
///
/// With two or more content-bearing declarations the canonical doc is the
/// shared trailing text; otherwise the first doc wins (content first) and
/// every differing doc stays on its own site.
fn merge_docs(catalog: &TypeCatalog, full: &[Declaration], content: usize) -> (Option<String>, HashMap<TypeId, String>) {
    let mut written: Vec<(TypeId, bool, &str)> = full
        .iter()
        .filter_map(|d| {
            let ty = catalog.ty(d.id);
            ty.doc.as_deref().map(|doc| (d.id, ty.has_content(), doc))
        })
        .collect();
    let mut site_docs = HashMap::new();

    if content >= 2 && written.len() >= 2 {
        let suffix = docs::common_suffix(written.iter().map(|(_, _, d)| *d));
        for (id, _, doc) in &written {
            if let Some(rest) = docs::remainder(doc, &suffix) {
                site_docs.insert(*id, rest);
            }
        }
        let doc = if suffix.trim().is_empty() { None } else { Some(suffix) };
        return (doc, site_docs);
    }

    written.sort_by_key(|(_, has_content, _)| !has_content);
    let Some((_, _, chosen)) = written.first().copied() else { return (None, site_docs) };
    for (id, _, doc) in &written[1..] {
        if *doc != chosen {
            site_docs.insert(*id, doc.to_string());
        }
    }
    (Some(chosen.to_string()), site_docs)
}

fn merge_meta(catalog: &TypeCatalog, full: &[Declaration]) -> Meta {
    let mut meta = Meta::new();
    for d in full {
        for (k, v) in &catalog.ty(d.id).meta {
            meta.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    meta
}

// --------------------------------- records -------------------------------- //

fn merge_record(catalog: &TypeCatalog, name: &str, full: &[Declaration]) -> Result<Merged> {
    let content: Vec<Declaration> = full.iter().copied().filter(|d| catalog.ty(d.id).has_content()).collect();
    let channels: BTreeSet<Channel> = content.iter().map(|d| d.channel).collect();
    let (doc, site_docs) = merge_docs(catalog, full, content.len());

    let mut candidates: IndexMap<String, Vec<(Channel, &TypeRef)>> = IndexMap::new();
    for d in &content {
        for f in catalog.ty(d.id).fields() {
            let field = f.name.clone().unwrap_or_default();
            candidates.entry(field).or_default().push((d.channel, f));
        }
    }
    let explicit = |key: &str| candidates.values().flatten().any(|(_, f)| f.params.contains(key));
    let access = Access {
        channels: &channels,
        explicit_create: explicit(Channel::Create.as_str()),
        explicit_write: explicit(Channel::Write.as_str()),
    };

    let mut fields = Vec::with_capacity(candidates.len());
    for (field, cands) in &candidates {
        let mut winner = cands[0].1.clone();
        for (_, other) in &cands[1..] {
            reconcile(catalog, name, field, &mut winner, other)?;
        }
        if channels.len() > 1 {
            access.synthesize(&mut winner, cands);
        }
        fields.push(winner);
    }
    fields.sort_by(|a, b| a.name.cmp(&b.name));

    let mut ty = Type::record(name);
    ty.set_fields(fields)?;
    ty.doc = doc;
    ty.meta = merge_meta(catalog, full);
    Ok(Merged { ty, site_docs })
}

fn reconcile(catalog: &TypeCatalog, name: &str, field: &str, winner: &mut TypeRef, other: &TypeRef) -> Result<()> {
    let conflict = |left: String, right: String| Error::FieldConflict {
        type_name: name.to_string(),
        field: field.to_string(),
        left,
        right,
    };
    if !catalog.equivalent(winner.ty, other.ty) {
        return Err(conflict(render::render_type(catalog, winner.ty), render::render_type(catalog, other.ty)));
    }
    if let (Some(a), Some(b)) = (&winner.doc, &other.doc) {
        if a != b {
            return Err(conflict(format!("{a:?}"), format!("{b:?}")));
        }
    }
    if winner.doc.is_none() {
        winner.doc = other.doc.clone();
    }
    if winner.params.is_empty() {
        winner.params = other.params.clone();
    } else if !other.params.is_empty() && winner.params != other.params {
        return Err(conflict(render::render_params(&winner.params), render::render_params(&other.params)));
    }
    Ok(())
}

struct Access<'a> {
    /// Channels that declared the type with content.
    channels: &'a BTreeSet<Channel>,
    explicit_create: bool,
    explicit_write: bool,
}

impl Access<'_> {
    /// Derive `create`/`read`/`write` from which channels mention the field.
    fn synthesize(&self, field: &mut TypeRef, cands: &[(Channel, &TypeRef)]) {
        let flagged = cands.iter().any(|(_, f)| Channel::ACCESS.iter().any(|ch| f.params.contains(ch.as_str())));
        let present: BTreeSet<Channel> = cands.iter().map(|(ch, _)| *ch).collect();
        if flagged || present.contains(&Channel::Unscoped) || present == *self.channels {
            return;
        }
        let has = |ch| present.contains(&ch);
        let create = has(Channel::Create) || (has(Channel::Write) && !self.explicit_create);
        let write = has(Channel::Write) || (has(Channel::Create) && !self.explicit_write);
        let read = has(Channel::Read);
        for (ch, on) in [(Channel::Create, create), (Channel::Read, read), (Channel::Write, write)] {
            if on || self.channels.contains(&ch) {
                field.params.insert(ch.as_str(), Literal::Boolean(on));
            }
        }
    }
}

// -------------------------------- extensions ------------------------------ //

fn merge_extension(catalog: &TypeCatalog, name: &str, full: &[Declaration]) -> Result<Merged> {
    let content: Vec<Declaration> = full.iter().copied().filter(|d| catalog.ty(d.id).has_content()).collect();
    let (doc, site_docs) = merge_docs(catalog, full, content.len());

    let mut inner: Option<Node> = None;
    for d in &content {
        let Some(node) = catalog.ty(d.id).inner() else { continue };
        if let Some(first) = &inner {
            if !catalog.equivalent(first.id(), node.id()) {
                return Err(Error::FieldConflict {
                    type_name: name.to_string(),
                    field: "value".into(),
                    left: render::render_node(catalog, first),
                    right: render::render_node(catalog, node),
                });
            }
        } else {
            inner = Some(node.clone());
        }
    }

    let mut ty = Type::extension(name, inner);
    ty.doc = doc;
    ty.meta = merge_meta(catalog, full);
    Ok(Merged { ty, site_docs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(c: &mut TypeCatalog, text: &str, channel: Channel) -> Vec<Node> {
        c.parse_multi(text, channel).unwrap().into_iter().filter_map(|e| e.node).collect()
    }

    fn flags(c: &TypeCatalog, ty: TypeId, field: &str) -> Vec<(String, bool)> {
        let f = c.ty(ty).field(field).unwrap();
        f.params.iter().map(|(k, v)| (k.clone(), v.as_bool().unwrap())).collect()
    }

    #[test]
    fn asymmetric_fields_get_access_flags() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    f : int", Channel::Write);
        declare(&mut c, "item : Item\n    g : int", Channel::Create);
        c.merge_pending().unwrap();
        let item = c.get("Item").unwrap();
        let names: Vec<_> = c.ty(item).fields().iter().map(|f| f.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["f", "g"]);
        let both = vec![("create".to_string(), true), ("write".to_string(), true)];
        assert_eq!(flags(&c, item, "f"), both);
        assert_eq!(flags(&c, item, "g"), both);
    }

    #[test]
    fn explicit_create_blocks_write_implication() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    f : int\n    k : int, create: false", Channel::Write);
        declare(&mut c, "item : Item\n    g : int\n    k : int, create: false", Channel::Read);
        c.merge_pending().unwrap();
        let item = c.get("Item").unwrap();
        assert_eq!(flags(&c, item, "f"), vec![("read".to_string(), false), ("write".to_string(), true)]);
        assert_eq!(flags(&c, item, "g"), vec![("read".to_string(), true), ("write".to_string(), false)]);
        assert_eq!(flags(&c, item, "k"), vec![("create".to_string(), false)]);
    }

    #[test]
    fn fields_in_every_channel_stay_unflagged() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    id : int\n    f : str", Channel::Read);
        declare(&mut c, "item : Item\n    id : int", Channel::Write);
        c.merge_pending().unwrap();
        let item = c.get("Item").unwrap();
        assert!(c.ty(item).field("id").unwrap().params.is_empty());
        assert_eq!(flags(&c, item, "f"), vec![("read".to_string(), true), ("write".to_string(), false)]);
    }

    #[test]
    fn single_channel_keeps_fields_verbatim() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "a : Item\n    x : int\n    y : str, optional", Channel::Read);
        declare(&mut c, "b : Item", Channel::Write);
        c.merge_pending().unwrap();
        let item = c.ty(c.get("Item").unwrap());
        assert!(item.field("x").unwrap().params.is_empty());
        assert_eq!(item.field("y").unwrap().params.len(), 1);
    }

    #[test]
    fn conflicting_field_types_name_both() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    x : int", Channel::Read);
        declare(&mut c, "item : Item\n    x : str", Channel::Write);
        let err = c.merge_pending().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::FieldConflict { .. }));
        assert!(msg.contains("integer") && msg.contains("string"), "{msg}");
    }

    #[test]
    fn conflicting_field_docs_and_params() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    x : int\n        One.", Channel::Read);
        declare(&mut c, "item : Item\n    x : int\n        Two.", Channel::Write);
        assert!(matches!(c.merge_pending(), Err(Error::FieldConflict { .. })));

        let mut c = TypeCatalog::new();
        declare(&mut c, "item : Item\n    x : int, min: 1", Channel::Read);
        declare(&mut c, "item : Item\n    x : int, min: 2", Channel::Write);
        assert!(matches!(c.merge_pending(), Err(Error::FieldConflict { .. })));
    }

    #[test]
    fn base_mismatch_lists_bases() {
        let mut c = TypeCatalog::new();
        declare(&mut c, "t : dict\n    x : Thing\n        y : int", Channel::Read);
        c.load_extension_text("Thing : int\n    An extension.", None).unwrap();
        let err = c.merge_pending().unwrap_err();
        let Error::BaseMismatch { name, bases } = err else { panic!("expected base mismatch") };
        assert_eq!(name, "Thing");
        assert_eq!(bases.into_iter().collect::<Vec<_>>(), vec!["extension", "record"]);
    }

    #[test]
    fn shared_doc_suffix_becomes_canonical() {
        let mut c = TypeCatalog::new();
        let a = declare(&mut c, "a : Item\n    A\n    B\n    C\n\n    x : int", Channel::Read);
        let b = declare(&mut c, "b : Item\n    X\n    B\n    C\n\n    y : int", Channel::Write);
        c.merge_pending().unwrap();
        let item = c.get("Item").unwrap();
        assert_eq!(c.ty(item).doc.as_deref(), Some("B\nC"));

        let (mut a, mut b) = (a[0].clone(), b[0].clone());
        c.dereference(&mut a).unwrap();
        c.dereference(&mut b).unwrap();
        assert_eq!((a.id(), b.id()), (item, item));
        assert_eq!(a.as_type_ref().unwrap().doc.as_deref(), Some("A"));
        assert_eq!(b.as_type_ref().unwrap().doc.as_deref(), Some("X"));
    }

    #[test]
    fn existing_definition_keeps_its_own_doc() {
        let mut c = TypeCatalog::new();
        c.load_extension_text("Pet : record\n    A pet.\n\n    name : str", None).unwrap();
        let read = declare(&mut c, "pet : Pet\n    Read pet.\n\n    name : str", Channel::Read);
        let written = declare(&mut c, "pet : Pet\n    Written pet.\n\n    name : str", Channel::Write);
        c.merge_pending().unwrap();
        let pet = c.get("Pet").unwrap();
        assert_eq!(c.ty(pet).doc.as_deref(), Some("A pet."));

        let (mut read, mut written) = (read[0].clone(), written[0].clone());
        c.dereference(&mut read).unwrap();
        c.dereference(&mut written).unwrap();
        assert_eq!(read.as_type_ref().unwrap().doc.as_deref(), Some("Read pet."));
        assert_eq!(written.as_type_ref().unwrap().doc.as_deref(), Some("Written pet."));
    }

    #[test]
    fn extensions_merge_their_child() {
        let mut c = TypeCatalog::new();
        c.load_extension_text("Color : ('r' | 'g')", None).unwrap();
        declare(&mut c, "fg : Color\nbg : Color, optional", Channel::Read);
        c.merge_pending().unwrap();
        let color = c.ty(c.get("Color").unwrap());
        assert!(color.inner().is_some());
        assert_eq!(c.get_provisional("Color"), None);
    }
}
