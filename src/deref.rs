//! Dereferencer: rebind retired ids and resolve `unknown` forward references.
//!
//! Walks are depth-first with a visited set, so a second pass is a no-op and
//! a cycle through named types terminates.

use std::collections::HashSet;

use tracing::trace;

use crate::catalog::{join_docs, TypeCatalog};
use crate::error::{Error, Result};
use crate::model::{Base, Node, SlotMut, TypeId, TypeRef};

/// Resolve a caller-owned tree in place.
pub(crate) fn dereference(catalog: &mut TypeCatalog, node: &mut Node) -> Result<()> {
    let (id, site_doc) = resolve(catalog, node.id())?;
    let bare = matches!(node, Node::Type(_));
    match site_doc {
        Some(doc) if bare => *node = Node::Ref(TypeRef::new(id).with_doc(doc)),
        doc => apply(SlotMut::from_node(node), id, doc),
    }
    walk(catalog, id, &mut HashSet::new())
}

/// Resolve every canonical type, promoting provisional ones as they are reached.
pub(crate) fn resolve_catalog(catalog: &mut TypeCatalog) -> Result<()> {
    let mut roots: Vec<(String, TypeId)> = catalog.canonical.iter().map(|(k, v)| (k.clone(), *v)).collect();
    roots.sort();
    let mut seen = HashSet::new();
    for (_, id) in roots {
        walk(catalog, id, &mut seen)?;
    }
    Ok(())
}

fn walk(catalog: &mut TypeCatalog, id: TypeId, seen: &mut HashSet<TypeId>) -> Result<()> {
    if !seen.insert(id) {
        return Ok(());
    }
    let children = catalog.ty(id).child_ids();
    let mut resolved = Vec::with_capacity(children.len());
    for child in children {
        resolved.push(resolve(catalog, child)?);
    }
    for (slot, (target, doc)) in catalog.ty_mut(id).slots_mut().into_iter().zip(resolved.iter().cloned()) {
        apply(slot, target, doc);
    }
    for (target, _) in resolved {
        walk(catalog, target, seen)?;
    }
    Ok(())
}

/// Final id for `id`, plus the demoted doc of the first retired site passed.
fn resolve(catalog: &mut TypeCatalog, id: TypeId) -> Result<(TypeId, Option<String>)> {
    let mut site_doc = None;
    let mut cur = id;
    while let Some(rebind) = catalog.forward.get(&cur) {
        if site_doc.is_none() {
            site_doc = rebind.site_doc.clone();
        }
        cur = rebind.target;
    }
    let ty = catalog.ty(cur);
    let unknown = ty.base == Base::Unknown;
    // empty named nodes are references by name, just like unknown ones
    let shell = ty.is_named() && ty.doc.is_none() && !ty.has_content();
    // a provisional definition reached directly is in use too
    let provisional = ty.is_named() && catalog.provisional.get(&ty.name) == Some(&cur);
    if unknown || shell || provisional {
        let name = ty.name.clone();
        match catalog.lookup_promote(&name) {
            Some(target) if target != cur => {
                catalog.forward_to(cur, target, None);
                trace!(from = %cur, to = %target, name = %name, "resolved reference by name");
                cur = catalog.follow(target);
            }
            Some(_) => {}
            None if unknown => return Err(Error::UnresolvedReference(name)),
            None => {}
        }
    }
    Ok((cur, site_doc))
}

fn apply(slot: SlotMut<'_>, id: TypeId, site_doc: Option<String>) {
    match slot {
        SlotMut::Id(slot) => *slot = id,
        SlotMut::Ref(r) => {
            r.ty = id;
            if site_doc.is_some() {
                r.doc = join_docs([site_doc, r.doc.take()]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::model::{Kind, Type};

    #[test]
    fn unknown_names_resolve_after_registration() {
        let mut c = TypeCatalog::new();
        let mut node = Node::Type(c.parse_type("list(widget)").unwrap());
        assert!(matches!(c.dereference(&mut node), Err(Error::UnresolvedReference(n)) if n == "widget"));

        let widget = c.register_type(Type::record("widget")).unwrap();
        c.dereference(&mut node).unwrap();
        let list = c.ty(node.id());
        assert_eq!(list.inner().unwrap().id(), widget);
    }

    #[test]
    fn provisional_types_are_promoted_on_use() {
        let mut c = TypeCatalog::new();
        let gadget = c.register_provisional(Type::record("gadget").with_doc("A gadget.")).unwrap();
        let mut node = Node::Type(c.parse_type("ref(gadget)").unwrap());
        c.dereference(&mut node).unwrap();
        assert_eq!(c.ty(node.id()).inner().unwrap().id(), gadget);
        assert_eq!(c.get("gadget"), Some(gadget));
    }

    #[test]
    fn dereferencing_twice_changes_nothing() {
        let mut c = TypeCatalog::new();
        let entries = c.parse_multi("a : Item\n    Shared.\n\n    x : widget\nb : Item", Channel::Read).unwrap();
        c.register_type(Type::record("widget")).unwrap();
        c.merge_pending().unwrap();
        let mut once = entries[0].node.clone().unwrap();
        c.dereference(&mut once).unwrap();
        let mut twice = once.clone();
        c.dereference(&mut twice).unwrap();
        assert_eq!(once, twice);
        let item = c.ty(c.get("Item").unwrap());
        assert_eq!(item.kind(), Kind::Record);
        assert_eq!(c.ty(item.field("x").unwrap().ty).name, "widget");
        assert_eq!(c.ty(item.field("x").unwrap().ty).kind(), Kind::Record);
    }

    #[test]
    fn self_reference_terminates() {
        let mut c = TypeCatalog::new();
        c.parse_multi("node : Tree\n    children : list(Tree)", Channel::Read).unwrap();
        c.merge_pending().unwrap();
        let tree = c.get("Tree").unwrap();
        let children = c.ty(tree).field("children").unwrap().ty;
        assert_eq!(c.ty(children).inner().unwrap().id(), tree);
    }
}
