//! Declaring channels and staging of parsed trees into the pending merge set.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::catalog::{Declaration, TypeCatalog};
use crate::model::{Node, TypeId, TypeRef};

/// The context a declaration was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Create,
    Read,
    Write,
    Unscoped,
}

impl Channel {
    /// Channels that carry an access qualifier, in emission order.
    pub const ACCESS: [Channel; 3] = [Channel::Create, Channel::Read, Channel::Write];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Create => "create",
            Channel::Read => "read",
            Channel::Write => "write",
            Channel::Unscoped => "unscoped",
        }
    }

    /// Qualifier key set on fields declared under this channel.
    pub fn access_key(self) -> Option<&'static str> {
        match self {
            Channel::Unscoped => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Channel::Create),
            "read" => Ok(Channel::Read),
            "write" => Ok(Channel::Write),
            "unscoped" | "none" => Ok(Channel::Unscoped),
            other => Err(format!("unknown channel {other:?} (expected create, read, write or unscoped)")),
        }
    }
}

/// Stage every named type in `node` under `channel`, depth-first.
///
/// A bare named record is first wrapped in an unnamed `TypeRef` so every
/// staged root has a site that can carry a demoted doc.
pub(crate) fn stage(catalog: &mut TypeCatalog, node: Node, channel: Channel) -> Node {
    let node = match node {
        Node::Type(id) if catalog.ty(id).is_named() => Node::Ref(TypeRef::new(id)),
        other => other,
    };
    let mut found = Vec::new();
    collect_named(catalog, node.id(), &mut HashSet::new(), &mut found);
    for id in found {
        let name = catalog.ty(id).name.clone();
        catalog.stage(&name, Declaration { id, channel });
    }
    node
}

fn collect_named(catalog: &TypeCatalog, id: TypeId, seen: &mut HashSet<TypeId>, out: &mut Vec<TypeId>) {
    if !seen.insert(id) {
        return;
    }
    let ty = catalog.ty(id);
    if ty.is_named() {
        out.push(id);
    }
    for child in ty.child_ids() {
        collect_named(catalog, child, seen, out);
    }
}
