//! Attribute-block parser: indented `name : spec` documentation blocks into
//! trees of types.
//!
//! [`Entries`] is lazy. Each step consumes top-level lines until it can yield
//! one declaration together with the prose that preceded it. Bodies of
//! declarations are parsed recursively as nested blocks.

use std::vec;

use crate::catalog::{join_docs, TypeCatalog};
use crate::channel::{self, Channel};
use crate::error::{Error, Result};
use crate::grammar::{self, Keyword, SymbolKind, TypeParser};
use crate::lines::{self, Line};
use crate::model::{self, Kind, Node, Type, TypeId, TypeRef};

/// One yielded item: the documentation that preceded a declaration, and the
/// declaration itself (`None` for prose at the end of a block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub doc: Option<String>,
    pub node: Option<Node>,
}

pub struct BlockParser<'c> {
    catalog: &'c mut TypeCatalog,
    channel: Option<Channel>,
    eager: bool,
}

impl<'c> BlockParser<'c> {
    /// Parser that stages every yielded declaration under `channel`.
    pub fn new(catalog: &'c mut TypeCatalog, channel: Channel) -> Self {
        Self { catalog, channel: Some(channel), eager: false }
    }

    /// Parser that stages nothing.
    pub fn detached(catalog: &'c mut TypeCatalog) -> Self {
        Self { catalog, channel: None, eager: false }
    }

    /// Treat a lone type name between blank lines as a declaration of that type.
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn entries(self, text: &str) -> Entries<'c> {
        Entries {
            catalog: self.catalog,
            channel: self.channel,
            eager: self.eager,
            lines: lines::split(text).into_iter(),
            prose: Vec::new(),
            done: false,
        }
    }

    /// At most one declaration; all surrounding prose becomes its doc.
    pub fn parse(self, text: &str) -> Result<Entry> {
        let mut docs = Vec::new();
        let mut node = None;
        for entry in self.entries(text) {
            let entry = entry?;
            docs.push(entry.doc);
            if let Some(n) = entry.node {
                if node.is_some() {
                    return Err(Error::invalid_spec(text, 0, "expected at most one declaration"));
                }
                node = Some(n);
            }
        }
        Ok(Entry { doc: join_docs(docs), node })
    }

    pub fn parse_multi(self, text: &str) -> Result<Vec<Entry>> { self.entries(text).collect() }
}

pub struct Entries<'c> {
    catalog: &'c mut TypeCatalog,
    channel: Option<Channel>,
    eager: bool,
    lines: vec::IntoIter<Line>,
    prose: Vec<String>,
    done: bool,
}

impl<'c> Iterator for Entries<'c> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(line) = self.lines.next() {
            if line.is_blank() {
                if !self.prose.is_empty() {
                    self.prose.push(String::new());
                }
                continue;
            }
            let parsed = match &line.decl {
                Some((name, spec)) => self.declaration(name, spec, &line.body),
                None if self.is_standalone(&line) => self.standalone(&line.text, &line.body),
                None => {
                    self.push_prose(line);
                    continue;
                }
            };
            let doc = self.take_doc();
            return Some(match parsed {
                Ok(node) => Ok(Entry { doc, node: Some(self.finish(node)) }),
                Err(e) => {
                    self.done = true;
                    Err(e)
                }
            });
        }
        self.done = true;
        let doc = self.take_doc()?;
        Some(Ok(Entry { doc: Some(doc), node: None }))
    }
}

impl<'c> Entries<'c> {
    fn nested<'n>(catalog: &'n mut TypeCatalog, body: &[String], eager: bool) -> Entries<'n> {
        Entries {
            catalog,
            channel: None,
            eager,
            lines: lines::split_lines(body).into_iter(),
            prose: Vec::new(),
            done: false,
        }
    }

    fn finish(&mut self, node: Node) -> Node {
        match self.channel {
            Some(ch) => channel::stage(self.catalog, node, ch),
            None => node,
        }
    }

    fn push_prose(&mut self, line: Line) {
        self.prose.push(line.text);
        for b in line.body {
            self.prose.push(if b.is_empty() { b } else { format!("    {b}") });
        }
    }

    fn take_doc(&mut self) -> Option<String> {
        let doc = doc_of(&self.prose);
        self.prose.clear();
        doc
    }

    fn is_standalone(&self, line: &Line) -> bool {
        if !(self.eager && line.blank_before && line.blank_after && grammar::is_symbol(&line.text)) {
            return false;
        }
        let name = self.catalog.resolve_alias(&line.text);
        !matches!(
            self.catalog.classify_symbol(name),
            SymbolKind::Unknown | SymbolKind::Keyword(Keyword::Null | Keyword::True | Keyword::False)
        )
    }

    fn declaration(&mut self, name: &str, spec: &str, body: &[String]) -> Result<Node> {
        if spec.trim().is_empty() {
            let line = format!("{name} :");
            return Err(Error::invalid_spec(&line, line.len(), format!("missing type for {name:?}")));
        }
        let (id, params) = TypeParser::new(self.catalog).parse_declaration(spec)?;
        let mut site = TypeRef::named(name, id).with_params(params);
        site.doc = self.attach_body(id, body)?;
        Ok(Node::Ref(site))
    }

    fn standalone(&mut self, text: &str, body: &[String]) -> Result<Node> {
        let id = TypeParser::new(self.catalog).parse_type(text)?;
        Ok(match self.attach_body(id, body)? {
            Some(doc) => Node::Ref(TypeRef::new(id).with_doc(doc)),
            None => Node::Type(id),
        })
    }

    /// Feed a declaration body into the type it declares. Returns the doc
    /// left for the declaring site.
    fn attach_body(&mut self, id: TypeId, body: &[String]) -> Result<Option<String>> {
        if body.is_empty() {
            return Ok(None);
        }
        let ty = self.catalog.ty(id);
        let kind = ty.kind();
        if kind == Kind::List {
            if let Some(inner) = ty.inner().map(Node::id) {
                if self.catalog.ty(inner).supports_children() {
                    return self.attach_body(inner, body);
                }
                return Ok(doc_of(body));
            }
        } else if !ty.is_record_like() {
            return Ok(doc_of(body));
        }
        let record_like = ty.is_record_like();
        let fresh_named = kind == Kind::Record && ty.doc.is_none() && !ty.has_content();

        let entries = Entries::nested(self.catalog, body, !record_like).collect::<Result<Vec<_>>>()?;
        let mut lead = None;
        let mut tail = None;
        let mut children = Vec::new();
        for entry in entries {
            match entry.node {
                None => tail = entry.doc,
                Some(node) if children.is_empty() => {
                    lead = entry.doc;
                    children.push(node);
                }
                Some(mut node) => {
                    if let Node::Ref(r) = &mut node {
                        r.doc = join_docs([entry.doc, r.doc.take()]);
                    }
                    children.push(node);
                }
            }
        }
        let doc = join_docs([lead, tail]);

        if record_like {
            let fields = named_fields(&self.catalog.ty(id).name, children)?;
            let ty = self.catalog.ty_mut(id);
            for f in fields {
                ty.push_field(f)?;
            }
        } else if !children.is_empty() {
            let inner = match children.as_slice() {
                [Node::Type(t)] => Node::Type(*t),
                [Node::Ref(r)] if r.name.is_none() => Node::Ref(r.clone()),
                _ => {
                    let mut rec = Type::compound(model::RECORD)?;
                    rec.set_fields(named_fields(model::RECORD, children)?)?;
                    Node::Type(self.catalog.alloc(rec))
                }
            };
            self.catalog.ty_mut(id).set_inner(inner)?;
        }

        if fresh_named && doc.is_some() {
            self.catalog.ty_mut(id).doc = doc;
            return Ok(None);
        }
        Ok(doc)
    }
}

fn named_fields(owner: &str, children: Vec<Node>) -> Result<Vec<TypeRef>> {
    children
        .into_iter()
        .map(|node| match node {
            Node::Ref(r) if r.name.is_some() => Ok(r),
            _ => Err(Error::structure(format!("body of {owner:?} may only declare named fields"))),
        })
        .collect()
}

/// Join lines into a doc, dropping blank lines at either end.
fn doc_of(lines: &[String]) -> Option<String> {
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    let end = lines.iter().rposition(|l| !l.trim().is_empty())?;
    Some(lines[start..=end].join("\n"))
}
