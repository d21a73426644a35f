//! Alternate spellings for canonical names (`int` → `integer`, `dict` → `record`).
//!
//! A spelling resolves to exactly one canonical name. Re-adding an identical
//! alias is a no-op; anything that would make resolution ambiguous fails.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Spellings every catalog starts with.
const BUILTIN: &[(&str, &[&str])] = &[
    ("integer", &["int", "long"]),
    ("number", &["num", "float", "double", "real", "decimal"]),
    ("string", &["str", "text"]),
    ("boolean", &["bool"]),
    ("bytes", &["binary", "blob"]),
    ("record", &["dict", "object", "map", "hash"]),
    ("list", &["array", "seq", "sequence"]),
    ("reference", &["ref"]),
    ("oneof", &["enum", "choice"]),
    ("null", &["nil", "None", "Null", "NULL"]),
    ("true", &["True", "TRUE"]),
    ("false", &["False", "FALSE"]),
];

/// Spellings honoured only inside literal values, so `no` or `on` stay free
/// as type names.
const WORDS: &[(&str, &[&str])] = &[
    ("null", &["none"]),
    ("true", &["yes", "Yes", "on"]),
    ("false", &["no", "No", "off"]),
];

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// canonical → spellings
    targets: IndexMap<String, BTreeSet<String>>,
    /// spelling → canonical
    lookup: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self { Self::default() }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (target, spellings) in BUILTIN {
            for s in *spellings {
                // seeds are disjoint by construction
                let _ = table.add(s, target);
            }
        }
        table
    }

    pub fn add(&mut self, source: &str, target: &str) -> Result<()> {
        let conflict = |reason: String| Error::AliasConflict { alias: source.to_string(), reason };

        if source.is_empty() || target.is_empty() {
            return Err(conflict("alias and target must be non-empty".into()));
        }
        if source == target {
            return Err(conflict("a name cannot alias itself".into()));
        }
        if let Some(existing) = self.lookup.get(source) {
            if existing == target { return Ok(()); }
            return Err(conflict(format!("already an alias of {existing:?}, cannot retarget to {target:?}")));
        }
        if self.targets.contains_key(source) {
            return Err(conflict("is a canonical name with aliases of its own".into()));
        }
        if let Some(existing) = self.lookup.get(target) {
            return Err(conflict(format!("target {target:?} is itself an alias of {existing:?}")));
        }

        self.lookup.insert(source.to_string(), target.to_string());
        self.targets.entry(target.to_string()).or_default().insert(source.to_string());
        Ok(())
    }

    /// Canonical name for `name`, or `name` itself when it is not an alias.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.target(name).unwrap_or(name)
    }

    /// Like [`resolve`](Self::resolve), plus the literal-only spellings.
    pub fn resolve_word<'a>(&'a self, word: &'a str) -> &'a str {
        if let Some(target) = self.target(word) {
            return target;
        }
        WORDS
            .iter()
            .find(|(_, spellings)| spellings.contains(&word))
            .map_or(word, |(target, _)| *target)
    }

    pub fn target(&self, name: &str) -> Option<&str> { self.lookup.get(name).map(String::as_str) }

    pub fn is_alias(&self, name: &str) -> bool { self.lookup.contains_key(name) }

    pub fn spellings(&self, canonical: &str) -> impl Iterator<Item = &str> {
        self.targets.get(canonical).into_iter().flatten().map(String::as_str)
    }
}
