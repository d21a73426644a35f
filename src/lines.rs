//! Line classification for attribute blocks.
//!
//! A block is split into top-level lines. Each non-blank line owns the more
//! indented lines that follow it (its body), dedented to their own margin.
//!
//! A declaration needs whitespace on both sides of the colon (`name : spec`,
//! or a bare `name :`). `Note: see below` and `ratio :int` are prose.

use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>[^\s:]+)\s+:(?:\s+(?P<spec>.*?))?\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// The line itself, without indentation.
    pub text: String,
    /// `name : spec` split, when the line is a declaration.
    pub decl: Option<(String, String)>,
    pub body: Vec<String>,
    /// Previous top-level line is blank, or this is the first line.
    pub blank_before: bool,
    /// Next top-level line is blank, or the block ends here.
    pub blank_after: bool,
}

impl Line {
    pub fn is_blank(&self) -> bool { self.text.is_empty() }
}

fn indent(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

fn is_blank(line: &str) -> bool { line.trim().is_empty() }

/// Strip the common margin of the non-blank lines; blank lines become empty.
pub fn dedent<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let margin = lines.iter().map(AsRef::as_ref).filter(|l| !is_blank(l)).map(indent).min().unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            let l = l.as_ref();
            if is_blank(l) {
                return String::new();
            }
            let mut width = 0;
            let cut = l
                .char_indices()
                .find(|(_, c)| {
                    if width >= margin || !c.is_whitespace() {
                        return true;
                    }
                    width += if *c == '\t' { 4 } else { 1 };
                    false
                })
                .map(|(i, _)| i)
                .unwrap_or(l.len());
            l[cut..].trim_end().to_string()
        })
        .collect()
}

pub fn classify(text: &str) -> Option<(String, String)> {
    let caps = DECLARATION.captures(text)?;
    let name = caps.name("name")?.as_str().to_string();
    let spec = caps.name("spec").map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((name, spec))
}

pub fn split(text: &str) -> Vec<Line> {
    let raw: Vec<&str> = text.lines().collect();
    split_lines(&dedent(&raw))
}

/// Split already-dedented lines.
pub fn split_lines(lines: &[String]) -> Vec<Line> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if is_blank(line) {
            out.push(Line {
                text: String::new(),
                decl: None,
                body: Vec::new(),
                blank_before: true,
                blank_after: true,
            });
            i += 1;
            continue;
        }
        let own = indent(line);
        let mut last = i;
        let mut j = i + 1;
        while j < lines.len() {
            if is_blank(&lines[j]) {
                j += 1;
                continue;
            }
            if indent(&lines[j]) <= own {
                break;
            }
            last = j;
            j += 1;
        }
        let trimmed = line.trim().to_string();
        out.push(Line {
            decl: classify(&trimmed),
            text: trimmed,
            body: dedent(&lines[i + 1..=last]),
            blank_before: i == 0 || is_blank(&lines[i - 1]),
            blank_after: last + 1 >= lines.len() || is_blank(&lines[last + 1]),
        });
        i = last + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_and_prose() {
        assert_eq!(classify("name : str, optional"), Some(("name".into(), "str, optional".into())));
        assert_eq!(classify("name :"), Some(("name".into(), "".into())));
        assert_eq!(classify("Returns the name."), None);
        assert_eq!(classify("ratio: 3"), None);
        assert_eq!(classify("ratio :int"), None);
        assert_eq!(classify("ratio\t:\tint"), Some(("ratio".into(), "int".into())));
    }

    #[test]
    fn bodies_keep_inner_blank_lines() {
        let text = "\
owner : Person
    The owner.

    name : str

next : int
";
        let lines = split(text);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].body, vec!["The owner.", "", "name : str"]);
        assert!(lines[0].blank_before && lines[0].blank_after);
        assert!(lines[1].is_blank());
        assert_eq!(lines[2].decl.as_ref().map(|d| d.0.as_str()), Some("next"));
    }

    #[test]
    fn common_margin_is_removed() {
        let lines = split("    a : int\n      b\n    c : str");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].body, vec!["b"]);
        assert!(!lines[0].blank_after);
        assert!(!lines[1].blank_before);
    }
}
