//! Line-wise common-suffix reduction over documentation strings.

/// Longest run of trailing lines shared by every doc, leading blank lines
/// trimmed.
pub fn common_suffix<'a, I: IntoIterator<Item = &'a str>>(docs: I) -> String {
    let mut docs = docs.into_iter();
    let Some(first) = docs.next() else { return String::new() };
    let mut acc: Vec<&str> = first.lines().collect();
    for doc in docs {
        let lines: Vec<&str> = doc.lines().collect();
        let shared = acc.iter().rev().zip(lines.iter().rev()).take_while(|(a, b)| a.trim_end() == b.trim_end()).count();
        acc.drain(..acc.len() - shared);
    }
    let start = acc.iter().position(|l| !l.trim().is_empty()).unwrap_or(acc.len());
    acc[start..].join("\n")
}

/// What `doc` says beyond `suffix`, if anything.
pub fn remainder(doc: &str, suffix: &str) -> Option<String> {
    let rest = if suffix.is_empty() {
        doc
    } else {
        let lines: Vec<&str> = doc.lines().collect();
        let tail = suffix.lines().count();
        if lines.len() < tail || lines[lines.len() - tail..].join("\n").trim_end() != suffix.trim_end() {
            // not a literal suffix, keep everything on the site
            doc
        } else {
            return non_blank(lines[..lines.len() - tail].join("\n"));
        }
    };
    non_blank(rest.to_string())
}

fn non_blank(s: String) -> Option<String> {
    let s = s.trim_end().to_string();
    if s.trim().is_empty() { None } else { Some(s) }
}
