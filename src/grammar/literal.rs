//! Constant sub-grammar: hex runs, strict JSON literals, and a lenient
//! YAML-flow-like fallback (single quotes, bare words, `{k: v}`).
//!
//! A literal is usually followed by more grammar (`42, optional`), so every
//! entry point consumes only the literal and leaves the cursor on the tail.

use indexmap::IndexMap;
use serde_json::Value;

use crate::alias::AliasTable;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::model::Literal;

/// Characters that end a bare word.
const BARE_STOP: &[char] = &[',', ']', '}', ')', '|', '&', '\n'];

/// Parse a constant at the cursor, or return `None` (cursor untouched) when
/// the next character cannot start one. `marker` starts a trailing comment
/// and ends any bare word it appears in.
pub fn parse_constant(aliases: &AliasTable, marker: &str, cur: &mut Cursor<'_>) -> Result<Option<Literal>> {
    let rest = cur.rest();
    let Some(first) = rest.chars().next() else { return Ok(None) };

    if rest.starts_with("0x") || rest.starts_with("0X") {
        return parse_hex(cur).map(Some);
    }
    if first.is_ascii_digit() || first == '-' {
        return match strict_prefix(rest) {
            Some((v, n)) => {
                cur.advance(n);
                Ok(Some(Literal::from_json(v)))
            }
            None => Err(Error::invalid_spec(cur.text(), cur.pos(), "malformed numeric literal")),
        };
    }
    if matches!(first, '"' | '\'' | '{' | '[') {
        if let Some((v, n)) = strict_prefix(rest) {
            cur.advance(n);
            return Ok(Some(Literal::from_json(v)));
        }
        return lenient_value(aliases, marker, cur).map(Some);
    }
    Ok(None)
}

/// Qualifier values: any constant, or a bare word.
pub fn parse_value(aliases: &AliasTable, marker: &str, cur: &mut Cursor<'_>) -> Result<Literal> {
    if let Some(lit) = parse_constant(aliases, marker, cur)? {
        return Ok(lit);
    }
    lenient_value(aliases, marker, cur)
}

fn parse_hex(cur: &mut Cursor<'_>) -> Result<Literal> {
    let start = cur.pos();
    let digits: String = cur.rest()[2..].chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    match Literal::from_hex(&digits) {
        Some(lit) => {
            cur.advance(2 + digits.len());
            Ok(lit)
        }
        None => Err(Error::invalid_spec(cur.text(), start, "hex literal needs an even number of digits")),
    }
}

// ------------------------------- Strict ---------------------------------- //

/// Strict JSON parse of the longest valid prefix.
///
/// When the whole input is not a literal but serde_json reports trailing
/// characters at column N, the first N-1 bytes are parsed on their own and the
/// rest is left to the caller.
fn strict_prefix(text: &str) -> Option<(Value, usize)> {
    match serde_json::from_str::<Value>(text) {
        Ok(v) => Some((v, text.len())),
        Err(e) if e.line() == 1 && e.to_string().starts_with("trailing characters") => {
            let cut = e.column().checked_sub(1)?;
            let head = text.get(..cut)?;
            let v = serde_json::from_str::<Value>(head).ok()?;
            Some((v, cut))
        }
        Err(_) => None,
    }
}

// ------------------------------- Lenient --------------------------------- //

fn lenient_value(aliases: &AliasTable, marker: &str, cur: &mut Cursor<'_>) -> Result<Literal> {
    cur.skip_ws();
    match cur.peek() {
        Some('"') | Some('\'') => quoted(cur).map(Literal::String),
        Some('[') => lenient_list(aliases, marker, cur),
        Some('{') => lenient_record(aliases, marker, cur),
        _ => {
            let start = cur.pos();
            let word = bare(cur, BARE_STOP, marker);
            if word.is_empty() {
                return Err(Error::invalid_spec(cur.text(), start, "expected a literal value"));
            }
            Ok(resolve_word(aliases, word))
        }
    }
}

fn lenient_list(aliases: &AliasTable, marker: &str, cur: &mut Cursor<'_>) -> Result<Literal> {
    cur.read(); // '['
    let mut items = Vec::new();
    loop {
        if cur.eat(']') { break; }
        items.push(lenient_value(aliases, marker, cur)?);
        if cur.eat(',') { continue; }
        if cur.eat(']') { break; }
        return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ',' or ']' in list literal"));
    }
    Ok(Literal::List(items))
}

fn lenient_record(aliases: &AliasTable, marker: &str, cur: &mut Cursor<'_>) -> Result<Literal> {
    cur.read(); // '{'
    let mut map = IndexMap::new();
    loop {
        if cur.eat('}') { break; }
        cur.skip_ws();
        let key_at = cur.pos();
        let key = match cur.peek() {
            Some('"') | Some('\'') => quoted(cur)?,
            _ => bare(cur, &[':', ',', '}', '\n'], marker).to_string(),
        };
        if key.is_empty() {
            return Err(Error::invalid_spec(cur.text(), key_at, "expected a key in record literal"));
        }
        if !cur.eat(':') {
            return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ':' after record key"));
        }
        let value = lenient_value(aliases, marker, cur)?;
        map.insert(key, value);
        if cur.eat(',') { continue; }
        if cur.eat('}') { break; }
        return Err(Error::invalid_spec(cur.text(), cur.pos(), "expected ',' or '}' in record literal"));
    }
    Ok(Literal::Record(map))
}

/// Single- or double-quoted string. Double quotes take JSON escapes, single
/// quotes escape themselves by doubling (`'it''s'`).
fn quoted(cur: &mut Cursor<'_>) -> Result<String> {
    let start = cur.pos();
    let Some(q) = cur.read() else {
        return Err(Error::invalid_spec(cur.text(), start, "expected a quoted string"));
    };
    let mut out = String::new();
    loop {
        match cur.read() {
            None => return Err(Error::invalid_spec(cur.text(), start, "unterminated string literal")),
            Some(c) if c == q => {
                if q == '\'' && cur.peek() == Some('\'') {
                    cur.read();
                    out.push('\'');
                    continue;
                }
                return Ok(out);
            }
            Some('\\') if q == '"' => match cur.read() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(c) => out.push(c),
                None => return Err(Error::invalid_spec(cur.text(), start, "unterminated string literal")),
            },
            Some(c) => out.push(c),
        }
    }
}

fn bare<'a>(cur: &mut Cursor<'a>, stop: &[char], marker: &str) -> &'a str {
    let rest = cur.rest();
    let mut len = rest.find(|c: char| stop.contains(&c)).unwrap_or(rest.len());
    if let Some(at) = rest[..len].find(marker).filter(|_| !marker.is_empty()) {
        len = at;
    }
    let word = rest[..len].trim_end();
    cur.advance(word.len());
    word
}

/// Bare words: alias-spelled `null`/`true`/`false`, hex, numbers, else text.
fn resolve_word(aliases: &AliasTable, word: &str) -> Literal {
    match aliases.resolve_word(word) {
        "null" => return Literal::Null,
        "true" => return Literal::Boolean(true),
        "false" => return Literal::Boolean(false),
        _ => {}
    }
    if let Some(hex) = word.strip_prefix("0x").and_then(Literal::from_hex) {
        return hex;
    }
    match serde_json::from_str::<Value>(word) {
        Ok(v @ Value::Number(_)) => Literal::from_json(v),
        _ => Literal::String(word.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordered_float::OrderedFloat;

    fn constant(text: &str) -> (Option<Literal>, String) {
        let aliases = AliasTable::builtin();
        let mut cur = Cursor::new(text);
        let lit = parse_constant(&aliases, "#", &mut cur).unwrap();
        (lit, cur.rest().to_string())
    }

    #[test]
    fn number_yields_back_qualifier_tail() {
        assert_eq!(constant("42, optional"), (Some(Literal::Integer(42)), ", optional".into()));
        assert_eq!(constant("-1.5 | 3"), (Some(Literal::Number(OrderedFloat(-1.5))), "| 3".into()));
    }

    #[test]
    fn hex_runs() {
        assert_eq!(constant("0xff)"), (Some(Literal::Byte(0xff)), ")".into()));
        assert_eq!(constant("0x0102"), (Some(Literal::Bytes(vec![1, 2])), "".into()));
        let aliases = AliasTable::builtin();
        assert!(parse_constant(&aliases, "#", &mut Cursor::new("0xabc")).is_err());
    }

    #[test]
    fn strict_then_lenient_strings() {
        assert_eq!(constant(r#""m" | "f""#), (Some(Literal::String("m".into())), "| \"f\"".into()));
        assert_eq!(constant("'f'|'o')"), (Some(Literal::String("f".into())), "|'o')".into()));
        assert_eq!(constant("'it''s'"), (Some(Literal::String("it's".into())), "".into()));
    }

    #[test]
    fn lenient_structures_resolve_bare_words() {
        let (lit, rest) = constant("{a: yes, b: [1, two, 0x01]}, optional");
        let Some(Literal::Record(m)) = lit else { panic!("expected record") };
        assert_eq!(m["a"], Literal::Boolean(true));
        assert_eq!(m["b"], Literal::List(vec![
            Literal::Integer(1),
            Literal::String("two".into()),
            Literal::Byte(1),
        ]));
        assert_eq!(rest, ", optional");
    }

    #[test]
    fn strict_list_stops_at_bracket() {
        let (lit, rest) = constant("[1, 2], max: 3");
        assert_eq!(lit, Some(Literal::List(vec![Literal::Integer(1), Literal::Integer(2)])));
        assert_eq!(rest, ", max: 3");
    }

    #[test]
    fn symbols_are_not_constants() {
        assert_eq!(constant("int"), (None, "int".into()));
    }

    #[test]
    fn bare_values_for_qualifiers() {
        let aliases = AliasTable::builtin();
        let mut cur = Cursor::new("hello world, optional");
        assert_eq!(parse_value(&aliases, "#", &mut cur).unwrap(), Literal::String("hello world".into()));
        assert_eq!(cur.rest(), ", optional");
        let mut cur = Cursor::new("None");
        assert_eq!(parse_value(&aliases, "#", &mut cur).unwrap(), Literal::Null);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let aliases = AliasTable::builtin();
        let err = parse_constant(&aliases, "#", &mut Cursor::new("'abc")).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification { .. }));
    }
}
