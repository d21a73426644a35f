use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::Value;

/// Payload of a `constant` type, and the value side of a qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(String),
    Byte(u8),
    Bytes(Vec<u8>),
    List(Vec<Literal>),
    Record(IndexMap<String, Literal>),
}

impl Literal {
    /// Kind name; doubles as the `name` of a constant type holding it.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Number(_) => "number",
            Literal::String(_) => "string",
            Literal::Byte(_) => "byte",
            Literal::Bytes(_) => "bytes",
            Literal::List(_) => "list",
            Literal::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Decode a `0x`-prefixed, even-length hex run.
    pub fn from_hex(digits: &str) -> Option<Literal> {
        if digits.is_empty() || digits.len() % 2 != 0 { return None; }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) { return None; }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .ok()?;
        if bytes.len() == 1 { Some(Literal::Byte(bytes[0])) } else { Some(Literal::Bytes(bytes)) }
    }

    pub fn from_json(v: Value) -> Literal {
        match v {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Integer(i),
                None => Literal::Number(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Literal::String(s),
            Value::Array(xs) => Literal::List(xs.into_iter().map(Literal::from_json).collect()),
            Value::Object(m) => Literal::Record(
                m.into_iter().map(|(k, v)| (k, Literal::from_json(v))).collect()
            ),
        }
    }

    /// JSON view for the catalog dump. Bytes become `0x…` strings.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::from(*b),
            Literal::Integer(i) => Value::from(*i),
            Literal::Number(f) => Value::from(f.0),
            Literal::String(s) => Value::from(s.clone()),
            Literal::Byte(_) | Literal::Bytes(_) => Value::from(self.to_string()),
            Literal::List(xs) => Value::Array(xs.iter().map(Literal::to_json).collect()),
            Literal::Record(m) => Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
            ),
        }
    }
}

/// Renders in type-spec syntax, so the output parses back to the same literal.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Number(n) => write!(f, "{}", Value::from(n.0)),
            Literal::String(s) => write!(f, "{}", Value::from(s.as_str())),
            Literal::Byte(b) => write!(f, "0x{b:02x}"),
            Literal::Bytes(bs) => {
                write!(f, "0x")?;
                for b in bs { write!(f, "{b:02x}")?; }
                Ok(())
            }
            Literal::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Literal::Record(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}: {v}", Value::from(k.as_str()))?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_width_picks_byte_or_bytes() {
        assert_eq!(Literal::from_hex("ff"), Some(Literal::Byte(0xff)));
        assert_eq!(Literal::from_hex("0a0b"), Some(Literal::Bytes(vec![0x0a, 0x0b])));
        assert_eq!(Literal::from_hex("abc"), None);
        assert_eq!(Literal::from_hex("zz"), None);
    }

    #[test]
    fn json_integers_stay_integers() {
        let lit = Literal::from_json(json!({"a": 1, "b": 1.5, "c": [true, null]}));
        let Literal::Record(m) = &lit else { panic!("expected record") };
        assert_eq!(m["a"], Literal::Integer(1));
        assert_eq!(m["b"], Literal::Number(OrderedFloat(1.5)));
        assert_eq!(lit.to_json(), json!({"a": 1, "b": 1.5, "c": [true, null]}));
    }

    #[test]
    fn display_is_spec_syntax() {
        let lit = Literal::List(vec![
            Literal::String("a \"b\"".into()),
            Literal::Number(OrderedFloat(2.0)),
            Literal::Bytes(vec![1, 2]),
        ]);
        assert_eq!(lit.to_string(), r#"["a \"b\"", 2.0, 0x0102]"#);
    }
}
