use crate::variables::FrameRef;
use serde_json::{json, Value};

/// Primitive values handed to the project serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    /// Interned selector / tag such as `doForever` or `setVar:to:`.
    Symbol(String),
    /// Names and specs (variable names, custom block specs).
    Utf8(String),
    /// Plain string literals.
    String(String),
    Integer(i64),
    Float(f64),
    Nil,
    Frame(FrameRef),
    Array(Vec<Wire>),
}

impl Wire {
    pub fn symbol(text: &str) -> Self {
        Wire::Symbol(text.to_string())
    }

    pub fn utf8(text: &str) -> Self {
        Wire::Utf8(text.to_string())
    }

    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Wire::Integer(value as i64)
        } else {
            Wire::Float(value)
        }
    }

    pub fn as_array(&self) -> Option<&[Wire]> {
        match self {
            Wire::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Wire::Symbol(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Wire::Symbol(text) => json!({ "symbol": text }),
            Wire::Utf8(text) | Wire::String(text) => Value::String(text.clone()),
            Wire::Integer(n) => json!(n),
            Wire::Float(n) => json!(n),
            Wire::Nil => Value::Null,
            Wire::Frame(frame) => json!({ "frame": frame.index() }),
            Wire::Array(items) => Value::Array(items.iter().map(Wire::to_json).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_become_integers() {
        assert_eq!(Wire::number(42.0), Wire::Integer(42));
        assert_eq!(Wire::number(-3.0), Wire::Integer(-3));
        assert_eq!(Wire::number(2.5), Wire::Float(2.5));
    }

    #[test]
    fn renders_json() {
        let wire = Wire::Array(vec![
            Wire::symbol("doRepeat"),
            Wire::Integer(10),
            Wire::Nil,
            Wire::String("hi".to_string()),
        ]);
        assert_eq!(
            wire.to_json(),
            json!([{ "symbol": "doRepeat" }, 10, null, "hi"])
        );
    }
}
