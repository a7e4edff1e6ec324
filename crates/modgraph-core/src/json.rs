use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Object,
    Array,
}

impl JsonKind {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(n) if n.is_f64() => JsonKind::Float,
            Value::Number(_) => JsonKind::Integer,
            Value::String(_) => JsonKind::String,
            Value::Object(_) => JsonKind::Object,
            Value::Array(_) => JsonKind::Array,
        }
    }

    pub fn is_number(self) -> bool {
        matches!(self, JsonKind::Integer | JsonKind::Float)
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "boolean",
            JsonKind::Integer => "integer",
            JsonKind::Float => "float",
            JsonKind::String => "string",
            JsonKind::Object => "object",
            JsonKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// Parses content JSON, tolerating a UTF-8 byte order mark.
pub fn parse_bytes(data: &[u8]) -> serde_json::Result<Value> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    serde_json::from_slice(data)
}

/// Appends `key` to a JSON pointer, escaping `~` and `/` (RFC 6901).
pub fn child_pointer(parent: &str, key: &str) -> String {
    let escaped = key.replace('~', "~0").replace('/', "~1");
    if parent == "/" {
        format!("/{}", escaped)
    } else {
        format!("{}/{}", parent, escaped)
    }
}
