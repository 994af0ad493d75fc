use std::collections::HashMap;
use std::io;
use std::ops::Index;

/// Key under which a top-level array is stored, since the parse result is
/// always an object.
pub const ROOT_KEY: &str = "root";

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Object(HashMap<String, JsonValue>),
    Array(Vec<JsonValue>),
    String(String),
    /// Literal number lexeme, never coerced.
    Number(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read json source: {0}")]
    IoFailure(#[from] io::Error),

    #[error("illegal json format: {0}")]
    IllegalFormat(String),

    /// A defect in the tokenizer/batcher collaboration, not bad input.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

impl JsonError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        JsonError::IllegalFormat(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        JsonError::InternalInvariantViolation(msg.into())
    }

    /// True when the error signals a bug rather than malformed input or a
    /// failing source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JsonError::InternalInvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, JsonError>;

impl JsonValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number exactly as written in the source.
    pub fn as_number(&self) -> Option<&str> {
        match self {
            JsonValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, JsonValue>> {
        match self {
            JsonValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Decodes the escape sequences of a string value. String leaves keep
    /// their raw lexeme, so this is done on demand.
    pub fn unescaped(&self) -> Option<Result<String>> {
        self.as_str().map(decode_escapes)
    }
}

/// Decodes JSON escape sequences (`\n`, `\"`, `\uXXXX`, surrogate pairs).
pub fn decode_escapes(src: &str) -> Result<String> {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hi = read_hex4(&mut chars)?;
                let cp = if (0xD800..0xDC00).contains(&hi) {
                    // high surrogate, a `\uDC00..\uDFFF` must follow
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(JsonError::format("unpaired surrogate in escape"));
                    }
                    let lo = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&lo) {
                        return Err(JsonError::format("unpaired surrogate in escape"));
                    }
                    0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00)
                } else {
                    hi
                };
                out.push(
                    char::from_u32(cp)
                        .ok_or_else(|| JsonError::format(format!("invalid code point {cp:#x}")))?,
                );
            }
            Some(other) => {
                return Err(JsonError::format(format!("invalid escape '\\{other}'")));
            }
            None => return Err(JsonError::format("dangling backslash")),
        }
    }
    Ok(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Result<u32> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 {
        return Err(JsonError::format("truncated \\u escape"));
    }
    u32::from_str_radix(&hex, 16)
        .map_err(|_| JsonError::format(format!("invalid \\u escape '{hex}'")))
}

/// Addresses one child of a container: `&str` for an object member,
/// `usize` for an array element.
pub trait JsonIndex {
    fn lookup(self, container: &JsonValue) -> Option<&JsonValue>;
}

impl JsonIndex for &str {
    fn lookup(self, container: &JsonValue) -> Option<&JsonValue> {
        container.as_object()?.get(self)
    }
}

impl JsonIndex for usize {
    fn lookup(self, container: &JsonValue) -> Option<&JsonValue> {
        container.as_array()?.get(self)
    }
}

impl JsonValue {
    /// `None` when `self` is the wrong kind of container or the member is
    /// absent.
    pub fn get(&self, at: impl JsonIndex) -> Option<&JsonValue> {
        at.lookup(self)
    }
}

/// Panics when the member is missing, like map and slice indexing.
impl Index<&str> for JsonValue {
    type Output = JsonValue;

    fn index(&self, key: &str) -> &JsonValue {
        match self.get(key) {
            Some(v) => v,
            None => panic!("no member \"{key}\" in json value"),
        }
    }
}

impl Index<usize> for JsonValue {
    type Output = JsonValue;

    fn index(&self, i: usize) -> &JsonValue {
        match self.get(i) {
            Some(v) => v,
            None => panic!("no element {i} in json value"),
        }
    }
}
