use std::collections::HashMap;

use log::debug;

use crate::json_tok::{Token, TokenType};
use crate::json_types::{JsonError, JsonValue, Result, ROOT_KEY};

/// Default limit on nested containers, counting the root.
pub const MAX_DEPTH: usize = 128;

/// What to do when an object repeats a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeys {
    /// The later value replaces the earlier one.
    #[default]
    LastWins,
    /// Fail with `IllegalFormat`.
    Reject,
}

/// Position in the token sequence, shared by every level of one parse.
///
/// Only ever handed down as `&mut`; a recursive call leaves it on its own
/// closing bracket so the caller's step moves past it.
#[derive(Debug)]
struct Cursor {
    pos: usize,
    depth: usize,
}

impl Cursor {
    fn at(pos: usize) -> Self {
        Self { pos, depth: 0 }
    }

    #[inline]
    fn step(&mut self) {
        self.pos += 1;
    }

    fn enter(&mut self, limit: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > limit {
            return Err(JsonError::format(format!(
                "nesting deeper than {limit} levels at token {}",
                self.pos
            )));
        }
        Ok(())
    }

    #[inline]
    fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Recursive-descent builder over a validated token sequence.
#[derive(Debug)]
pub struct Parser<'t> {
    tokens: &'t [Token],
    duplicates: DuplicateKeys,
    max_depth: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Parser {
            tokens,
            duplicates: DuplicateKeys::default(),
            max_depth: MAX_DEPTH,
        }
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeys) -> Self {
        self.duplicates = policy;
        self
    }

    /// Documents nested deeper than `depth` containers fail with
    /// `IllegalFormat` instead of exhausting the stack.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builds the value tree. The root is always an object; a top-level array
    /// is stored under [`ROOT_KEY`].
    pub fn parse(&self) -> Result<JsonValue> {
        if self.tokens.len() == 2 {
            return Ok(JsonValue::Object(HashMap::new()));
        }
        let root = match self.tokens.get(1).map(|t| t.kind) {
            Some(TokenType::StartObject) => self.parse_object(&mut Cursor::at(2))?,
            Some(TokenType::StartArray) => {
                let array = self.parse_array(&mut Cursor::at(2))?;
                let mut map = HashMap::with_capacity(1);
                map.insert(ROOT_KEY.to_string(), array);
                JsonValue::Object(map)
            }
            _ => {
                return Err(JsonError::format("document must start with { or ["));
            }
        };
        debug!("parsed {} tokens", self.tokens.len());
        Ok(root)
    }

    fn token(&self, cursor: &Cursor) -> Result<&'t Token> {
        self.tokens.get(cursor.pos).ok_or_else(|| {
            JsonError::internal(format!(
                "cursor {} ran past {} tokens",
                cursor.pos,
                self.tokens.len()
            ))
        })
    }

    fn parse_object(&self, cursor: &mut Cursor) -> Result<JsonValue> {
        cursor.enter(self.max_depth)?;
        let mut map = HashMap::new();
        let mut last_key: Option<&'t str> = None;
        loop {
            let token = self.token(cursor)?;
            let value = match token.kind {
                TokenType::Eof | TokenType::EndObject => {
                    cursor.leave();
                    return Ok(JsonValue::Object(map));
                }
                TokenType::Key => {
                    last_key = Some(token.lexeme());
                    None
                }
                TokenType::StartObject => {
                    cursor.step();
                    Some(self.parse_object(cursor)?)
                }
                TokenType::StartArray => {
                    cursor.step();
                    Some(self.parse_array(cursor)?)
                }
                TokenType::Colon | TokenType::Comma => None,
                TokenType::String
                | TokenType::Number
                | TokenType::True
                | TokenType::False
                | TokenType::Null => Some(scalar(token)?),
                TokenType::EndArray | TokenType::Sof | TokenType::BatchSplit => {
                    return Err(unexpected(token, cursor));
                }
            };
            if let Some(value) = value {
                let key = last_key.take().ok_or_else(|| {
                    JsonError::internal(format!("value without a key at {}", cursor.pos))
                })?;
                self.insert(&mut map, key, value)?;
            }
            cursor.step();
        }
    }

    fn parse_array(&self, cursor: &mut Cursor) -> Result<JsonValue> {
        cursor.enter(self.max_depth)?;
        let mut list = Vec::new();
        loop {
            let token = self.token(cursor)?;
            match token.kind {
                TokenType::Eof | TokenType::EndArray => {
                    cursor.leave();
                    return Ok(JsonValue::Array(list));
                }
                TokenType::StartObject => {
                    cursor.step();
                    list.push(self.parse_object(cursor)?);
                }
                TokenType::StartArray => {
                    cursor.step();
                    list.push(self.parse_array(cursor)?);
                }
                TokenType::Comma => {}
                TokenType::String
                | TokenType::Number
                | TokenType::True
                | TokenType::False
                | TokenType::Null => list.push(scalar(token)?),
                TokenType::EndObject
                | TokenType::Key
                | TokenType::Colon
                | TokenType::Sof
                | TokenType::BatchSplit => return Err(unexpected(token, cursor)),
            }
            cursor.step();
        }
    }

    fn insert(
        &self,
        map: &mut HashMap<String, JsonValue>,
        key: &str,
        value: JsonValue,
    ) -> Result<()> {
        let previous = map.insert(key.to_owned(), value);
        if previous.is_some() && self.duplicates == DuplicateKeys::Reject {
            return Err(JsonError::format(format!("duplicate key \"{key}\"")));
        }
        Ok(())
    }
}

fn scalar(token: &Token) -> Result<JsonValue> {
    Ok(match token.kind {
        TokenType::String => JsonValue::String(token.lexeme().to_owned()),
        TokenType::Number => JsonValue::Number(token.lexeme().to_owned()),
        TokenType::True => JsonValue::Boolean(true),
        TokenType::False => JsonValue::Boolean(false),
        TokenType::Null => JsonValue::Null,
        other => return Err(JsonError::internal(format!("{other} is not a scalar"))),
    })
}

fn unexpected(token: &Token, cursor: &Cursor) -> JsonError {
    match token.kind {
        TokenType::BatchSplit => {
            JsonError::internal(format!("batch split token reached the parser at {}", cursor.pos))
        }
        kind => JsonError::format(format!("unexpected {kind} token at {}", cursor.pos)),
    }
}

/// Parses a validated token sequence with the default duplicate-key policy.
pub fn parse(tokens: &[Token]) -> Result<JsonValue> {
    Parser::new(tokens).parse()
}

/*-------------------------------------------------------------
 * Tests
 *-----------------------------------------------------------*/
