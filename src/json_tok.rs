//! `json_tok` – window tokenizer whose unfinished lexemes survive the batch
//! boundary.
//
//  A window is tokenized in one go. When a string, number or keyword is cut
//  off by the end of the window it is emitted as `BatchSplit` carrying the raw
//  partial text; the batcher removes it and prepends it to the next window.

use std::borrow::Cow;
use std::fmt;

use memchr::memchr2;
use strsim::damerau_levenshtein;

use crate::json_types::{JsonError, Result};

const KEYWORDS: [&str; 3] = ["true", "false", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    Key,
    String,
    Number,
    True,
    False,
    Null,
    Colon,
    Comma,
    Sof,
    Eof,
    /// A lexeme cut by the end of a window; never part of a finished sequence.
    BatchSplit,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::StartObject => "START_OBJECT",
            TokenType::EndObject => "END_OBJECT",
            TokenType::StartArray => "START_ARRAY",
            TokenType::EndArray => "END_ARRAY",
            TokenType::Key => "KEY",
            TokenType::String => "STRING",
            TokenType::Number => "NUMBER",
            TokenType::True => "TRUE",
            TokenType::False => "FALSE",
            TokenType::Null => "NULL",
            TokenType::Colon => "COLON",
            TokenType::Comma => "COMMA",
            TokenType::Sof => "SOF",
            TokenType::Eof => "EOF",
            TokenType::BatchSplit => "BATCH_SPLIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    /// String contents (escapes kept raw), number/keyword text, or the
    /// punctuation itself. Empty for `Sof`/`Eof`.
    pub lexeme: Cow<'static, str>,
}

impl Token {
    pub fn new(kind: TokenType, lexeme: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
        }
    }

    pub const fn fixed(kind: TokenType, lexeme: &'static str) -> Self {
        Self {
            kind,
            lexeme: Cow::Borrowed(lexeme),
        }
    }

    pub const fn sof() -> Self {
        Self::fixed(TokenType::Sof, "")
    }

    pub const fn eof() -> Self {
        Self::fixed(TokenType::Eof, "")
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// Re-tags the token, keeping its lexeme.
    pub(crate) fn retag(&mut self, kind: TokenType) {
        self.kind = kind;
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type: {}, value: {}", self.kind, self.lexeme)
    }
}

#[inline]
fn keyword(text: &str) -> Option<Token> {
    match text {
        "true" => Some(Token::fixed(TokenType::True, "true")),
        "false" => Some(Token::fixed(TokenType::False, "false")),
        "null" => Some(Token::fixed(TokenType::Null, "null")),
        _ => None,
    }
}

#[inline]
fn is_number_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

#[inline]
fn ends_keyword(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b']' | b'}' | b',')
}

/// Checks a complete number lexeme against the JSON number grammar:
/// `-? (0 | [1-9][0-9]*) (\.[0-9]+)? ([eE][+-]?[0-9]+)?`
pub fn is_valid_number(text: &str) -> bool {
    let b = text.as_bytes();
    let mut i = 0;
    let digits = |i: &mut usize| {
        let start = *i;
        while *i < b.len() && b[*i].is_ascii_digit() {
            *i += 1;
        }
        *i - start
    };

    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    match b.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            digits(&mut i);
        }
        _ => return false,
    }
    if b.get(i) == Some(&b'.') {
        i += 1;
        if digits(&mut i) == 0 {
            return false;
        }
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(b.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if digits(&mut i) == 0 {
            return false;
        }
    }
    i == b.len()
}

/// Tokenizes one text window, appending to the running sequence.
///
/// A non-final window may end in the middle of a lexeme; that lexeme is
/// deferred as `BatchSplit`. The final window (the leftover of the last
/// split, once the source is exhausted) must resolve everything.
#[derive(Debug)]
pub struct Tokenizer<'w> {
    src: &'w str,
    pos: usize,
    last_window: bool,
}

impl<'w> Tokenizer<'w> {
    pub fn new(src: &'w str) -> Self {
        Self {
            src,
            pos: 0,
            last_window: false,
        }
    }

    /// Tokenizer for text after which no more input will follow.
    pub fn last(src: &'w str) -> Self {
        Self {
            last_window: true,
            ..Self::new(src)
        }
    }

    pub fn run(mut self, out: &mut Vec<Token>) -> Result<()> {
        let src = self.src;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            let tok = match b {
                b'{' => self.single(TokenType::StartObject, "{"),
                b'}' => self.single(TokenType::EndObject, "}"),
                b'[' => self.single(TokenType::StartArray, "["),
                b']' => self.single(TokenType::EndArray, "]"),
                b':' => self.single(TokenType::Colon, ":"),
                b',' => self.single(TokenType::Comma, ","),
                b'"' => self.read_string()?,
                b't' | b'f' | b'n' => self.read_keyword()?,
                b'0'..=b'9' | b'-' => self.read_number()?,
                b if b.is_ascii_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                _ => {
                    let c = self.src[self.pos..].chars().next().unwrap_or('\u{FFFD}');
                    return Err(JsonError::format(format!(
                        "invalid character {c:?} in buffer"
                    )));
                }
            };
            out.push(tok);
        }
        Ok(())
    }

    #[inline]
    fn single(&mut self, kind: TokenType, lexeme: &'static str) -> Token {
        self.pos += 1;
        Token::fixed(kind, lexeme)
    }

    fn split(&self, start: usize) -> Token {
        debug_assert!(!self.last_window);
        Token::new(TokenType::BatchSplit, self.src[start..self.pos].to_owned())
    }

    fn read_string(&mut self) -> Result<Token> {
        let quote = self.pos;
        let src = self.src;
        let bytes = src.as_bytes();
        self.pos += 1;

        while let Some(off) = memchr2(b'"', b'\\', &bytes[self.pos..]) {
            let at = self.pos + off;
            if bytes[at] == b'"' {
                self.pos = at + 1;
                return Ok(Token::new(
                    TokenType::String,
                    self.src[quote + 1..at].to_owned(),
                ));
            }
            // backslash: the next character is literal
            if at + 1 >= bytes.len() {
                self.pos = bytes.len();
                return self.unterminated(quote);
            }
            self.pos = at + 2;
        }

        self.pos = bytes.len();
        self.unterminated(quote)
    }

    fn unterminated(&self, quote: usize) -> Result<Token> {
        if self.last_window {
            return Err(JsonError::format("unterminated string at end of input"));
        }
        Ok(self.split(quote))
    }

    fn read_keyword(&mut self) -> Result<Token> {
        let start = self.pos;
        let src = self.src;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() && !ends_keyword(bytes[self.pos]) {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        let at_edge = self.pos == bytes.len();

        if at_edge && !self.last_window && KEYWORDS.iter().any(|k| k.starts_with(text)) {
            // `tru`, or even `true`, may still grow in the next window
            return Ok(self.split(start));
        }
        keyword(text).ok_or_else(|| malformed_keyword(text))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let src = self.src;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() && is_number_byte(bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos == bytes.len() && !self.last_window {
            return Ok(self.split(start));
        }
        let text = &self.src[start..self.pos];
        if !is_valid_number(text) {
            return Err(JsonError::format(format!("malformed number '{text}'")));
        }
        Ok(Token::new(TokenType::Number, text.to_owned()))
    }
}

fn malformed_keyword(text: &str) -> JsonError {
    let shown: String = text.chars().take(16).collect();
    let hint = KEYWORDS
        .iter()
        .map(|k| (damerau_levenshtein(k, text), *k))
        .filter(|(d, _)| *d <= 2)
        .min();
    match hint {
        Some((_, k)) => JsonError::format(format!(
            "cannot tokenize invalid keyword '{shown}', did you mean '{k}'?"
        )),
        None => JsonError::format(format!("cannot tokenize invalid keyword '{shown}'")),
    }
}

/*-------------------------------------------------------------
 * Tests
 *-----------------------------------------------------------*/
