//! Grammar check over a complete token sequence.
//!
//! One forward pass with a bracket stack and the type of the previous token.
//! The only mutation is the STRING → KEY rewrite of the current position,
//! so indices stay valid for the whole scan.

use log::debug;

use crate::json_tok::{Token, TokenType};
use crate::json_types::{JsonError, Result};

use TokenType::*;

const SCALAR_END: [TokenType; 7] = [String, Number, Null, True, False, EndArray, EndObject];

#[inline]
fn one_of(prev: TokenType, allowed: &[TokenType]) -> bool {
    allowed.contains(&prev)
}

fn reject(idx: usize, tok: TokenType, prev: TokenType) -> JsonError {
    JsonError::format(format!("{tok} token cannot follow {prev} (token {idx})"))
}

/// Validates `tokens` against the JSON grammar and rewrites every STRING
/// that is immediately followed by a COLON into a KEY.
///
/// Running it again over an already rewritten sequence changes nothing.
pub fn validate_and_rewrite(tokens: &mut [Token]) -> Result<()> {
    let mut stack: Vec<TokenType> = Vec::new();
    let mut prev = Sof;
    let mut keys = 0usize;
    let last = tokens.len().saturating_sub(1);

    match tokens.first().map(|t| t.kind) {
        Some(Sof) => {}
        Some(other) => {
            return Err(JsonError::format(format!(
                "token sequence must begin with SOF, found {other}"
            )))
        }
        None => return Err(JsonError::format("empty token sequence")),
    }

    for i in 1..tokens.len() {
        let next_is_colon = tokens.get(i + 1).map(|t| t.kind) == Some(Colon);
        let kind = tokens[i].kind;
        let top = stack.last().copied();
        // after a comma the container decides what may come next
        let in_array_slot = prev == Comma && top == Some(StartArray);
        let value_slot = prev == Colon || prev == StartArray || in_array_slot;

        match kind {
            BatchSplit => {
                return Err(JsonError::internal(format!(
                    "batch split token reached validation at {i}"
                )))
            }
            Sof => {
                return Err(JsonError::format(format!(
                    "SOF token can only be the first token, found at {i}"
                )))
            }
            Eof => {
                if i != last {
                    return Err(JsonError::format(format!(
                        "EOF token can only be the last token, found at {i}"
                    )));
                }
                if !one_of(prev, &[EndObject, EndArray]) {
                    return Err(reject(i, kind, prev));
                }
                if !stack.is_empty() {
                    return Err(JsonError::format(format!(
                        "{} unclosed bracket(s) at end of input",
                        stack.len()
                    )));
                }
            }
            StartObject | StartArray => {
                if !(prev == Sof || value_slot) {
                    return Err(reject(i, kind, prev));
                }
                stack.push(kind);
            }
            EndObject => {
                if stack.pop() != Some(StartObject) {
                    return Err(JsonError::format(format!(
                        "END_OBJECT token at {i} does not match a START_OBJECT token"
                    )));
                }
                if !(prev == StartObject || one_of(prev, &SCALAR_END)) {
                    return Err(reject(i, kind, prev));
                }
            }
            EndArray => {
                if stack.pop() != Some(StartArray) {
                    return Err(JsonError::format(format!(
                        "END_ARRAY token at {i} does not match a START_ARRAY token"
                    )));
                }
                if !(prev == StartArray || one_of(prev, &SCALAR_END)) {
                    return Err(reject(i, kind, prev));
                }
            }
            String if next_is_colon => {
                tokens[i].retag(Key);
                keys += 1;
                check_key(i, prev, top)?;
            }
            Key => check_key(i, prev, top)?,
            String | Number | True | False | Null => {
                if !value_slot {
                    return Err(reject(i, kind, prev));
                }
            }
            Colon => {
                // `prev` is already the rewritten KEY
                if prev != Key {
                    return Err(reject(i, kind, prev));
                }
            }
            Comma => {
                if top.is_none() || !one_of(prev, &SCALAR_END) {
                    return Err(reject(i, kind, prev));
                }
            }
        }
        prev = tokens[i].kind;
    }

    if prev != Eof {
        return Err(JsonError::format("token sequence must end with EOF"));
    }
    debug!("validated {} tokens, rewrote {keys} keys", tokens.len());
    Ok(())
}

fn check_key(i: usize, prev: TokenType, top: Option<TokenType>) -> Result<()> {
    let after_opener = prev == StartObject;
    let after_member = prev == Comma && top == Some(StartObject);
    if after_opener || after_member {
        Ok(())
    } else {
        Err(reject(i, Key, prev))
    }
}

/*-------------------------------------------------------------
 * Tests
 *-----------------------------------------------------------*/
