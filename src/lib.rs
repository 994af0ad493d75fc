//! Batched streaming JSON reader.
//!
//! A source is read in fixed-size batches and tokenized window by window
//! ([`tokenize`]), the complete token sequence is checked against the JSON
//! grammar while object keys are tagged ([`validate_and_rewrite`]), and the
//! validated tokens are turned into a [`JsonValue`] tree ([`parse`]).
//!
//! ```no_run
//! let reader = json_reader::JsonReader::new();
//! let value = reader.read_path("player.json")?;
//! println!("{:?}", value.get("position"));
//! # Ok::<(), json_reader::JsonError>(())
//! ```

use std::fs::File;
use std::path::Path;

use log::debug;

mod config;
mod json_batch;
mod json_tok;
mod json_types;
mod json_validator;
mod rd_json_parser;

pub use config::ReaderConfig;
pub use json_batch::{BatchPolicy, ByteSource, SizedReader, MAX_BATCH, MIB};
pub use json_tok::{Token, TokenType};
pub use json_types::{decode_escapes, JsonError, JsonIndex, JsonValue, Result, ROOT_KEY};
pub use json_validator::validate_and_rewrite;
pub use rd_json_parser::{parse, DuplicateKeys, Parser, MAX_DEPTH};

/// Tokenizes a byte source with the default batch policy, or with
/// `batch_size_override` when given (which must be positive).
pub fn tokenize<S: ByteSource>(source: S, batch_size_override: Option<i64>) -> Result<Vec<Token>> {
    json_batch::tokenize_with(source, batch_size_override, &BatchPolicy::default())
}

/// Tokenizes, validates and parses an in-memory document.
pub fn read_str(json: &str) -> Result<JsonValue> {
    JsonReader::new().read_str(json)
}

/// Runs the three stages with one configuration.
#[derive(Debug, Clone, Default)]
pub struct JsonReader {
    config: ReaderConfig,
}

impl JsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Fixes the batch size for later reads; zero or negative sizes fail
    /// with `InvalidConfiguration` and leave the reader unchanged.
    pub fn set_batch_size(&mut self, size: i64) -> Result<()> {
        self.config = self.config.clone().with_batch_size(size)?;
        Ok(())
    }

    pub fn tokenize<S: ByteSource>(&self, source: S) -> Result<Vec<Token>> {
        json_batch::tokenize_with(source, self.config.batch_override(), &self.config.policy)
    }

    /// Validates `tokens` in place and builds the value tree.
    pub fn parse(&self, tokens: &mut [Token]) -> Result<JsonValue> {
        validate_and_rewrite(tokens)?;
        Parser::new(tokens)
            .duplicate_keys(self.config.duplicate_keys)
            .max_depth(self.config.max_depth)
            .parse()
    }

    pub fn read<S: ByteSource>(&self, source: S) -> Result<JsonValue> {
        let mut tokens = self.tokenize(source)?;
        self.parse(&mut tokens)
    }

    pub fn read_str(&self, json: &str) -> Result<JsonValue> {
        self.read(json.as_bytes())
    }

    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<JsonValue> {
        let path = path.as_ref();
        debug!("reading {}", path.display());
        self.read(File::open(path)?)
    }
}

/*-------------------------------------------------------------
 * Tests
 *-----------------------------------------------------------*/
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use proptest::prelude::*;
    use serde_json::Value as SJson;
    use TokenType::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenType> {
        tokens.iter().map(|t| t.kind).collect()
    }

    /// Mirrors a serde_json value in this crate's model, keeping number
    /// text as serde prints it.
    fn to_internal(v: &SJson) -> JsonValue {
        match v {
            SJson::Null => JsonValue::Null,
            SJson::Bool(b) => JsonValue::Boolean(*b),
            SJson::Number(n) => JsonValue::Number(n.to_string()),
            SJson::String(s) => JsonValue::String(s.clone()),
            SJson::Array(a) => JsonValue::Array(a.iter().map(to_internal).collect()),
            SJson::Object(o) => JsonValue::Object(
                o.iter().map(|(k, v)| (k.clone(), to_internal(v))).collect(),
            ),
        }
    }

    fn root(v: &SJson) -> JsonValue {
        match v {
            SJson::Array(_) => {
                let mut map = HashMap::new();
                map.insert(ROOT_KEY.to_string(), to_internal(v));
                JsonValue::Object(map)
            }
            _ => to_internal(v),
        }
    }

    #[test]
    fn scenario_empty_object() {
        let mut tokens = tokenize("{}".as_bytes(), None).unwrap();
        assert_eq!(kinds(&tokens), vec![Sof, StartObject, EndObject, Eof]);
        validate_and_rewrite(&mut tokens).unwrap();
        assert_eq!(parse(&tokens).unwrap(), JsonValue::Object(HashMap::new()));
    }

    #[test]
    fn scenario_object_with_array() {
        let v = read_str(r#"{"x":1,"y":[true,null]}"#).unwrap();
        assert_eq!(v["x"], JsonValue::Number("1".into()));
        assert_eq!(
            v["y"],
            JsonValue::Array(vec![JsonValue::Boolean(true), JsonValue::Null])
        );
    }

    #[test]
    fn scenario_top_level_array() {
        let v = read_str("[1,2,3]").unwrap();
        let numbers: Vec<_> = v[ROOT_KEY]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n.as_number().unwrap())
            .collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
    }

    #[test]
    fn scenario_adjacent_strings() {
        assert!(matches!(
            read_str(r#"{"a": "b" "c"}"#),
            Err(JsonError::IllegalFormat(_))
        ));
    }

    #[test]
    fn scenario_string_closing_on_boundary() {
        let doc = r#"{"k":"abcdefgh"}"#;
        let close = doc.rfind('"').unwrap();
        let expected = tokenize(doc.as_bytes(), None).unwrap();
        // every batch size that puts a boundary somewhere inside the string,
        // including right after its closing quote
        for batch in 1..=(close + 1) as i64 {
            let tokens = tokenize(doc.as_bytes(), Some(batch)).unwrap();
            assert_eq!(tokens, expected, "batch size {batch}");
            assert_eq!(tokens[4], Token::new(String, "abcdefgh"));
        }
    }

    #[test]
    fn scenario_bad_batch_size() {
        for bad in [0, -5] {
            assert!(matches!(
                tokenize("{}".as_bytes(), Some(bad)),
                Err(JsonError::InvalidConfiguration(_))
            ));
            assert!(matches!(
                JsonReader::new().set_batch_size(bad),
                Err(JsonError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn player_document_tokens() {
        let doc = r#"{
            "position": {"x": 200, "y": 300},
            "map": "outside",
            "inventory": {"size": 9}
        }"#;
        let tokens = tokenize(doc.as_bytes(), Some(7)).unwrap();
        let expected = vec![
            Token::sof(),
            Token::fixed(StartObject, "{"),
            Token::new(String, "position"),
            Token::fixed(Colon, ":"),
            Token::fixed(StartObject, "{"),
            Token::new(String, "x"),
            Token::fixed(Colon, ":"),
            Token::new(Number, "200"),
            Token::fixed(Comma, ","),
            Token::new(String, "y"),
            Token::fixed(Colon, ":"),
            Token::new(Number, "300"),
            Token::fixed(EndObject, "}"),
            Token::fixed(Comma, ","),
            Token::new(String, "map"),
            Token::fixed(Colon, ":"),
            Token::new(String, "outside"),
            Token::fixed(Comma, ","),
            Token::new(String, "inventory"),
            Token::fixed(Colon, ":"),
            Token::fixed(StartObject, "{"),
            Token::new(String, "size"),
            Token::fixed(Colon, ":"),
            Token::new(Number, "9"),
            Token::fixed(EndObject, "}"),
            Token::fixed(EndObject, "}"),
            Token::eof(),
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "Al", "tags": ["a", "b"], "age": 30}}"#).unwrap();

        let mut reader = JsonReader::new();
        reader.set_batch_size(5).unwrap();
        let v = reader.read_path(file.path()).unwrap();
        assert_eq!(v["name"].as_str(), Some("Al"));
        assert_eq!(v["tags"][1].as_str(), Some("b"));
        assert_eq!(v["age"].as_number(), Some("30"));
    }

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonReader::new()
            .read_path(dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, JsonError::IoFailure(_)));
    }

    #[test]
    fn reader_applies_duplicate_policy() {
        let strict = JsonReader::with_config(
            ReaderConfig::new().with_duplicate_keys(DuplicateKeys::Reject),
        );
        assert!(strict.read_str(r#"{"a":1,"a":2}"#).is_err());
        assert_eq!(
            read_str(r#"{"a":1,"a":2}"#).unwrap()["a"],
            JsonValue::Number("2".into())
        );
    }

    #[test]
    fn deep_documents_fail_instead_of_overflowing() {
        let deep = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        assert!(matches!(read_str(&deep), Err(JsonError::IllegalFormat(_))));

        let shallow = JsonReader::with_config(ReaderConfig::new().with_max_depth(2));
        assert!(shallow.read_str(r#"{"a":[1]}"#).is_ok());
        assert!(shallow.read_str(r#"{"a":[[1]]}"#).is_err());
    }

    #[test]
    fn unbalanced_brackets_never_succeed() {
        for doc in ["{", "[", "{]", "[}", r#"{"a":[}"#, r#"[{]}"#, "{}}", "[]]"] {
            for batch in [1, 2, 64] {
                let result = tokenize(doc.as_bytes(), Some(batch))
                    .and_then(|mut t| validate_and_rewrite(&mut t).map(|_| t));
                assert!(
                    matches!(result, Err(JsonError::IllegalFormat(_))),
                    "{doc} with batch {batch}"
                );
            }
        }
    }

    /// Small nested documents, always rooted in an object or array.
    fn arb_json() -> impl Strategy<Value = SJson> {
        let leaf = prop_oneof![
            Just(SJson::Null),
            any::<bool>().prop_map(SJson::Bool),
            any::<i32>().prop_map(|n| SJson::from(n)),
            (-1.0e6f64..1.0e6).prop_map(|f| SJson::from(f)),
            "[a-zA-Z0-9 éß✓\"\\\\/]{0,12}".prop_map(SJson::String),
        ];
        let tree = leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(SJson::Array),
                proptest::collection::hash_map("[a-z]{1,6}", inner, 0..6)
                    .prop_map(|m| SJson::Object(m.into_iter().collect())),
            ]
        });
        prop_oneof![
            proptest::collection::vec(tree.clone(), 0..5).prop_map(SJson::Array),
            proptest::collection::hash_map("[a-z]{1,6}", tree, 0..5)
                .prop_map(|m| SJson::Object(m.into_iter().collect())),
        ]
    }

    proptest! {
        #[test]
        fn batch_size_does_not_change_tokens(doc in arb_json(), b1 in 1i64..40, b2 in 1i64..40) {
            let text = serde_json::to_string_pretty(&doc).unwrap();
            let whole = tokenize(text.as_bytes(), Some(text.len().max(1) as i64)).unwrap();
            let t1 = tokenize(text.as_bytes(), Some(b1)).unwrap();
            let t2 = tokenize(text.as_bytes(), Some(b2)).unwrap();
            prop_assert!(t1.iter().all(|t| t.kind != BatchSplit));
            prop_assert_eq!(&t1, &whole);
            prop_assert_eq!(&t2, &whole);
        }

        #[test]
        fn structure_matches_reference(doc in arb_json(), batch in 1i64..64) {
            let text = serde_json::to_string(&doc).unwrap();
            let mut reader = JsonReader::new();
            reader.set_batch_size(batch).unwrap();
            let value = reader.read_str(&text).unwrap();

            // string leaves keep escapes raw; decode before comparing
            prop_assert_eq!(decode_leaves(value), root(&doc));
        }
    }

    fn decode_leaves(v: JsonValue) -> JsonValue {
        match v {
            JsonValue::String(s) => JsonValue::String(decode_escapes(&s).unwrap()),
            JsonValue::Array(a) => JsonValue::Array(a.into_iter().map(decode_leaves).collect()),
            JsonValue::Object(o) => JsonValue::Object(
                o.into_iter()
                    .map(|(k, v)| (decode_escapes(&k).unwrap(), decode_leaves(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}
