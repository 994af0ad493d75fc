use crate::json_batch::{checked_batch_size, BatchPolicy};
use crate::json_types::Result;
use crate::rd_json_parser::{DuplicateKeys, MAX_DEPTH};

/// Settings shared by every read performed through a [`crate::JsonReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Fixed batch size; `None` lets `policy` decide from the source size.
    pub batch_size: Option<usize>,
    pub policy: BatchPolicy,
    pub duplicate_keys: DuplicateKeys,
    /// Deepest container nesting the parser accepts.
    pub max_depth: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            policy: BatchPolicy::default(),
            duplicate_keys: DuplicateKeys::default(),
            max_depth: MAX_DEPTH,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the batch size. Zero or negative sizes are rejected with
    /// `InvalidConfiguration`.
    pub fn with_batch_size(mut self, size: i64) -> Result<Self> {
        self.batch_size = Some(checked_batch_size(size)?);
        Ok(self)
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeys) -> Self {
        self.duplicate_keys = policy;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub(crate) fn batch_override(&self) -> Option<i64> {
        // checked_batch_size guarantees the value came from a positive i64
        self.batch_size.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_types::JsonError;

    #[test]
    fn defaults() {
        let c = ReaderConfig::new();
        assert_eq!(c.batch_size, None);
        assert_eq!(c.policy, BatchPolicy::default());
        assert_eq!(c.duplicate_keys, DuplicateKeys::LastWins);
        assert_eq!(c.max_depth, MAX_DEPTH);
        assert_eq!(c.batch_override(), None);
    }

    #[test]
    fn batch_size_must_be_positive() {
        assert!(matches!(
            ReaderConfig::new().with_batch_size(0),
            Err(JsonError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ReaderConfig::new().with_batch_size(-5),
            Err(JsonError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ReaderConfig::new().with_batch_size(i64::MAX),
            Err(JsonError::InvalidConfiguration(_))
        ));
        let c = ReaderConfig::new().with_batch_size(4096).unwrap();
        assert_eq!(c.batch_size, Some(4096));
        assert_eq!(c.batch_override(), Some(4096));
    }
}
