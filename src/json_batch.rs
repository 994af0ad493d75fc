// json_batch.rs
//
// Pulls raw chunks from a byte source, decodes them to UTF-8 text windows and
// feeds each window to the tokenizer, stitching `BatchSplit` continuations
// onto the following window.

use std::fs::File;
use std::io::{self, Read};

use log::{debug, trace};

use crate::json_tok::{Token, TokenType, Tokenizer};
use crate::json_types::{JsonError, Result};

pub const MIB: u64 = 1_048_576;

/// Largest batch size a caller may request.
pub const MAX_BATCH: usize = 1024 * MIB as usize;

/// Where raw bytes come from.
///
/// `read_chunk` fills as much of `buf` as it can; a short read is a valid
/// partial chunk and `Ok(0)` marks the end of input.
pub trait ByteSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Total size in bytes, when known up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl ByteSource for File {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Only regular files report a size; pipes, FIFOs and `/proc` entries
    /// claim zero bytes.
    fn size_hint(&self) -> Option<u64> {
        self.metadata().ok().filter(|m| m.is_file()).map(|m| m.len())
    }
}

impl ByteSource for &[u8] {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        let (head, rest) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = rest;
        Ok(n)
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// Adapts any `Read` (socket, pipe, decompressor …) into a `ByteSource`.
#[derive(Debug)]
pub struct SizedReader<R> {
    inner: R,
    len: Option<u64>,
}

impl<R: Read> SizedReader<R> {
    /// `len` feeds the batch policy; pass `None` when the size is unknown.
    pub fn new(inner: R, len: Option<u64>) -> Self {
        Self { inner, len }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for SizedReader<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn size_hint(&self) -> Option<u64> {
        self.len
    }
}

/// Tiers used to pick a batch size from the total source size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Sources up to this size are read in one batch of their exact size.
    pub single_batch_limit: u64,
    /// Sources below this size use `medium_batch`, larger ones `large_batch`.
    pub large_threshold: u64,
    pub medium_batch: usize,
    pub large_batch: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            single_batch_limit: MIB,
            large_threshold: 100 * MIB,
            medium_batch: MIB as usize,
            large_batch: 5 * MIB as usize,
        }
    }
}

impl BatchPolicy {
    pub fn batch_size_for(&self, total: Option<u64>) -> usize {
        match total {
            Some(n) if n <= self.single_batch_limit => {
                usize::try_from(n).unwrap_or(usize::MAX).max(1)
            }
            Some(n) if n < self.large_threshold => self.medium_batch,
            Some(_) => self.large_batch,
            None => self.medium_batch,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.medium_batch == 0 || self.large_batch == 0 {
            return Err(JsonError::InvalidConfiguration(
                "batch policy sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Validates a caller supplied batch size: positive and at most [`MAX_BATCH`].
pub fn checked_batch_size(size: i64) -> Result<usize> {
    if size <= 0 {
        return Err(JsonError::InvalidConfiguration(format!(
            "batch size must be positive, got {size}"
        )));
    }
    match usize::try_from(size) {
        Ok(n) if n <= MAX_BATCH => Ok(n),
        _ => Err(JsonError::InvalidConfiguration(format!(
            "batch size {size} exceeds the {MAX_BATCH} byte limit"
        ))),
    }
}

/// Drives the read → decode → tokenize loop over one source.
#[derive(Debug)]
pub struct Batcher<S> {
    source: S,
    batch_size: usize,
    /// Raw read buffer; the first `carry` bytes are an incomplete UTF-8
    /// sequence left over from the previous read.
    raw: Vec<u8>,
    carry: usize,
    window: String,
}

impl<S: ByteSource> Batcher<S> {
    /// Allocates the read buffer up front; fails with `InvalidConfiguration`
    /// when `batch_size` is zero or cannot be allocated.
    pub fn new(source: S, batch_size: usize) -> Result<Self> {
        let too_big = || {
            JsonError::InvalidConfiguration(format!(
                "cannot allocate a {batch_size} byte batch buffer"
            ))
        };
        if batch_size == 0 {
            return Err(JsonError::InvalidConfiguration(
                "batch size must be positive, got 0".into(),
            ));
        }
        // room for up to 3 bytes of a carried utf-8 sequence
        let raw_len = batch_size.checked_add(3).ok_or_else(too_big)?;
        let mut raw = Vec::new();
        raw.try_reserve_exact(raw_len).map_err(|_| too_big())?;
        raw.resize(raw_len, 0);
        let mut window = String::new();
        window.try_reserve(batch_size).map_err(|_| too_big())?;

        Ok(Self {
            source,
            batch_size,
            raw,
            carry: 0,
            window,
        })
    }

    /// Tokenizes the whole source into a sequence framed by `Sof` / `Eof`.
    pub fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = vec![Token::sof()];
        let mut batches = 0usize;

        loop {
            let end = self.carry + self.batch_size;
            let n = self.source.read_chunk(&mut self.raw[self.carry..end])?;
            if n == 0 {
                break;
            }
            batches += 1;

            self.window.clear();
            if let Some(split) = take_split(&mut tokens) {
                trace!("batch {batches}: stitching {} byte continuation", split.len());
                self.window.push_str(&split);
            }
            self.decode(self.carry + n)?;

            let before = tokens.len();
            Tokenizer::new(&self.window).run(&mut tokens)?;
            debug!(
                "batch {batches}: {n} bytes read, {} tokens",
                tokens.len() - before
            );
        }

        if self.carry > 0 {
            return Err(JsonError::format(
                "input ends inside a multi-byte utf-8 sequence",
            ));
        }
        if let Some(split) = take_split(&mut tokens) {
            Tokenizer::last(&split).run(&mut tokens)?;
        }
        tokens.push(Token::eof());
        debug!("tokenized {batches} batches into {} tokens", tokens.len());
        Ok(tokens)
    }

    /// Appends the valid UTF-8 prefix of `raw[..filled]` to the window and
    /// moves an incomplete trailing sequence to the front of `raw`.
    fn decode(&mut self, filled: usize) -> Result<()> {
        let bytes = &self.raw[..filled];
        let valid = match std::str::from_utf8(bytes) {
            Ok(text) => {
                self.window.push_str(text);
                filled
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = std::str::from_utf8(&bytes[..valid])
                    .map_err(|e| JsonError::internal(e.to_string()))?;
                self.window.push_str(text);
                valid
            }
            Err(e) => {
                return Err(JsonError::format(format!(
                    "invalid utf-8 sequence in input: {e}"
                )));
            }
        };
        self.raw.copy_within(valid..filled, 0);
        self.carry = filled - valid;
        Ok(())
    }
}

fn take_split(tokens: &mut Vec<Token>) -> Option<String> {
    if tokens.last().map(|t| t.kind) == Some(TokenType::BatchSplit) {
        tokens.pop().map(|t| t.lexeme.into_owned())
    } else {
        None
    }
}

/// Tokenizes `source`, choosing the batch size from `policy` unless an
/// explicit override is given.
pub fn tokenize_with<S: ByteSource>(
    source: S,
    batch_size_override: Option<i64>,
    policy: &BatchPolicy,
) -> Result<Vec<Token>> {
    let hint = source.size_hint();
    let batch_size = match batch_size_override {
        Some(size) => checked_batch_size(size)?,
        None => {
            policy.check()?;
            // a policy tier never exceeds a known source size
            let tier = policy.batch_size_for(hint);
            match hint {
                Some(n) => tier.min(usize::try_from(n).unwrap_or(usize::MAX).max(1)),
                None => tier,
            }
        }
    };
    debug!("batch size {batch_size} for source of {hint:?} bytes");
    Batcher::new(source, batch_size)?.run()
}

/*-------------------------------------------------------------
 * Tests
 *-----------------------------------------------------------*/
