//! Minimal Solidity ABI codec.
//!
//! Covers what the voting contract needs: `uint256` and `string` arguments,
//! `uint256`, tuple and tuple-array return values. Decoding is strict: any
//! out-of-bounds offset, oversized integer or invalid UTF-8 is an error.

use crate::domain::VoteSyncError;
use primitive_types::U256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// ABI word size in bytes.
pub const WORD: usize = 32;

/// ABI decoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// Not a `0x`-prefixed hex string.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// An offset or length points outside the data.
    #[error("Out of bounds: need {needed} bytes, have {have}")]
    OutOfBounds {
        /// Bytes required
        needed: usize,
        /// Bytes available
        have: usize,
    },

    /// Integer wider than 64 bits.
    #[error("Integer overflow: {0} does not fit in u64")]
    Overflow(U256),

    /// String payload is not UTF-8.
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    /// Data has the wrong overall shape.
    #[error("Unexpected shape: {0}")]
    Shape(String),
}

impl From<AbiError> for VoteSyncError {
    fn from(err: AbiError) -> Self {
        VoteSyncError::ProtocolMismatch(err.to_string())
    }
}

/// Keccak-256 digest (Ethereum's pre-standard SHA-3).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 4-byte function selector for a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Decode `0x`-prefixed hex. `"0x"` decodes to an empty vector.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| AbiError::InvalidHex(s.to_string()))?;
    hex::decode(digits).map_err(|_| AbiError::InvalidHex(s.to_string()))
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a JSON-RPC quantity (`"0x1a"`).
pub fn parse_quantity(s: &str) -> Result<u64, AbiError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| AbiError::InvalidHex(s.to_string()))?;
    if digits.is_empty() {
        return Err(AbiError::InvalidHex(s.to_string()));
    }
    let value = U256::from_str_radix(digits, 16).map_err(|_| AbiError::InvalidHex(s.to_string()))?;
    u256_to_u64(value)
}

/// Render a JSON-RPC quantity.
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Checked narrowing; ledger integers are `uint256`.
pub fn u256_to_u64(value: U256) -> Result<u64, AbiError> {
    if value > U256::from(u64::MAX) {
        return Err(AbiError::Overflow(value));
    }
    Ok(value.as_u64())
}

/// Argument value for [`encode_call`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `uint256`
    Uint(U256),
    /// `string`
    Str(String),
}

impl From<u64> for Token {
    fn from(v: u64) -> Self {
        Token::Uint(U256::from(v))
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Str(s.to_string())
    }
}

/// Calldata: selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode_tokens(args));
    out
}

/// Head/tail encoding of a token list (also the encoding of a tuple).
pub fn encode_tokens(args: &[Token]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for arg in args {
        match arg {
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Str(s) => {
                head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
                tail.extend_from_slice(&uint_word(U256::from(s.len())));
                tail.extend_from_slice(s.as_bytes());
                let padding = (WORD - s.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }
    head.extend(tail);
    head
}

/// One big-endian ABI word.
pub fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

/// Cursor over ABI-encoded data. Offsets are relative to `base`.
#[derive(Clone, Copy, Debug)]
pub struct AbiReader<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> AbiReader<'a> {
    /// Reader at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, base: 0 }
    }

    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let end = start.checked_add(len).ok_or(AbiError::OutOfBounds {
            needed: usize::MAX,
            have: self.data.len(),
        })?;
        self.data.get(start..end).ok_or(AbiError::OutOfBounds {
            needed: end,
            have: self.data.len(),
        })
    }

    /// Head word `index` as `uint256`.
    pub fn uint(&self, index: usize) -> Result<U256, AbiError> {
        let word = self.slice(self.base + index * WORD, WORD)?;
        Ok(U256::from_big_endian(word))
    }

    /// Head word `index` as `u64`.
    pub fn u64(&self, index: usize) -> Result<u64, AbiError> {
        u256_to_u64(self.uint(index)?)
    }

    /// Head word `index` interpreted as an offset or length bounded by the data.
    fn bounded(&self, index: usize) -> Result<usize, AbiError> {
        let value = self.uint(index)?;
        if value > U256::from(self.data.len()) {
            return Err(AbiError::OutOfBounds {
                needed: usize::MAX,
                have: self.data.len(),
            });
        }
        Ok(value.as_usize())
    }

    /// Reader positioned at the dynamic value whose offset is head word `index`.
    pub fn tail(&self, index: usize) -> Result<AbiReader<'a>, AbiError> {
        let offset = self.bounded(index)?;
        let base = self.base + offset;
        if base > self.data.len() {
            return Err(AbiError::OutOfBounds {
                needed: base,
                have: self.data.len(),
            });
        }
        Ok(AbiReader {
            data: self.data,
            base,
        })
    }

    /// Dynamic `string` referenced by head word `index`.
    pub fn string(&self, index: usize) -> Result<String, AbiError> {
        let tail = self.tail(index)?;
        let len = tail.bounded(0)?;
        let bytes = self.slice(tail.base + WORD, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
    }

    /// Dynamic array referenced by head word `index`: its length and a reader
    /// over the element heads.
    pub fn array(&self, index: usize) -> Result<(usize, AbiReader<'a>), AbiError> {
        let tail = self.tail(index)?;
        let len = tail.bounded(0)?;
        let elements = AbiReader {
            data: self.data,
            base: tail.base + WORD,
        };
        let heads = len.checked_mul(WORD).ok_or(AbiError::OutOfBounds {
            needed: usize::MAX,
            have: self.data.len(),
        })?;
        self.slice(elements.base, heads)?;
        Ok((len, elements))
    }
}
