//! Block parameters and hex quantities for Ethereum JSON-RPC.
//!
//! Renders block tags and numbers into request parameters and decodes the hex-encoded
//! quantities nodes return.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Error types for quantity parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("expected a hex quantity string, got {0}")]
    NotAQuantity(String),
}

/// Block reference types supported by Ethereum JSON-RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    /// Specific block number
    Number(u64),
    /// Block tag (latest, earliest, etc.)
    Tag(BlockTag),
}

/// Standard Ethereum block tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// The most recent block in the canonical chain
    Latest,
    /// The earliest/genesis block
    Earliest,
    /// A block in the pending state
    Pending,
    /// The most recent safe head block
    Safe,
    /// The most recent finalized block
    Finalized,
}

impl BlockTag {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Earliest => "earliest",
            Self::Pending => "pending",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

impl BlockRef {
    /// The default block for state reads.
    pub const LATEST: Self = Self::Tag(BlockTag::Latest);

    /// Renders this block reference as a JSON-RPC parameter (`"latest"`, `"0x10"`).
    #[must_use]
    pub fn to_param(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl Default for BlockRef {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:#x}"),
            Self::Tag(tag) => f.write_str(tag.as_str()),
        }
    }
}

fn quantity_digits(value: &Value) -> Result<&str, ParseError> {
    let s = value.as_str().ok_or_else(|| ParseError::NotAQuantity(value.to_string()))?;
    let digits = s.strip_prefix("0x").ok_or_else(|| ParseError::InvalidHex(s.to_string()))?;
    if digits.is_empty() {
        return Err(ParseError::InvalidHex(s.to_string()));
    }
    Ok(digits)
}

/// Decodes a `0x`-prefixed hex quantity (e.g. a chain id) into a `u64`.
///
/// # Errors
/// Returns `ParseError` if `value` is not a string or not valid hex, or overflows.
pub fn parse_quantity_u64(value: &Value) -> Result<u64, ParseError> {
    let digits = quantity_digits(value)?;
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidHex(digits.to_string()))
}

/// Decodes a `0x`-prefixed hex quantity (e.g. a wei balance) into a `u128`.
///
/// # Errors
/// Returns `ParseError` if `value` is not a string or not valid hex, or overflows.
pub fn parse_quantity_u128(value: &Value) -> Result<u128, ParseError> {
    let digits = quantity_digits(value)?;
    u128::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidHex(digits.to_string()))
}
