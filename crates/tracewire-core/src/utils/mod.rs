//! Utility functions shared by the middleware and the client.
//!
//! ## Canonical JSON (`canonical_json`)
//! - Compact JSON with sorted object keys
//! - Used to derive cache keys that ignore object key order
//! - Bounded writer rejects oversized values early
//!
//! ## Block Parameters (`block_param`)
//! - Parsing and rendering of "latest", "finalized", hex block numbers
//! - Decoding of hex quantities returned by nodes

pub mod block_param;
pub mod canonical_json;

pub use block_param::{
    parse_quantity_u128, parse_quantity_u64, BlockRef, BlockTag, ParseError as BlockParseError,
};
pub use canonical_json::{canonical_params, to_canonical_string, LimitExceeded};
