//! Canonical JSON text for deterministic cache keys.
//!
//! Walks a `serde_json::Value` and writes compact JSON with object keys sorted, so two
//! values that differ only in object key order produce byte-identical output. Scalars are
//! written in serde_json's own compact form, which already escapes strings unambiguously.
//!
//! Writing goes through a [`BoundedWriter`] that refuses to grow past a byte limit, so an
//! oversized value is rejected as soon as the limit is crossed instead of after the whole
//! value has been rendered.

use serde_json::Value;
use std::fmt::{self, Write};

/// Returned when canonical output would exceed the configured byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("canonical form exceeds {limit} bytes")]
pub struct LimitExceeded {
    pub limit: usize,
}

/// String sink that fails once `limit` bytes would be exceeded.
pub struct BoundedWriter {
    buf: String,
    limit: usize,
}

impl BoundedWriter {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { buf: String::with_capacity(limit.min(256)), limit }
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.buf
    }
}

impl Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.buf.push_str(s);
        Ok(())
    }
}

/// Writes `value` as canonical JSON into `out`.
///
/// # Errors
///
/// Propagates the writer's error; writing to a `String` never fails.
pub fn write_canonical<W: Write>(value: &Value, out: &mut W) -> fmt::Result {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            write!(out, "{value}")
        }
        Value::Array(arr) => {
            out.write_char('[')?;
            for (i, element) in arr.iter().enumerate() {
                if i > 0 {
                    out.write_char(',')?;
                }
                write_canonical(element, out)?;
            }
            out.write_char(']')
        }
        Value::Object(obj) => {
            // {"a":1,"b":2} and {"b":2,"a":1} must render identically
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.write_char('{')?;
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.write_char(',')?;
                }
                write!(out, "{}:", Value::String(key.clone()))?;
                write_canonical(value, out)?;
            }
            out.write_char('}')
        }
    }
}

/// Renders `params` as a canonical JSON array, bounded by `limit` bytes.
///
/// # Errors
///
/// Returns [`LimitExceeded`] if the rendered form would be larger than `limit`.
pub fn canonical_params(params: &[Value], limit: usize) -> Result<String, LimitExceeded> {
    let mut out = BoundedWriter::new(limit);
    let render = |out: &mut BoundedWriter| -> fmt::Result {
        out.write_char('[')?;
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                out.write_char(',')?;
            }
            write_canonical(param, out)?;
        }
        out.write_char(']')
    };

    render(&mut out).map_err(|_| LimitExceeded { limit })?;
    Ok(out.into_string())
}

/// Canonical JSON text of `value`, without a size limit.
#[must_use]
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    // String's fmt::Write impl is infallible
    let _ = write_canonical(value, &mut out);
    out
}
