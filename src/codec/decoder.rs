//! Value decoder.
//!
//! Reads values one at a time from a `bytes::Bytes` buffer. A failed decode
//! leaves the position untouched, so values already taken from the same
//! buffer stay valid and the caller decides whether the rest is salvageable.
//!
//! # Example
//!
//! ```
//! use amqp_engine::codec::{registry, Decoder};
//! use amqp_engine::types::{LifetimePolicy, TypedValue};
//! use bytes::Bytes;
//!
//! let mut decoder = Decoder::new(Bytes::from_static(&[0x00, 0x53, 0x2e, 0x45]));
//! let value = decoder.decode_typed(registry()).unwrap();
//! assert!(matches!(
//!     value,
//!     TypedValue::LifetimePolicy(LifetimePolicy::DeleteOnNoLinksOrMessages(_))
//! ));
//! ```

use bytes::{Buf, Bytes};

use super::descriptor::{Descriptor, Symbol};
use super::registry::DescriptorRegistry;
use super::value::{Described, Value};
use super::wire_format::{codes, DESCRIBED};
use crate::error::{EngineError, Result};
use crate::types::TypedValue;

/// Deepest nesting of described values and lists accepted from the wire.
pub const MAX_DEPTH: usize = 64;

/// Decoder over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct Decoder {
    buf: Bytes,
}

impl Decoder {
    /// Create a decoder over `buf`.
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Create a decoder over a byte slice (copies data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Number of bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Decode the next raw value.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` on truncated input, unknown type codes, invalid
    /// UTF-8, inconsistent compound sizes or nesting deeper than
    /// [`MAX_DEPTH`].
    pub fn decode_value(&mut self) -> Result<Value> {
        let mut cursor = self.buf.clone();
        let value = read_value(&mut cursor, 0)?;
        self.buf = cursor;
        Ok(value)
    }

    /// Decode the next value, resolving a described list through `registry`.
    ///
    /// Described values whose body is not a list, and plain values, are
    /// returned as [`TypedValue::Value`].
    pub fn decode_typed(&mut self, registry: &DescriptorRegistry) -> Result<TypedValue> {
        let mut cursor = self.buf.clone();
        let typed = match read_value(&mut cursor, 0)? {
            Value::Described(described) => {
                let Described { descriptor, value } = *described;
                match value {
                    Value::List(fields) => registry.decode(&descriptor, fields)?,
                    value => TypedValue::Value(Value::Described(Box::new(Described {
                        descriptor,
                        value,
                    }))),
                }
            }
            value => TypedValue::Value(value),
        };
        self.buf = cursor;
        Ok(typed)
    }
}

fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(EngineError::Malformed(format!(
            "Need {} bytes, {} available",
            needed,
            buf.len()
        )));
    }
    Ok(())
}

fn take_u8(buf: &mut Bytes) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut Bytes) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_bytes(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

fn take_utf8(buf: &mut Bytes, len: usize, what: &str) -> Result<String> {
    let raw = take_bytes(buf, len)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| EngineError::Malformed(format!("Invalid UTF-8 in {}: {}", what, e)))
}

fn read_value(buf: &mut Bytes, depth: usize) -> Result<Value> {
    let code = take_u8(buf)?;
    let value = match code {
        DESCRIBED => {
            let depth = nested(depth)?;
            let constructor = buf.first().copied().unwrap_or(code);
            let descriptor = match read_value(buf, depth)? {
                Value::Ulong(code) => Descriptor::Code(code),
                Value::Symbol(symbol) => Descriptor::Symbol(symbol),
                _ => {
                    return Err(EngineError::Malformed(format!(
                        "Descriptor must be ulong or symbol, got {} (0x{:02x})",
                        codes::name(constructor),
                        constructor
                    )))
                }
            };
            let value = read_value(buf, depth)?;
            Value::Described(Box::new(Described { descriptor, value }))
        }
        codes::NULL => Value::Null,
        codes::TRUE => Value::Bool(true),
        codes::FALSE => Value::Bool(false),
        codes::BOOLEAN => match take_u8(buf)? {
            0x00 => Value::Bool(false),
            0x01 => Value::Bool(true),
            other => {
                return Err(EngineError::Malformed(format!(
                    "Invalid boolean byte 0x{:02x}",
                    other
                )))
            }
        },
        codes::UBYTE => Value::Ubyte(take_u8(buf)?),
        codes::USHORT => {
            ensure(buf, 2)?;
            Value::Ushort(buf.get_u16())
        }
        codes::UINT0 => Value::Uint(0),
        codes::SMALL_UINT => Value::Uint(u32::from(take_u8(buf)?)),
        codes::UINT => Value::Uint(take_u32(buf)?),
        codes::ULONG0 => Value::Ulong(0),
        codes::SMALL_ULONG => Value::Ulong(u64::from(take_u8(buf)?)),
        codes::ULONG => {
            ensure(buf, 8)?;
            Value::Ulong(buf.get_u64())
        }
        codes::SMALL_INT => {
            ensure(buf, 1)?;
            Value::Int(i32::from(buf.get_i8()))
        }
        codes::INT => {
            ensure(buf, 4)?;
            Value::Int(buf.get_i32())
        }
        codes::SMALL_LONG => {
            ensure(buf, 1)?;
            Value::Long(i64::from(buf.get_i8()))
        }
        codes::LONG => {
            ensure(buf, 8)?;
            Value::Long(buf.get_i64())
        }
        codes::VBIN8 => {
            let len = take_u8(buf)? as usize;
            Value::Binary(take_bytes(buf, len)?)
        }
        codes::VBIN32 => {
            let len = take_u32(buf)? as usize;
            Value::Binary(take_bytes(buf, len)?)
        }
        codes::STR8 => {
            let len = take_u8(buf)? as usize;
            Value::String(take_utf8(buf, len, "string")?)
        }
        codes::STR32 => {
            let len = take_u32(buf)? as usize;
            Value::String(take_utf8(buf, len, "string")?)
        }
        codes::SYM8 => {
            let len = take_u8(buf)? as usize;
            Value::Symbol(Symbol::new(take_utf8(buf, len, "symbol")?))
        }
        codes::SYM32 => {
            let len = take_u32(buf)? as usize;
            Value::Symbol(Symbol::new(take_utf8(buf, len, "symbol")?))
        }
        codes::LIST0 => Value::List(Vec::new()),
        codes::LIST8 => {
            let size = take_u8(buf)? as usize;
            let mut body = take_bytes(buf, size)?;
            let count = take_u8(&mut body)? as usize;
            Value::List(read_elements(&mut body, count, nested(depth)?)?)
        }
        codes::LIST32 => {
            let size = take_u32(buf)? as usize;
            let mut body = take_bytes(buf, size)?;
            let count = take_u32(&mut body)? as usize;
            Value::List(read_elements(&mut body, count, nested(depth)?)?)
        }
        other => {
            return Err(EngineError::Malformed(format!(
                "Invalid type code 0x{:02x}",
                other
            )))
        }
    };
    Ok(value)
}

fn nested(depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(EngineError::Malformed("nesting too deep".into()));
    }
    Ok(depth + 1)
}

fn read_elements(body: &mut Bytes, count: usize, depth: usize) -> Result<Vec<Value>> {
    // every element needs at least its constructor byte
    if count > body.len() {
        return Err(EngineError::Malformed(format!(
            "List count {} exceeds {} body bytes",
            count,
            body.len()
        )));
    }
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_value(body, depth)?);
    }
    if !body.is_empty() {
        return Err(EngineError::Malformed(format!(
            "{} trailing bytes after list elements",
            body.len()
        )));
    }
    Ok(items)
}
