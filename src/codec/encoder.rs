//! Canonical encoder.
//!
//! Always picks the smallest encoding for a value: the zero-width forms
//! (`uint0`, `ulong0`, `list0`) for zero and empty, the one-byte forms where
//! the value fits, and the wide forms otherwise. Decoding canonical bytes and
//! re-encoding the result therefore reproduces the input exactly.
//!
//! # Example
//!
//! ```
//! use amqp_engine::codec::{Encoder, Value};
//!
//! let bytes = Encoder::encode(&Value::described(0x2eu64, vec![])).unwrap();
//! assert_eq!(&bytes[..], &[0x00, 0x53, 0x2e, 0x45]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::value::Value;
use super::wire_format::{codes, DESCRIBED, MAX_SHORT_LEN};
use crate::error::{EngineError, Result};

/// Encoder for [`Value`]s.
pub struct Encoder;

impl Encoder {
    /// Encode a value into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns error if a variable-width value exceeds the 32-bit length limit.
    pub fn encode(value: &Value) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        Self::encode_into(value, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode a value, appending to `buf`.
    pub fn encode_into(value: &Value, buf: &mut BytesMut) -> Result<()> {
        match value {
            Value::Null => buf.put_u8(codes::NULL),
            Value::Bool(true) => buf.put_u8(codes::TRUE),
            Value::Bool(false) => buf.put_u8(codes::FALSE),
            Value::Ubyte(v) => {
                buf.put_u8(codes::UBYTE);
                buf.put_u8(*v);
            }
            Value::Ushort(v) => {
                buf.put_u8(codes::USHORT);
                buf.put_u16(*v);
            }
            Value::Uint(0) => buf.put_u8(codes::UINT0),
            Value::Uint(v) => match u8::try_from(*v) {
                Ok(small) => {
                    buf.put_u8(codes::SMALL_UINT);
                    buf.put_u8(small);
                }
                Err(_) => {
                    buf.put_u8(codes::UINT);
                    buf.put_u32(*v);
                }
            },
            Value::Ulong(0) => buf.put_u8(codes::ULONG0),
            Value::Ulong(v) => match u8::try_from(*v) {
                Ok(small) => {
                    buf.put_u8(codes::SMALL_ULONG);
                    buf.put_u8(small);
                }
                Err(_) => {
                    buf.put_u8(codes::ULONG);
                    buf.put_u64(*v);
                }
            },
            Value::Int(v) => match i8::try_from(*v) {
                Ok(small) => {
                    buf.put_u8(codes::SMALL_INT);
                    buf.put_i8(small);
                }
                Err(_) => {
                    buf.put_u8(codes::INT);
                    buf.put_i32(*v);
                }
            },
            Value::Long(v) => match i8::try_from(*v) {
                Ok(small) => {
                    buf.put_u8(codes::SMALL_LONG);
                    buf.put_i8(small);
                }
                Err(_) => {
                    buf.put_u8(codes::LONG);
                    buf.put_i64(*v);
                }
            },
            Value::Binary(bytes) => put_variable(buf, codes::VBIN8, codes::VBIN32, bytes)?,
            Value::String(s) => put_variable(buf, codes::STR8, codes::STR32, s.as_bytes())?,
            Value::Symbol(s) => {
                put_variable(buf, codes::SYM8, codes::SYM32, s.as_str().as_bytes())?
            }
            Value::List(items) => put_list(buf, items)?,
            Value::Described(described) => {
                buf.put_u8(DESCRIBED);
                Self::encode_into(&Value::from(described.descriptor.clone()), buf)?;
                Self::encode_into(&described.value, buf)?;
            }
        }
        Ok(())
    }
}

fn wide_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        EngineError::Malformed(format!("Length {} exceeds 32-bit encoding limit", len))
    })
}

fn put_variable(buf: &mut BytesMut, short: u8, wide: u8, data: &[u8]) -> Result<()> {
    if data.len() <= MAX_SHORT_LEN {
        buf.put_u8(short);
        buf.put_u8(data.len() as u8);
    } else {
        buf.put_u8(wide);
        buf.put_u32(wide_len(data.len())?);
    }
    buf.put_slice(data);
    Ok(())
}

fn put_list(buf: &mut BytesMut, items: &[Value]) -> Result<()> {
    if items.is_empty() {
        buf.put_u8(codes::LIST0);
        return Ok(());
    }

    let mut body = BytesMut::new();
    for item in items {
        Encoder::encode_into(item, &mut body)?;
    }

    // size counts the count field plus the element bytes
    if items.len() <= MAX_SHORT_LEN && body.len() < MAX_SHORT_LEN {
        buf.put_u8(codes::LIST8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(items.len() as u8);
    } else {
        buf.put_u8(codes::LIST32);
        buf.put_u32(wide_len(body.len() + 4)?);
        buf.put_u32(wide_len(items.len())?);
    }
    buf.put_slice(&body);
    Ok(())
}
