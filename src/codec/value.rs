//! Decoded primitive values.

use bytes::Bytes;

use super::descriptor::{Descriptor, Symbol};

/// A decoded AMQP value.
///
/// Only the subset needed to carry composite-type fields is modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Ubyte(u8),
    Ushort(u16),
    Uint(u32),
    Ulong(u64),
    Int(i32),
    Long(i64),
    Binary(Bytes),
    String(String),
    Symbol(Symbol),
    List(Vec<Value>),
    Described(Box<Described>),
}

/// A described value whose descriptor has not been resolved to a domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Described {
    pub descriptor: Descriptor,
    pub value: Value,
}

impl Value {
    /// Build a described value from a descriptor and an ordered field list.
    pub fn described(descriptor: impl Into<Descriptor>, fields: Vec<Value>) -> Self {
        Value::Described(Box::new(Described {
            descriptor: descriptor.into(),
            value: Value::List(fields),
        }))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ulong(&self) -> Option<u64> {
        match self {
            Value::Ulong(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Ulong(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl From<Descriptor> for Value {
    fn from(descriptor: Descriptor) -> Self {
        match descriptor {
            Descriptor::Code(code) => Value::Ulong(code),
            Descriptor::Symbol(symbol) => Value::Symbol(symbol),
        }
    }
}
