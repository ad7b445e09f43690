//! Delivery states.
//!
//! `Received` is the only non-terminal state and the only one with required
//! fields; it rejects any field list that is not exactly
//! `[uint section-number, ulong section-offset]`.

use super::{out_of_range, DescribedType};
use crate::codec::{Descriptor, Value};
use crate::error::{EngineError, Result};

/// Partial receipt: how far into the message the receiver has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Received {
    pub section_number: u32,
    pub section_offset: u64,
}

impl Received {
    pub fn new(section_number: u32, section_offset: u64) -> Self {
        Self {
            section_number,
            section_offset,
        }
    }
}

impl DescribedType for Received {
    const CODE: u64 = 0x0000_0000_0000_0023;
    const SYMBOL: &'static str = "amqp:received:list";
    const ARITY: usize = 2;

    fn get(&self, index: usize) -> Result<Value> {
        match index {
            0 => Ok(Value::Uint(self.section_number)),
            1 => Ok(Value::Ulong(self.section_offset)),
            _ => Err(out_of_range(index, Self::ARITY)),
        }
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self> {
        if fields.len() != Self::ARITY {
            return Err(EngineError::Arity {
                descriptor: Descriptor::Code(Self::CODE),
                expected: "2",
                actual: fields.len(),
            });
        }
        let section_number = fields[0].as_uint().ok_or(EngineError::FieldType {
            descriptor: Descriptor::Code(Self::CODE),
            index: 0,
            expected: "uint",
        })?;
        let section_offset = fields[1].as_ulong().ok_or(EngineError::FieldType {
            descriptor: Descriptor::Code(Self::CODE),
            index: 1,
            expected: "ulong",
        })?;
        Ok(Self::new(section_number, section_offset))
    }
}

impl From<Received> for DeliveryState {
    fn from(value: Received) -> Self {
        DeliveryState::Received(value)
    }
}

impl From<Received> for super::TypedValue {
    fn from(value: Received) -> Self {
        super::TypedValue::DeliveryState(DeliveryState::Received(value))
    }
}

described_marker!(
    /// Terminal outcome: the message was processed.
    Accepted,
    DeliveryState,
    0x0000_0000_0000_0024,
    "amqp:accepted:list"
);

described_marker!(
    /// Terminal outcome: the message was not and will not be processed.
    Released,
    DeliveryState,
    0x0000_0000_0000_0026,
    "amqp:released:list"
);

/// Terminal outcome: the message is invalid and cannot be processed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rejected {
    error: Option<Value>,
}

impl Rejected {
    /// An explicit null error is the same as no error on the wire, so it is
    /// stored as `None`.
    pub fn new(error: Option<Value>) -> Self {
        Self {
            error: error.filter(|v| !v.is_null()),
        }
    }

    /// Error describing the rejection, kept as an undecoded value.
    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }
}

impl DescribedType for Rejected {
    const CODE: u64 = 0x0000_0000_0000_0025;
    const SYMBOL: &'static str = "amqp:rejected:list";
    const ARITY: usize = 1;

    fn get(&self, index: usize) -> Result<Value> {
        match index {
            0 => Ok(self.error.clone().unwrap_or(Value::Null)),
            _ => Err(out_of_range(index, Self::ARITY)),
        }
    }

    fn from_fields(mut fields: Vec<Value>) -> Result<Self> {
        if fields.len() > Self::ARITY {
            return Err(EngineError::Arity {
                descriptor: Descriptor::Code(Self::CODE),
                expected: "0..=1",
                actual: fields.len(),
            });
        }
        Ok(Self::new(fields.pop()))
    }
}

impl From<Rejected> for DeliveryState {
    fn from(value: Rejected) -> Self {
        DeliveryState::Rejected(value)
    }
}

impl From<Rejected> for super::TypedValue {
    fn from(value: Rejected) -> Self {
        super::TypedValue::DeliveryState(DeliveryState::Rejected(value))
    }
}

/// State of a delivery as reported by one side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Received(Received),
    Accepted(Accepted),
    Rejected(Rejected),
    Released(Released),
}

impl DeliveryState {
    /// Outcomes are terminal; `Received` is not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }

    pub fn descriptor(&self) -> Descriptor {
        match self {
            DeliveryState::Received(s) => s.descriptor(),
            DeliveryState::Accepted(s) => s.descriptor(),
            DeliveryState::Rejected(s) => s.descriptor(),
            DeliveryState::Released(s) => s.descriptor(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            DeliveryState::Received(s) => s.size(),
            DeliveryState::Accepted(s) => s.size(),
            DeliveryState::Rejected(s) => s.size(),
            DeliveryState::Released(s) => s.size(),
        }
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        match self {
            DeliveryState::Received(s) => s.get(index),
            DeliveryState::Accepted(s) => s.get(index),
            DeliveryState::Rejected(s) => s.get(index),
            DeliveryState::Released(s) => s.get(index),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        match self {
            DeliveryState::Received(s) => s.to_value(),
            DeliveryState::Accepted(s) => s.to_value(),
            DeliveryState::Rejected(s) => s.to_value(),
            DeliveryState::Released(s) => s.to_value(),
        }
    }
}
