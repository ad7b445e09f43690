//! Composite (described) domain types.
//!
//! Every type here implements [`DescribedType`]: a canonical numeric
//! descriptor, an equivalent symbolic descriptor, a fixed arity and indexed
//! access to its fields. Decoding goes through the
//! [`DescriptorRegistry`](crate::codec::DescriptorRegistry); re-encoding goes
//! through [`DescribedType::to_value`].

use crate::codec::{Descriptor, DescriptorRegistry, Value};
use crate::error::{EngineError, Result};

/// Capability shared by all composite types.
pub trait DescribedType: Sized {
    /// Canonical numeric descriptor.
    const CODE: u64;
    /// Canonical symbolic descriptor.
    const SYMBOL: &'static str;
    /// Number of encoded fields.
    const ARITY: usize;

    /// Field at `index`.
    ///
    /// # Errors
    ///
    /// `FieldIndexOutOfRange` for any `index >= size()`.
    fn get(&self, index: usize) -> Result<Value>;

    /// Build the type from a decoded field list.
    fn from_fields(fields: Vec<Value>) -> Result<Self>;

    /// Number of fields; constant per type.
    #[inline]
    fn size(&self) -> usize {
        Self::ARITY
    }

    /// The canonical (numeric) descriptor.
    fn descriptor(&self) -> Descriptor {
        Descriptor::Code(Self::CODE)
    }

    /// Both wire forms of this type's descriptor.
    fn descriptors() -> [Descriptor; 2] {
        [Descriptor::Code(Self::CODE), Descriptor::symbol(Self::SYMBOL)]
    }

    /// Described value for encoding. Trailing null fields are omitted.
    fn to_value(&self) -> Result<Value> {
        let mut fields = (0..self.size())
            .map(|index| self.get(index))
            .collect::<Result<Vec<_>>>()?;
        while fields.last().is_some_and(Value::is_null) {
            fields.pop();
        }
        Ok(Value::described(self.descriptor(), fields))
    }

    /// Register this type's constructor under every equivalent descriptor.
    fn register(registry: &mut DescriptorRegistry)
    where
        Self: Into<TypedValue>,
    {
        for descriptor in Self::descriptors() {
            registry.register(descriptor, construct::<Self>);
        }
    }
}

fn construct<T>(fields: Vec<Value>) -> Result<TypedValue>
where
    T: DescribedType + Into<TypedValue>,
{
    T::from_fields(fields).map(Into::into)
}

/// Out-of-range error for a type with `size` fields.
pub(crate) fn out_of_range(index: usize, size: usize) -> EngineError {
    EngineError::FieldIndexOutOfRange { index, size }
}

/// Declare a zero-field marker type belonging to the `$family` enum.
macro_rules! described_marker {
    ($(#[$meta:meta])* $name:ident, $family:ident, $code:expr, $symbol:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl $crate::types::DescribedType for $name {
            const CODE: u64 = $code;
            const SYMBOL: &'static str = $symbol;
            const ARITY: usize = 0;

            fn get(&self, index: usize) -> $crate::error::Result<$crate::codec::Value> {
                Err($crate::types::out_of_range(index, 0))
            }

            // identity is carried by the descriptor alone
            fn from_fields(_fields: Vec<$crate::codec::Value>) -> $crate::error::Result<Self> {
                Ok($name)
            }
        }

        impl From<$name> for $family {
            fn from(value: $name) -> Self {
                $family::$name(value)
            }
        }

        impl From<$name> for $crate::types::TypedValue {
            fn from(value: $name) -> Self {
                $crate::types::TypedValue::$family($family::$name(value))
            }
        }
    };
}

mod delivery_state;
mod lifetime_policy;

pub use delivery_state::{Accepted, DeliveryState, Received, Rejected, Released};
pub use lifetime_policy::{
    DeleteOnClose, DeleteOnNoLinks, DeleteOnNoLinksOrMessages, DeleteOnNoMessages, LifetimePolicy,
};

/// A described value whose descriptor no registered constructor claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDescribed {
    descriptor: Descriptor,
    fields: Vec<Value>,
}

impl UnknownDescribed {
    pub fn new(descriptor: Descriptor, fields: Vec<Value>) -> Self {
        Self { descriptor, fields }
    }

    /// Descriptor exactly as it appeared on the wire.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.fields
            .get(index)
            .ok_or_else(|| out_of_range(index, self.fields.len()))
    }

    pub fn to_value(&self) -> Value {
        Value::described(self.descriptor.clone(), self.fields.clone())
    }
}

/// Result of decoding a value through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    LifetimePolicy(LifetimePolicy),
    DeliveryState(DeliveryState),
    /// Described list with an unregistered descriptor.
    Unknown(UnknownDescribed),
    /// Anything that is not a described list.
    Value(Value),
}

impl TypedValue {
    /// Canonical descriptor of a described value, `None` for plain values.
    pub fn descriptor(&self) -> Option<Descriptor> {
        match self {
            TypedValue::LifetimePolicy(policy) => Some(policy.descriptor()),
            TypedValue::DeliveryState(state) => Some(state.descriptor()),
            TypedValue::Unknown(unknown) => Some(unknown.descriptor().clone()),
            TypedValue::Value(Value::Described(described)) => Some(described.descriptor.clone()),
            TypedValue::Value(_) => None,
        }
    }

    /// Inverse of decoding: the value to hand to the encoder.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            TypedValue::LifetimePolicy(policy) => policy.to_value(),
            TypedValue::DeliveryState(state) => state.to_value(),
            TypedValue::Unknown(unknown) => Ok(unknown.to_value()),
            TypedValue::Value(value) => Ok(value.clone()),
        }
    }
}

impl From<LifetimePolicy> for TypedValue {
    fn from(policy: LifetimePolicy) -> Self {
        TypedValue::LifetimePolicy(policy)
    }
}

impl From<DeliveryState> for TypedValue {
    fn from(state: DeliveryState) -> Self {
        TypedValue::DeliveryState(state)
    }
}
