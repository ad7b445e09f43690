//! Codec module - described types and the primitive subset they rest on.
//!
//! - [`Descriptor`] / [`Symbol`] - identity of a described type on the wire
//! - [`Value`] - decoded primitive values
//! - [`Encoder`] / [`Decoder`] - canonical byte encoding
//! - [`DescriptorRegistry`] - descriptor → constructor lookup
//!
//! # Example
//!
//! ```
//! use amqp_engine::codec::{registry, Decoder, Encoder};
//! use amqp_engine::types::{Accepted, DescribedType, TypedValue};
//!
//! let bytes = Encoder::encode(&Accepted.to_value().unwrap()).unwrap();
//! let typed = Decoder::new(bytes).decode_typed(registry()).unwrap();
//! assert!(matches!(typed, TypedValue::DeliveryState(_)));
//! ```

mod decoder;
mod descriptor;
mod encoder;
mod registry;
mod value;
mod wire_format;

pub use decoder::{Decoder, MAX_DEPTH};
pub use descriptor::{Descriptor, Symbol};
pub use encoder::Encoder;
pub use registry::{registry, Constructor, DescriptorRegistry};
pub use value::{Described, Value};
pub use wire_format::{codes, DESCRIBED, MAX_SHORT_LEN};
