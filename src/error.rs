//! Error types for amqp-engine.

use thiserror::Error;

use crate::codec::Descriptor;
use crate::engine::{EndpointKind, EndpointState};

/// Main error type for all engine and codec operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Byte-level decode failure (truncated input, invalid type code, bad UTF-8).
    #[error("Malformed encoding: {0}")]
    Malformed(String),

    /// A constructor received a field list of a shape it does not accept.
    #[error("Described type {descriptor} expects {expected} fields, got {actual}")]
    Arity {
        /// Descriptor of the type being constructed.
        descriptor: Descriptor,
        /// Accepted field count (human readable, e.g. "2" or "0..=1").
        expected: &'static str,
        /// Number of fields received.
        actual: usize,
    },

    /// A field is present but holds the wrong primitive type.
    #[error("Described type {descriptor}: field {index} must be {expected}")]
    FieldType {
        descriptor: Descriptor,
        index: usize,
        expected: &'static str,
    },

    /// Field access beyond a composite type's declared arity.
    #[error("Unknown index {index} (size {size})")]
    FieldIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Declared number of fields.
        size: usize,
    },

    /// Endpoint operation invoked from a state that forbids it.
    #[error("Cannot {operation} {endpoint}: local={local}, remote={remote}")]
    IllegalState {
        endpoint: EndpointKind,
        operation: &'static str,
        local: EndpointState,
        remote: EndpointState,
    },

    /// Endpoint is closed on both sides and accepts no further changes.
    #[error("{endpoint} is closed")]
    EndpointClosed {
        /// Kind of the terminal endpoint.
        endpoint: EndpointKind,
    },

    /// Handle refers to a freed slot or was never issued by this connection.
    #[error("Stale {kind} handle")]
    StaleHandle {
        /// Kind of entity the handle was meant to address.
        kind: EndpointKind,
    },

    /// Inbound frame on a channel with no session behind it.
    #[error("Unknown channel: {0}")]
    UnknownChannel(u16),

    /// Inbound frame naming a link handle the session does not know.
    #[error("Unknown link handle: {0}")]
    UnknownHandle(u32),

    /// Inbound disposition naming a delivery id nothing is tracking.
    #[error("Unknown delivery id: {0}")]
    UnknownDeliveryId(u32),

    /// Delivery tag rejected (too long, or duplicated in the unsettled window).
    #[error("Delivery tag error: {0}")]
    DeliveryTag(String),

    /// Disposition or settle on a delivery this side already settled.
    #[error("Delivery already settled")]
    AlreadySettled,

    /// Freeing a delivery this side has not settled yet.
    #[error("Delivery not settled")]
    NotSettled,

    /// Inbound transfer reusing a delivery id that is still unsettled.
    #[error("Duplicate delivery id: {0}")]
    DuplicateDeliveryId(u32),

    /// Every channel up to `channel_max` is taken.
    #[error("No channel available (channel_max {0})")]
    ChannelMax(u16),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds values outside protocol limits.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
