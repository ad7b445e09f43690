//! # amqp-engine
//!
//! Transport-agnostic core of an AMQP 1.0 implementation.
//!
//! The crate owns no sockets or threads. A transport feeds decoded frames in
//! and pulls frames out; the application drives endpoints through a
//! [`Connection`] and reads deliveries off its work queue.
//!
//! ## Architecture
//!
//! - **Codec** ([`codec`]): primitive value subset, canonical encoder, decoder
//!   and the descriptor registry that maps wire descriptors to constructors
//! - **Types** ([`types`]): composite described types (lifetime policies,
//!   delivery states) and the unknown-descriptor fallback
//! - **Engine** ([`engine`]): connection → session → link → delivery, with
//!   local/remote endpoint states, filtered iteration and the work queue
//!
//! ## Example
//!
//! ```
//! use amqp_engine::codec::{registry, Decoder, Encoder};
//! use amqp_engine::types::{DeleteOnNoLinksOrMessages, DescribedType, TypedValue};
//! use amqp_engine::{Connection, StateMask};
//!
//! // codec: a lifetime policy survives encode and registry decode
//! let bytes = Encoder::encode(&DeleteOnNoLinksOrMessages.to_value().unwrap()).unwrap();
//! let typed = Decoder::new(bytes).decode_typed(registry()).unwrap();
//! assert!(matches!(typed, TypedValue::LifetimePolicy(_)));
//!
//! // engine: open a connection and a session
//! let mut connection = Connection::new();
//! connection.open().unwrap();
//! let session = connection.session().unwrap();
//! connection.open_session(session).unwrap();
//! let active = connection
//!     .session_head(StateMask::ACTIVE, StateMask::ANY)
//!     .collect(&connection);
//! assert_eq!(active, vec![session]);
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::ConnectionConfig;
pub use engine::{Connection, DeliveryId, EndpointState, LinkId, SessionId, StateMask};
pub use error::{EngineError, Result};
