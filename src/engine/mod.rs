//! Endpoint state machine.
//!
//! A [`Connection`] is the root of a tree of sessions, links and deliveries.
//! The application drives local state through `Connection` methods; the
//! transport feeds inbound [`Frame`]s to [`Connection::handle_frame`] and
//! drains outbound ones with [`Connection::pop_frame`].
//!
//! # Example
//!
//! ```
//! use amqp_engine::engine::{Connection, StateMask};
//!
//! let mut client = Connection::new();
//! let mut server = Connection::new();
//! client.open().unwrap();
//! let session = client.session().unwrap();
//! client.open_session(session).unwrap();
//!
//! while let Some(frame) = client.pop_frame() {
//!     server.handle_frame(frame).unwrap();
//! }
//!
//! // the peer's begin created a session the server has not opened yet
//! let pending = server
//!     .session_head(StateMask::UNINITIALIZED, StateMask::ACTIVE)
//!     .collect(&server);
//! assert_eq!(pending.len(), 1);
//! ```

pub(crate) mod arena;
mod connection;
mod cursor;
mod delivery;
mod endpoint;
mod frame;
mod inbound;
mod link;
mod session;
mod work_queue;

pub use connection::Connection;
pub use cursor::{EndpointCursor, EndpointHandle};
pub use delivery::{Delivery, DeliveryId};
pub use endpoint::{EndpointKind, EndpointState, EndpointStates, ErrorCondition, StateMask};
pub use frame::{Frame, Performative, Role};
pub use link::{Link, LinkId};
pub use session::{Session, SessionId};
