//! Endpoint lifecycle state.
//!
//! Every endpoint (connection, session, link) tracks two independent states:
//! the local one, driven by the application, and the remote one, driven by
//! frames from the peer. Each side moves only forward:
//! ```text
//! UNINITIALIZED ──open──▶ ACTIVE ──close──▶ CLOSED
//!       └──────────────close──────────────────▲
//! ```
//! Once both sides are `CLOSED` the endpoint is terminal and every further
//! state change fails with [`EngineError::EndpointClosed`].

use std::fmt;
use std::ops::BitOr;

use crate::codec::Symbol;
use crate::error::{EngineError, Result};

/// Lifecycle state of one side of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointState {
    Uninitialized,
    Active,
    Closed,
}

impl EndpointState {
    /// Single-state mask bit.
    #[inline]
    const fn bit(self) -> u8 {
        match self {
            EndpointState::Uninitialized => StateMask::UNINITIALIZED.0,
            EndpointState::Active => StateMask::ACTIVE.0,
            EndpointState::Closed => StateMask::CLOSED.0,
        }
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointState::Uninitialized => "UNINITIALIZED",
            EndpointState::Active => "ACTIVE",
            EndpointState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Set of acceptable states for one side, used to filter iteration.
///
/// # Example
///
/// ```
/// use amqp_engine::engine::{EndpointState, StateMask};
///
/// let mask = StateMask::UNINITIALIZED | StateMask::ACTIVE;
/// assert!(mask.contains(EndpointState::Active));
/// assert!(!mask.contains(EndpointState::Closed));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateMask(u8);

impl StateMask {
    pub const NONE: StateMask = StateMask(0);
    pub const UNINITIALIZED: StateMask = StateMask(0b001);
    pub const ACTIVE: StateMask = StateMask(0b010);
    pub const CLOSED: StateMask = StateMask(0b100);
    pub const ANY: StateMask = StateMask(0b111);

    /// Check if `state` is in the mask.
    #[inline]
    pub fn contains(self, state: EndpointState) -> bool {
        self.0 & state.bit() != 0
    }
}

impl BitOr for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: StateMask) -> StateMask {
        StateMask(self.0 | rhs.0)
    }
}

impl From<EndpointState> for StateMask {
    fn from(state: EndpointState) -> Self {
        StateMask(state.bit())
    }
}

/// Kind of entity, for error reporting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Connection,
    Session,
    Link,
    Delivery,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointKind::Connection => "connection",
            EndpointKind::Session => "session",
            EndpointKind::Link => "link",
            EndpointKind::Delivery => "delivery",
        };
        f.write_str(name)
    }
}

/// Error condition attached to a closing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    pub condition: Symbol,
    pub description: Option<String>,
}

impl ErrorCondition {
    pub fn new(condition: impl Into<Symbol>, description: Option<String>) -> Self {
        Self {
            condition: condition.into(),
            description,
        }
    }
}

/// Local and remote state of one endpoint, with the legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStates {
    kind: EndpointKind,
    local: EndpointState,
    remote: EndpointState,
}

impl EndpointStates {
    pub fn new(kind: EndpointKind) -> Self {
        Self {
            kind,
            local: EndpointState::Uninitialized,
            remote: EndpointState::Uninitialized,
        }
    }

    #[inline]
    pub fn local(&self) -> EndpointState {
        self.local
    }

    #[inline]
    pub fn remote(&self) -> EndpointState {
        self.remote
    }

    #[inline]
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Both sides closed.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.local == EndpointState::Closed && self.remote == EndpointState::Closed
    }

    /// Check whether the pair matches both masks.
    #[inline]
    pub fn matches(&self, local: StateMask, remote: StateMask) -> bool {
        local.contains(self.local) && remote.contains(self.remote)
    }

    /// Validate a local `open` without applying it.
    pub fn check_open_local(&self) -> Result<()> {
        self.check(self.local == EndpointState::Uninitialized, "open")
    }

    /// Validate a local `close` without applying it.
    pub fn check_close_local(&self) -> Result<()> {
        self.check(self.local != EndpointState::Closed, "close")
    }

    /// Local `UNINITIALIZED → ACTIVE`.
    pub fn open_local(&mut self) -> Result<()> {
        self.check_open_local()?;
        self.local = EndpointState::Active;
        Ok(())
    }

    /// Local `UNINITIALIZED | ACTIVE → CLOSED`.
    pub fn close_local(&mut self) -> Result<()> {
        self.check_close_local()?;
        self.local = EndpointState::Closed;
        Ok(())
    }

    /// Remote `UNINITIALIZED → ACTIVE`, on the peer's opening performative.
    pub fn open_remote(&mut self) -> Result<()> {
        self.check(self.remote == EndpointState::Uninitialized, "remote-open")?;
        self.remote = EndpointState::Active;
        Ok(())
    }

    /// Remote `UNINITIALIZED | ACTIVE → CLOSED`, on the peer's closing performative.
    pub fn close_remote(&mut self) -> Result<()> {
        self.check(self.remote != EndpointState::Closed, "remote-close")?;
        self.remote = EndpointState::Closed;
        Ok(())
    }

    /// Fail with `operation` unless the local side is in `state`.
    pub(crate) fn require_local(&self, state: EndpointState, operation: &'static str) -> Result<()> {
        self.check(self.local == state, operation)
    }

    /// Fail with `operation` if the local side is already closed.
    pub(crate) fn require_not_closed(&self, operation: &'static str) -> Result<()> {
        self.check(self.local != EndpointState::Closed, operation)
    }

    /// Fail with `operation` unless the remote side is in `state`.
    pub(crate) fn require_remote(&self, state: EndpointState, operation: &'static str) -> Result<()> {
        self.check(self.remote == state, operation)
    }

    fn check(&self, allowed: bool, operation: &'static str) -> Result<()> {
        if self.is_terminal() {
            return Err(EngineError::EndpointClosed {
                endpoint: self.kind,
            });
        }
        if !allowed {
            return Err(EngineError::IllegalState {
                endpoint: self.kind,
                operation,
                local: self.local,
                remote: self.remote,
            });
        }
        Ok(())
    }
}
