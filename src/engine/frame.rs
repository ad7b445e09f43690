//! Performatives and frames exchanged with the transport.
//!
//! The engine consumes inbound [`Frame`]s in arrival order and queues
//! outbound ones in the order local transitions happen. Byte-level framing
//! belongs to the transport; a frame here is the channel plus the decoded
//! performative.
//!
//! # Example
//!
//! ```
//! use amqp_engine::engine::{Frame, Performative};
//!
//! let frame = Frame::new(3, Performative::End { error: None });
//! assert_eq!(frame.channel(), 3);
//! assert_eq!(frame.name(), "end");
//! ```

use bytes::Bytes;

use super::endpoint::ErrorCondition;
use crate::types::{DeliveryState, LifetimePolicy};

/// Role of a link endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Role of the peer's end of the same link.
    #[inline]
    pub fn opposite(self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    #[inline]
    pub fn is_sender(self) -> bool {
        self == Role::Sender
    }
}

/// AMQP performatives handled by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Performative {
    Open {
        container_id: String,
        hostname: Option<String>,
        channel_max: u16,
        max_frame_size: u32,
        idle_timeout_ms: Option<u32>,
    },
    Begin {
        /// Sender's channel when answering a peer-initiated begin.
        remote_channel: Option<u16>,
    },
    Attach {
        name: String,
        handle: u32,
        role: Role,
        lifetime_policy: Option<LifetimePolicy>,
    },
    Transfer {
        handle: u32,
        delivery_id: u32,
        delivery_tag: Bytes,
        settled: bool,
        state: Option<DeliveryState>,
        payload: Bytes,
    },
    Disposition {
        /// Role of the endpoint sending the disposition.
        role: Role,
        first: u32,
        last: Option<u32>,
        settled: bool,
        state: Option<DeliveryState>,
    },
    Detach {
        handle: u32,
        error: Option<ErrorCondition>,
    },
    End {
        error: Option<ErrorCondition>,
    },
    Close {
        error: Option<ErrorCondition>,
    },
}

impl Performative {
    /// Performative name as defined by AMQP 1.0.
    pub fn name(&self) -> &'static str {
        match self {
            Performative::Open { .. } => "open",
            Performative::Begin { .. } => "begin",
            Performative::Attach { .. } => "attach",
            Performative::Transfer { .. } => "transfer",
            Performative::Disposition { .. } => "disposition",
            Performative::Detach { .. } => "detach",
            Performative::End { .. } => "end",
            Performative::Close { .. } => "close",
        }
    }

    /// Descriptor code of the performative.
    pub fn code(&self) -> u64 {
        match self {
            Performative::Open { .. } => 0x10,
            Performative::Begin { .. } => 0x11,
            Performative::Attach { .. } => 0x12,
            Performative::Transfer { .. } => 0x14,
            Performative::Disposition { .. } => 0x15,
            Performative::Detach { .. } => 0x16,
            Performative::End { .. } => 0x17,
            Performative::Close { .. } => 0x18,
        }
    }
}

/// A performative on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: u16,
    pub performative: Performative,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u16, performative: Performative) -> Self {
        Self {
            channel,
            performative,
        }
    }

    #[inline]
    pub fn channel(&self) -> u16 {
        self.channel
    }

    #[inline]
    pub fn performative(&self) -> &Performative {
        &self.performative
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.performative.name()
    }

    /// Check if this frame carries connection-level state (open/close).
    #[inline]
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self.performative,
            Performative::Open { .. } | Performative::Close { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_opposite() {
        assert_eq!(Role::Sender.opposite(), Role::Receiver);
        assert_eq!(Role::Receiver.opposite(), Role::Sender);
        assert!(Role::Sender.is_sender());
        assert!(!Role::Receiver.is_sender());
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(
            2,
            Performative::Detach {
                handle: 7,
                error: None,
            },
        );
        assert_eq!(frame.channel(), 2);
        assert_eq!(frame.name(), "detach");
        assert_eq!(frame.performative().code(), 0x16);
        assert!(!frame.is_connection_level());
    }

    #[test]
    fn test_connection_level_frames() {
        assert!(Frame::new(0, Performative::Close { error: None }).is_connection_level());
        assert!(!Frame::new(0, Performative::Begin { remote_channel: None }).is_connection_level());
    }

    #[test]
    fn test_performative_codes() {
        let open = Performative::Open {
            container_id: "c".into(),
            hostname: None,
            channel_max: 1,
            max_frame_size: 512,
            idle_timeout_ms: None,
        };
        assert_eq!(open.code(), 0x10);
        assert_eq!(Performative::End { error: None }.code(), 0x17);
    }
}
