//! Session endpoint.

use std::collections::{BTreeMap, HashMap};

use super::arena::handle_type;
use super::delivery::DeliveryId;
use super::endpoint::{EndpointKind, EndpointState, EndpointStates, ErrorCondition};
use super::link::LinkId;

handle_type!(
    /// Handle to a [`Session`] owned by a [`Connection`](super::Connection).
    SessionId
);

/// A session: a bidirectional channel of links within a connection.
#[derive(Debug)]
pub struct Session {
    pub(crate) states: EndpointStates,
    /// Outgoing channel number.
    pub(crate) channel: u16,
    /// Channel the peer uses for this session, once it has begun.
    pub(crate) remote_channel: Option<u16>,
    /// Links in creation order.
    pub(crate) links: Vec<LinkId>,
    /// Peer's link handles → local link.
    pub(crate) remote_handles: HashMap<u32, LinkId>,
    pub(crate) next_handle: u32,
    pub(crate) next_outgoing_id: u32,
    /// Unsettled deliveries we sent, by delivery id.
    pub(crate) outgoing: BTreeMap<u32, DeliveryId>,
    /// Unsettled deliveries we received, by delivery id.
    pub(crate) incoming: BTreeMap<u32, DeliveryId>,
    pub(crate) condition: Option<ErrorCondition>,
    pub(crate) remote_condition: Option<ErrorCondition>,
}

impl Session {
    pub(crate) fn new(channel: u16) -> Self {
        Self {
            states: EndpointStates::new(EndpointKind::Session),
            channel,
            remote_channel: None,
            links: Vec::new(),
            remote_handles: HashMap::new(),
            next_handle: 0,
            next_outgoing_id: 0,
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
            condition: None,
            remote_condition: None,
        }
    }

    #[inline]
    pub fn local_state(&self) -> EndpointState {
        self.states.local()
    }

    #[inline]
    pub fn remote_state(&self) -> EndpointState {
        self.states.remote()
    }

    #[inline]
    pub fn states(&self) -> EndpointStates {
        self.states
    }

    /// Local outgoing channel.
    #[inline]
    pub fn channel(&self) -> u16 {
        self.channel
    }

    #[inline]
    pub fn remote_channel(&self) -> Option<u16> {
        self.remote_channel
    }

    /// Links of this session in creation order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn condition(&self) -> Option<&ErrorCondition> {
        self.condition.as_ref()
    }

    pub fn remote_condition(&self) -> Option<&ErrorCondition> {
        self.remote_condition.as_ref()
    }

    /// Allocate the next local link handle.
    pub(crate) fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }

    /// Allocate the next outgoing delivery id.
    pub(crate) fn allocate_delivery_id(&mut self) -> u32 {
        let id = self.next_outgoing_id;
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        id
    }
}
