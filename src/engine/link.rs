//! Link endpoint.

use std::collections::HashMap;

use bytes::Bytes;

use super::arena::handle_type;
use super::delivery::DeliveryId;
use super::endpoint::{EndpointKind, EndpointState, EndpointStates, ErrorCondition};
use super::frame::Role;
use super::session::SessionId;
use crate::types::LifetimePolicy;

handle_type!(
    /// Handle to a [`Link`] owned by a [`Connection`](super::Connection).
    LinkId
);

/// A unidirectional route between a sender and a receiver.
#[derive(Debug)]
pub struct Link {
    pub(crate) states: EndpointStates,
    pub(crate) session: SessionId,
    pub(crate) name: String,
    pub(crate) role: Role,
    /// Local handle, sent in attach/detach/transfer.
    pub(crate) handle: u32,
    pub(crate) remote_handle: Option<u32>,
    pub(crate) lifetime_policy: Option<LifetimePolicy>,
    pub(crate) remote_lifetime_policy: Option<LifetimePolicy>,
    /// Live delivery records in creation order.
    pub(crate) deliveries: Vec<DeliveryId>,
    /// Unsettled deliveries by tag; a tag is unique within this window.
    pub(crate) unsettled: HashMap<Bytes, DeliveryId>,
    pub(crate) condition: Option<ErrorCondition>,
    pub(crate) remote_condition: Option<ErrorCondition>,
}

impl Link {
    pub(crate) fn new(session: SessionId, name: String, role: Role, handle: u32) -> Self {
        Self {
            states: EndpointStates::new(EndpointKind::Link),
            session,
            name,
            role,
            handle,
            remote_handle: None,
            lifetime_policy: None,
            remote_lifetime_policy: None,
            deliveries: Vec::new(),
            unsettled: HashMap::new(),
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

    /// Owning session.
    #[inline]
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn is_sender(&self) -> bool {
        self.role.is_sender()
    }

    #[inline]
    pub fn handle(&self) -> u32 {
        self.handle
    }

    #[inline]
    pub fn remote_handle(&self) -> Option<u32> {
        self.remote_handle
    }

    pub fn lifetime_policy(&self) -> Option<LifetimePolicy> {
        self.lifetime_policy
    }

    /// Lifetime policy the peer attached with.
    pub fn remote_lifetime_policy(&self) -> Option<LifetimePolicy> {
        self.remote_lifetime_policy
    }

    /// Deliveries still held by this link, oldest first.
    pub fn deliveries(&self) -> &[DeliveryId] {
        &self.deliveries
    }

    /// Number of unsettled deliveries.
    pub fn unsettled(&self) -> usize {
        self.unsettled.len()
    }

    pub fn condition(&self) -> Option<&ErrorCondition> {
        self.condition.as_ref()
    }

    pub fn remote_condition(&self) -> Option<&ErrorCondition> {
        self.remote_condition.as_ref()
    }
}
