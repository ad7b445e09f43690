//! Delivery: one message transfer on a link.

use bytes::Bytes;

use super::arena::handle_type;
use super::link::LinkId;
use crate::types::DeliveryState;

handle_type!(
    /// Handle to a [`Delivery`] owned by a [`Connection`](super::Connection).
    DeliveryId
);

/// A message transfer tracked until both sides settle it.
#[derive(Debug)]
pub struct Delivery {
    pub(crate) link: LinkId,
    pub(crate) tag: Bytes,
    /// Session-scoped transfer number.
    pub(crate) delivery_id: u32,
    pub(crate) payload: Bytes,
    pub(crate) local_state: Option<DeliveryState>,
    pub(crate) remote_state: Option<DeliveryState>,
    pub(crate) settled: bool,
    pub(crate) remote_settled: bool,
}

impl Delivery {
    pub(crate) fn new(link: LinkId, tag: Bytes, delivery_id: u32, payload: Bytes) -> Self {
        Self {
            link,
            tag,
            delivery_id,
            payload,
            local_state: None,
            remote_state: None,
            settled: false,
            remote_settled: false,
        }
    }

    /// Owning link.
    #[inline]
    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    #[inline]
    pub fn delivery_id(&self) -> u32 {
        self.delivery_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn local_state(&self) -> Option<&DeliveryState> {
        self.local_state.as_ref()
    }

    pub fn remote_state(&self) -> Option<&DeliveryState> {
        self.remote_state.as_ref()
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    #[inline]
    pub fn is_remote_settled(&self) -> bool {
        self.remote_settled
    }
}
