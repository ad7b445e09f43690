//! Connection-wide FIFO of deliveries awaiting application attention.
//!
//! Each delivery holds at most one position. The queue is a doubly linked
//! list threaded through a map keyed by delivery, so pushing, removing from
//! any position and stepping to the next entry are all constant time. A
//! delivery that leaves and is flagged again goes to the back.

use std::collections::HashMap;

use super::delivery::DeliveryId;

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: Option<DeliveryId>,
    next: Option<DeliveryId>,
}

#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    nodes: HashMap<DeliveryId, Node>,
    head: Option<DeliveryId>,
    tail: Option<DeliveryId>,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `delivery` unless it is already queued.
    ///
    /// Returns `true` if the delivery was added.
    pub(crate) fn push(&mut self, delivery: DeliveryId) -> bool {
        if self.nodes.contains_key(&delivery) {
            return false;
        }
        let node = Node {
            prev: self.tail,
            next: None,
        };
        match self.tail.and_then(|tail| self.nodes.get_mut(&tail)) {
            Some(tail) => tail.next = Some(delivery),
            None => self.head = Some(delivery),
        }
        self.tail = Some(delivery);
        self.nodes.insert(delivery, node);
        true
    }

    /// Remove `delivery` wherever it sits. Returns `true` if it was queued.
    pub(crate) fn remove(&mut self, delivery: DeliveryId) -> bool {
        let Some(Node { prev, next }) = self.nodes.remove(&delivery) else {
            return false;
        };
        match prev.and_then(|prev| self.nodes.get_mut(&prev)) {
            Some(node) => node.next = next,
            None => self.head = next,
        }
        match next.and_then(|next| self.nodes.get_mut(&next)) {
            Some(node) => node.prev = prev,
            None => self.tail = prev,
        }
        true
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<DeliveryId> {
        self.head
    }

    /// The delivery queued right after `delivery`, if `delivery` is queued.
    pub(crate) fn next_after(&self, delivery: DeliveryId) -> Option<DeliveryId> {
        self.nodes.get(&delivery)?.next
    }

    #[inline]
    pub(crate) fn contains(&self, delivery: DeliveryId) -> bool {
        self.nodes.contains_key(&delivery)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = DeliveryId> + '_ {
        std::iter::successors(self.head, |id| self.next_after(*id))
    }
}
