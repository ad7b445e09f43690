//! Link lifetime policies.
//!
//! Lifetime policies govern when a dynamically created node behind a link is
//! deleted. Each policy is a zero-field marker: its descriptor is its whole
//! identity.

use super::DescribedType;
use crate::codec::{Descriptor, Value};
use crate::error::Result;

described_marker!(
    /// Delete the node when the link that created it closes.
    DeleteOnClose,
    LifetimePolicy,
    0x0000_0000_0000_002b,
    "amqp:delete-on-close:list"
);

described_marker!(
    /// Delete the node once no links are attached to it.
    DeleteOnNoLinks,
    LifetimePolicy,
    0x0000_0000_0000_002c,
    "amqp:delete-on-no-links:list"
);

described_marker!(
    /// Delete the node once it holds no messages.
    DeleteOnNoMessages,
    LifetimePolicy,
    0x0000_0000_0000_002d,
    "amqp:delete-on-no-messages:list"
);

described_marker!(
    /// Delete the node once it has neither links nor messages.
    DeleteOnNoLinksOrMessages,
    LifetimePolicy,
    0x0000_0000_0000_002e,
    "amqp:delete-on-no-links-or-messages:list"
);

/// Lifetime policy attached to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifetimePolicy {
    DeleteOnClose(DeleteOnClose),
    DeleteOnNoLinks(DeleteOnNoLinks),
    DeleteOnNoMessages(DeleteOnNoMessages),
    DeleteOnNoLinksOrMessages(DeleteOnNoLinksOrMessages),
}

impl LifetimePolicy {
    pub fn descriptor(&self) -> Descriptor {
        match self {
            LifetimePolicy::DeleteOnClose(p) => p.descriptor(),
            LifetimePolicy::DeleteOnNoLinks(p) => p.descriptor(),
            LifetimePolicy::DeleteOnNoMessages(p) => p.descriptor(),
            LifetimePolicy::DeleteOnNoLinksOrMessages(p) => p.descriptor(),
        }
    }

    /// Always 0: lifetime policies carry no fields.
    #[inline]
    pub fn size(&self) -> usize {
        0
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        match self {
            LifetimePolicy::DeleteOnClose(p) => p.get(index),
            LifetimePolicy::DeleteOnNoLinks(p) => p.get(index),
            LifetimePolicy::DeleteOnNoMessages(p) => p.get(index),
            LifetimePolicy::DeleteOnNoLinksOrMessages(p) => p.get(index),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        match self {
            LifetimePolicy::DeleteOnClose(p) => p.to_value(),
            LifetimePolicy::DeleteOnNoLinks(p) => p.to_value(),
            LifetimePolicy::DeleteOnNoMessages(p) => p.to_value(),
            LifetimePolicy::DeleteOnNoLinksOrMessages(p) => p.to_value(),
        }
    }
}
