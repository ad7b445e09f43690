//! State-filtered traversal over sessions and links.
//!
//! A cursor captures the endpoints that exist when it is created, in creation
//! order. The state masks are checked as the cursor advances, so an endpoint
//! whose state changes mid-traversal is judged by its current state, while an
//! endpoint created after the cursor is never visited.

use super::connection::Connection;
use super::endpoint::{EndpointStates, StateMask};
use super::link::LinkId;
use super::session::SessionId;

/// A handle whose endpoint states can be looked up on a connection.
pub trait EndpointHandle: Copy {
    /// Current states, or `None` if the handle no longer resolves.
    fn states(self, connection: &Connection) -> Option<EndpointStates>;
}

impl EndpointHandle for SessionId {
    fn states(self, connection: &Connection) -> Option<EndpointStates> {
        connection.sessions.get(self.0).map(|session| session.states)
    }
}

impl EndpointHandle for LinkId {
    fn states(self, connection: &Connection) -> Option<EndpointStates> {
        connection.links.get(self.0).map(|link| link.states)
    }
}

/// One pass over endpoints matching a local and a remote state mask.
#[derive(Debug, Clone)]
pub struct EndpointCursor<H> {
    ids: std::vec::IntoIter<H>,
    local: StateMask,
    remote: StateMask,
}

impl<H: EndpointHandle> EndpointCursor<H> {
    pub(crate) fn new(ids: Vec<H>, local: StateMask, remote: StateMask) -> Self {
        Self {
            ids: ids.into_iter(),
            local,
            remote,
        }
    }

    /// Advance to the next matching endpoint.
    ///
    /// Freed endpoints are skipped.
    pub fn next(&mut self, connection: &Connection) -> Option<H> {
        let (local, remote) = (self.local, self.remote);
        self.ids.by_ref().find(|id| {
            id.states(connection)
                .is_some_and(|states| states.matches(local, remote))
        })
    }

    /// Drain the rest of the pass into a vector.
    pub fn collect(mut self, connection: &Connection) -> Vec<H> {
        let mut out = Vec::new();
        while let Some(id) = self.next(connection) {
            out.push(id);
        }
        out
    }
}
