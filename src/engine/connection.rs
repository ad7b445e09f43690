//! Connection: the root endpoint.
//!
//! A [`Connection`] owns every session, link and delivery beneath it and hands
//! out `Copy` handles to them. Local operations validate first, then change
//! state and queue the matching outbound frame for the transport.
//!
//! # Example
//!
//! ```
//! use amqp_engine::engine::{Connection, StateMask};
//!
//! let mut connection = Connection::new();
//! connection.set_container("client-1").unwrap();
//! connection.open().unwrap();
//!
//! let session = connection.session().unwrap();
//! connection.open_session(session).unwrap();
//!
//! let mut cursor = connection.session_head(
//!     StateMask::ACTIVE,
//!     StateMask::UNINITIALIZED | StateMask::ACTIVE,
//! );
//! assert_eq!(cursor.next(&connection), Some(session));
//! assert_eq!(cursor.next(&connection), None);
//!
//! // open and begin are waiting for the transport
//! assert_eq!(connection.pending_frames(), 2);
//! ```

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use super::arena::Arena;
use super::cursor::EndpointCursor;
use super::delivery::{Delivery, DeliveryId};
use super::endpoint::{EndpointKind, EndpointState, EndpointStates, ErrorCondition, StateMask};
use super::frame::{Frame, Performative, Role};
use super::link::{Link, LinkId};
use super::session::{Session, SessionId};
use super::work_queue::WorkQueue;
use crate::config::ConnectionConfig;
use crate::error::{EngineError, Result};
use crate::types::{DeliveryState, LifetimePolicy};

/// Properties the peer announced in its `open`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RemoteProperties {
    pub(crate) container: Option<String>,
    pub(crate) hostname: Option<String>,
    pub(crate) channel_max: Option<u16>,
    pub(crate) max_frame_size: Option<u32>,
    pub(crate) idle_timeout_ms: Option<u32>,
}

/// Log a rejected operation before the error is returned.
pub(crate) fn rejected(operation: &'static str) -> impl FnOnce(&EngineError) {
    move |err| tracing::warn!(operation, error = %err, "Operation rejected")
}

#[inline]
pub(crate) fn stale(kind: EndpointKind) -> EngineError {
    EngineError::StaleHandle { kind }
}

/// Root endpoint of the engine.
///
/// Not thread-safe; callers serialize access to one connection.
#[derive(Debug)]
pub struct Connection {
    pub(crate) states: EndpointStates,
    /// Local identity and limits; container and hostname are editable until open.
    pub(crate) config: ConnectionConfig,
    pub(crate) remote: RemoteProperties,
    pub(crate) condition: Option<ErrorCondition>,
    pub(crate) remote_condition: Option<ErrorCondition>,
    pub(crate) sessions: Arena<Session>,
    /// Live sessions in creation order.
    pub(crate) session_order: Vec<SessionId>,
    pub(crate) links: Arena<Link>,
    pub(crate) deliveries: Arena<Delivery>,
    /// Local channel → session.
    pub(crate) channels: HashMap<u16, SessionId>,
    /// Peer channel → session, while the peer's half is begun.
    pub(crate) remote_channels: HashMap<u16, SessionId>,
    pub(crate) work: WorkQueue,
    pub(crate) outbound: VecDeque<Frame>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Create a connection with default configuration.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a connection seeded from `config`.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            states: EndpointStates::new(EndpointKind::Connection),
            config,
            remote: RemoteProperties::default(),
            condition: None,
            remote_condition: None,
            sessions: Arena::new(),
            session_order: Vec::new(),
            links: Arena::new(),
            deliveries: Arena::new(),
            channels: HashMap::new(),
            remote_channels: HashMap::new(),
            work: WorkQueue::new(),
            outbound: VecDeque::new(),
        }
    }

    // ---- connection endpoint ----

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

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open locally and queue `open`.
    pub fn open(&mut self) -> Result<()> {
        self.states.open_local().inspect_err(rejected("open connection"))?;
        tracing::debug!(container = ?self.config.container_id, "Connection opened locally");

        let open = Performative::Open {
            container_id: self.config.container_id.clone().unwrap_or_default(),
            hostname: self.config.hostname.clone(),
            channel_max: self.config.channel_max,
            max_frame_size: self.config.max_frame_size,
            idle_timeout_ms: self.config.idle_timeout_ms,
        };
        self.emit(0, open);
        Ok(())
    }

    /// Close locally. `close` is queued only if `open` was sent.
    pub fn close(&mut self) -> Result<()> {
        let was_open = self.states.local() == EndpointState::Active;
        self.states.close_local().inspect_err(rejected("close connection"))?;
        tracing::debug!("Connection closed locally");

        if was_open {
            let error = self.condition.clone();
            self.emit(0, Performative::Close { error });
        }
        Ok(())
    }

    /// Condition sent with `close`. Rejected once the connection is closed
    /// locally.
    pub fn set_condition(&mut self, condition: Option<ErrorCondition>) -> Result<()> {
        self.states
            .require_not_closed("set condition on")
            .inspect_err(rejected("set condition"))?;
        self.condition = condition;
        Ok(())
    }

    pub fn condition(&self) -> Option<&ErrorCondition> {
        self.condition.as_ref()
    }

    /// Condition the peer sent with its `close`.
    pub fn remote_condition(&self) -> Option<&ErrorCondition> {
        self.remote_condition.as_ref()
    }

    /// Set the local container id. Only allowed before `open`.
    pub fn set_container(&mut self, container: impl Into<String>) -> Result<()> {
        self.states
            .require_local(EndpointState::Uninitialized, "set container on")
            .inspect_err(rejected("set container"))?;
        self.config.container_id = Some(container.into());
        Ok(())
    }

    /// Set the requested virtual host. Only allowed before `open`.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) -> Result<()> {
        self.states
            .require_local(EndpointState::Uninitialized, "set hostname on")
            .inspect_err(rejected("set hostname"))?;
        self.config.hostname = Some(hostname.into());
        Ok(())
    }

    pub fn container(&self) -> Option<&str> {
        self.config.container_id.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.config.hostname.as_deref()
    }

    /// Container id announced by the peer, once its `open` arrived.
    pub fn remote_container(&self) -> Option<&str> {
        self.remote.container.as_deref()
    }

    pub fn remote_hostname(&self) -> Option<&str> {
        self.remote.hostname.as_deref()
    }

    pub fn remote_channel_max(&self) -> Option<u16> {
        self.remote.channel_max
    }

    pub fn remote_max_frame_size(&self) -> Option<u32> {
        self.remote.max_frame_size
    }

    pub fn remote_idle_timeout_ms(&self) -> Option<u32> {
        self.remote.idle_timeout_ms
    }

    // ---- sessions ----

    /// Create a session on the lowest free channel.
    ///
    /// # Errors
    ///
    /// `ChannelMax` when every channel up to the negotiated maximum is taken.
    pub fn session(&mut self) -> Result<SessionId> {
        self.states
            .require_not_closed("create session on")
            .inspect_err(rejected("create session"))?;
        let channel = self.allocate_channel()?;
        let id = self.insert_session(channel);
        tracing::debug!(channel, "Session created");
        Ok(id)
    }

    pub fn get_session(&self, id: SessionId) -> Result<&Session> {
        self.sessions
            .get(id.0)
            .ok_or_else(|| stale(EndpointKind::Session))
    }

    /// Open the session locally and queue `begin`. The connection must be open.
    pub fn open_session(&mut self, id: SessionId) -> Result<()> {
        self.states
            .require_local(EndpointState::Active, "open session on")
            .inspect_err(rejected("open session"))?;
        let session = self.session_mut(id)?;
        session
            .states
            .open_local()
            .inspect_err(rejected("open session"))?;
        let (channel, remote_channel) = (session.channel, session.remote_channel);
        tracing::debug!(channel, ?remote_channel, "Session opened locally");

        self.emit(channel, Performative::Begin { remote_channel });
        Ok(())
    }

    /// Close the session locally. `end` is queued only if `begin` was sent
    /// and the connection is still open.
    pub fn close_session(&mut self, id: SessionId) -> Result<()> {
        let live = self.live_channel(id);
        let session = self.session_mut(id)?;
        session
            .states
            .close_local()
            .inspect_err(rejected("close session"))?;
        let error = session.condition.clone();
        tracing::debug!(channel = session.channel, "Session closed locally");

        if let Some(channel) = live {
            self.emit(channel, Performative::End { error });
        }
        Ok(())
    }

    /// Condition sent with `end`.
    pub fn set_session_condition(
        &mut self,
        id: SessionId,
        condition: Option<ErrorCondition>,
    ) -> Result<()> {
        let session = self.session_mut(id)?;
        session
            .states
            .require_not_closed("set condition on")
            .inspect_err(rejected("set session condition"))?;
        session.condition = condition;
        Ok(())
    }

    /// Cursor over sessions matching both masks, in creation order.
    pub fn session_head(&self, local: StateMask, remote: StateMask) -> EndpointCursor<SessionId> {
        EndpointCursor::new(self.session_order.clone(), local, remote)
    }

    /// Release a session that is closed on both sides and has no links left.
    pub fn free_session(&mut self, id: SessionId) -> Result<()> {
        let session = self.get_session(id)?;
        if !session.states.is_terminal() || !session.links.is_empty() {
            let err = EngineError::IllegalState {
                endpoint: EndpointKind::Session,
                operation: "free",
                local: session.local_state(),
                remote: session.remote_state(),
            };
            rejected("free session")(&err);
            return Err(err);
        }
        let channel = session.channel;
        let remote_channel = session.remote_channel;

        self.channels.remove(&channel);
        if let Some(remote_channel) = remote_channel {
            if self.remote_channels.get(&remote_channel) == Some(&id) {
                self.remote_channels.remove(&remote_channel);
            }
        }
        self.session_order.retain(|s| *s != id);
        self.sessions.remove(id.0);
        tracing::debug!(channel, "Session freed");
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ---- links ----

    /// Create a sending link named `name` on `session`.
    pub fn sender(&mut self, session: SessionId, name: impl Into<String>) -> Result<LinkId> {
        self.create_link(session, name.into(), Role::Sender)
    }

    /// Create a receiving link named `name` on `session`.
    pub fn receiver(&mut self, session: SessionId, name: impl Into<String>) -> Result<LinkId> {
        self.create_link(session, name.into(), Role::Receiver)
    }

    pub fn get_link(&self, id: LinkId) -> Result<&Link> {
        self.links.get(id.0).ok_or_else(|| stale(EndpointKind::Link))
    }

    /// Set the lifetime policy sent in `attach`. Only allowed before the link opens.
    pub fn set_lifetime_policy(&mut self, id: LinkId, policy: LifetimePolicy) -> Result<()> {
        let link = self.link_mut(id)?;
        link.states
            .require_local(EndpointState::Uninitialized, "set lifetime policy on")
            .inspect_err(rejected("set lifetime policy"))?;
        link.lifetime_policy = Some(policy);
        Ok(())
    }

    /// Open the link locally and queue `attach`. The session must be open.
    pub fn open_link(&mut self, id: LinkId) -> Result<()> {
        let session_id = self.get_link(id)?.session;
        let channel = self
            .require_live_session(session_id, "open link on")
            .inspect_err(rejected("open link"))?;

        let link = self.link_mut(id)?;
        link.states.open_local().inspect_err(rejected("open link"))?;
        let attach = Performative::Attach {
            name: link.name.clone(),
            handle: link.handle,
            role: link.role,
            lifetime_policy: link.lifetime_policy,
        };
        tracing::debug!(name = %link.name, handle = link.handle, role = ?link.role, "Link opened locally");

        self.emit(channel, attach);
        Ok(())
    }

    /// Close the link locally. `detach` is queued only if `attach` was sent
    /// and the session is still open.
    pub fn close_link(&mut self, id: LinkId) -> Result<()> {
        let session_id = self.get_link(id)?.session;
        let live = self.live_channel(session_id);

        let link = self.link_mut(id)?;
        let was_open = link.local_state() == EndpointState::Active;
        link.states.close_local().inspect_err(rejected("close link"))?;
        let detach = Performative::Detach {
            handle: link.handle,
            error: link.condition.clone(),
        };
        tracing::debug!(name = %link.name, handle = link.handle, "Link closed locally");

        if let (true, Some(channel)) = (was_open, live) {
            self.emit(channel, detach);
        }
        Ok(())
    }

    /// Condition sent with `detach`.
    pub fn set_link_condition(&mut self, id: LinkId, condition: Option<ErrorCondition>) -> Result<()> {
        let link = self.link_mut(id)?;
        link.states
            .require_not_closed("set condition on")
            .inspect_err(rejected("set link condition"))?;
        link.condition = condition;
        Ok(())
    }

    /// Cursor over links matching both masks, ordered by session creation
    /// and then by link creation within each session.
    pub fn link_head(&self, local: StateMask, remote: StateMask) -> EndpointCursor<LinkId> {
        let ids = self
            .session_order
            .iter()
            .filter_map(|id| self.sessions.get(id.0))
            .flat_map(|session| session.links.iter().copied())
            .collect();
        EndpointCursor::new(ids, local, remote)
    }

    /// Release a link that is closed on both sides and holds no deliveries.
    pub fn free_link(&mut self, id: LinkId) -> Result<()> {
        let link = self.get_link(id)?;
        if !link.states.is_terminal() || !link.deliveries.is_empty() {
            let err = EngineError::IllegalState {
                endpoint: EndpointKind::Link,
                operation: "free",
                local: link.local_state(),
                remote: link.remote_state(),
            };
            rejected("free link")(&err);
            return Err(err);
        }
        let session_id = link.session;

        if let Some(session) = self.sessions.get_mut(session_id.0) {
            session.links.retain(|l| *l != id);
            session.remote_handles.retain(|_, l| *l != id);
        }
        self.links.remove(id.0);
        tracing::debug!("Link freed");
        Ok(())
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // ---- deliveries ----

    /// Send a message on a locally open sending link and queue `transfer`.
    ///
    /// # Errors
    ///
    /// `DeliveryTag` if `tag` is longer than the configured maximum or is
    /// already used by an unsettled delivery on this link.
    pub fn send(
        &mut self,
        link: LinkId,
        tag: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> Result<DeliveryId> {
        let (tag, payload) = (tag.into(), payload.into());
        let channel = self.check_send(link, &tag).inspect_err(rejected("send"))?;

        let link_ref = self
            .links
            .get_mut(link.0)
            .ok_or_else(|| stale(EndpointKind::Link))?;
        let session = self
            .sessions
            .get_mut(link_ref.session.0)
            .ok_or_else(|| stale(EndpointKind::Session))?;

        let delivery_id = session.allocate_delivery_id();
        let id = DeliveryId(self.deliveries.insert(Delivery::new(
            link,
            tag.clone(),
            delivery_id,
            payload.clone(),
        )));
        session.outgoing.insert(delivery_id, id);
        link_ref.deliveries.push(id);
        link_ref.unsettled.insert(tag.clone(), id);
        let handle = link_ref.handle;

        tracing::trace!(handle, delivery_id, len = payload.len(), "Delivery sent");
        self.emit(
            channel,
            Performative::Transfer {
                handle,
                delivery_id,
                delivery_tag: tag,
                settled: false,
                state: None,
                payload,
            },
        );
        Ok(id)
    }

    pub fn get_delivery(&self, id: DeliveryId) -> Result<&Delivery> {
        self.deliveries
            .get(id.0)
            .ok_or_else(|| stale(EndpointKind::Delivery))
    }

    /// Record a local outcome and queue an unsettled `disposition`.
    pub fn disposition(&mut self, id: DeliveryId, state: DeliveryState) -> Result<()> {
        let delivery = self.get_delivery(id)?;
        if delivery.settled {
            rejected("disposition")(&EngineError::AlreadySettled);
            return Err(EngineError::AlreadySettled);
        }
        let delivery_id = delivery.delivery_id;
        let link = self.get_link(delivery.link)?;
        let role = link.role;
        let live = self.live_channel(link.session);

        self.delivery_mut(id)?.local_state = Some(state.clone());
        tracing::trace!(delivery_id, ?state, "Local disposition");

        if let Some(channel) = live {
            self.emit(
                channel,
                Performative::Disposition {
                    role,
                    first: delivery_id,
                    last: None,
                    settled: false,
                    state: Some(state),
                },
            );
        }
        Ok(())
    }

    /// Settle locally.
    ///
    /// The delivery leaves the work queue and the link's unsettled window.
    /// A settled `disposition` is queued unless the peer settled first.
    pub fn settle(&mut self, id: DeliveryId) -> Result<()> {
        let delivery = self.get_delivery(id)?;
        if delivery.settled {
            rejected("settle")(&EngineError::AlreadySettled);
            return Err(EngineError::AlreadySettled);
        }
        let tag = delivery.tag.clone();
        let delivery_id = delivery.delivery_id;
        let remote_settled = delivery.remote_settled;
        let state = delivery.local_state.clone();
        let link_id = delivery.link;

        let link = self
            .links
            .get_mut(link_id.0)
            .ok_or_else(|| stale(EndpointKind::Link))?;
        if link.unsettled.get(&tag) == Some(&id) {
            link.unsettled.remove(&tag);
        }
        let (role, session_id) = (link.role, link.session);
        if let Some(session) = self.sessions.get_mut(session_id.0) {
            let unsettled = match role {
                Role::Sender => &mut session.outgoing,
                Role::Receiver => &mut session.incoming,
            };
            if unsettled.get(&delivery_id) == Some(&id) {
                unsettled.remove(&delivery_id);
            }
        }
        self.delivery_mut(id)?.settled = true;
        if self.work.remove(id) {
            tracing::trace!(delivery_id, "Settled delivery left the work queue");
        }
        tracing::trace!(delivery_id, remote_settled, "Delivery settled locally");

        if !remote_settled {
            if let Some(channel) = self.live_channel(session_id) {
                self.emit(
                    channel,
                    Performative::Disposition {
                        role,
                        first: delivery_id,
                        last: None,
                        settled: true,
                        state,
                    },
                );
            }
        }
        Ok(())
    }

    /// Release a locally settled delivery.
    pub fn free_delivery(&mut self, id: DeliveryId) -> Result<()> {
        let delivery = self.get_delivery(id)?;
        if !delivery.settled {
            rejected("free delivery")(&EngineError::NotSettled);
            return Err(EngineError::NotSettled);
        }
        let link = delivery.link;

        if let Some(link) = self.links.get_mut(link.0) {
            link.deliveries.retain(|d| *d != id);
        }
        self.work.remove(id);
        self.deliveries.remove(id.0);
        Ok(())
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }

    // ---- work queue ----

    /// Oldest delivery awaiting application attention.
    pub fn work_head(&self) -> Option<DeliveryId> {
        self.work.head()
    }

    /// Delivery queued after `id`, or `None` if `id` is last or not queued.
    pub fn work_next(&self, id: DeliveryId) -> Option<DeliveryId> {
        self.work.next_after(id)
    }

    /// Mark the delivery's pending work consumed.
    ///
    /// Returns `true` if it was queued. It rejoins the back of the queue on
    /// the next remote update.
    pub fn clear_work(&mut self, id: DeliveryId) -> Result<bool> {
        if !self.deliveries.contains(id.0) {
            return Err(stale(EndpointKind::Delivery));
        }
        let removed = self.work.remove(id);
        if removed {
            tracing::trace!("Work cleared");
        }
        Ok(removed)
    }

    #[inline]
    pub fn is_work_pending(&self, id: DeliveryId) -> bool {
        self.work.contains(id)
    }

    pub fn work_len(&self) -> usize {
        self.work.len()
    }

    /// Deliveries awaiting attention, oldest first.
    pub fn work(&self) -> impl Iterator<Item = DeliveryId> + '_ {
        self.work.iter()
    }

    // ---- outbound frames ----

    /// Next frame for the transport to write.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.outbound.pop_front()
    }

    #[inline]
    pub fn pending_frames(&self) -> usize {
        self.outbound.len()
    }

    // ---- internals ----

    pub(crate) fn emit(&mut self, channel: u16, performative: Performative) {
        tracing::trace!(channel, performative = performative.name(), "Frame queued");
        self.outbound.push_back(Frame::new(channel, performative));
    }

    /// Lowest free local channel under both sides' `channel_max`.
    pub(crate) fn allocate_channel(&self) -> Result<u16> {
        let limit = self
            .remote
            .channel_max
            .map_or(self.config.channel_max, |remote| remote.min(self.config.channel_max));
        (0..=limit)
            .find(|channel| !self.channels.contains_key(channel))
            .ok_or(EngineError::ChannelMax(limit))
    }

    pub(crate) fn insert_session(&mut self, channel: u16) -> SessionId {
        let id = SessionId(self.sessions.insert(Session::new(channel)));
        self.session_order.push(id);
        self.channels.insert(channel, id);
        id
    }

    pub(crate) fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions
            .get_mut(id.0)
            .ok_or_else(|| stale(EndpointKind::Session))
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> Result<&mut Link> {
        self.links.get_mut(id.0).ok_or_else(|| stale(EndpointKind::Link))
    }

    pub(crate) fn delivery_mut(&mut self, id: DeliveryId) -> Result<&mut Delivery> {
        self.deliveries
            .get_mut(id.0)
            .ok_or_else(|| stale(EndpointKind::Delivery))
    }

    /// Outgoing channel of `session` if frames can still be sent on it.
    pub(crate) fn live_channel(&self, session: SessionId) -> Option<u16> {
        if self.states.local() != EndpointState::Active {
            return None;
        }
        self.sessions
            .get(session.0)
            .filter(|session| session.local_state() == EndpointState::Active)
            .map(|session| session.channel)
    }

    /// Like [`live_channel`](Self::live_channel), but explains why not.
    fn require_live_session(&self, session: SessionId, operation: &'static str) -> Result<u16> {
        self.states.require_local(EndpointState::Active, operation)?;
        let session = self.get_session(session)?;
        session.states.require_local(EndpointState::Active, operation)?;
        Ok(session.channel)
    }

    fn create_link(&mut self, session_id: SessionId, name: String, role: Role) -> Result<LinkId> {
        let session = self
            .sessions
            .get_mut(session_id.0)
            .ok_or_else(|| stale(EndpointKind::Session))?;
        session
            .states
            .require_not_closed("create link on")
            .inspect_err(rejected("create link"))?;

        let handle = session.allocate_handle();
        tracing::debug!(%name, handle, ?role, "Link created");
        let id = LinkId(self.links.insert(Link::new(session_id, name, role, handle)));
        session.links.push(id);
        Ok(id)
    }

    /// Validate a tag against the size limit and the link's unsettled window.
    pub(crate) fn check_tag(&self, link: &Link, tag: &[u8]) -> Result<()> {
        let max = self.config.max_delivery_tag_len;
        if tag.len() > max {
            return Err(EngineError::DeliveryTag(format!(
                "{} bytes exceeds the maximum of {}",
                tag.len(),
                max
            )));
        }
        if link.unsettled.contains_key(tag) {
            return Err(EngineError::DeliveryTag(
                "already in the unsettled window".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a send and return the channel for its `transfer`.
    fn check_send(&self, link: LinkId, tag: &[u8]) -> Result<u16> {
        let link = self.get_link(link)?;
        if !link.is_sender() {
            return Err(EngineError::IllegalState {
                endpoint: EndpointKind::Link,
                operation: "send on receiving",
                local: link.local_state(),
                remote: link.remote_state(),
            });
        }
        link.states.require_local(EndpointState::Active, "send on")?;
        let channel = self.require_live_session(link.session, "send on")?;
        self.check_tag(link, tag)?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Accepted, DeleteOnClose, DeleteOnNoLinksOrMessages, Received};

    fn frames(connection: &mut Connection) -> Vec<Frame> {
        std::iter::from_fn(|| connection.pop_frame()).collect()
    }

    /// Open connection with one open session and one open sender link.
    fn open_sender() -> (Connection, SessionId, LinkId) {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let session = connection.session().unwrap();
        connection.open_session(session).unwrap();
        let link = connection.sender(session, "out").unwrap();
        connection.open_link(link).unwrap();
        frames(&mut connection);
        (connection, session, link)
    }

    #[test]
    fn test_open_emits_open_with_identity() {
        let mut connection = Connection::new();
        connection.set_container("c-1").unwrap();
        connection.set_hostname("vhost").unwrap();
        connection.open().unwrap();

        let frame = connection.pop_frame().unwrap();
        assert_eq!(frame.channel(), 0);
        match frame.performative {
            Performative::Open {
                container_id,
                hostname,
                channel_max,
                ..
            } => {
                assert_eq!(container_id, "c-1");
                assert_eq!(hostname.as_deref(), Some("vhost"));
                assert_eq!(channel_max, u16::MAX);
            }
            other => panic!("expected open, got {other:?}"),
        }
        assert_eq!(connection.local_state(), EndpointState::Active);
    }

    #[test]
    fn test_identity_locked_after_open() {
        let mut connection = Connection::new();
        connection.open().unwrap();

        let err = connection.set_container("late").unwrap_err();
        assert!(matches!(err, EngineError::IllegalState { .. }));
        assert!(connection.set_hostname("late").is_err());
        assert_eq!(connection.container(), None);
    }

    #[test]
    fn test_with_config_seeds_identity() {
        let config = ConnectionConfig::builder()
            .container_id("from-config")
            .build()
            .unwrap();
        let connection = Connection::with_config(config);
        assert_eq!(connection.container(), Some("from-config"));
        assert_eq!(connection.remote_container(), None);
    }

    #[test]
    fn test_close_without_open_sends_nothing() {
        let mut connection = Connection::new();
        connection.close().unwrap();
        assert_eq!(connection.local_state(), EndpointState::Closed);
        assert_eq!(connection.pending_frames(), 0);
    }

    #[test]
    fn test_close_carries_condition() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let condition = ErrorCondition::new("amqp:internal-error", Some("boom".into()));
        connection.set_condition(Some(condition.clone())).unwrap();
        connection.close().unwrap();

        let sent = frames(&mut connection);
        assert_eq!(
            sent[1].performative,
            Performative::Close {
                error: Some(condition)
            }
        );
    }

    #[test]
    fn test_conditions_locked_after_close() {
        let (mut connection, session, link) = open_sender();
        let condition = ErrorCondition::new("amqp:internal-error", None);

        connection.close_link(link).unwrap();
        let err = connection
            .set_link_condition(link, Some(condition.clone()))
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState { .. }));
        assert!(connection.get_link(link).unwrap().condition.is_none());

        connection.close_session(session).unwrap();
        assert!(connection
            .set_session_condition(session, Some(condition.clone()))
            .is_err());

        connection.close().unwrap();
        assert!(connection.set_condition(Some(condition)).is_err());
        assert!(connection.condition().is_none());
    }

    #[test]
    fn test_sessions_get_lowest_free_channel() {
        let mut connection = Connection::new();
        let a = connection.session().unwrap();
        let b = connection.session().unwrap();
        assert_eq!(connection.get_session(a).unwrap().channel(), 0);
        assert_eq!(connection.get_session(b).unwrap().channel(), 1);
        assert_eq!(connection.session_count(), 2);
    }

    #[test]
    fn test_channel_max_exhausted() {
        let config = ConnectionConfig::builder().channel_max(1).build().unwrap();
        let mut connection = Connection::with_config(config);
        connection.session().unwrap();
        connection.session().unwrap();
        assert!(matches!(
            connection.session(),
            Err(EngineError::ChannelMax(1))
        ));
    }

    #[test]
    fn test_open_session_requires_open_connection() {
        let mut connection = Connection::new();
        let session = connection.session().unwrap();

        let err = connection.open_session(session).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalState {
                endpoint: EndpointKind::Connection,
                ..
            }
        ));
        assert_eq!(
            connection.get_session(session).unwrap().local_state(),
            EndpointState::Uninitialized
        );
    }

    #[test]
    fn test_session_head_scenario() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let session = connection.session().unwrap();
        connection.open_session(session).unwrap();

        let found = connection
            .session_head(
                StateMask::ACTIVE,
                StateMask::UNINITIALIZED | StateMask::ACTIVE,
            )
            .collect(&connection);
        assert_eq!(found, vec![session]);
    }

    #[test]
    fn test_session_head_filters_and_orders() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let a = connection.session().unwrap();
        let b = connection.session().unwrap();
        let c = connection.session().unwrap();
        connection.open_session(a).unwrap();
        connection.open_session(c).unwrap();

        let active = connection
            .session_head(StateMask::ACTIVE, StateMask::ANY)
            .collect(&connection);
        assert_eq!(active, vec![a, c]);

        let idle = connection
            .session_head(StateMask::UNINITIALIZED, StateMask::ANY)
            .collect(&connection);
        assert_eq!(idle, vec![b]);

        assert!(connection
            .session_head(StateMask::CLOSED, StateMask::ANY)
            .collect(&connection)
            .is_empty());
    }

    #[test]
    fn test_cursor_excludes_later_sessions() {
        let mut connection = Connection::new();
        let first = connection.session().unwrap();
        let mut cursor = connection.session_head(StateMask::ANY, StateMask::ANY);
        let later = connection.session().unwrap();

        assert_eq!(cursor.next(&connection), Some(first));
        assert_eq!(cursor.next(&connection), None);

        let fresh = connection
            .session_head(StateMask::ANY, StateMask::ANY)
            .collect(&connection);
        assert_eq!(fresh, vec![first, later]);
    }

    #[test]
    fn test_link_head_flattens_sessions_in_order() {
        let mut connection = Connection::new();
        let s1 = connection.session().unwrap();
        let s2 = connection.session().unwrap();
        let l21 = connection.sender(s2, "a").unwrap();
        let l11 = connection.receiver(s1, "b").unwrap();
        let l12 = connection.sender(s1, "c").unwrap();

        let links = connection
            .link_head(StateMask::ANY, StateMask::ANY)
            .collect(&connection);
        assert_eq!(links, vec![l11, l12, l21]);
        assert_eq!(connection.link_count(), 3);
    }

    #[test]
    fn test_open_link_emits_attach_with_policy() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let session = connection.session().unwrap();
        connection.open_session(session).unwrap();
        let link = connection.receiver(session, "in").unwrap();
        connection
            .set_lifetime_policy(link, DeleteOnNoLinksOrMessages.into())
            .unwrap();
        connection.open_link(link).unwrap();

        let sent = frames(&mut connection);
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[2].performative,
            Performative::Attach {
                name: "in".into(),
                handle: 0,
                role: Role::Receiver,
                lifetime_policy: Some(DeleteOnNoLinksOrMessages.into()),
            }
        );

        assert!(connection
            .set_lifetime_policy(link, DeleteOnClose.into())
            .is_err());
    }

    #[test]
    fn test_open_link_requires_open_session() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let session = connection.session().unwrap();
        let link = connection.sender(session, "out").unwrap();

        let err = connection.open_link(link).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalState {
                endpoint: EndpointKind::Session,
                ..
            }
        ));
    }

    #[test]
    fn test_close_link_after_session_end_sends_no_detach() {
        let (mut connection, session, link) = open_sender();
        connection.close_session(session).unwrap();
        connection.close_link(link).unwrap();

        let sent = frames(&mut connection);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), "end");
    }

    #[test]
    fn test_send_emits_transfer() {
        let (mut connection, _, link) = open_sender();
        let d = connection.send(link, &b"t1"[..], &b"hello"[..]).unwrap();

        let delivery = connection.get_delivery(d).unwrap();
        assert_eq!(delivery.tag(), b"t1");
        assert_eq!(delivery.delivery_id(), 0);
        assert_eq!(delivery.link(), link);
        assert_eq!(connection.get_link(link).unwrap().unsettled(), 1);

        let frame = connection.pop_frame().unwrap();
        match frame.performative {
            Performative::Transfer {
                handle,
                delivery_id,
                delivery_tag,
                settled,
                payload,
                ..
            } => {
                assert_eq!(handle, 0);
                assert_eq!(delivery_id, 0);
                assert_eq!(&delivery_tag[..], b"t1");
                assert!(!settled);
                assert_eq!(&payload[..], b"hello");
            }
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn test_send_rejects_duplicate_and_long_tags() {
        let (mut connection, _, link) = open_sender();
        connection.send(link, &b"dup"[..], Bytes::new()).unwrap();

        let err = connection.send(link, &b"dup"[..], Bytes::new()).unwrap_err();
        assert!(matches!(err, EngineError::DeliveryTag(_)));

        let long = vec![0u8; 33];
        let err = connection.send(link, long, Bytes::new()).unwrap_err();
        assert!(err.to_string().contains("33 bytes"));
        assert_eq!(connection.delivery_count(), 1);
    }

    #[test]
    fn test_send_on_receiver_rejected() {
        let mut connection = Connection::new();
        connection.open().unwrap();
        let session = connection.session().unwrap();
        connection.open_session(session).unwrap();
        let link = connection.receiver(session, "in").unwrap();
        connection.open_link(link).unwrap();

        assert!(matches!(
            connection.send(link, &b"t"[..], Bytes::new()),
            Err(EngineError::IllegalState { .. })
        ));
    }

    #[test]
    fn test_settle_frees_tag_and_emits_disposition() {
        let (mut connection, session, link) = open_sender();
        let d = connection.send(link, &b"t"[..], Bytes::new()).unwrap();
        connection.pop_frame();

        connection.settle(d).unwrap();
        assert!(connection.get_delivery(d).unwrap().is_settled());
        assert_eq!(connection.get_link(link).unwrap().unsettled(), 0);
        assert!(connection.get_session(session).unwrap().outgoing.is_empty());

        assert_eq!(
            connection.pop_frame().unwrap().performative,
            Performative::Disposition {
                role: Role::Sender,
                first: 0,
                last: None,
                settled: true,
                state: None,
            }
        );

        assert!(matches!(
            connection.settle(d),
            Err(EngineError::AlreadySettled)
        ));
        // tag is reusable once settled
        connection.send(link, &b"t"[..], Bytes::new()).unwrap();
    }

    #[test]
    fn test_disposition_records_local_state() {
        let (mut connection, _, link) = open_sender();
        let d = connection.send(link, &b"t"[..], Bytes::new()).unwrap();
        let state = DeliveryState::from(Received::new(1, 10));
        connection.disposition(d, state.clone()).unwrap();

        assert_eq!(connection.get_delivery(d).unwrap().local_state(), Some(&state));
        connection.settle(d).unwrap();
        assert!(matches!(
            connection.disposition(d, Accepted.into()),
            Err(EngineError::AlreadySettled)
        ));
    }

    #[test]
    fn test_free_requires_terminal_and_empty() {
        let (mut connection, session, link) = open_sender();
        let d = connection.send(link, &b"t"[..], Bytes::new()).unwrap();

        assert!(matches!(
            connection.free_delivery(d),
            Err(EngineError::NotSettled)
        ));
        connection.settle(d).unwrap();
        connection.free_delivery(d).unwrap();
        assert!(matches!(
            connection.get_delivery(d),
            Err(EngineError::StaleHandle {
                kind: EndpointKind::Delivery
            })
        ));

        // locally closed only, not terminal
        connection.close_link(link).unwrap();
        assert!(connection.free_link(link).is_err());
        assert!(connection.free_session(session).is_err());
    }

    #[test]
    fn test_clear_work_on_stale_handle() {
        let (mut connection, _, link) = open_sender();
        let d = connection.send(link, &b"t"[..], Bytes::new()).unwrap();
        connection.settle(d).unwrap();
        connection.free_delivery(d).unwrap();

        assert!(connection.clear_work(d).is_err());
        assert_eq!(connection.work_head(), None);
    }
}
