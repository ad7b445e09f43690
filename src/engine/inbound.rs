//! Inbound frame processing.
//!
//! Frames are applied in arrival order. Each handler validates everything it
//! needs before the first write, so a rejected frame leaves the connection
//! exactly as it was.

use bytes::Bytes;

use super::arena::Arena;
use super::connection::{rejected, stale, Connection};
use super::delivery::{Delivery, DeliveryId};
use super::endpoint::{EndpointKind, EndpointState, ErrorCondition};
use super::frame::{Frame, Performative, Role};
use super::link::{Link, LinkId};
use super::session::{Session, SessionId};
use crate::error::{EngineError, Result};
use crate::types::{DeliveryState, LifetimePolicy};

impl Connection {
    /// Apply one inbound frame.
    ///
    /// # Errors
    ///
    /// Session-level frames before the peer's `open`, frames naming an
    /// unknown channel, handle or delivery id, and frames that would move a
    /// remote state backwards are rejected without changing anything.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        tracing::trace!(channel = frame.channel, performative = frame.name(), "Frame received");
        let Frame {
            channel,
            performative,
        } = frame;

        let result = match performative {
            Performative::Open {
                container_id,
                hostname,
                channel_max,
                max_frame_size,
                idle_timeout_ms,
            } => self.on_open(container_id, hostname, channel_max, max_frame_size, idle_timeout_ms),
            Performative::Close { error } => self.on_close(error),
            Performative::Begin { remote_channel } => self
                .require_remote_open()
                .and_then(|()| self.on_begin(channel, remote_channel)),
            Performative::Attach {
                name,
                handle,
                role,
                lifetime_policy,
            } => self
                .require_remote_open()
                .and_then(|()| self.on_attach(channel, name, handle, role, lifetime_policy)),
            Performative::Transfer {
                handle,
                delivery_id,
                delivery_tag,
                settled,
                state,
                payload,
            } => self.require_remote_open().and_then(|()| {
                self.on_transfer(channel, handle, delivery_id, delivery_tag, settled, state, payload)
            }),
            Performative::Disposition {
                role,
                first,
                last,
                settled,
                state,
            } => self
                .require_remote_open()
                .and_then(|()| self.on_disposition(channel, role, first, last, settled, state)),
            Performative::Detach { handle, error } => self
                .require_remote_open()
                .and_then(|()| self.on_detach(channel, handle, error)),
            Performative::End { error } => self
                .require_remote_open()
                .and_then(|()| self.on_end(channel, error)),
        };
        result.inspect_err(rejected("handle frame"))
    }

    fn require_remote_open(&self) -> Result<()> {
        self.states
            .require_remote(EndpointState::Active, "accept session frame on")
    }

    fn on_open(
        &mut self,
        container_id: String,
        hostname: Option<String>,
        channel_max: u16,
        max_frame_size: u32,
        idle_timeout_ms: Option<u32>,
    ) -> Result<()> {
        self.states.open_remote()?;
        tracing::debug!(container = %container_id, channel_max, max_frame_size, "Connection opened remotely");

        self.remote.container = Some(container_id);
        self.remote.hostname = hostname;
        self.remote.channel_max = Some(channel_max);
        self.remote.max_frame_size = Some(max_frame_size);
        self.remote.idle_timeout_ms = idle_timeout_ms;
        Ok(())
    }

    /// The peer can no longer end or detach anything, so every session and
    /// link it still holds open is closed on the remote side too.
    fn on_close(&mut self, error: Option<ErrorCondition>) -> Result<()> {
        self.states.close_remote()?;
        tracing::debug!(?error, "Connection closed remotely");
        self.remote_condition = error;
        for id in &self.session_order {
            if let Some(session) = self.sessions.get_mut(id.0) {
                close_remote_tree(session, &mut self.links)?;
            }
        }
        self.remote_channels.clear();
        Ok(())
    }

    fn on_begin(&mut self, channel: u16, remote_channel: Option<u16>) -> Result<()> {
        if let Some(&existing) = self.remote_channels.get(&channel) {
            // peer already has a session begun on this channel
            return self.session_mut(existing)?.states.open_remote();
        }

        let id = match remote_channel {
            Some(local) => {
                let id = *self
                    .channels
                    .get(&local)
                    .ok_or(EngineError::UnknownChannel(local))?;
                let session = self.session_mut(id)?;
                session.states.open_remote()?;
                session.remote_channel = Some(channel);
                id
            }
            None => {
                let local = self.allocate_channel()?;
                let id = self.insert_session(local);
                let session = self.session_mut(id)?;
                session.states.open_remote()?;
                session.remote_channel = Some(channel);
                id
            }
        };
        self.remote_channels.insert(channel, id);
        tracing::debug!(channel, ?remote_channel, "Session opened remotely");
        Ok(())
    }

    fn on_end(&mut self, channel: u16, error: Option<ErrorCondition>) -> Result<()> {
        let id = self.remote_session(channel)?;
        let session = self
            .sessions
            .get_mut(id.0)
            .ok_or_else(|| stale(EndpointKind::Session))?;
        session.states.close_remote()?;
        session.remote_condition = error;
        // links the peer did not detach first end with the session
        close_remote_tree(session, &mut self.links)?;
        self.remote_channels.remove(&channel);
        tracing::debug!(channel, "Session closed remotely");
        Ok(())
    }

    fn on_attach(
        &mut self,
        channel: u16,
        name: String,
        handle: u32,
        role: Role,
        lifetime_policy: Option<LifetimePolicy>,
    ) -> Result<()> {
        let session_id = self.remote_session(channel)?;
        let session = self.get_session(session_id)?;

        if let Some(&existing) = session.remote_handles.get(&handle) {
            return self.link_mut(existing)?.states.open_remote();
        }

        let local_role = role.opposite();
        let matched = session.links.iter().copied().find(|id| {
            self.links.get(id.0).is_some_and(|link| {
                link.name == name && link.role == local_role && link.remote_handle.is_none()
            })
        });

        let id = match matched {
            Some(id) => id,
            None => {
                let session = self
                    .sessions
                    .get_mut(session_id.0)
                    .ok_or_else(|| stale(EndpointKind::Session))?;
                let local_handle = session.allocate_handle();
                let id = LinkId(self.links.insert(Link::new(
                    session_id,
                    name.clone(),
                    local_role,
                    local_handle,
                )));
                session.links.push(id);
                id
            }
        };

        let link = self.link_mut(id)?;
        link.states.open_remote()?;
        link.remote_handle = Some(handle);
        link.remote_lifetime_policy = lifetime_policy;
        self.session_mut(session_id)?.remote_handles.insert(handle, id);
        tracing::debug!(%name, handle, ?role, "Link opened remotely");
        Ok(())
    }

    fn on_detach(&mut self, channel: u16, handle: u32, error: Option<ErrorCondition>) -> Result<()> {
        let session_id = self.remote_session(channel)?;
        let id = self.remote_link(session_id, handle)?;

        let link = self.link_mut(id)?;
        link.states.close_remote()?;
        link.remote_condition = error;
        self.session_mut(session_id)?.remote_handles.remove(&handle);
        tracing::debug!(handle, "Link closed remotely");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn on_transfer(
        &mut self,
        channel: u16,
        handle: u32,
        delivery_id: u32,
        tag: Bytes,
        settled: bool,
        state: Option<DeliveryState>,
        payload: Bytes,
    ) -> Result<()> {
        let session_id = self.remote_session(channel)?;
        let link_id = self.remote_link(session_id, handle)?;
        let link = self.get_link(link_id)?;
        if link.is_sender() {
            return Err(EngineError::IllegalState {
                endpoint: EndpointKind::Link,
                operation: "receive on sending",
                local: link.local_state(),
                remote: link.remote_state(),
            });
        }
        self.check_tag(link, &tag)?;
        if self.get_session(session_id)?.incoming.contains_key(&delivery_id) {
            return Err(EngineError::DuplicateDeliveryId(delivery_id));
        }

        let mut delivery = Delivery::new(link_id, tag.clone(), delivery_id, payload);
        delivery.remote_state = state;
        delivery.remote_settled = settled;
        let id = DeliveryId(self.deliveries.insert(delivery));

        let link = self
            .links
            .get_mut(link_id.0)
            .ok_or_else(|| stale(EndpointKind::Link))?;
        link.deliveries.push(id);
        if !settled {
            link.unsettled.insert(tag, id);
            self.session_mut(session_id)?.incoming.insert(delivery_id, id);
        }
        self.work.push(id);
        tracing::trace!(handle, delivery_id, settled, "Delivery received");
        Ok(())
    }

    fn on_disposition(
        &mut self,
        channel: u16,
        role: Role,
        first: u32,
        last: Option<u32>,
        settled: bool,
        state: Option<DeliveryState>,
    ) -> Result<()> {
        let session_id = self.remote_session(channel)?;
        let last = last.unwrap_or(first);
        if last < first {
            return Err(EngineError::Malformed(format!(
                "disposition range {first}..={last} is empty"
            )));
        }

        // the peer's role tells which of our halves the range refers to
        let session = self.get_session(session_id)?;
        let unsettled = match role {
            Role::Receiver => &session.outgoing,
            Role::Sender => &session.incoming,
        };
        let matched: Vec<(u32, DeliveryId)> = unsettled
            .range(first..=last)
            .map(|(delivery_id, id)| (*delivery_id, *id))
            .collect();
        if matched.is_empty() {
            return Err(EngineError::UnknownDeliveryId(first));
        }

        for (delivery_id, id) in matched {
            let delivery = self.delivery_mut(id)?;
            if state.is_some() {
                delivery.remote_state = state.clone();
            }
            if settled {
                delivery.remote_settled = true;
                let session = self.session_mut(session_id)?;
                match role {
                    Role::Receiver => session.outgoing.remove(&delivery_id),
                    Role::Sender => session.incoming.remove(&delivery_id),
                };
            }
            self.work.push(id);
            tracing::trace!(delivery_id, settled, "Remote disposition");
        }
        Ok(())
    }

    /// Session the peer has begun on `channel`.
    fn remote_session(&self, channel: u16) -> Result<SessionId> {
        self.remote_channels
            .get(&channel)
            .copied()
            .ok_or(EngineError::UnknownChannel(channel))
    }

    /// Local link bound to the peer's `handle`.
    fn remote_link(&self, session: SessionId, handle: u32) -> Result<LinkId> {
        self.get_session(session)?
            .remote_handles
            .get(&handle)
            .copied()
            .ok_or(EngineError::UnknownHandle(handle))
    }
}

/// Close the remote side of `session` and of each of its links that is not
/// closed yet. Remote handles are released.
fn close_remote_tree(session: &mut Session, links: &mut Arena<Link>) -> Result<()> {
    if session.states.remote() != EndpointState::Closed {
        session.states.close_remote()?;
    }
    session.remote_handles.clear();
    for id in &session.links {
        if let Some(link) = links.get_mut(id.0) {
            if link.states.remote() != EndpointState::Closed {
                link.states.close_remote()?;
                tracing::trace!(name = %link.name, "Link closed remotely with its session");
            }
        }
    }
    Ok(())
}
