//! Peer sessions.
//!
//! A [`PeerSession`] is one connection attempt: a negotiator plus, once allocated, the
//! synchronization channel. A [`Peer`] owns the drawing engine and at most one session
//! at a time. The drawing engine outlives sessions; closing or resetting a session
//! never touches the document.

use crate::channel::{MessageSink, SyncChannel, SyncEvent};
use crate::config::SessionConfig;
use crate::engine::{Command, DrawingEngine};
use crate::export::{self, ExportResult};
use crate::negotiation::{
    ConnectionNegotiator, NegotiationError, NegotiationEvent, NegotiationResult, NegotiationState,
    Role,
};
use crate::protocol::SyncMessage;
use crate::transport::PeerTransport;
use chrono::Local;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Progress reported by [`PeerSession::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The local payload is ready for the other peer.
    PayloadReady(String),
    /// The channel opened.
    Connected,
    /// A drawing intent from the remote peer.
    Message(SyncMessage),
    /// The channel closed. The session is over.
    Closed,
}

/// One connection attempt.
pub struct PeerSession {
    id: Uuid,
    negotiator: ConnectionNegotiator,
    channel: Option<SyncChannel>,
}

impl PeerSession {
    pub fn new(transport: Box<dyn PeerTransport>, channel_label: &str) -> Self {
        let id = Uuid::new_v4();
        log::debug!("Session {} created", id);
        Self {
            id,
            negotiator: ConnectionNegotiator::new(transport, channel_label),
            channel: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> NegotiationState {
        self.negotiator.state()
    }

    pub fn role(&self) -> Option<Role> {
        self.negotiator.role()
    }

    pub fn is_connected(&self) -> bool {
        self.negotiator.is_connected()
    }

    pub fn is_closed(&self) -> bool {
        self.negotiator.state() == NegotiationState::Closed
    }

    pub fn local_payload(&self) -> Option<&str> {
        self.negotiator.local_payload()
    }

    pub fn negotiator_mut(&mut self) -> &mut ConnectionNegotiator {
        &mut self.negotiator
    }

    /// Pump negotiation and channel events (non-blocking).
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        for event in self.negotiator.poll() {
            match event {
                NegotiationEvent::LocalPayload(payload) => {
                    events.push(SessionEvent::PayloadReady(payload));
                }
                NegotiationEvent::ChannelAllocated(channel) => {
                    self.channel = Some(SyncChannel::new(channel));
                }
            }
        }

        let Some(channel) = self.channel.as_mut() else {
            return events;
        };
        for event in channel.poll_events() {
            match event {
                SyncEvent::Opened => {
                    self.negotiator.channel_opened();
                    events.push(SessionEvent::Connected);
                }
                SyncEvent::Message(message) => events.push(SessionEvent::Message(message)),
                SyncEvent::Closed => {
                    log::info!(
                        "Session {} closed: {} sent, {} received, {} dropped",
                        self.id,
                        channel.sent_count(),
                        channel.received_count(),
                        channel.dropped_count()
                    );
                    self.negotiator.close();
                    events.push(SessionEvent::Closed);
                }
            }
        }
        events
    }

    /// Close the channel and the connection.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
        self.negotiator.close();
    }
}

impl MessageSink for PeerSession {
    fn send_message(&mut self, message: &SyncMessage) {
        self.channel.send_message(message);
    }
}

/// One participant: a drawing engine and at most one session.
pub struct Peer {
    config: SessionConfig,
    engine: DrawingEngine,
    session: Option<PeerSession>,
}

impl Peer {
    pub fn new(config: SessionConfig) -> Self {
        log::info!("Entered at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let engine = DrawingEngine::from_config(&config);
        Self {
            config,
            engine,
            session: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &DrawingEngine {
        &self.engine
    }

    pub fn session(&self) -> Option<&PeerSession> {
        self.session.as_ref()
    }

    /// Handshake state of the current session, `Idle` without one.
    pub fn state(&self) -> NegotiationState {
        self.session
            .as_ref()
            .map_or(NegotiationState::Idle, PeerSession::state)
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(PeerSession::is_connected)
    }

    fn ensure_no_active_session(&self, operation: &'static str) -> NegotiationResult<()> {
        match &self.session {
            Some(session) if !session.is_closed() => Err(NegotiationError::OutOfSequence {
                operation,
                state: session.state(),
            }),
            _ => Ok(()),
        }
    }

    /// Start sharing: create an offer. The payload arrives via [`poll`](Self::poll).
    pub fn start_sharing(&mut self, transport: Box<dyn PeerTransport>) -> NegotiationResult<()> {
        self.ensure_no_active_session("start sharing")?;
        let mut session = PeerSession::new(transport, &self.config.channel_label);
        let result = session.negotiator_mut().create_offer();
        self.session = Some(session);
        result
    }

    /// Join from a scanned offer payload.
    pub fn join(&mut self, transport: Box<dyn PeerTransport>, offer: &str) -> NegotiationResult<()> {
        self.ensure_no_active_session("join")?;
        let mut session = PeerSession::new(transport, &self.config.channel_label);
        let result = session.negotiator_mut().accept_offer(offer);
        self.session = Some(session);
        result
    }

    /// Complete sharing with the answer payload (scanned or pasted).
    pub fn accept_answer(&mut self, answer: &str) -> NegotiationResult<()> {
        match self.session.as_mut() {
            Some(session) => session.negotiator_mut().accept_answer(answer),
            None => Err(NegotiationError::OutOfSequence {
                operation: "accept an answer",
                state: NegotiationState::Idle,
            }),
        }
    }

    /// Pump the session and apply every remote message, in arrival order.
    ///
    /// A closed session is dropped after its events are returned.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let events = session.poll();
        for event in &events {
            if let SessionEvent::Message(message) = event {
                self.engine.apply_remote(message);
            }
        }
        if events.contains(&SessionEvent::Closed) {
            self.session = None;
        }
        events
    }

    /// Handle a local command, broadcasting over the session if connected.
    pub fn command(&mut self, command: Command) -> bool {
        self.engine.apply_local_command(command, &mut self.session)
    }

    /// Abort the current session. The drawing is kept.
    pub fn reset(&mut self) {
        if let Some(mut session) = self.session.take() {
            log::info!("Session {} reset", session.id());
            session.close();
        }
    }

    /// Save the composite into `dir`.
    pub fn export(&self, dir: &Path) -> ExportResult<PathBuf> {
        export::save_composite(dir, &self.config.export_prefix, self.engine.layers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryNetwork;

    fn payload(events: &[SessionEvent]) -> String {
        events
            .iter()
            .find_map(|event| match event {
                SessionEvent::PayloadReady(payload) => Some(payload.clone()),
                _ => None,
            })
            .unwrap()
    }

    fn connect(network: &MemoryNetwork, a: &mut Peer, b: &mut Peer) {
        a.start_sharing(Box::new(network.transport())).unwrap();
        let offer = payload(&a.poll());
        b.join(Box::new(network.transport()), &offer).unwrap();
        let answer = payload(&b.poll());
        a.accept_answer(&answer).unwrap();
        assert!(a.poll().contains(&SessionEvent::Connected));
        assert!(b.poll().contains(&SessionEvent::Connected));
    }

    #[test]
    fn test_connect_and_share_layer() {
        let network = MemoryNetwork::new();
        let mut a = Peer::new(SessionConfig::default());
        let mut b = Peer::new(SessionConfig::default());
        connect(&network, &mut a, &mut b);
        assert!(a.is_connected() && b.is_connected());

        assert!(a.command(Command::AddLayer));
        let events = b.poll();
        assert_eq!(events, vec![SessionEvent::Message(SyncMessage::AddLayer)]);
        assert_eq!(b.engine().layers().len(), 2);
    }

    #[test]
    fn test_drawing_offline_is_kept_local() {
        let mut a = Peer::new(SessionConfig::default());
        assert!(a.command(Command::AddLayer));
        assert_eq!(a.engine().layers().len(), 2);
        assert!(a.poll().is_empty());
    }

    #[test]
    fn test_second_session_refused_while_active() {
        let network = MemoryNetwork::new();
        let mut a = Peer::new(SessionConfig::default());
        a.start_sharing(Box::new(network.transport())).unwrap();
        assert!(matches!(
            a.start_sharing(Box::new(network.transport())),
            Err(NegotiationError::OutOfSequence { .. })
        ));

        a.reset();
        assert_eq!(a.state(), NegotiationState::Idle);
        assert!(a.start_sharing(Box::new(network.transport())).is_ok());
    }

    #[test]
    fn test_accept_answer_without_session() {
        let mut a = Peer::new(SessionConfig::default());
        assert!(matches!(
            a.accept_answer("{}"),
            Err(NegotiationError::OutOfSequence { .. })
        ));
    }

    #[test]
    fn test_close_ends_session_both_sides() {
        let network = MemoryNetwork::new();
        let mut a = Peer::new(SessionConfig::default());
        let mut b = Peer::new(SessionConfig::default());
        connect(&network, &mut a, &mut b);

        a.reset();
        assert!(a.session().is_none());
        assert_eq!(b.poll(), vec![SessionEvent::Closed]);
        assert!(b.session().is_none());
        assert_eq!(b.state(), NegotiationState::Idle);

        // Drawing continues locally after the session ends.
        assert!(b.command(Command::AddLayer));
    }

    #[test]
    fn test_failed_join_leaves_closed_session() {
        let network = MemoryNetwork::new();
        let mut b = Peer::new(SessionConfig::default());
        assert!(b.join(Box::new(network.transport()), "garbage").is_err());
        assert_eq!(b.state(), NegotiationState::Closed);
        // A closed session does not block a retry.
        assert!(b.join(Box::new(network.transport()), "garbage").is_err());
    }
}
