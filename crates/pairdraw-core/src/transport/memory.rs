//! In-process transport.
//!
//! Two [`MemoryTransport`]s created from the same [`MemoryNetwork`] can negotiate
//! with each other by exchanging their description strings, exactly like two
//! browsers would. Used by tests and the headless demo.

use super::{
    ChannelEvent, MessageChannel, PeerTransport, ReadyState, SdpType, SessionDescription,
    TransportError, TransportEvent, TransportResult,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use uuid::Uuid;

const FINGERPRINT_PREFIX: &str = "a=fingerprint:memory ";
const FIRST_PORT: u16 = 50000;

/// Shared state of a channel: one event queue per side.
struct Pipe {
    label: String,
    state: ReadyState,
    queues: [VecDeque<ChannelEvent>; 2],
}

impl Pipe {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: ReadyState::Connecting,
            queues: [VecDeque::new(), VecDeque::new()],
        }
    }

    fn open(&mut self) {
        self.state = ReadyState::Open;
        for queue in &mut self.queues {
            queue.push_back(ChannelEvent::Open);
        }
    }

    fn close(&mut self) {
        if self.state == ReadyState::Closed {
            return;
        }
        // Connecting channels never opened, so they never report a close either.
        let was_open = self.state == ReadyState::Open;
        self.state = ReadyState::Closed;
        if was_open {
            for queue in &mut self.queues {
                queue.push_back(ChannelEvent::Close);
            }
        }
    }
}

/// One end of an in-process channel.
pub struct MemoryChannel {
    pipe: Rc<RefCell<Pipe>>,
    side: usize,
    label: String,
}

impl MemoryChannel {
    fn new(pipe: Rc<RefCell<Pipe>>, side: usize) -> Self {
        let label = pipe.borrow().label.clone();
        Self { pipe, side, label }
    }
}

impl MessageChannel for MemoryChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        self.pipe.borrow().state
    }

    fn send(&mut self, text: &str) -> TransportResult<()> {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.state != ReadyState::Open {
            return Err(TransportError::ChannelNotOpen);
        }
        pipe.queues[1 - self.side].push_back(ChannelEvent::Message(text.to_string()));
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<ChannelEvent> {
        self.pipe.borrow_mut().queues[self.side].drain(..).collect()
    }

    fn close(&mut self) {
        self.pipe.borrow_mut().close();
    }
}

#[derive(Default)]
struct Endpoint {
    events: Vec<TransportEvent>,
    pipe: Option<Rc<RefCell<Pipe>>>,
    remote: Option<Uuid>,
    closed: bool,
}

#[derive(Default)]
struct NetworkState {
    endpoints: HashMap<Uuid, Endpoint>,
    next_port: u16,
}

/// A shared in-process "network" that memory transports negotiate over.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Rc<RefCell<NetworkState>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh transport endpoint attached to this network.
    pub fn transport(&self) -> MemoryTransport {
        let id = Uuid::new_v4();
        self.inner.borrow_mut().endpoints.insert(id, Endpoint::default());
        MemoryTransport {
            id,
            network: self.clone(),
            local: None,
            remote: None,
            candidates: Vec::new(),
            gathering_complete: false,
            session_version: 0,
        }
    }

    fn allocate_port(&self) -> u16 {
        let mut net = self.inner.borrow_mut();
        let port = FIRST_PORT.wrapping_add(net.next_port);
        net.next_port = net.next_port.wrapping_add(1);
        port
    }

    fn endpoint_exists(&self, id: Uuid) -> bool {
        self.inner
            .borrow()
            .endpoints
            .get(&id)
            .is_some_and(|endpoint| !endpoint.closed)
    }

    fn with_endpoint<R>(&self, id: Uuid, f: impl FnOnce(&mut Endpoint) -> R) -> Option<R> {
        self.inner.borrow_mut().endpoints.get_mut(&id).map(f)
    }

    /// Join an initiator's pending channel with the responder that answered it.
    fn link(&self, initiator: Uuid, responder: Uuid) -> TransportResult<()> {
        let mut net = self.inner.borrow_mut();

        let answered_us = net
            .endpoints
            .get(&responder)
            .and_then(|endpoint| endpoint.remote);
        if answered_us != Some(initiator) {
            return Err(TransportError::InvalidDescription(
                "answer was not created for this offer".to_string(),
            ));
        }

        let pipe = net
            .endpoints
            .get(&initiator)
            .and_then(|endpoint| endpoint.pipe.clone())
            .ok_or_else(|| TransportError::Other("no channel to connect".to_string()))?;

        if pipe.borrow().state != ReadyState::Connecting {
            return Err(TransportError::InvalidDescription(
                "channel already negotiated".to_string(),
            ));
        }
        pipe.borrow_mut().open();

        let endpoint = net
            .endpoints
            .get_mut(&responder)
            .ok_or(TransportError::Closed)?;
        endpoint.pipe = Some(pipe.clone());
        endpoint
            .events
            .push(TransportEvent::DataChannel(Box::new(MemoryChannel::new(pipe, 1))));

        log::debug!("Memory network linked {} <-> {}", initiator, responder);
        Ok(())
    }
}

/// A transport endpoint on a [`MemoryNetwork`].
pub struct MemoryTransport {
    id: Uuid,
    network: MemoryNetwork,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    candidates: Vec<String>,
    gathering_complete: bool,
    session_version: u32,
}

impl MemoryTransport {
    /// Endpoint identifier (embedded in descriptions as the fingerprint).
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.network.endpoint_exists(self.id) {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    fn describe(&mut self, kind: SdpType) -> SessionDescription {
        self.session_version += 1;
        let setup = match kind {
            SdpType::Offer => "actpass",
            SdpType::Answer => "active",
        };
        let sdp = format!(
            "v=0\r\n\
             o=- {session} {version} IN IP4 127.0.0.1\r\n\
             s=-\r\n\
             t=0 0\r\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
             c=IN IP4 0.0.0.0\r\n\
             a=mid:0\r\n\
             {FINGERPRINT_PREFIX}{id}\r\n\
             a=setup:{setup}\r\n\
             a=sctp-port:5000\r\n",
            session = self.id.as_u128() as u64,
            version = self.session_version,
            id = self.id,
        );
        SessionDescription::new(kind, sdp)
    }
}

/// Extract the endpoint identifier from a description.
fn endpoint_of(description: &SessionDescription) -> TransportResult<Uuid> {
    let value = description
        .sdp
        .lines()
        .find_map(|line| line.strip_prefix(FINGERPRINT_PREFIX))
        .ok_or_else(|| TransportError::InvalidDescription("missing fingerprint".to_string()))?;
    Uuid::parse_str(value.trim())
        .map_err(|e| TransportError::InvalidDescription(format!("bad fingerprint: {}", e)))
}

impl PeerTransport for MemoryTransport {
    fn create_channel(&mut self, label: &str) -> TransportResult<Box<dyn MessageChannel>> {
        self.ensure_open()?;
        let pipe = Rc::new(RefCell::new(Pipe::new(label)));
        self.network
            .with_endpoint(self.id, |endpoint| endpoint.pipe = Some(pipe.clone()))
            .ok_or(TransportError::Closed)?;
        Ok(Box::new(MemoryChannel::new(pipe, 0)))
    }

    fn create_offer(&mut self) -> TransportResult<SessionDescription> {
        self.ensure_open()?;
        let has_channel = self
            .network
            .with_endpoint(self.id, |endpoint| endpoint.pipe.is_some())
            .unwrap_or(false);
        if !has_channel {
            return Err(TransportError::Other(
                "an offer needs a channel to negotiate".to_string(),
            ));
        }
        Ok(self.describe(SdpType::Offer))
    }

    fn create_answer(&mut self) -> TransportResult<SessionDescription> {
        self.ensure_open()?;
        match &self.remote {
            Some(remote) if remote.kind == SdpType::Offer => Ok(self.describe(SdpType::Answer)),
            _ => Err(TransportError::Other(
                "cannot answer without a remote offer".to_string(),
            )),
        }
    }

    fn set_local_description(&mut self, description: SessionDescription) -> TransportResult<()> {
        self.ensure_open()?;
        if endpoint_of(&description)? != self.id {
            return Err(TransportError::InvalidDescription(
                "local description belongs to another endpoint".to_string(),
            ));
        }
        self.local = Some(description);
        self.candidates.clear();
        self.gathering_complete = false;

        // Loopback has exactly one host candidate; gathering finishes right away but is
        // reported through events like any other transport.
        let port = self.network.allocate_port();
        let candidate = format!("candidate:1 1 udp 2122260223 127.0.0.1 {} typ host", port);
        self.candidates.push(candidate.clone());
        self.gathering_complete = true;
        self.network.with_endpoint(self.id, |endpoint| {
            endpoint.events.push(TransportEvent::Candidate(Some(candidate)));
            endpoint.events.push(TransportEvent::Candidate(None));
        });
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> TransportResult<()> {
        self.ensure_open()?;
        let remote_id = endpoint_of(&description)?;
        if remote_id == self.id {
            return Err(TransportError::InvalidDescription(
                "remote description is our own".to_string(),
            ));
        }
        if !self.network.endpoint_exists(remote_id) {
            return Err(TransportError::InvalidDescription(
                "unknown remote endpoint".to_string(),
            ));
        }

        let reachable = description.candidates().next().is_some();
        let kind = description.kind;
        match kind {
            SdpType::Offer => {
                if self.local.is_some() {
                    return Err(TransportError::InvalidDescription(
                        "offer received after local description".to_string(),
                    ));
                }
            }
            SdpType::Answer => {
                let offered = self
                    .local
                    .as_ref()
                    .is_some_and(|local| local.kind == SdpType::Offer);
                if !offered {
                    return Err(TransportError::InvalidDescription(
                        "answer received without a local offer".to_string(),
                    ));
                }
            }
        }

        self.network
            .with_endpoint(self.id, |endpoint| endpoint.remote = Some(remote_id))
            .ok_or(TransportError::Closed)?;
        self.remote = Some(description);

        if kind == SdpType::Answer {
            if reachable {
                self.network.link(self.id, remote_id)?;
            } else {
                log::debug!("Answer carries no candidates; connectivity cannot complete");
            }
        }
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        let local = self.local.as_ref()?;
        let mut sdp = local.sdp.clone();
        for candidate in &self.candidates {
            sdp.push_str("a=");
            sdp.push_str(candidate);
            sdp.push_str("\r\n");
        }
        if self.gathering_complete {
            sdp.push_str("a=end-of-candidates\r\n");
        }
        Some(SessionDescription::new(local.kind, sdp))
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.network
            .with_endpoint(self.id, |endpoint| std::mem::take(&mut endpoint.events))
            .unwrap_or_default()
    }

    fn close(&mut self) {
        let pipe = self.network.with_endpoint(self.id, |endpoint| {
            endpoint.closed = true;
            endpoint.events.clear();
            endpoint.pipe.take()
        });
        if let Some(Some(pipe)) = pipe {
            pipe.borrow_mut().close();
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
        self.network.inner.borrow_mut().endpoints.remove(&self.id);
    }
}
