//! Connection negotiation.
//!
//! A two-message handshake (offer, answer) establishes the message channel without a
//! rendezvous server. Each side's description is exported as an opaque text payload
//! that the user carries across out-of-band (optical code, or pasted text for the
//! answer leg).
//!
//! ```text
//! initiator: Idle -> Offering -> AwaitingAnswer -> Connected
//! responder: Idle -> Answering -> Connected
//! any state -> Closed
//! ```

use crate::transport::{
    MessageChannel, PeerTransport, SdpType, SessionDescription, TransportError, TransportEvent,
};
use std::fmt;
use thiserror::Error;

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Starts sharing and creates the offer.
    Initiator,
    /// Joins by answering a scanned offer.
    Responder,
}

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
    #[default]
    Idle,
    /// Offer created, gathering candidates.
    Offering,
    /// Offer payload published, waiting for the remote answer.
    AwaitingAnswer,
    /// Answer created from a remote offer, waiting for the channel.
    Answering,
    Connected,
    /// Terminal. A new session is required to try again.
    Closed,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::Offering => "offering",
            NegotiationState::AwaitingAnswer => "awaiting-answer",
            NegotiationState::Answering => "answering",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Handshake errors.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Malformed negotiation payload: {0}")]
    MalformedPayload(String),
    #[error("Expected an {expected} description, got an {actual}")]
    UnexpectedDescription { expected: SdpType, actual: SdpType },
    #[error("Cannot {operation} while {state}")]
    OutOfSequence {
        operation: &'static str,
        state: NegotiationState,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for negotiation operations.
pub type NegotiationResult<T> = Result<T, NegotiationError>;

/// Encode a description as an exchange payload.
pub fn encode_payload(description: &SessionDescription) -> NegotiationResult<String> {
    serde_json::to_string(description).map_err(|e| NegotiationError::MalformedPayload(e.to_string()))
}

/// Decode an exchange payload. Surrounding whitespace (from pasting) is ignored.
pub fn decode_payload(payload: &str) -> NegotiationResult<SessionDescription> {
    let description: SessionDescription = serde_json::from_str(payload.trim())
        .map_err(|e| NegotiationError::MalformedPayload(e.to_string()))?;
    if description.sdp.trim().is_empty() {
        return Err(NegotiationError::MalformedPayload(
            "description has no sdp".to_string(),
        ));
    }
    Ok(description)
}

/// Events produced while negotiating.
pub enum NegotiationEvent {
    /// The local description is final; hand this payload to the other peer.
    LocalPayload(String),
    /// The message channel for this session exists (not necessarily open yet).
    ChannelAllocated(Box<dyn MessageChannel>),
}

impl fmt::Debug for NegotiationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationEvent::LocalPayload(payload) => f
                .debug_tuple("LocalPayload")
                .field(&payload.len())
                .finish(),
            NegotiationEvent::ChannelAllocated(channel) => f
                .debug_tuple("ChannelAllocated")
                .field(&channel.label())
                .finish(),
        }
    }
}

/// Drives one handshake over a [`PeerTransport`].
pub struct ConnectionNegotiator {
    transport: Box<dyn PeerTransport>,
    channel_label: String,
    role: Option<Role>,
    state: NegotiationState,
    local_payload: Option<String>,
    pending: Vec<NegotiationEvent>,
}

impl ConnectionNegotiator {
    pub fn new(transport: Box<dyn PeerTransport>, channel_label: impl Into<String>) -> Self {
        Self {
            transport,
            channel_label: channel_label.into(),
            role: None,
            state: NegotiationState::Idle,
            local_payload: None,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Role, once a handshake leg has started.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.state == NegotiationState::Connected
    }

    /// The finalized local payload, once gathering completed.
    pub fn local_payload(&self) -> Option<&str> {
        self.local_payload.as_deref()
    }

    /// Start the initiator leg: open the channel endpoint and create the offer.
    ///
    /// The payload is emitted by [`poll`](Self::poll) once candidate gathering ends.
    pub fn create_offer(&mut self) -> NegotiationResult<()> {
        self.expect_state("create an offer", NegotiationState::Idle)?;
        self.role = Some(Role::Initiator);

        let channel = self
            .transport
            .create_channel(&self.channel_label)
            .map_err(|e| self.abort(e.into()))?;
        let offer = self
            .transport
            .create_offer()
            .map_err(|e| self.abort(e.into()))?;
        self.transport
            .set_local_description(offer)
            .map_err(|e| self.abort(e.into()))?;

        self.pending.push(NegotiationEvent::ChannelAllocated(channel));
        self.state = NegotiationState::Offering;
        log::info!("Offer generated, gathering candidates");
        Ok(())
    }

    /// Start the responder leg from a scanned offer payload.
    pub fn accept_offer(&mut self, payload: &str) -> NegotiationResult<()> {
        self.expect_state("accept an offer", NegotiationState::Idle)?;
        self.role = Some(Role::Responder);

        let offer = decode_payload(payload).map_err(|e| self.abort(e))?;
        if offer.kind != SdpType::Offer {
            return Err(self.abort(NegotiationError::UnexpectedDescription {
                expected: SdpType::Offer,
                actual: offer.kind,
            }));
        }

        self.transport
            .set_remote_description(offer)
            .map_err(|e| self.abort(e.into()))?;
        let answer = self
            .transport
            .create_answer()
            .map_err(|e| self.abort(e.into()))?;
        self.transport
            .set_local_description(answer)
            .map_err(|e| self.abort(e.into()))?;

        self.state = NegotiationState::Answering;
        log::info!("Offer accepted, answer generated");
        Ok(())
    }

    /// Complete the initiator leg with the remote answer (scanned or pasted).
    ///
    /// The state stays [`NegotiationState::AwaitingAnswer`] until the channel opens.
    /// If connectivity never completes it stays there; there is no timeout.
    pub fn accept_answer(&mut self, payload: &str) -> NegotiationResult<()> {
        self.expect_state("accept an answer", NegotiationState::AwaitingAnswer)?;

        let answer = decode_payload(payload).map_err(|e| self.abort(e))?;
        if answer.kind != SdpType::Answer {
            return Err(self.abort(NegotiationError::UnexpectedDescription {
                expected: SdpType::Answer,
                actual: answer.kind,
            }));
        }
        if answer.candidates().next().is_none() {
            log::warn!("Answer carries no connectivity candidates");
        }

        self.transport
            .set_remote_description(answer)
            .map_err(|e| self.abort(e.into()))?;
        log::info!("Answer applied, waiting for channel");
        Ok(())
    }

    /// Drain negotiation progress (non-blocking).
    pub fn poll(&mut self) -> Vec<NegotiationEvent> {
        let mut events = std::mem::take(&mut self.pending);
        if self.state == NegotiationState::Closed {
            return events;
        }

        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Candidate(Some(candidate)) => {
                    log::debug!("Gathered {}", candidate);
                }
                TransportEvent::Candidate(None) => {
                    log::info!("Candidate gathering complete");
                    if let Some(payload) = self.finalize_local() {
                        events.push(NegotiationEvent::LocalPayload(payload));
                    }
                }
                TransportEvent::DataChannel(channel) => {
                    if self.role == Some(Role::Responder) {
                        log::debug!("Remote opened channel '{}'", channel.label());
                        events.push(NegotiationEvent::ChannelAllocated(channel));
                    } else {
                        log::warn!("Ignoring unsolicited channel '{}'", channel.label());
                    }
                }
            }
        }
        events
    }

    /// Build the payload from the gathered local description.
    fn finalize_local(&mut self) -> Option<String> {
        if !matches!(
            self.state,
            NegotiationState::Offering | NegotiationState::Answering
        ) {
            return None;
        }
        let description = self.transport.local_description()?;
        match encode_payload(&description) {
            Ok(payload) => {
                if self.state == NegotiationState::Offering {
                    self.state = NegotiationState::AwaitingAnswer;
                }
                log::info!("Local {} ready for exchange", description.kind);
                self.local_payload = Some(payload.clone());
                Some(payload)
            }
            Err(e) => {
                self.abort(e);
                None
            }
        }
    }

    /// The session's channel reported open.
    pub fn channel_opened(&mut self) {
        match self.state {
            NegotiationState::AwaitingAnswer | NegotiationState::Answering => {
                self.state = NegotiationState::Connected;
                log::info!("Connected");
            }
            state => log::debug!("Channel opened while {}", state),
        }
    }

    /// Tear the connection down. Terminal.
    pub fn close(&mut self) {
        if self.state != NegotiationState::Closed {
            log::info!("Session closed");
        }
        self.transport.close();
        self.state = NegotiationState::Closed;
        self.pending.clear();
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: NegotiationState,
    ) -> NegotiationResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NegotiationError::OutOfSequence {
                operation,
                state: self.state,
            })
        }
    }

    /// Abort the handshake. The user must start over.
    fn abort(&mut self, error: NegotiationError) -> NegotiationError {
        log::warn!("Negotiation failed: {}", error);
        self.close();
        error
    }
}
