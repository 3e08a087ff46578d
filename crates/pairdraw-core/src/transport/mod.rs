//! Peer transport abstraction.
//!
//! The negotiation core never talks to a concrete peer-to-peer stack. It drives a
//! [`PeerTransport`], which can describe the local endpoint (offer/answer), gather
//! connectivity candidates, and hand out an ordered, reliable [`MessageChannel`]
//! once both descriptions are in place.
//!
//! Events are collected by the implementation and must be polled, the same way the
//! event loop polls every other source.

mod memory;

pub use memory::{MemoryChannel, MemoryNetwork, MemoryTransport};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Channel is not open")]
    ChannelNotOpen,
    #[error("Invalid session description: {0}")]
    InvalidDescription(String),
    #[error("Transport is closed")]
    Closed,
    #[error("Transport error: {0}")]
    Other(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => f.write_str("offer"),
            SdpType::Answer => f.write_str("answer"),
        }
    }
}

/// A connection description (`{"type": "offer", "sdp": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    /// Connectivity candidates carried by this description.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.sdp
            .lines()
            .filter_map(|line| line.strip_prefix("a="))
            .filter(|attr| attr.starts_with("candidate:"))
    }
}

/// Ready state of a message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events raised by a message channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel became open.
    Open,
    /// A text message arrived from the remote peer.
    Message(String),
    /// The channel closed (either side).
    Close,
}

/// An ordered, reliable, bidirectional text channel between two peers.
pub trait MessageChannel {
    /// Channel label agreed during negotiation.
    fn label(&self) -> &str;

    /// Current ready state.
    fn ready_state(&self) -> ReadyState;

    /// Send a text message. Fails unless the channel is open.
    fn send(&mut self, text: &str) -> TransportResult<()>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<ChannelEvent>;

    /// Close the channel.
    fn close(&mut self);
}

/// Events raised by a transport during negotiation.
pub enum TransportEvent {
    /// A connectivity candidate was gathered. `None` marks the end of gathering.
    Candidate(Option<String>),
    /// The remote peer opened a channel toward us (responder side).
    DataChannel(Box<dyn MessageChannel>),
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Candidate(candidate) => {
                f.debug_tuple("Candidate").field(candidate).finish()
            }
            TransportEvent::DataChannel(channel) => f
                .debug_struct("DataChannel")
                .field("label", &channel.label())
                .field("ready_state", &channel.ready_state())
                .finish(),
        }
    }
}

/// The peer-to-peer connection primitive.
///
/// Everything runs on one cooperative event loop, so implementations are not
/// required to be `Send`.
pub trait PeerTransport {
    /// Open the local end of a message channel (initiator only). The channel stays
    /// in [`ReadyState::Connecting`] until the handshake completes.
    fn create_channel(&mut self, label: &str) -> TransportResult<Box<dyn MessageChannel>>;

    /// Generate an offer description.
    fn create_offer(&mut self) -> TransportResult<SessionDescription>;

    /// Generate an answer to the remote offer.
    fn create_answer(&mut self) -> TransportResult<SessionDescription>;

    /// Install the local description and start candidate gathering.
    fn set_local_description(&mut self, description: SessionDescription) -> TransportResult<()>;

    /// Install the remote description.
    fn set_remote_description(&mut self, description: SessionDescription)
    -> TransportResult<()>;

    /// Local description including every candidate gathered so far.
    fn local_description(&self) -> Option<SessionDescription>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Tear down the connection and any channel it carries.
    fn close(&mut self);
}
