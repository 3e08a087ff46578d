//! Synchronization channel.
//!
//! Wraps one established [`MessageChannel`] and speaks the drawing protocol over it.
//! Sending is fire-and-forget and silently does nothing until the channel is open.
//! Received records are decoded in arrival order; anything malformed or of an
//! unknown type is dropped without disturbing the session.

use crate::protocol::{self, SyncMessage};
use crate::transport::{ChannelEvent, MessageChannel, ReadyState};

/// Events surfaced by a [`SyncChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The channel opened. Reported once per channel.
    Opened,
    /// A valid message from the remote peer.
    Message(SyncMessage),
    /// The channel closed. Reported once per channel.
    Closed,
}

/// Destination for outgoing drawing intents.
pub trait MessageSink {
    /// Deliver a message, or drop it if delivery is impossible right now.
    fn send_message(&mut self, message: &SyncMessage);
}

impl MessageSink for Vec<SyncMessage> {
    fn send_message(&mut self, message: &SyncMessage) {
        self.push(message.clone());
    }
}

impl<S: MessageSink> MessageSink for Option<S> {
    fn send_message(&mut self, message: &SyncMessage) {
        if let Some(sink) = self {
            sink.send_message(message);
        }
    }
}

/// Protocol endpoint over an ordered, reliable message channel.
pub struct SyncChannel {
    inner: Box<dyn MessageChannel>,
    opened: bool,
    closed: bool,
    sent: u64,
    received: u64,
    dropped: u64,
}

impl SyncChannel {
    /// Wrap a channel (usually still connecting).
    pub fn new(inner: Box<dyn MessageChannel>) -> Self {
        Self {
            inner,
            opened: false,
            closed: false,
            sent: 0,
            received: 0,
            dropped: 0,
        }
    }

    pub fn label(&self) -> &str {
        self.inner.label()
    }

    pub fn ready_state(&self) -> ReadyState {
        if self.closed {
            ReadyState::Closed
        } else {
            self.inner.ready_state()
        }
    }

    /// Whether sends will be delivered.
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Send a message. A no-op unless the channel is open.
    pub fn send(&mut self, message: &SyncMessage) {
        if !self.is_open() {
            log::debug!("Channel not open, dropping outgoing {}", message.kind());
            return;
        }
        let text = match protocol::encode(message) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Failed to encode {}: {}", message.kind(), e);
                return;
            }
        };
        match self.inner.send(&text) {
            Ok(()) => {
                self.sent += 1;
                log::debug!("Sent {}", message.kind());
            }
            Err(e) => log::warn!("Send of {} failed: {}", message.kind(), e),
        }
    }

    /// Drain pending events (non-blocking), in the order the remote peer sent them.
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in self.inner.poll_events() {
            match event {
                ChannelEvent::Open => {
                    if !self.opened && !self.closed {
                        self.opened = true;
                        log::info!("Channel '{}' open", self.inner.label());
                        events.push(SyncEvent::Opened);
                    }
                }
                ChannelEvent::Message(text) => {
                    if self.closed {
                        continue;
                    }
                    match protocol::decode(&text) {
                        Ok(SyncMessage::Unknown) => {
                            self.dropped += 1;
                            log::debug!("Ignoring message of unknown type");
                        }
                        Ok(message) => {
                            self.received += 1;
                            log::debug!("Received {}", message.kind());
                            events.push(SyncEvent::Message(message));
                        }
                        Err(e) => {
                            self.dropped += 1;
                            log::warn!("Dropping malformed message: {}", e);
                        }
                    }
                }
                ChannelEvent::Close => {
                    if !self.closed {
                        self.closed = true;
                        log::info!("Channel '{}' closed", self.inner.label());
                        events.push(SyncEvent::Closed);
                    }
                }
            }
        }
        events
    }

    /// Close the channel. The closed event is reported by the next poll.
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Messages successfully handed to the transport.
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Valid messages delivered to the caller.
    pub fn received_count(&self) -> u64 {
        self.received
    }

    /// Messages discarded as malformed or unknown.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

impl MessageSink for SyncChannel {
    fn send_message(&mut self, message: &SyncMessage) {
        self.send(message);
    }
}
