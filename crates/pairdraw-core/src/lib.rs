//! PairDraw Core Library
//!
//! Two-peer collaborative drawing without a server: connection negotiation, the
//! drawing-intent protocol, and the layered raster model each peer keeps in sync.

pub mod channel;
pub mod config;
pub mod engine;
pub mod export;
pub mod input;
pub mod layers;
pub mod negotiation;
pub mod pen;
pub mod protocol;
pub mod raster;
pub mod session;
pub mod transport;

pub use channel::{MessageSink, SyncChannel, SyncEvent};
pub use config::{ConfigError, ConfigResult, SessionConfig};
pub use engine::{Command, Document, DrawingEngine, Operation, StrokeKind, StrokeSegment};
pub use export::{ExportError, ExportResult};
pub use input::PointerEvent;
pub use layers::{Layer, LayerStack, THUMBNAIL_SIZE};
pub use negotiation::{
    ConnectionNegotiator, NegotiationError, NegotiationEvent, NegotiationResult, NegotiationState,
    Role,
};
pub use pen::{PenState, Rgb, Tool};
pub use protocol::{ProtocolError, SyncMessage};
pub use raster::Raster;
pub use session::{Peer, PeerSession, SessionEvent};
pub use transport::{
    MemoryNetwork, MemoryTransport, MessageChannel, PeerTransport, SessionDescription,
    TransportError, TransportEvent,
};
