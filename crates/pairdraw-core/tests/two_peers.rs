//! End-to-end tests: two peers negotiating over the in-memory transport and drawing.

use pairdraw_core::engine::{Command, DrawingEngine};
use pairdraw_core::input::PointerEvent;
use pairdraw_core::negotiation::{ConnectionNegotiator, NegotiationEvent, NegotiationState};
use pairdraw_core::pen::{PenState, Rgb};
use pairdraw_core::protocol::SyncMessage;
use pairdraw_core::session::{Peer, SessionEvent};
use pairdraw_core::transport::MemoryNetwork;
use pairdraw_core::{SessionConfig, negotiation};

fn config() -> SessionConfig {
    SessionConfig {
        canvas_width: 100,
        canvas_height: 100,
        ..SessionConfig::default()
    }
}

fn payload(events: Vec<SessionEvent>) -> String {
    events
        .into_iter()
        .find_map(|event| match event {
            SessionEvent::PayloadReady(payload) => Some(payload),
            _ => None,
        })
        .expect("payload ready")
}

fn connected_peers(network: &MemoryNetwork) -> (Peer, Peer) {
    let mut a = Peer::new(config());
    let mut b = Peer::new(config());

    a.start_sharing(Box::new(network.transport())).unwrap();
    let p1 = payload(a.poll());
    b.join(Box::new(network.transport()), &p1).unwrap();
    let p2 = payload(b.poll());
    a.accept_answer(&p2).unwrap();

    a.poll();
    b.poll();
    assert_eq!(a.state(), NegotiationState::Connected);
    assert_eq!(b.state(), NegotiationState::Connected);
    (a, b)
}

#[test]
fn handshake_then_segment_appears_on_both_peers() {
    let network = MemoryNetwork::new();
    let (mut a, mut b) = connected_peers(&network);

    a.command(Command::SetPen(PenState::new(Rgb::new(255, 0, 0), 5, 1.0)));
    a.command(Command::Pointer(PointerEvent::down(10.0, 10.0)));
    a.command(Command::Pointer(PointerEvent::moved(50.0, 50.0)));
    a.command(Command::Pointer(PointerEvent::Up));

    let events = b.poll();
    assert!(events.contains(&SessionEvent::Message(SyncMessage::Draw {
        layer: 0,
        x1: 10.0,
        y1: 10.0,
        x2: 50.0,
        y2: 50.0,
        color: Rgb::new(255, 0, 0),
        line_width: 5,
        alpha: 1.0,
    })));

    let a_layer = a.engine().layers().layer(0).unwrap().surface();
    let b_layer = b.engine().layers().layer(0).unwrap().surface();
    assert_eq!(a_layer, b_layer);
    assert_eq!(b_layer.pixel(30, 30), Some([255, 0, 0, 255]));
    assert_eq!(a.engine().composite(), b.engine().composite());
}

#[test]
fn deleting_only_layer_sends_nothing() {
    let network = MemoryNetwork::new();
    let (mut a, mut b) = connected_peers(&network);

    assert!(!a.command(Command::DeleteSelectedLayer));
    assert_eq!(a.engine().layers().len(), 1);
    assert!(b.poll().is_empty());
}

#[test]
fn select_one_past_end_is_ignored() {
    let network = MemoryNetwork::new();
    let mut a = Peer::new(config());
    let mut b = Peer::new(config());

    // b grows its stack before connecting, so the stacks differ in length.
    b.command(Command::AddLayer);

    a.start_sharing(Box::new(network.transport())).unwrap();
    let p1 = payload(a.poll());
    b.join(Box::new(network.transport()), &p1).unwrap();
    let p2 = payload(b.poll());
    a.accept_answer(&p2).unwrap();
    a.poll();
    b.poll();
    assert!(a.is_connected() && b.is_connected());

    assert!(b.command(Command::SelectLayer(1)));
    let events = a.poll();
    assert_eq!(
        events,
        vec![SessionEvent::Message(SyncMessage::SelectLayer { index: 1 })]
    );
    assert_eq!(a.engine().layers().len(), 1);
    assert_eq!(a.engine().layers().selected_index(), 0);
}

#[test]
fn remote_select_past_end_leaves_selection() {
    let mut engine = DrawingEngine::from_config(&config());
    engine.apply_remote(&SyncMessage::AddLayer);
    engine.apply_remote(&SyncMessage::SelectLayer { index: 0 });
    let count = engine.layers().len();
    assert!(!engine.apply_remote(&SyncMessage::SelectLayer { index: count }));
    assert_eq!(engine.layers().selected_index(), 0);
}

#[test]
fn pen_changes_follow_toggle_without_undo() {
    let network = MemoryNetwork::new();
    let (mut a, mut b) = connected_peers(&network);

    a.command(Command::SetLineWidth(9));
    b.poll();
    assert_eq!(b.engine().pen().line_width, 9);

    b.command(Command::SetPenSync(false));
    assert_eq!(b.engine().pen().line_width, 9);

    a.command(Command::SetLineWidth(2));
    let events = b.poll();
    assert_eq!(events.len(), 1);
    assert_eq!(b.engine().pen().line_width, 9);

    // With the toggle off locally, b's own changes are not sent either.
    b.command(Command::SetAlpha(0.25));
    assert!(a.poll().is_empty());
    assert_eq!(a.engine().pen().alpha, 1.0);
}

#[test]
fn payload_roundtrip_completes_opposite_leg() {
    let network = MemoryNetwork::new();
    let mut a = ConnectionNegotiator::new(Box::new(network.transport()), "draw");
    let mut b = ConnectionNegotiator::new(Box::new(network.transport()), "draw");

    a.create_offer().unwrap();
    a.poll();
    let offer = a.local_payload().unwrap().to_string();
    let decoded = negotiation::decode_payload(&offer).unwrap();
    let reencoded = negotiation::encode_payload(&decoded).unwrap();

    b.accept_offer(&reencoded).unwrap();
    b.poll();
    let answer = negotiation::decode_payload(b.local_payload().unwrap()).unwrap();
    a.accept_answer(&negotiation::encode_payload(&answer).unwrap())
        .unwrap();
    a.channel_opened();
    assert!(a.is_connected());
    assert!(
        b.poll()
            .iter()
            .any(|event| matches!(event, NegotiationEvent::ChannelAllocated(_)))
    );
}

#[test]
fn answer_without_candidates_stays_awaiting() {
    let network = MemoryNetwork::new();
    let mut a = Peer::new(config());
    a.start_sharing(Box::new(network.transport())).unwrap();
    let offer = payload(a.poll());

    let mut b = ConnectionNegotiator::new(Box::new(network.transport()), "draw");
    b.accept_offer(&offer).unwrap();
    b.poll();
    let mut answer = negotiation::decode_payload(b.local_payload().unwrap()).unwrap();
    answer.sdp = answer
        .sdp
        .lines()
        .filter(|line| !line.starts_with("a=candidate") && !line.starts_with("a=end-of-candidates"))
        .map(|line| format!("{}\r\n", line))
        .collect();

    a.accept_answer(&negotiation::encode_payload(&answer).unwrap())
        .unwrap();
    for _ in 0..4 {
        assert!(a.poll().is_empty());
    }
    assert_eq!(a.state(), NegotiationState::AwaitingAnswer);
    assert!(!a.is_connected());
}

#[test]
fn closing_ends_synchronization() {
    let network = MemoryNetwork::new();
    let (mut a, mut b) = connected_peers(&network);

    b.reset();
    assert_eq!(a.poll(), vec![SessionEvent::Closed]);

    a.command(Command::AddLayer);
    assert_eq!(a.engine().layers().len(), 2);
    assert_eq!(b.engine().layers().len(), 1);
}
