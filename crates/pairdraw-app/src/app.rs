//! Headless application: scripted two-peer demo and message replay.

use anyhow::{Context, Result, bail};
use pairdraw_core::engine::{Command, DrawingEngine};
use pairdraw_core::input::PointerEvent;
use pairdraw_core::pen::{Rgb, Tool};
use pairdraw_core::protocol;
use pairdraw_core::session::{Peer, SessionEvent};
use pairdraw_core::transport::MemoryNetwork;
use pairdraw_core::{SessionConfig, export};
use std::path::{Path, PathBuf};

/// Upper bound on event-loop rounds while waiting for the handshake.
const MAX_PUMP_ROUNDS: usize = 16;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    /// Directory exported images are written to.
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Outcome of a demo run.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub initiator_image: PathBuf,
    pub responder_image: PathBuf,
    /// Whether both peers ended with pixel-identical composites.
    pub converged: bool,
}

/// The application shell.
pub struct App {
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Connect two in-process peers, draw on both and export both composites.
    pub fn demo(&self) -> Result<DemoReport> {
        let network = MemoryNetwork::new();
        let mut initiator = Peer::new(self.peer_config("a"));
        let mut responder = Peer::new(self.peer_config("b"));

        initiator
            .start_sharing(Box::new(network.transport()))
            .context("failed to create offer")?;
        let offer = wait_for_payload(&mut initiator).context("offer never became ready")?;
        log::info!("Offer payload is {} bytes", offer.len());

        responder
            .join(Box::new(network.transport()), &offer)
            .context("failed to accept offer")?;
        let answer = wait_for_payload(&mut responder).context("answer never became ready")?;

        initiator
            .accept_answer(&answer)
            .context("failed to accept answer")?;
        pump(&mut initiator, &mut responder);
        if !(initiator.is_connected() && responder.is_connected()) {
            bail!("peers did not connect");
        }

        initiator.command(Command::SetColor(Rgb::new(255, 0, 0)));
        stroke(&mut initiator, &[(10.0, 10.0), (50.0, 50.0)]);
        pump(&mut initiator, &mut responder);

        initiator.command(Command::AddLayer);
        initiator.command(Command::SetColor(Rgb::new(0, 0, 255)));
        initiator.command(Command::SetLineWidth(8));
        let wave: Vec<(f64, f64)> = (0..=20)
            .map(|i| {
                let x = 20.0 + i as f64 * 15.0;
                (x, 150.0 + 40.0 * (x / 40.0).sin())
            })
            .collect();
        stroke(&mut initiator, &wave);
        pump(&mut initiator, &mut responder);

        responder.command(Command::SetTool(Tool::Eraser));
        responder.command(Command::SetEraserSize(20.0));
        stroke(&mut responder, &[(150.0, 80.0), (150.0, 220.0)]);
        responder.command(Command::SetTool(Tool::Pen));
        stroke(&mut responder, &[(200.0, 300.0), (260.0, 320.0), (320.0, 300.0)]);
        pump(&mut initiator, &mut responder);

        let converged = initiator.engine().composite() == responder.engine().composite();
        if !converged {
            log::warn!("Composites differ between peers");
        }

        let initiator_image = initiator
            .export(&self.config.output_dir)
            .context("failed to export initiator image")?;
        let responder_image = responder
            .export(&self.config.output_dir)
            .context("failed to export responder image")?;

        initiator.reset();
        pump(&mut initiator, &mut responder);

        Ok(DemoReport {
            initiator_image,
            responder_image,
            converged,
        })
    }

    /// Apply a JSON-lines file of wire messages to a fresh document and export it.
    ///
    /// Lines that are blank, malformed or of an unknown type are skipped.
    pub fn replay(&self, input: &Path) -> Result<PathBuf> {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;

        let mut engine = DrawingEngine::from_config(&self.config.session);
        let mut applied = 0usize;
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match protocol::decode(line) {
                Ok(message) => {
                    if engine.apply_remote(&message) {
                        applied += 1;
                    }
                }
                Err(e) => log::warn!("Line {}: {}", number + 1, e),
            }
        }
        log::info!("Applied {} messages from {}", applied, input.display());

        let path = export::save_composite(
            &self.config.output_dir,
            &self.config.session.export_prefix,
            engine.layers(),
        )
        .context("failed to export replay")?;
        Ok(path)
    }

    fn peer_config(&self, suffix: &str) -> SessionConfig {
        let mut config = self.config.session.clone();
        config.export_prefix = format!("{}_{}", config.export_prefix, suffix);
        config
    }
}

/// Poll until the peer's local payload is ready.
fn wait_for_payload(peer: &mut Peer) -> Option<String> {
    for _ in 0..MAX_PUMP_ROUNDS {
        for event in peer.poll() {
            if let SessionEvent::PayloadReady(payload) = event {
                return Some(payload);
            }
        }
    }
    None
}

/// Run both event loops until neither has anything left to do.
fn pump(a: &mut Peer, b: &mut Peer) {
    for _ in 0..MAX_PUMP_ROUNDS {
        let a_events = a.poll();
        let b_events = b.poll();
        if a_events.is_empty() && b_events.is_empty() {
            return;
        }
    }
    log::warn!("Event loops still busy after {} rounds", MAX_PUMP_ROUNDS);
}

/// Press, drag through `points`, release.
fn stroke(peer: &mut Peer, points: &[(f64, f64)]) {
    let Some(&(x, y)) = points.first() else {
        return;
    };
    peer.command(Command::Pointer(PointerEvent::down(x, y)));
    for &(x, y) in &points[1..] {
        peer.command(Command::Pointer(PointerEvent::moved(x, y)));
    }
    peer.command(Command::Pointer(PointerEvent::Up));
}
