//! Pointer input for freehand strokes.
//!
//! Capture is platform-specific; by the time events reach the core they carry
//! canvas-local coordinates.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer event type for unified mouse/touch handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PointerEvent {
    Down { position: Point },
    Move { position: Point },
    Up,
    /// The pointer left the canvas.
    Leave,
}

impl PointerEvent {
    pub fn down(x: f64, y: f64) -> Self {
        PointerEvent::Down {
            position: Point::new(x, y),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        PointerEvent::Move {
            position: Point::new(x, y),
        }
    }
}

/// Tracks the anchor of the stroke in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrokeTracker {
    anchor: Option<Point>,
}

impl StrokeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a stroke at `position`.
    pub fn begin(&mut self, position: Point) {
        self.anchor = Some(position);
    }

    /// Move to `position`. Returns the segment start if a stroke is in progress,
    /// and advances the anchor.
    pub fn advance(&mut self, position: Point) -> Option<Point> {
        let from = self.anchor?;
        self.anchor = Some(position);
        Some(from)
    }

    /// Finish the stroke. Nothing is emitted; every segment was already committed.
    pub fn end(&mut self) {
        self.anchor = None;
    }
}
