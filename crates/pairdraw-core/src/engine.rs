//! Drawing engine.
//!
//! All document changes are expressed as [`Operation`]s and go through one transition,
//! [`Document::apply`]. There are two entry points into it:
//!
//! - [`DrawingEngine::perform_local`] applies an operation and broadcasts it.
//! - [`DrawingEngine::apply_remote`] applies a received message and never sends anything.
//!
//! Applying a remote operation therefore has exactly the effect of the same local
//! operation, minus the re-transmission.

use crate::channel::MessageSink;
use crate::config::SessionConfig;
use crate::input::{PointerEvent, StrokeTracker};
use crate::layers::LayerStack;
use crate::pen::{DEFAULT_ERASER_SIZE, PenState, Rgb, Tool};
use crate::protocol::SyncMessage;
use crate::raster::Raster;
use kurbo::Point;

/// What a stroke segment does to its layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeKind {
    Draw {
        color: Rgb,
        line_width: u32,
        alpha: f64,
    },
    Erase {
        size: f64,
    },
}

/// One straight drawing or erasing segment on a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSegment {
    pub layer: usize,
    pub from: Point,
    pub to: Point,
    pub kind: StrokeKind,
}

impl StrokeSegment {
    fn to_message(self) -> SyncMessage {
        let Point { x: x1, y: y1 } = self.from;
        let Point { x: x2, y: y2 } = self.to;
        match self.kind {
            StrokeKind::Draw {
                color,
                line_width,
                alpha,
            } => SyncMessage::Draw {
                layer: self.layer,
                x1,
                y1,
                x2,
                y2,
                color,
                line_width,
                alpha,
            },
            StrokeKind::Erase { size } => SyncMessage::Erase {
                layer: self.layer,
                x1,
                y1,
                x2,
                y2,
                size,
            },
        }
    }
}

/// A change to a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Stroke(StrokeSegment),
    Clear { layer: usize },
    AddLayer,
    SelectLayer { index: usize },
    DeleteLayer { index: usize },
    /// Local only.
    MoveLayerUp { index: usize },
    /// Local only.
    MoveLayerDown { index: usize },
    ChangePen(PenState),
}

impl Operation {
    /// Wire form, or `None` for operations that are never transmitted.
    pub fn to_message(&self) -> Option<SyncMessage> {
        let message = match *self {
            Operation::Stroke(segment) => segment.to_message(),
            Operation::Clear { layer } => SyncMessage::Clear { layer },
            Operation::AddLayer => SyncMessage::AddLayer,
            Operation::SelectLayer { index } => SyncMessage::SelectLayer { index },
            Operation::DeleteLayer { index } => SyncMessage::DeleteLayer { index },
            Operation::MoveLayerUp { .. } | Operation::MoveLayerDown { .. } => return None,
            Operation::ChangePen(pen) => SyncMessage::ChangePen {
                color: pen.color,
                line_width: pen.line_width,
                alpha: pen.alpha,
            },
        };
        Some(message)
    }

    /// Operation requested by a received message, or `None` for unknown messages.
    pub fn from_message(message: &SyncMessage) -> Option<Operation> {
        let op = match *message {
            SyncMessage::Draw {
                layer,
                x1,
                y1,
                x2,
                y2,
                color,
                line_width,
                alpha,
            } => Operation::Stroke(StrokeSegment {
                layer,
                from: Point::new(x1, y1),
                to: Point::new(x2, y2),
                kind: StrokeKind::Draw {
                    color,
                    line_width,
                    alpha,
                },
            }),
            SyncMessage::Erase {
                layer,
                x1,
                y1,
                x2,
                y2,
                size,
            } => Operation::Stroke(StrokeSegment {
                layer,
                from: Point::new(x1, y1),
                to: Point::new(x2, y2),
                kind: StrokeKind::Erase { size },
            }),
            SyncMessage::Clear { layer } => Operation::Clear { layer },
            SyncMessage::AddLayer => Operation::AddLayer,
            SyncMessage::SelectLayer { index } => Operation::SelectLayer { index },
            SyncMessage::DeleteLayer { index } => Operation::DeleteLayer { index },
            SyncMessage::ChangePen {
                color,
                line_width,
                alpha,
            } => Operation::ChangePen(PenState::new(color, line_width, alpha)),
            SyncMessage::Unknown => return None,
        };
        Some(op)
    }
}

/// Everything one peer draws into, plus its local settings.
#[derive(Debug, Clone)]
pub struct Document {
    pub layers: LayerStack,
    pub pen: PenState,
    /// Eraser diameter. Never synchronized.
    pub eraser_size: f64,
    pub tool: Tool,
    /// Whether pen changes are mirrored. Never synchronized.
    pub sync_pen_settings: bool,
}

impl Document {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: LayerStack::new(width, height),
            pen: PenState::default(),
            eraser_size: DEFAULT_ERASER_SIZE,
            tool: Tool::default(),
            sync_pen_settings: true,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            layers: LayerStack::new(config.canvas_width, config.canvas_height),
            pen: config.pen,
            eraser_size: config.eraser_size,
            tool: Tool::default(),
            sync_pen_settings: config.sync_pen_settings,
        }
    }

    /// Apply an operation. Returns `false` if it was refused (out-of-range index,
    /// deleting the last layer) and nothing changed.
    pub fn apply(&mut self, op: &Operation) -> bool {
        match *op {
            Operation::Stroke(segment) => {
                let Some(layer) = self.layers.layer_mut(segment.layer) else {
                    return false;
                };
                let surface = layer.surface_mut();
                match segment.kind {
                    StrokeKind::Draw {
                        color,
                        line_width,
                        alpha,
                    } => surface.stroke_segment(
                        segment.from,
                        segment.to,
                        line_width as f64,
                        color,
                        alpha,
                    ),
                    StrokeKind::Erase { size } => {
                        surface.erase_segment(segment.from, segment.to, size)
                    }
                }
                true
            }
            Operation::Clear { layer } => self.layers.clear_layer(layer),
            Operation::AddLayer => {
                self.layers.add_layer();
                true
            }
            Operation::SelectLayer { index } => self.layers.select_layer(index),
            Operation::DeleteLayer { index } => self.layers.delete_layer(index),
            Operation::MoveLayerUp { index } => self.layers.move_up(index),
            Operation::MoveLayerDown { index } => self.layers.move_down(index),
            Operation::ChangePen(pen) => {
                self.pen = PenState::new(pen.color, pen.line_width, pen.alpha);
                true
            }
        }
    }
}

/// User-level actions, independent of how they were captured.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddLayer,
    SelectLayer(usize),
    DeleteSelectedLayer,
    ClearSelectedLayer,
    MoveSelectedLayerUp,
    MoveSelectedLayerDown,
    SetTool(Tool),
    SetPen(PenState),
    SetColor(Rgb),
    SetLineWidth(u32),
    SetAlpha(f64),
    SetEraserSize(f64),
    SetPenSync(bool),
    Pointer(PointerEvent),
}

/// Turns local input into operations and applies remote ones.
pub struct DrawingEngine {
    document: Document,
    stroke: StrokeTracker,
    frame: Raster,
}

impl DrawingEngine {
    pub fn new(document: Document) -> Self {
        let frame = document.layers.composite();
        Self {
            document,
            stroke: StrokeTracker::new(),
            frame,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Document::from_config(config))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn layers(&self) -> &LayerStack {
        &self.document.layers
    }

    pub fn pen(&self) -> PenState {
        self.document.pen
    }

    /// The composite as of the last change.
    pub fn composite(&self) -> &Raster {
        &self.frame
    }

    /// Apply a local operation and broadcast it.
    ///
    /// Nothing is sent if the operation was refused, is local-only, or is a pen change
    /// while pen sync is off.
    pub fn perform_local(&mut self, op: Operation, sink: &mut impl MessageSink) -> bool {
        if !self.commit(&op) {
            return false;
        }
        if matches!(op, Operation::ChangePen(_)) && !self.document.sync_pen_settings {
            return true;
        }
        if let Some(message) = op.to_message() {
            sink.send_message(&message);
        }
        true
    }

    /// Apply a message from the remote peer. Never sends.
    pub fn apply_remote(&mut self, message: &SyncMessage) -> bool {
        let Some(op) = Operation::from_message(message) else {
            return false;
        };
        if matches!(op, Operation::ChangePen(_)) && !self.document.sync_pen_settings {
            log::debug!("Pen sync off, ignoring remote pen change");
            return false;
        }
        let applied = self.commit(&op);
        if !applied {
            log::debug!("Ignoring remote {} (out of range)", message.kind());
        }
        applied
    }

    /// Handle a local command. Returns whether anything changed.
    pub fn apply_local_command(&mut self, command: Command, sink: &mut impl MessageSink) -> bool {
        let selected = self.document.layers.selected_index();
        match command {
            Command::AddLayer => self.perform_local(Operation::AddLayer, sink),
            Command::SelectLayer(index) => {
                self.perform_local(Operation::SelectLayer { index }, sink)
            }
            Command::DeleteSelectedLayer => {
                self.perform_local(Operation::DeleteLayer { index: selected }, sink)
            }
            Command::ClearSelectedLayer => {
                self.perform_local(Operation::Clear { layer: selected }, sink)
            }
            Command::MoveSelectedLayerUp => {
                self.perform_local(Operation::MoveLayerUp { index: selected }, sink)
            }
            Command::MoveSelectedLayerDown => {
                self.perform_local(Operation::MoveLayerDown { index: selected }, sink)
            }
            Command::SetTool(tool) => {
                log::debug!("Tool: {}", tool.name());
                self.document.tool = tool;
                true
            }
            Command::SetPen(pen) => self.change_pen(pen, sink),
            Command::SetColor(color) => {
                let pen = PenState { color, ..self.document.pen };
                self.change_pen(pen, sink)
            }
            Command::SetLineWidth(line_width) => {
                let pen = PenState {
                    line_width,
                    ..self.document.pen
                };
                self.change_pen(pen, sink)
            }
            Command::SetAlpha(alpha) => {
                let pen = PenState {
                    alpha,
                    ..self.document.pen
                };
                self.change_pen(pen, sink)
            }
            Command::SetEraserSize(size) => {
                if !(size.is_finite() && size > 0.0) {
                    return false;
                }
                self.document.eraser_size = size;
                true
            }
            Command::SetPenSync(enabled) => {
                self.document.sync_pen_settings = enabled;
                true
            }
            Command::Pointer(event) => self.handle_pointer(event, sink),
        }
    }

    fn change_pen(&mut self, pen: PenState, sink: &mut impl MessageSink) -> bool {
        let pen = PenState::new(pen.color, pen.line_width, pen.alpha);
        self.perform_local(Operation::ChangePen(pen), sink)
    }

    fn handle_pointer(&mut self, event: PointerEvent, sink: &mut impl MessageSink) -> bool {
        match event {
            PointerEvent::Down { position } => {
                self.stroke.begin(position);
                false
            }
            PointerEvent::Move { position } => match self.stroke.advance(position) {
                Some(from) => {
                    let segment = self.segment(from, position);
                    self.perform_local(Operation::Stroke(segment), sink)
                }
                None => false,
            },
            PointerEvent::Up | PointerEvent::Leave => {
                self.stroke.end();
                false
            }
        }
    }

    /// Segment on the selected layer using the active tool's attributes.
    fn segment(&self, from: Point, to: Point) -> StrokeSegment {
        let kind = match self.document.tool {
            Tool::Pen => StrokeKind::Draw {
                color: self.document.pen.color,
                line_width: self.document.pen.line_width,
                alpha: self.document.pen.alpha,
            },
            Tool::Eraser => StrokeKind::Erase {
                size: self.document.eraser_size,
            },
        };
        StrokeSegment {
            layer: self.document.layers.selected_index(),
            from,
            to,
            kind,
        }
    }

    fn commit(&mut self, op: &Operation) -> bool {
        let applied = self.document.apply(op);
        if applied && !matches!(op, Operation::ChangePen(_) | Operation::SelectLayer { .. }) {
            self.frame = self.document.layers.composite();
        }
        applied
    }
}
