//! Wire protocol for drawing intents.
//!
//! Every message is one JSON object with a `type` discriminator:
//! ```json
//! { "type": "draw", "layer": 0, "x1": 10, "y1": 10, "x2": 50, "y2": 50,
//!   "color": "rgb(255,0,0)", "lineWidth": 5, "alpha": 1.0 }
//! { "type": "erase", "layer": 0, "x1": 0, "y1": 0, "x2": 5, "y2": 5, "size": 10 }
//! { "type": "clear", "layer": 0 }
//! { "type": "addLayer" }
//! { "type": "selectLayer", "index": 1 }
//! { "type": "deleteLayer", "index": 1 }
//! { "type": "changePen", "color": "rgb(0,0,0)", "lineWidth": 5, "alpha": 1.0 }
//! ```
//! There is no version field; unknown types decode to [`SyncMessage::Unknown`].

use crate::pen::Rgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a received message is rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Result type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A drawing intent exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncMessage {
    /// Append a stroke segment to a layer.
    Draw {
        layer: usize,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: Rgb,
        line_width: u32,
        alpha: f64,
    },
    /// Alpha-erase along a segment on a layer.
    Erase {
        layer: usize,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        size: f64,
    },
    /// Reset a layer's pixels.
    Clear { layer: usize },
    /// Append a new layer on top and select it.
    AddLayer,
    /// Change the active layer.
    SelectLayer { index: usize },
    /// Remove a layer (never the last one).
    DeleteLayer { index: usize },
    /// Mirror pen settings.
    ChangePen {
        color: Rgb,
        line_width: u32,
        alpha: f64,
    },
    /// Any message type this build does not know.
    #[serde(other)]
    Unknown,
}

impl SyncMessage {
    /// The `type` discriminator as sent on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Draw { .. } => "draw",
            SyncMessage::Erase { .. } => "erase",
            SyncMessage::Clear { .. } => "clear",
            SyncMessage::AddLayer => "addLayer",
            SyncMessage::SelectLayer { .. } => "selectLayer",
            SyncMessage::DeleteLayer { .. } => "deleteLayer",
            SyncMessage::ChangePen { .. } => "changePen",
            SyncMessage::Unknown => "unknown",
        }
    }

    /// Check value ranges that the schema alone cannot express.
    pub fn validate(&self) -> ProtocolResult<()> {
        match *self {
            SyncMessage::Draw {
                line_width, alpha, ..
            }
            | SyncMessage::ChangePen {
                line_width, alpha, ..
            } => {
                if line_width == 0 {
                    return Err(ProtocolError::InvalidField {
                        field: "lineWidth",
                        reason: "must be positive",
                    });
                }
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(ProtocolError::InvalidField {
                        field: "alpha",
                        reason: "must be within 0..=1",
                    });
                }
            }
            SyncMessage::Erase { size, .. } => {
                if size.is_nan() || size <= 0.0 {
                    return Err(ProtocolError::InvalidField {
                        field: "size",
                        reason: "must be positive",
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Encode a message as one JSON text record.
pub fn encode(message: &SyncMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decode and validate one JSON text record.
pub fn decode(text: &str) -> ProtocolResult<SyncMessage> {
    let message: SyncMessage = serde_json::from_str(text)?;
    message.validate()?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draw_wire_shape() {
        let msg = SyncMessage::Draw {
            layer: 0,
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 50.0,
            color: Rgb::new(255, 0, 0),
            line_width: 5,
            alpha: 1.0,
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "draw", "layer": 0,
                "x1": 10.0, "y1": 10.0, "x2": 50.0, "y2": 50.0,
                "color": "rgb(255,0,0)", "lineWidth": 5, "alpha": 1.0
            })
        );
    }

    #[test]
    fn test_unit_variant_shape() {
        assert_eq!(encode(&SyncMessage::AddLayer).unwrap(), r#"{"type":"addLayer"}"#);
    }

    #[test]
    fn test_decode_original_page_messages() {
        // Integer coordinates and hex colors as a browser page would send them.
        let msg = decode(
            r##"{"type":"draw","layer":1,"x1":3,"y1":4,"x2":5,"y2":6,"color":"#00ff00","lineWidth":8,"alpha":0.5}"##,
        )
        .unwrap();
        assert_eq!(
            msg,
            SyncMessage::Draw {
                layer: 1,
                x1: 3.0,
                y1: 4.0,
                x2: 5.0,
                y2: 6.0,
                color: Rgb::new(0, 255, 0),
                line_width: 8,
                alpha: 0.5,
            }
        );
        assert_eq!(
            decode(r#"{"type":"selectLayer","index":2}"#).unwrap(),
            SyncMessage::SelectLayer { index: 2 }
        );
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg = decode(r#"{"type":"reorderLayer","from":0,"to":1}"#).unwrap();
        assert_eq!(msg, SyncMessage::Unknown);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"type":"clear"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"deleteLayer","index":-1}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"index":1}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(matches!(
            decode(r#"{"type":"changePen","color":"rgb(0,0,0)","lineWidth":0,"alpha":1}"#),
            Err(ProtocolError::InvalidField { field: "lineWidth", .. })
        ));
        assert!(matches!(
            decode(r#"{"type":"changePen","color":"rgb(0,0,0)","lineWidth":3,"alpha":1.5}"#),
            Err(ProtocolError::InvalidField { field: "alpha", .. })
        ));
        assert!(matches!(
            decode(r#"{"type":"erase","layer":0,"x1":0,"y1":0,"x2":1,"y2":1,"size":0}"#),
            Err(ProtocolError::InvalidField { field: "size", .. })
        ));
    }
}
