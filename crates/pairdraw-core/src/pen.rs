//! Pen configuration and drawing tools.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Color parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseColorError {
    #[error("Unrecognized color format: {0}")]
    Format(String),
    #[error("Invalid color component: {0}")]
    Component(String),
}

/// An opaque 3-channel color.
///
/// Written as `rgb(r,g,b)`; `#rrggbb` is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array.
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(ParseColorError::Format(s.to_string()));
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16)
                    .map_err(|_| ParseColorError::Component(s.to_string()))
            };
            return Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let inner = s
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ParseColorError::Format(s.to_string()))?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ParseColorError::Format(s.to_string()));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: i64 = part
                .parse()
                .map_err(|_| ParseColorError::Component(part.to_string()))?;
            *slot = value.clamp(0, 255) as u8;
        }
        Ok(Rgb::new(channels[0], channels[1], channels[2]))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Shared drawing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenState {
    pub color: Rgb,
    /// Line width in pixels (at least 1).
    pub line_width: u32,
    /// Stroke opacity in `0.0..=1.0`.
    pub alpha: f64,
}

impl PenState {
    pub const DEFAULT_LINE_WIDTH: u32 = 5;

    /// Create a pen, clamping width and alpha into range.
    pub fn new(color: Rgb, line_width: u32, alpha: f64) -> Self {
        Self {
            color,
            line_width: line_width.max(1),
            alpha: clamp_alpha(alpha),
        }
    }

    /// Whether width and alpha are in range.
    pub fn is_valid(&self) -> bool {
        self.line_width >= 1 && (0.0..=1.0).contains(&self.alpha)
    }
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            line_width: Self::DEFAULT_LINE_WIDTH,
            alpha: 1.0,
        }
    }
}

/// Clamp an alpha value into `0.0..=1.0`, mapping NaN to opaque.
pub fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) }
}

/// Default eraser diameter in pixels.
pub const DEFAULT_ERASER_SIZE: f64 = 10.0;

/// Active drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
}

impl Tool {
    /// Display name for this tool.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Pen => "Pen",
            Tool::Eraser => "Eraser",
        }
    }
}
