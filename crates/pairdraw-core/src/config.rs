//! Session configuration.

use crate::pen::{DEFAULT_ERASER_SIZE, PenState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest accepted canvas edge in pixels.
pub const MAX_CANVAS_SIZE: u32 = 8192;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-peer settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Label of the negotiated message channel.
    pub channel_label: String,
    /// Initial pen.
    pub pen: PenState,
    /// Initial eraser diameter. Never synchronized.
    pub eraser_size: f64,
    /// Mirror pen changes to and from the remote peer.
    pub sync_pen_settings: bool,
    /// Prefix of exported image file names.
    pub export_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            channel_label: "draw".to_string(),
            pen: PenState::default(),
            eraser_size: DEFAULT_ERASER_SIZE,
            sync_pen_settings: true,
            export_prefix: "pairdraw".to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Invalid {
                field: "canvas size",
                reason: "must be non-zero",
            });
        }
        if self.canvas_width > MAX_CANVAS_SIZE || self.canvas_height > MAX_CANVAS_SIZE {
            return Err(ConfigError::Invalid {
                field: "canvas size",
                reason: "must not exceed 8192 pixels per side",
            });
        }
        if self.channel_label.is_empty() {
            return Err(ConfigError::Invalid {
                field: "channel_label",
                reason: "must not be empty",
            });
        }
        if !self.pen.is_valid() {
            return Err(ConfigError::Invalid {
                field: "pen",
                reason: "line width must be positive and alpha within 0..=1",
            });
        }
        if !(self.eraser_size.is_finite() && self.eraser_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "eraser_size",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pen::Rgb;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!((config.canvas_width, config.canvas_height), (800, 600));
        assert_eq!(config.channel_label, "draw");
        assert_eq!(config.pen, PenState::new(Rgb::BLACK, 5, 1.0));
        assert_eq!(config.eraser_size, 10.0);
        assert!(config.sync_pen_settings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SessionConfig::from_json_str(
            r##"{"canvas_width": 320, "pen": {"color": "#ff0000"}, "sync_pen_settings": false}"##,
        )
        .unwrap();
        assert_eq!(config.canvas_width, 320);
        assert_eq!(config.canvas_height, 600);
        assert_eq!(config.pen.color, Rgb::new(255, 0, 0));
        assert_eq!(config.pen.line_width, 5);
        assert!(!config.sync_pen_settings);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"canvas_height": 0}"#),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"eraser_size": -1}"#),
            Err(ConfigError::Invalid { field: "eraser_size", .. })
        ));
        assert!(matches!(
            SessionConfig::from_json_str(
                r#"{"canvas_width": 4294967295, "canvas_height": 4294967295}"#
            ),
            Err(ConfigError::Invalid { field: "canvas size", .. })
        ));
        assert!(SessionConfig::from_json_str(r#"{"canvas_width": 8192}"#).is_ok());
        assert!(matches!(
            SessionConfig::from_json_str("[1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"export_prefix": "sketch"}}"#).unwrap();
        let config = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.export_prefix, "sketch");

        assert!(matches!(
            SessionConfig::from_json_file("/nonexistent/pairdraw.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
