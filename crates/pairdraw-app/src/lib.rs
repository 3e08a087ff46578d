//! PairDraw Application
//!
//! Headless shell around the core: runs two in-process peers end to end and
//! replays recorded message streams into images.

mod app;

pub use app::{App, AppConfig, DemoReport};
