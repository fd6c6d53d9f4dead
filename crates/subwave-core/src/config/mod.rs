//! Waveform configuration
//!
//! All tunables of the ingest, zoom and view layers live in one YAML-backed
//! struct so the host application can persist them next to its own settings.
//!
//! # Usage
//!
//! ```ignore
//! use subwave_core::config::{default_config_path, load_config, WaveformConfig};
//!
//! let config: WaveformConfig = load_config(&default_config_path("waveform.yaml"));
//! ```

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the waveform pipeline and its view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Highest stored sample rate in Hz
    /// Streams above it are decimated by a power of two.
    /// Default: 3000
    pub zoom_ceiling_hz: u32,

    /// Extra capacity added to the reported stream duration, in milliseconds
    /// Container durations are often short; writes past capacity are dropped.
    /// Default: 60000
    pub duration_slack_ms: u64,

    /// How long the zoom worker sleeps between polls for new samples
    /// Default: 100
    pub zoom_poll_interval_ms: u64,

    /// Autoscroll padding as a percentage of the visible window
    /// Default: 15
    pub autoscroll_padding_percent: u32,

    /// Fraction of the window used as padding while dragging or selecting
    /// Default: 0.2
    pub drag_scroll_padding_fraction: f64,

    /// Animate page scrolls
    /// Default: true
    pub smooth_scroll: bool,

    /// Duration of a page scroll animation in milliseconds
    /// Default: 150
    pub smooth_scroll_duration_ms: u64,

    /// Interval of the scroll-while-dragging timer in milliseconds
    /// Default: 50
    pub hover_scroll_interval_ms: u64,

    /// Distance from a cue edge, in pixels, that still grabs the edge
    /// Default: 10
    pub drag_tolerance_pixels: u32,

    /// Smallest zoom (samples per pixel)
    /// Default: 8
    pub min_zoom: u32,

    /// Zoom used for a fresh view (samples per pixel)
    /// Default: 64
    pub default_zoom: u32,

    /// Minimum duration of a line inserted from a range selection, in milliseconds
    /// Default: 1000
    pub min_line_duration_ms: u64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            zoom_ceiling_hz: 3000,
            duration_slack_ms: 60_000,
            zoom_poll_interval_ms: 100,
            autoscroll_padding_percent: 15,
            drag_scroll_padding_fraction: 0.2,
            smooth_scroll: true,
            smooth_scroll_duration_ms: 150,
            hover_scroll_interval_ms: 50,
            drag_tolerance_pixels: 10,
            min_zoom: 8,
            default_zoom: 64,
            min_line_duration_ms: 1000,
        }
    }
}

impl WaveformConfig {
    pub fn zoom_poll_interval(&self) -> Duration {
        Duration::from_millis(self.zoom_poll_interval_ms.max(1))
    }

    pub fn smooth_scroll_duration(&self) -> Duration {
        Duration::from_millis(self.smooth_scroll_duration_ms)
    }

    pub fn hover_scroll_interval(&self) -> Duration {
        Duration::from_millis(self.hover_scroll_interval_ms.max(1))
    }
}
