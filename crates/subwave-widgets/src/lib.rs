//! Subwave Widgets - Waveform view interaction for subtitle timing
//!
//! This crate holds everything a waveform widget does except painting:
//!
//! - **Time mapping**: pixel <-> millisecond conversion for the visible window
//! - **Cue cache**: visible subtitle lines sorted by show time
//! - **Dragging**: hit-testing of cue edges and the drag state machine
//! - **Auto-scroll**: page scrolling for playback, hover scrolling near the edges
//! - **Zoom glue**: forwarding the zoom level to [`subwave_core::ZoomEngine`]
//!
//! ## Architecture
//!
//! - **State structs**: [`WaveformView`] and [`WaveCue`] are plain data plus
//!   methods; the host toolkit feeds them pointer events and timer ticks
//! - **Model boundary**: subtitle lines live behind [`SubtitleModel`]
//! - **Rendering**: the host paints from [`WaveformView::visible_lines`] and
//!   [`envelope_columns`]

pub mod waveform;

pub use waveform::{
    envelope_columns, CueLine, CursorShape, DragMode, MouseButton, ScrollAnimation, SubtitleModel,
    VecSubtitle, ViewEvent, WaveCue, WaveformView,
};
