//! Waveform view interaction
//!
//! - `model`: subtitle lines as seen by the view
//! - `cue`: hit-testing and drag state of one line
//! - `scroll`: page scroll animation and hover scroll speed
//! - `view`: the widget state driving all of the above

mod cue;
mod model;
mod scroll;
mod view;

pub use cue::{DragMode, WaveCue};
pub use model::{CueLine, SubtitleModel, VecSubtitle};
pub use scroll::{hover_scroll_amount, ScrollAnimation};
pub use view::{envelope_columns, CursorShape, MouseButton, ViewEvent, WaveformView};
