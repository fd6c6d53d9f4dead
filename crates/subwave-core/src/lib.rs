//! Subwave Core - Streaming waveform ingest and zoom envelopes for subtitle timing

pub mod config;
pub mod error;
pub mod gc;
pub mod ingest;
pub mod stream;
pub mod types;
pub mod zoom;

mod sync;

pub use error::{DecodeError, DecodeErrorCode, FormatError};
pub use ingest::{SampleIngest, SampleStore, WaveformEvent};
pub use types::*;
pub use zoom::{ZoomEngine, ZoomedData};
