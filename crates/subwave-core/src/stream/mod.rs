//! Decoder boundary
//!
//! A decode session talks to the ingest side only through [`StreamMessage`]s
//! sent over a crossbeam channel: decoded PCM chunks, progress reports, the
//! end of the stream and failures.
//!
//! ```text
//! ┌───────────────┐  StreamMessage   ┌──────────────┐  WaveformEvent  ┌────┐
//! │ StreamSource  │ ───────────────▶ │ SampleIngest │ ──────────────▶ │ UI │
//! │ (wave-decoder)│   bounded(16)    │ (wave-ingest)│   unbounded     └────┘
//! └───────────────┘                  └──────────────┘
//! ```

mod decoder;
mod memory;

pub use decoder::SymphoniaSource;
pub use memory::MemorySource;

use std::sync::atomic::AtomicBool;

use crossbeam::channel::Sender;

use crate::error::{DecodeError, DecodeResult};
use crate::types::WaveFormat;

/// Messages from a decode session to the ingest side
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// Interleaved little-endian PCM laid out as `format`
    AudioData {
        data: Vec<u8>,
        format: WaveFormat,
        start_millis: f64,
        duration_millis: f64,
    },
    /// Decode position and total stream length
    Progress { position_millis: u64, length_millis: u64 },
    /// End of stream reached
    Finished,
    /// Session failed after opening
    Error(DecodeError),
}

/// What an opened stream looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Layout of the `AudioData` chunks the session will send
    pub format: WaveFormat,
    /// Container-reported duration; often missing or short
    pub length_millis: Option<u64>,
}

/// A source of decoded PCM
///
/// `open` runs once on the decoder thread before `run`. Only the sample
/// layout (`bits_per_sample`, `is_integer`) of `requested` is honoured;
/// rate and channel count stay native.
pub trait StreamSource: Send {
    fn open(&mut self, stream_index: usize, requested: &WaveFormat) -> DecodeResult<StreamInfo>;

    /// Decode to the end, checking `interrupt` between chunks
    ///
    /// Returns early when the receiving side hangs up.
    fn run(&mut self, tx: &Sender<StreamMessage>, interrupt: &AtomicBool);
}

/// Layout requested from sources by the ingest side
pub const REQUESTED_LAYOUT: WaveFormat = WaveFormat::new(0, 0, 16, true);

/// Append normalised samples to `out` in the sample layout of `format`
pub(crate) fn encode_samples<I>(samples: I, format: &WaveFormat, out: &mut Vec<u8>)
where
    I: IntoIterator<Item = f32>,
{
    for sample in samples {
        let sample = sample.clamp(-1.0, 1.0);
        match (format.is_integer, format.bits_per_sample) {
            (true, 8) => {
                let value = (sample * 128.0).round().clamp(-128.0, 127.0) as i32;
                out.push((value + 128) as u8);
            }
            (true, 16) => {
                let value = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                out.extend_from_slice(&value.to_le_bytes());
            }
            (true, 24) => {
                let value = (sample * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32;
                out.extend_from_slice(&value.to_le_bytes()[..3]);
            }
            (true, 32) => {
                let value = (sample as f64 * 2_147_483_648.0)
                    .round()
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                out.extend_from_slice(&value.to_le_bytes());
            }
            _ => out.extend_from_slice(&sample.to_le_bytes()),
        }
    }
}
