//! In-memory PCM source

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;

use super::{encode_samples, StreamInfo, StreamMessage, StreamSource};
use crate::error::{DecodeError, DecodeResult};
use crate::types::{SampleType, WaveFormat};

/// Serves an interleaved 16-bit buffer as a single-stream decode session
pub struct MemorySource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<SampleType>,
    chunk_frames: usize,
    reported_length_millis: Option<u64>,
    output: WaveFormat,
}

impl MemorySource {
    /// `samples` is interleaved with `channels` samples per frame
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<SampleType>) -> Self {
        let length_millis = match (sample_rate, channels) {
            (0, _) | (_, 0) => None,
            _ => Some(samples.len() as u64 / channels as u64 * 1000 / sample_rate as u64),
        };
        Self {
            sample_rate,
            channels,
            samples,
            chunk_frames: 4096,
            reported_length_millis: length_millis,
            output: WaveFormat::pcm16(sample_rate, channels),
        }
    }

    /// Frames per delivered chunk
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames.max(1);
        self
    }

    /// Override the duration reported on open, like a container with bad metadata
    pub fn with_reported_length(mut self, length_millis: Option<u64>) -> Self {
        self.reported_length_millis = length_millis;
        self
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

impl StreamSource for MemorySource {
    fn open(&mut self, stream_index: usize, requested: &WaveFormat) -> DecodeResult<StreamInfo> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(DecodeError::no_audio_track());
        }
        if stream_index != 0 {
            return Err(DecodeError::stream_index(stream_index, 1));
        }

        let output = WaveFormat::new(
            self.sample_rate,
            self.channels,
            requested.bits_per_sample,
            requested.is_integer,
        );
        output.validate()?;
        self.output = output;

        Ok(StreamInfo {
            format: output,
            length_millis: self.reported_length_millis,
        })
    }

    fn run(&mut self, tx: &Sender<StreamMessage>, interrupt: &AtomicBool) {
        let channels = self.channels.max(1) as usize;
        let rate = self.sample_rate.max(1) as f64;
        let length_millis = self.frames() as u64 * 1000 / self.sample_rate.max(1) as u64;
        let reported = self.reported_length_millis.unwrap_or(length_millis);

        let _ = tx.send(StreamMessage::Progress {
            position_millis: 0,
            length_millis: reported,
        });

        for (chunk_index, chunk) in self.samples.chunks(self.chunk_frames * channels).enumerate() {
            if interrupt.load(Ordering::Relaxed) {
                log::debug!("Memory source interrupted at chunk {}", chunk_index);
                return;
            }

            let start_frame = chunk_index * self.chunk_frames;
            let mut data = Vec::with_capacity(chunk.len() * self.output.bytes_per_sample());
            encode_samples(chunk.iter().map(|s| *s as f32 / 32768.0), &self.output, &mut data);

            let message = StreamMessage::AudioData {
                data,
                format: self.output,
                start_millis: start_frame as f64 * 1000.0 / rate,
                duration_millis: (chunk.len() / channels) as f64 * 1000.0 / rate,
            };
            if tx.send(message).is_err() {
                return;
            }
        }

        let _ = tx.send(StreamMessage::Progress {
            position_millis: length_millis,
            length_millis: reported,
        });
        let _ = tx.send(StreamMessage::Finished);
    }
}
