//! Decimation state of a decode session
//!
//! Streams above the zoom ceiling are reduced by averaging `2^shift`
//! consecutive frames into one stored sample per channel. A chunk may end in
//! the middle of a group; the partially accumulated group carries over to
//! the next chunk, so the stored output does not depend on how the decoder
//! split the stream.

use super::store::SampleStore;
use crate::types::{SampleType, SAMPLE_MAX, SAMPLE_MIN};

/// Largest decimation exponent; keeps the i32 accumulators from overflowing
const MAX_SAMPLE_SHIFT: u8 = 15;

/// Timestamp disagreement, in stored samples, treated as decoder jitter
pub const JITTER_SAMPLES: usize = 1;

/// Smallest `shift` such that `sample_rate >> shift <= ceiling_hz`
pub fn sample_shift_for(sample_rate: u32, ceiling_hz: u32) -> u8 {
    let ceiling = ceiling_hz.max(1);
    let mut rate = sample_rate;
    let mut shift = 0u8;
    while rate > ceiling && shift < MAX_SAMPLE_SHIFT {
        rate >>= 1;
        shift += 1;
    }
    shift
}

/// Square-root display curve applied to an averaged sample
///
/// Quiet passages get visually emphasised. The sign is kept so the stored
/// value still deviates from zero in the original direction.
pub fn scale_sample(average: i32) -> SampleType {
    let half_range = (SAMPLE_MAX - SAMPLE_MIN) as f64 / 2.0;
    let magnitude = (average.unsigned_abs() as f64 / half_range).sqrt() * SAMPLE_MAX as f64;
    let magnitude = magnitude.min(SAMPLE_MAX as f64) as i32;
    if average < 0 {
        -magnitude as SampleType
    } else {
        magnitude as SampleType
    }
}

/// How a chunk's timestamp related to the write cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Chunk continues where the previous one ended
    Contiguous,
    /// Chunk starts before the cursor; the cursor moved back to it
    Rewound { from: usize, to: usize },
    /// Chunk starts after the cursor; the hole was padded
    GapFilled { from: usize, to: usize },
}

/// Decimation descriptor of the active decode session
#[derive(Debug)]
pub struct IngestFrame {
    /// Next write position in the store
    offset: usize,
    sample_shift: u8,
    channels: usize,
    /// Interleaved samples per decimated frame: `(1 << shift) * channels`
    frame_size: usize,
    /// Interleaved samples already accumulated into the current frame
    overflow: usize,
    accumulators: Vec<i32>,
}

impl IngestFrame {
    pub fn new(sample_shift: u8, channels: u16) -> Self {
        let sample_shift = sample_shift.min(MAX_SAMPLE_SHIFT);
        let channels = channels.max(1) as usize;
        Self {
            offset: 0,
            sample_shift,
            channels,
            frame_size: (1usize << sample_shift) * channels,
            overflow: 0,
            accumulators: vec![0; channels],
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn sample_shift(&self) -> u8 {
        self.sample_shift
    }

    pub fn overflow(&self) -> usize {
        self.overflow
    }

    /// Move the cursor to a chunk's declared start position
    ///
    /// Overlaps rewind the cursor so the new chunk overwrites what was
    /// there. Holes are padded with the last written sample of each channel
    /// (silence at the very start). Either adjustment drops the partial frame.
    pub fn align(&mut self, store: &SampleStore, chunk_start: usize) -> Alignment {
        let chunk_start = chunk_start.min(store.capacity());
        let from = self.offset;

        if chunk_start + JITTER_SAMPLES < from {
            self.offset = chunk_start;
            self.overflow = 0;
            store.publish(self.offset);
            return Alignment::Rewound { from, to: chunk_start };
        }

        if chunk_start > from + JITTER_SAMPLES {
            for channel in 0..self.channels {
                let fill = if from > 0 { store.sample(channel, from - 1) } else { 0 };
                for index in from..chunk_start {
                    store.write(channel, index, fill);
                }
            }
            self.offset = chunk_start;
            self.overflow = 0;
            store.publish(self.offset);
            return Alignment::GapFilled { from, to: chunk_start };
        }

        Alignment::Contiguous
    }

    /// Accumulate interleaved samples, storing every completed frame
    ///
    /// Returns the number of completed frames that did not fit in the store.
    pub fn push<I>(&mut self, store: &SampleStore, samples: I) -> usize
    where
        I: IntoIterator<Item = SampleType>,
    {
        let capacity = store.capacity();
        let mut dropped = 0;

        for sample in samples {
            let channel = self.overflow % self.channels;
            if self.overflow < self.channels {
                self.accumulators[channel] = sample as i32;
            } else {
                self.accumulators[channel] += sample as i32;
            }
            self.overflow += 1;

            if self.overflow == self.frame_size {
                self.overflow = 0;
                if self.offset < capacity {
                    for (channel, acc) in self.accumulators.iter().enumerate() {
                        store.write(channel, self.offset, scale_sample(acc >> self.sample_shift));
                    }
                    self.offset += 1;
                } else {
                    dropped += 1;
                }
            }
        }

        store.publish(self.offset);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shift_for_common_rates() {
        assert_eq!(sample_shift_for(48000, 3000), 4);
        assert_eq!(sample_shift_for(44100, 3000), 4);
        assert_eq!(sample_shift_for(8000, 3000), 2);
        assert_eq!(sample_shift_for(3000, 3000), 0);
        assert_eq!(sample_shift_for(2000, 3000), 0);
        assert_eq!(48000 >> sample_shift_for(48000, 3000), 3000);
    }

    #[test]
    fn test_sample_shift_is_bounded() {
        assert_eq!(sample_shift_for(u32::MAX, 0), MAX_SAMPLE_SHIFT);
    }

    #[test]
    fn test_scale_sample_curve() {
        assert_eq!(scale_sample(0), 0);
        assert_eq!(scale_sample(32767), 32766);
        assert_eq!(scale_sample(-32768), -32767);
        // a quarter of full scale maps to half of full scale
        let quarter = scale_sample(8192);
        assert!((quarter as i32 - 16383).abs() <= 1, "got {}", quarter);
        assert_eq!(scale_sample(-8192), -quarter);
    }

    #[test]
    fn test_push_without_decimation_scales_each_sample() {
        let store = SampleStore::new(1, 3000, 16);
        let mut frame = IngestFrame::new(0, 1);
        assert_eq!(frame.push(&store, [0, 8192, -8192]), 0);
        assert_eq!(frame.offset(), 3);
        assert_eq!(store.available(), 3);
        assert_eq!(store.sample(0, 1), scale_sample(8192));
        assert_eq!(store.sample(0, 2), scale_sample(-8192));
    }

    #[test]
    fn test_push_averages_interleaved_channels() {
        let store = SampleStore::new(2, 3000, 16);
        let mut frame = IngestFrame::new(1, 2);
        // two stereo frames averaged into one stored frame
        frame.push(&store, [100, -200, 300, -400]);
        assert_eq!(frame.offset(), 1);
        assert_eq!(store.sample(0, 0), scale_sample(200));
        assert_eq!(store.sample(1, 0), scale_sample(-300));
    }

    #[test]
    fn test_partial_frame_carries_over() {
        let store = SampleStore::new(2, 3000, 16);
        let mut frame = IngestFrame::new(1, 2);
        frame.push(&store, [100, -200, 300]);
        assert_eq!(frame.offset(), 0);
        assert_eq!(frame.overflow(), 3);
        frame.push(&store, [-400]);
        assert_eq!(frame.offset(), 1);
        assert_eq!(frame.overflow(), 0);
        assert_eq!(store.sample(1, 0), scale_sample(-300));
    }

    #[test]
    fn test_push_drops_frames_beyond_capacity() {
        let store = SampleStore::new(1, 3000, 2);
        let mut frame = IngestFrame::new(0, 1);
        assert_eq!(frame.push(&store, [1, 2, 3, 4, 5]), 3);
        assert_eq!(frame.offset(), 2);
        assert_eq!(store.available(), 2);
    }

    #[test]
    fn test_align_fills_gap_with_last_sample() {
        let store = SampleStore::new(1, 3000, 32);
        let mut frame = IngestFrame::new(0, 1);
        frame.push(&store, [0, 0, 8192]);
        let last = store.sample(0, 2);
        assert_ne!(last, 0);

        assert_eq!(frame.align(&store, 10), Alignment::GapFilled { from: 3, to: 10 });
        assert_eq!(frame.offset(), 10);
        for index in 3..10 {
            assert_eq!(store.sample(0, index), last);
        }
    }

    #[test]
    fn test_align_fills_leading_gap_with_silence() {
        let store = SampleStore::new(2, 3000, 32);
        let mut frame = IngestFrame::new(0, 2);
        assert_eq!(frame.align(&store, 5), Alignment::GapFilled { from: 0, to: 5 });
        assert_eq!(store.copy_channel(1, 0..5), vec![0; 5]);
        assert_eq!(store.available(), 5);
    }

    #[test]
    fn test_align_rewinds_on_overlap() {
        let store = SampleStore::new(1, 3000, 32);
        let mut frame = IngestFrame::new(0, 1);
        frame.push(&store, [1; 20]);
        assert_eq!(frame.align(&store, 12), Alignment::Rewound { from: 20, to: 12 });
        assert_eq!(store.available(), 12);
        frame.push(&store, [8192; 3]);
        assert_eq!(store.sample(0, 12), scale_sample(8192));
        assert_eq!(frame.offset(), 15);
    }

    #[test]
    fn test_align_absorbs_jitter() {
        let store = SampleStore::new(1, 3000, 32);
        let mut frame = IngestFrame::new(0, 1);
        frame.push(&store, [1; 10]);
        assert_eq!(frame.align(&store, 9), Alignment::Contiguous);
        assert_eq!(frame.align(&store, 11), Alignment::Contiguous);
        assert_eq!(frame.offset(), 10);
    }
}
