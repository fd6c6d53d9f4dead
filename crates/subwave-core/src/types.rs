//! Common types for subwave
//!
//! This module contains the value types shared by the ingest, zoom and view
//! layers: the PCM layout descriptor, the stored sample type, zoom cells and
//! the half-open cell ranges used by the zoom worker.

use std::fmt;

use crate::error::{FormatError, FormatResult};

/// Stored sample type (16-bit signed, after decimation)
pub type SampleType = i16;

/// Smallest representable stored sample
pub const SAMPLE_MIN: i32 = SampleType::MIN as i32;

/// Largest representable stored sample
pub const SAMPLE_MAX: i32 = SampleType::MAX as i32;

/// Midpoint of the stored range; envelope values are absolute deviations from it
///
/// The range has an even number of values, so the midpoint rounds up to 0
/// rather than down to -1 and silence stores as 0.
pub const SAMPLE_ZERO: i32 = SAMPLE_MIN + (SAMPLE_MAX - SAMPLE_MIN + 1) / 2;

/// PCM layout of a decoded audio stream
///
/// Valid bits per sample are 8, 16, 24 and 32. Integer samples are signed,
/// except 8-bit which is unsigned. Float samples are only valid at 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample (8, 16, 24 or 32)
    pub bits_per_sample: u16,
    /// Integer (true) or IEEE float (false) samples
    pub is_integer: bool,
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            is_integer: true,
        }
    }
}

impl WaveFormat {
    /// Create a new format description
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16, is_integer: bool) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            is_integer,
        }
    }

    /// 16-bit signed integer PCM, the layout requested from decoders
    pub const fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, 16, true)
    }

    /// Check that this format can be ingested
    pub fn validate(&self) -> FormatResult<()> {
        if self.sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(FormatError::ZeroChannels);
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(FormatError::UnsupportedBitDepth(self.bits_per_sample));
        }
        if !self.is_integer && self.bits_per_sample != 32 {
            return Err(FormatError::UnsupportedFloatDepth(self.bits_per_sample));
        }
        Ok(())
    }

    /// Whether `validate()` succeeds
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes per interleaved frame (one sample for every channel)
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn is_signed(&self) -> bool {
        self.bits_per_sample != 8 || !self.is_integer
    }

    /// Convert one little-endian sample to the stored sample domain
    ///
    /// `bytes` must hold exactly `bytes_per_sample()` bytes.
    pub fn sample_to_i16(&self, bytes: &[u8]) -> SampleType {
        match (self.is_integer, bytes) {
            (true, [b]) => ((*b as i16) - 128) << 8,
            (true, [lo, hi]) => i16::from_le_bytes([*lo, *hi]),
            (true, [_, mid, hi]) => i16::from_le_bytes([*mid, *hi]),
            (true, [_, _, b2, b3]) => i16::from_le_bytes([*b2, *b3]),
            (false, [b0, b1, b2, b3]) => {
                let value = f32::from_le_bytes([*b0, *b1, *b2, *b3]);
                (value.clamp(-1.0, 1.0) * SAMPLE_MAX as f32) as SampleType
            }
            _ => 0,
        }
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz.{}ch.{}bps.{}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            if self.is_integer { "int" } else { "float" }
        )
    }
}

/// One envelope cell: average and peak absolute deviation of the raw
/// samples it covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoomCell {
    pub min: u32,
    pub max: u32,
}

impl ZoomCell {
    pub(crate) fn pack(self) -> u64 {
        (self.max as u64) << 32 | self.min as u64
    }

    pub(crate) fn unpack(packed: u64) -> Self {
        Self {
            min: packed as u32,
            max: (packed >> 32) as u32,
        }
    }
}

/// Half-open range of zoom-cell indices `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataRange {
    pub start: u32,
    pub end: u32,
}

impl DataRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the two ranges share at least one index
    pub fn intersects(&self, other: &DataRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.start && index < self.end
    }
}
