//! Raw per-channel sample store
//!
//! Written by exactly one decode session and read concurrently by the zoom
//! worker and the UI. Cells are atomics so reads never tear. A cell below
//! `available()` (an `Acquire` load of the write cursor) was written before
//! the cursor was published.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicUsize, Ordering};

use crate::types::SampleType;

/// Decimated sample arrays for every channel of a stream
pub struct SampleStore {
    sample_rate: u32,
    channels: Vec<Box<[AtomicI16]>>,
    capacity: usize,
    /// Next write position (decimated samples)
    available: AtomicUsize,
    /// Capacity while decoding, final write position once finished
    length: AtomicUsize,
    decoding: AtomicBool,
}

impl SampleStore {
    /// Allocate an empty store for a decode session in progress
    pub fn new(channels: u16, sample_rate: u32, capacity: usize) -> Self {
        let channels = (0..channels)
            .map(|_| (0..capacity).map(|_| AtomicI16::new(0)).collect())
            .collect();

        Self {
            sample_rate,
            channels,
            capacity,
            available: AtomicUsize::new(0),
            length: AtomicUsize::new(capacity),
            decoding: AtomicBool::new(true),
        }
    }

    /// Build a finished store from already-decimated channel data
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn from_channels(sample_rate: u32, data: Vec<Vec<SampleType>>) -> Self {
        let capacity = data.iter().map(Vec::len).max().unwrap_or(0);
        let channels = data
            .into_iter()
            .map(|samples| {
                let mut cells: Vec<AtomicI16> = samples.into_iter().map(AtomicI16::new).collect();
                cells.resize_with(capacity, || AtomicI16::new(0));
                cells.into_boxed_slice()
            })
            .collect();

        Self {
            sample_rate,
            channels,
            capacity,
            available: AtomicUsize::new(capacity),
            length: AtomicUsize::new(capacity),
            decoding: AtomicBool::new(false),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Stored (decimated) samples per second
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples per channel the timeline spans
    pub fn length(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    /// Number of samples per channel written so far
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn is_decoding(&self) -> bool {
        self.decoding.load(Ordering::Acquire)
    }

    pub fn length_millis(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.length() as u64 * 1000 / self.sample_rate as u64
    }

    /// Read one sample; out of range reads return silence
    pub fn sample(&self, channel: usize, index: usize) -> SampleType {
        self.channels
            .get(channel)
            .and_then(|samples| samples.get(index))
            .map_or(0, |cell| cell.load(Ordering::Relaxed))
    }

    /// Copy a range of one channel, clamped to capacity
    pub fn copy_channel(&self, channel: usize, range: Range<usize>) -> Vec<SampleType> {
        let Some(samples) = self.channels.get(channel) else {
            return Vec::new();
        };
        let end = range.end.min(self.capacity);
        let start = range.start.min(end);
        samples[start..end]
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }

    pub(crate) fn write(&self, channel: usize, index: usize, value: SampleType) {
        if let Some(cell) = self.channels.get(channel).and_then(|samples| samples.get(index)) {
            cell.store(value, Ordering::Relaxed);
        }
    }

    /// Publish the write cursor after a batch of writes
    pub(crate) fn publish(&self, available: usize) {
        self.available.store(available.min(self.capacity), Ordering::Release);
    }

    /// Freeze the timeline at `length` samples and end the session
    pub(crate) fn finish(&self, length: usize) {
        let length = length.min(self.capacity);
        self.available.store(length, Ordering::Release);
        self.length.store(length, Ordering::Release);
        self.decoding.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels.len())
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("length", &self.length())
            .field("decoding", &self.is_decoding())
            .finish()
    }
}
