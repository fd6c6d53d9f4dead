//! Envelope storage and the read view handed to the UI

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::ZoomCell;

/// Min/max cells of every channel at one zoom scale
///
/// Cells are written once by the zoom worker. Whether a cell is valid is
/// decided by the range queue, never by its content.
pub struct Envelope {
    channels: Vec<Box<[AtomicU64]>>,
    len: usize,
}

impl Envelope {
    pub(crate) fn new(channels: u16, len: usize) -> Self {
        let channels = (0..channels)
            .map(|_| (0..len).map(|_| AtomicU64::new(0)).collect())
            .collect();
        Self { channels, len }
    }

    /// Cells per channel
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channels(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn cell(&self, channel: usize, index: usize) -> ZoomCell {
        self.channels
            .get(channel)
            .and_then(|cells| cells.get(index))
            .map_or_else(ZoomCell::default, |cell| ZoomCell::unpack(cell.load(Ordering::Relaxed)))
    }

    pub(crate) fn set(&self, channel: usize, index: usize, cell: ZoomCell) {
        if let Some(slot) = self.channels.get(channel).and_then(|cells| cells.get(index)) {
            slot.store(cell.pack(), Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("channels", &self.channels.len())
            .field("len", &self.len)
            .finish()
    }
}

/// Already-computed envelope cells for a requested window
///
/// Holds its own reference to the envelope, so it stays readable after the
/// engine switches zoom scale; it just stops describing the current view.
/// Re-query after every repaint to pick up cells computed in the meantime.
#[derive(Debug, Clone, Default)]
pub struct ZoomedData {
    envelope: Option<Arc<Envelope>>,
    start: usize,
    len: usize,
}

impl ZoomedData {
    pub(crate) fn new(envelope: Arc<Envelope>, start: usize, len: usize) -> Self {
        let len = len.min(envelope.len().saturating_sub(start));
        Self {
            envelope: Some(envelope),
            start,
            len,
        }
    }

    /// Nothing available yet (no stream, no zoom scale, or not computed)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of valid cells
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Envelope index of the first cell
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn channels(&self) -> u16 {
        self.envelope.as_ref().map_or(0, |e| e.channels())
    }

    /// `index` is relative to `start()`; out of range reads return an empty cell
    pub fn cell(&self, channel: usize, index: usize) -> ZoomCell {
        match &self.envelope {
            Some(envelope) if index < self.len => envelope.cell(channel, self.start + index),
            _ => ZoomCell::default(),
        }
    }

    pub fn channel(&self, channel: usize) -> Vec<ZoomCell> {
        (0..self.len).map(|i| self.cell(channel, i)).collect()
    }
}
