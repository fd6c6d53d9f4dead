//! Envelope computation for one zoom scale
//!
//! A session owns the envelope and range queue of one
//! (sample store, samples per pixel) pair. The worker thread repeatedly
//! takes the next pending range, computes its cells and returns the
//! unprocessed tail to the queue when it is interrupted or re-targeted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use basedrop::Shared;

use super::envelope::{Envelope, ZoomedData};
use super::ranges::RangeQueue;
use crate::ingest::SampleStore;
use crate::sync::lock;
use crate::types::{DataRange, ZoomCell, SAMPLE_ZERO};

/// Outcome of one worker iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Cells `[start, end)` were computed
    Processed(DataRange),
    /// Queue is empty but the store is still being written
    Waiting,
    /// Everything the store holds has been computed
    Drained,
    Interrupted,
}

pub(crate) struct ZoomSession {
    store: Shared<SampleStore>,
    samples_per_pixel: u32,
    envelope: Arc<Envelope>,
    queue: Mutex<RangeQueue>,
    wake: Condvar,
    interrupt: AtomicBool,
    /// Set by the UI side when the active range should be split
    restart: AtomicBool,
    poll_interval: Duration,
}

impl ZoomSession {
    pub fn new(store: Shared<SampleStore>, samples_per_pixel: u32, poll_interval: Duration) -> Self {
        let samples_per_pixel = samples_per_pixel.max(1);
        let cells = store.length().div_ceil(samples_per_pixel as usize);
        let envelope = Arc::new(Envelope::new(store.channels(), cells));
        let initial = (store.available() / samples_per_pixel as usize).min(cells) as u32;

        Self {
            store,
            samples_per_pixel,
            envelope,
            queue: Mutex::new(RangeQueue::new(initial)),
            wake: Condvar::new(),
            interrupt: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            poll_interval,
        }
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    pub fn envelope_len(&self) -> usize {
        self.envelope.len()
    }

    pub fn pending_ranges(&self) -> Vec<DataRange> {
        lock(&self.queue).snapshot()
    }

    /// Ask the worker to stop at the next cell boundary
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
        let _queue = lock(&self.queue);
        self.wake.notify_all();
    }

    /// Whether a worker started now would find anything to do
    pub fn has_work(&self) -> bool {
        let queue = lock(&self.queue);
        let limit = self.coverage_end();
        if self.store.is_decoding() {
            !queue.is_idle() || limit > queue.covered()
        } else {
            queue.has_ready(limit) || limit > queue.covered()
        }
    }

    /// Cells whose samples are all written
    ///
    /// Once decoding is over the trailing partial cell counts too.
    fn coverage_end(&self) -> u32 {
        let decoding = self.store.is_decoding();
        let available = self.store.available();
        let spp = self.samples_per_pixel as usize;
        let end = if decoding {
            available / spp
        } else {
            available.div_ceil(spp)
        };
        end.min(self.envelope.len()) as u32
    }

    /// Run one iteration; with `wait` an empty queue blocks for one poll interval
    pub fn step(&self, wait: bool) -> Step {
        let range = {
            let mut queue = lock(&self.queue);
            loop {
                if self.interrupt.load(Ordering::Acquire) {
                    return Step::Interrupted;
                }
                if let Some(range) = queue.take_next(self.coverage_end()) {
                    self.restart.store(false, Ordering::Release);
                    break range;
                }

                let decoding = self.store.is_decoding();
                if queue.extend_coverage(self.coverage_end()) {
                    continue;
                }
                if !decoding {
                    return Step::Drained;
                }
                if !wait {
                    return Step::Waiting;
                }
                let (_queue, _) = self
                    .wake
                    .wait_timeout(queue, self.poll_interval)
                    .unwrap_or_else(PoisonError::into_inner);
                return Step::Waiting;
            }
        };

        let cursor = self.compute(range);

        lock(&self.queue).finish_active(cursor);
        if cursor == range.start && self.interrupt.load(Ordering::Acquire) {
            return Step::Interrupted;
        }
        Step::Processed(DataRange::new(range.start, cursor))
    }

    /// Compute cells of `range`; returns the index of the first cell not written
    ///
    /// Stops early at cells whose samples are not all written, which happens
    /// when an overlapping chunk rewinds the write cursor.
    fn compute(&self, range: DataRange) -> u32 {
        let spp = self.samples_per_pixel as usize;
        let available = self.store.available();
        let channels = self.store.channels() as usize;
        let end = range.end.min(self.coverage_end());

        for index in range.start..end {
            if self.interrupt.load(Ordering::Relaxed) || self.restart.load(Ordering::Relaxed) {
                return index;
            }

            let first = index as usize * spp;
            let last = (first + spp).min(available);
            for channel in 0..channels {
                let mut sum = 0u64;
                let mut peak = 0u32;
                for i in first..last {
                    let value = (self.store.sample(channel, i) as i32 - SAMPLE_ZERO).unsigned_abs();
                    sum += value as u64;
                    peak = peak.max(value);
                }
                let cell = ZoomCell {
                    min: (sum / spp as u64) as u32,
                    max: peak,
                };
                self.envelope.set(channel, index as usize, cell);
            }
        }
        end.max(range.start)
    }

    /// Already-computed cells of the window `[time_start, time_end)` (millis)
    ///
    /// Records the window as the worker's priority and wakes it.
    pub fn zoomed(&self, time_start_millis: f64, time_end_millis: f64) -> ZoomedData {
        let cells_per_milli = self.store.sample_rate() as f64 / self.samples_per_pixel as f64 / 1000.0;
        let max = self.envelope.len() as f64;
        let start = (time_start_millis * cells_per_milli).floor().clamp(0.0, max) as u32;
        let end = (time_end_millis * cells_per_milli).ceil().clamp(0.0, max) as u32;
        if end <= start {
            return ZoomedData::new(Arc::clone(&self.envelope), start as usize, 0);
        }

        let window = DataRange::new(start, end);
        let len = {
            let mut queue = lock(&self.queue);
            if queue.set_request(window) {
                self.restart.store(true, Ordering::Release);
            }
            queue.readable_len(window)
        };
        self.wake.notify_one();

        ZoomedData::new(Arc::clone(&self.envelope), start as usize, len as usize)
    }

    /// Worker thread body
    pub fn run(&self) {
        log::debug!(
            "Zoom worker started: {} samples per pixel, {} cells",
            self.samples_per_pixel,
            self.envelope.len()
        );
        let mut processed = 0u64;
        loop {
            match self.step(true) {
                Step::Processed(range) => processed += range.len() as u64,
                Step::Waiting => {}
                Step::Drained => {
                    log::debug!("Zoom worker drained after {} cells", processed);
                    break;
                }
                Step::Interrupted => {
                    log::debug!("Zoom worker interrupted after {} cells", processed);
                    break;
                }
            }
        }
    }
}
