//! Background min/max envelope computation
//!
//! The [`ZoomEngine`] turns the raw sample store into one envelope cell per
//! `samples_per_pixel` samples on a dedicated worker thread, while the UI
//! reads whatever is already computed.
//!
//! ## Locking
//!
//! - `control` (coarse): serialises `set_waveform`, `set_zoom_scale`,
//!   `resume` and `stop_and_clear`. Held across the worker join, so those
//!   calls block until the worker has stopped.
//! - `current`: the live session, taken briefly by `zoomed_buffer`, which
//!   therefore never waits for a join.
//! - The session's range queue (fine): held by the worker between ranges
//!   and by `zoomed_buffer` while it records the request.
//!
//! Lock order is `control` before `current` before the range queue.

mod envelope;
mod ranges;
mod worker;

pub use envelope::{Envelope, ZoomedData};

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::Shared;

use crate::config::WaveformConfig;
use crate::ingest::SampleStore;
use crate::sync::lock;
use crate::types::DataRange;
use worker::ZoomSession;

struct Control {
    store: Option<Shared<SampleStore>>,
    samples_per_pixel: u32,
    worker: Option<JoinHandle<()>>,
}

/// Owner of the zoom envelope and its worker thread
pub struct ZoomEngine {
    poll_interval: Duration,
    control: Mutex<Control>,
    current: Mutex<Option<Arc<ZoomSession>>>,
}

impl ZoomEngine {
    pub fn new(config: &WaveformConfig) -> Self {
        Self {
            poll_interval: config.zoom_poll_interval(),
            control: Mutex::new(Control {
                store: None,
                samples_per_pixel: 0,
                worker: None,
            }),
            current: Mutex::new(None),
        }
    }

    /// Install or detach the raw sample store
    ///
    /// Stops and joins the worker first; starts a new one when a zoom scale
    /// is already set.
    pub fn set_waveform(&self, store: Option<Shared<SampleStore>>) {
        let mut control = lock(&self.control);
        self.stop_locked(&mut control);
        control.store = store;
        if control.samples_per_pixel > 0 {
            self.start_locked(&mut control);
        }
    }

    /// Switch to a new samples-per-pixel ratio
    ///
    /// Zero and the current value are ignored. Anything else discards the
    /// envelope and recomputes from scratch.
    pub fn set_zoom_scale(&self, samples_per_pixel: u32) {
        let mut control = lock(&self.control);
        if samples_per_pixel == 0 || samples_per_pixel == control.samples_per_pixel {
            return;
        }
        self.stop_locked(&mut control);
        log::debug!(
            "Zoom scale {} -> {} samples per pixel",
            control.samples_per_pixel,
            samples_per_pixel
        );
        control.samples_per_pixel = samples_per_pixel;
        self.start_locked(&mut control);
    }

    /// Restart an idle worker on the existing envelope
    ///
    /// Used when decoding finishes so the tail of the stream gets covered.
    pub fn resume(&self) {
        let mut control = lock(&self.control);
        if control.worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        if let Some(handle) = control.worker.take() {
            if handle.join().is_err() {
                log::error!("Zoom worker panicked");
            }
        }

        let session = lock(&self.current).clone();
        if let Some(session) = session {
            if session.has_work() {
                log::debug!("Resuming zoom worker");
                control.worker = spawn_worker(session);
            }
        }
    }

    /// Stop the worker and free the envelope
    ///
    /// The installed store is kept; a later `set_zoom_scale` starts over.
    pub fn stop_and_clear(&self) {
        let mut control = lock(&self.control);
        self.stop_locked(&mut control);
        control.samples_per_pixel = 0;
    }

    /// Computed cells covering `[time_start_millis, time_end_millis)`
    ///
    /// Never waits for the worker. The window becomes the worker's priority.
    /// Empty until a store and a zoom scale are installed.
    pub fn zoomed_buffer(&self, time_start_millis: f64, time_end_millis: f64) -> ZoomedData {
        let session = lock(&self.current).clone();
        match session {
            Some(session) => session.zoomed(time_start_millis, time_end_millis),
            None => ZoomedData::empty(),
        }
    }

    pub fn samples_per_pixel(&self) -> u32 {
        lock(&self.control).samples_per_pixel
    }

    pub fn is_running(&self) -> bool {
        lock(&self.control)
            .worker
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Cells per channel of the current envelope
    pub fn envelope_len(&self) -> usize {
        lock(&self.current).as_ref().map_or(0, |s| s.envelope_len())
    }

    /// Pending and in-progress ranges of the current envelope
    pub fn pending_ranges(&self) -> Vec<DataRange> {
        lock(&self.current)
            .as_ref()
            .map_or_else(Vec::new, |s| s.pending_ranges())
    }

    fn start_locked(&self, control: &mut Control) {
        let Some(store) = control.store.as_ref() else {
            return;
        };
        let session = Arc::new(ZoomSession::new(
            Shared::clone(store),
            control.samples_per_pixel,
            self.poll_interval,
        ));
        *lock(&self.current) = Some(Arc::clone(&session));
        control.worker = spawn_worker(session);
    }

    fn stop_locked(&self, control: &mut Control) {
        let session = lock(&self.current).take();
        if let Some(session) = &session {
            session.interrupt();
        }
        if let Some(handle) = control.worker.take() {
            if handle.join().is_err() {
                log::error!("Zoom worker panicked");
            }
        }
    }
}

impl Drop for ZoomEngine {
    fn drop(&mut self) {
        let mut control = lock(&self.control);
        self.stop_locked(&mut control);
    }
}

impl std::fmt::Debug for ZoomEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoomEngine")
            .field("samples_per_pixel", &self.samples_per_pixel())
            .field("envelope_len", &self.envelope_len())
            .field("running", &self.is_running())
            .finish()
    }
}

fn spawn_worker(session: Arc<ZoomSession>) -> Option<JoinHandle<()>> {
    let spp = session.samples_per_pixel();
    match thread::Builder::new()
        .name("zoom-worker".to_string())
        .spawn(move || session.run())
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::error!("Failed to spawn zoom worker ({} samples per pixel): {}", spp, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::gc_handle;
    use std::time::Instant;

    fn engine() -> ZoomEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        ZoomEngine::new(&WaveformConfig {
            zoom_poll_interval_ms: 5,
            ..WaveformConfig::default()
        })
    }

    fn wait_for_len(engine: &ZoomEngine, t0: f64, t1: f64, expected: usize) -> ZoomedData {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut last = 0;
        loop {
            let data = engine.zoomed_buffer(t0, t1);
            assert!(data.len() >= last, "readable length shrank: {} < {}", data.len(), last);
            last = data.len();
            if data.len() >= expected || Instant::now() > deadline {
                return data;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_empty_before_setup() {
        let engine = engine();
        assert!(engine.zoomed_buffer(0.0, 1000.0).is_empty());
        engine.set_zoom_scale(10);
        assert!(engine.zoomed_buffer(0.0, 1000.0).is_empty());
        assert!(!engine.is_running());
        assert_eq!(engine.envelope_len(), 0);
    }

    #[test]
    fn test_zero_scale_is_ignored() {
        let engine = engine();
        engine.set_zoom_scale(0);
        assert_eq!(engine.samples_per_pixel(), 0);
        engine.set_zoom_scale(16);
        engine.set_zoom_scale(0);
        assert_eq!(engine.samples_per_pixel(), 16);
    }

    #[test]
    fn test_worker_fills_whole_envelope() {
        let engine = engine();
        let store = SampleStore::from_channels(1000, vec![vec![100; 5000], vec![-200; 5000]]);
        engine.set_waveform(Some(Shared::new(&gc_handle(), store)));
        engine.set_zoom_scale(50);
        assert_eq!(engine.envelope_len(), 100);

        let data = wait_for_len(&engine, 0.0, 5000.0, 100);
        assert_eq!(data.len(), 100);
        assert_eq!(data.channels(), 2);
        assert!(data.channel(0).iter().all(|c| c.min == 100 && c.max == 100));
        assert!(data.channel(1).iter().all(|c| c.min == 200 && c.max == 200));
        assert!(engine.pending_ranges().is_empty());
    }

    #[test]
    fn test_zoom_change_reallocates_envelope() {
        let engine = engine();
        let store = SampleStore::from_channels(1000, vec![vec![1; 1000]]);
        engine.set_zoom_scale(10);
        engine.set_waveform(Some(Shared::new(&gc_handle(), store)));
        assert_eq!(engine.envelope_len(), 100);
        let old = wait_for_len(&engine, 0.0, 1000.0, 100);

        engine.set_zoom_scale(100);
        assert_eq!(engine.envelope_len(), 10);
        assert_eq!(wait_for_len(&engine, 0.0, 1000.0, 10).len(), 10);
        // data handed out earlier stays readable
        assert_eq!(old.len(), 100);
        assert_eq!(old.cell(0, 99).max, 1);
    }

    #[test]
    fn test_stop_and_clear() {
        let engine = engine();
        let store = SampleStore::from_channels(1000, vec![vec![1; 100_000]]);
        engine.set_waveform(Some(Shared::new(&gc_handle(), store)));
        engine.set_zoom_scale(8);
        engine.stop_and_clear();
        assert!(!engine.is_running());
        assert!(engine.zoomed_buffer(0.0, 1000.0).is_empty());
        assert_eq!(engine.samples_per_pixel(), 0);

        engine.set_zoom_scale(8);
        assert_eq!(wait_for_len(&engine, 0.0, 800.0, 100).len(), 100);
    }

    #[test]
    fn test_resume_covers_tail_after_decoding() {
        let engine = engine();
        let store = Shared::new(&gc_handle(), SampleStore::new(1, 1000, 2000));
        for i in 0..1000 {
            store.write(0, i, 5);
        }
        store.publish(1000);
        engine.set_waveform(Some(Shared::clone(&store)));
        engine.set_zoom_scale(100);
        assert_eq!(wait_for_len(&engine, 0.0, 2000.0, 10).len(), 10);

        for i in 1000..1550 {
            store.write(0, i, 5);
        }
        store.finish(1550);
        engine.resume();
        assert_eq!(wait_for_len(&engine, 0.0, 2000.0, 16).len(), 16);
        assert!(engine.pending_ranges().is_empty());
    }

    #[test]
    fn test_detach_store() {
        let engine = engine();
        let store = SampleStore::from_channels(1000, vec![vec![1; 1000]]);
        engine.set_zoom_scale(10);
        engine.set_waveform(Some(Shared::new(&gc_handle(), store)));
        engine.set_waveform(None);
        assert!(engine.zoomed_buffer(0.0, 1000.0).is_empty());
        assert_eq!(engine.samples_per_pixel(), 10);
    }
}
