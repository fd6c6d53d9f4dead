//! Streaming sample ingest
//!
//! [`SampleIngest`] runs one decode session at a time and assembles the
//! decoded chunks into a contiguous per-channel timeline:
//!
//! ```text
//!  wave-decoder thread          wave-ingest thread                 UI
//! ┌──────────────────┐        ┌─────────────────────┐
//! │ StreamSource::run│──msg──▶│ on_chunk_delivered  │──┐
//! └──────────────────┘        │ on_decode_progress  │  │ WaveformEvent
//!                             │ on_decode_finished  │  ├──────────────▶
//!                             └─────────┬───────────┘  │
//!                                       │ set_waveform │
//!                                       ▼              │
//!                                   ZoomEngine ────────┘ zoomed_buffer()
//! ```
//!
//! The store is sized on the first chunk from the reported duration plus a
//! fixed slack, since container metadata is often wrong. It never grows;
//! writes past its end are dropped.

mod frame;
mod store;

pub use frame::{sample_shift_for, scale_sample, Alignment, IngestFrame, JITTER_SAMPLES};
pub use store::SampleStore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use basedrop::Shared;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};

use crate::config::WaveformConfig;
use crate::error::DecodeError;
use crate::gc::gc_handle;
use crate::stream::{StreamMessage, StreamSource, REQUESTED_LAYOUT};
use crate::sync::lock;
use crate::types::WaveFormat;
use crate::zoom::ZoomEngine;

/// Decoded chunks buffered between the decoder and the ingest thread
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Notifications for the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformEvent {
    /// A store was installed or removed; lengths and channels changed
    Updated,
    Progress { position_millis: u64, length_millis: u64 },
    Finished,
    Error(DecodeError),
}

#[derive(Default)]
struct IngestState {
    /// Reported stream duration; the placeholder duration for null streams
    duration_millis: u64,
    /// Native format of the first chunk
    format: Option<WaveFormat>,
    frame: Option<IngestFrame>,
    store: Option<Shared<SampleStore>>,
    decoding: bool,
    clamp_logged: bool,
    mismatch_logged: bool,
}

struct IngestShared {
    config: WaveformConfig,
    zoom: Arc<ZoomEngine>,
    state: Mutex<IngestState>,
    events: Sender<WaveformEvent>,
}

struct DecodeSession {
    interrupt: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owner of the raw sample timeline of one waveform widget
pub struct SampleIngest {
    shared: Arc<IngestShared>,
    events_rx: Receiver<WaveformEvent>,
    session: Option<DecodeSession>,
}

impl SampleIngest {
    pub fn new(config: WaveformConfig, zoom: Arc<ZoomEngine>) -> Self {
        let (events, events_rx) = unbounded();
        Self {
            shared: Arc::new(IngestShared {
                config,
                zoom,
                state: Mutex::new(IngestState::default()),
                events,
            }),
            events_rx,
            session: None,
        }
    }

    /// Notifications for the UI; poll with `try_recv` from the event loop
    pub fn events(&self) -> Receiver<WaveformEvent> {
        self.events_rx.clone()
    }

    pub fn zoom_engine(&self) -> &Arc<ZoomEngine> {
        &self.shared.zoom
    }

    pub fn config(&self) -> &WaveformConfig {
        &self.shared.config
    }

    /// Start decoding `source`, replacing the current stream
    ///
    /// Returns immediately. Open failures arrive as `WaveformEvent::Error`
    /// and leave the ingest without channels.
    pub fn set_audio_stream(&mut self, source: Box<dyn StreamSource>, stream_index: usize) {
        self.clear_audio_stream();
        lock(&self.shared.state).decoding = true;

        let interrupt = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let thread_interrupt = Arc::clone(&interrupt);

        let spawned = thread::Builder::new()
            .name("wave-ingest".to_string())
            .spawn(move || decode_session(shared, source, stream_index, thread_interrupt));

        match spawned {
            Ok(handle) => self.session = Some(DecodeSession { interrupt, handle }),
            Err(e) => {
                log::error!("Failed to spawn ingest thread: {}", e);
                self.shared.on_decode_error(DecodeError::io(e.to_string()));
            }
        }
    }

    /// Stream-less placeholder spanning `duration_millis`
    pub fn set_null_audio_stream(&mut self, duration_millis: u64) {
        self.clear_audio_stream();
        lock(&self.shared.state).duration_millis = duration_millis;
        log::info!("Null audio stream of {} ms", duration_millis);
        self.shared.emit(WaveformEvent::Updated);
    }

    /// Stop decoding and free the store
    pub fn clear_audio_stream(&mut self) {
        if let Some(session) = self.session.take() {
            session.interrupt.store(true, Ordering::Release);
            if session.handle.join().is_err() {
                log::error!("Ingest thread panicked");
            }
        }

        let mut state = lock(&self.shared.state);
        let had_stream = state.store.is_some() || state.duration_millis > 0;
        *state = IngestState::default();
        self.shared.zoom.set_waveform(None);
        drop(state);

        if had_stream {
            self.shared.emit(WaveformEvent::Updated);
        }
    }

    /// Feed one decoded chunk; normally called by the ingest thread
    pub fn on_chunk_delivered(&self, data: &[u8], format: &WaveFormat, start_millis: f64) {
        self.shared.on_chunk_delivered(data, format, start_millis);
    }

    pub fn on_decode_progress(&self, position_millis: u64, length_millis: u64) {
        self.shared.on_decode_progress(position_millis, length_millis);
    }

    pub fn on_decode_finished(&self) {
        self.shared.on_decode_finished();
    }

    /// Decimated samples written so far
    pub fn samples_available(&self) -> usize {
        lock(&self.shared.state).store.as_ref().map_or(0, |s| s.available())
    }

    pub fn channels(&self) -> u16 {
        lock(&self.shared.state).store.as_ref().map_or(0, |s| s.channels())
    }

    /// Decimated sample rate, 0 without a store
    pub fn sample_rate(&self) -> u32 {
        lock(&self.shared.state).store.as_ref().map_or(0, |s| s.sample_rate())
    }

    /// Timeline length in decimated samples (capacity while decoding)
    pub fn length_samples(&self) -> usize {
        lock(&self.shared.state).store.as_ref().map_or(0, |s| s.length())
    }

    /// Timeline length; the placeholder duration for null streams
    pub fn length_millis(&self) -> u64 {
        let state = lock(&self.shared.state);
        state
            .store
            .as_ref()
            .map_or(state.duration_millis, |s| s.length_millis())
    }

    /// Duration reported by the decoder
    pub fn duration_millis(&self) -> u64 {
        lock(&self.shared.state).duration_millis
    }

    /// Milliseconds covered by one pixel at `samples_per_pixel`
    ///
    /// Without a store the zoom ceiling stands in for the sample rate.
    pub fn millis_per_pixel(&self, samples_per_pixel: u32) -> f64 {
        let rate = match self.sample_rate() {
            0 => self.shared.config.zoom_ceiling_hz.max(1),
            rate => rate,
        };
        samples_per_pixel as f64 * 1000.0 / rate as f64
    }

    pub fn is_decoding(&self) -> bool {
        lock(&self.shared.state).decoding
    }

    pub fn store(&self) -> Option<Shared<SampleStore>> {
        lock(&self.shared.state).store.clone()
    }
}

impl Drop for SampleIngest {
    fn drop(&mut self) {
        self.clear_audio_stream();
    }
}

impl IngestShared {
    fn emit(&self, event: WaveformEvent) {
        // receiver lives as long as the owning SampleIngest
        let _ = self.events.send(event);
    }

    fn on_chunk_delivered(&self, data: &[u8], format: &WaveFormat, start_millis: f64) {
        if let Err(e) = format.validate() {
            log::warn!("Dropping chunk with invalid format {}: {}", format, e);
            return;
        }

        let mut state = lock(&self.state);
        let state = &mut *state;

        if state.store.is_none() {
            let shift = sample_shift_for(format.sample_rate, self.config.zoom_ceiling_hz);
            let rate = format.sample_rate >> shift;
            let capacity_millis = state.duration_millis + self.config.duration_slack_ms;
            let capacity = (rate as u64 * capacity_millis / 1000) as usize;
            if state.duration_millis == 0 {
                log::warn!(
                    "Stream length unknown, waveform truncated after {} ms",
                    self.config.duration_slack_ms
                );
            }

            log::info!(
                "Allocating sample store: {} -> {} Hz (shift {}), {} samples x {} channels",
                format,
                rate,
                shift,
                capacity,
                format.channels
            );

            let store = Shared::new(&gc_handle(), SampleStore::new(format.channels, rate, capacity));
            state.frame = Some(IngestFrame::new(shift, format.channels));
            state.format = Some(*format);
            state.store = Some(Shared::clone(&store));
            state.decoding = true;
            self.zoom.set_waveform(Some(store));
            self.emit(WaveformEvent::Updated);
        } else if state.format != Some(*format) {
            if !state.mismatch_logged {
                log::warn!(
                    "Dropping chunk with format {} (session format {:?})",
                    format,
                    state.format.map(|f| f.to_string())
                );
                state.mismatch_logged = true;
            }
            return;
        }

        let (Some(frame), Some(store)) = (state.frame.as_mut(), state.store.as_ref()) else {
            log::debug!("Chunk delivered after decoding finished");
            return;
        };

        let chunk_start = (start_millis.max(0.0) * store.sample_rate() as f64 / 1000.0).floor() as usize;
        match frame.align(store, chunk_start) {
            Alignment::Contiguous => {}
            Alignment::Rewound { from, to } => log::debug!("Chunk overlap: rewinding {} -> {}", from, to),
            Alignment::GapFilled { from, to } => log::debug!("Chunk gap: filling {}..{}", from, to),
        }

        let samples = data
            .chunks_exact(format.bytes_per_sample())
            .map(|bytes| format.sample_to_i16(bytes));
        let dropped = frame.push(store, samples);

        if dropped > 0 && !state.clamp_logged {
            log::warn!(
                "Sample store full at {} samples; dropping the rest of the stream",
                store.capacity()
            );
            state.clamp_logged = true;
        }
    }

    fn on_decode_progress(&self, position_millis: u64, length_millis: u64) {
        {
            let mut state = lock(&self.state);
            if state.duration_millis == 0 && length_millis > 0 {
                state.duration_millis = length_millis;
            }
        }
        self.emit(WaveformEvent::Progress {
            position_millis,
            length_millis,
        });
    }

    /// Freeze the timeline at the write cursor
    fn finish_store(&self) {
        let mut state = lock(&self.state);
        state.decoding = false;
        if let (Some(frame), Some(store)) = (state.frame.take(), state.store.as_ref()) {
            store.finish(frame.offset());
            log::info!(
                "Decoding finished: {} samples ({} ms)",
                store.length(),
                store.length_millis()
            );
        }
        drop(state);
        self.zoom.resume();
    }

    fn on_decode_finished(&self) {
        self.finish_store();
        self.emit(WaveformEvent::Finished);
    }

    fn on_decode_error(&self, error: DecodeError) {
        log::error!("Decode error: {} ({})", error.message, error.debug);
        self.finish_store();
        self.emit(WaveformEvent::Error(error));
    }
}

/// Body of the ingest thread: open the source, then pump its messages
fn decode_session(
    shared: Arc<IngestShared>,
    mut source: Box<dyn StreamSource>,
    stream_index: usize,
    interrupt: Arc<AtomicBool>,
) {
    let info = match source.open(stream_index, &REQUESTED_LAYOUT) {
        Ok(info) => info,
        Err(e) => {
            lock(&shared.state).decoding = false;
            log::error!("Failed to open audio stream {}: {} ({})", stream_index, e.message, e.debug);
            shared.emit(WaveformEvent::Error(e));
            return;
        }
    };

    if let Some(length) = info.length_millis {
        lock(&shared.state).duration_millis = length;
    }
    log::info!("Decoding audio stream {}: {}", stream_index, info.format);

    let mut ended = false;
    thread::scope(|scope| {
        let (tx, rx) = bounded(STREAM_CHANNEL_CAPACITY);
        let producer_interrupt = &*interrupt;
        let producer = thread::Builder::new()
            .name("wave-decoder".to_string())
            .spawn_scoped(scope, move || source.run(&tx, producer_interrupt));
        if let Err(e) = producer {
            shared.on_decode_error(DecodeError::io(e.to_string()));
            ended = true;
            return;
        }

        for message in rx.iter() {
            if interrupt.load(Ordering::Acquire) {
                break;
            }
            match message {
                StreamMessage::AudioData {
                    data,
                    format,
                    start_millis,
                    ..
                } => shared.on_chunk_delivered(&data, &format, start_millis),
                StreamMessage::Progress {
                    position_millis,
                    length_millis,
                } => shared.on_decode_progress(position_millis, length_millis),
                StreamMessage::Finished => {
                    shared.on_decode_finished();
                    ended = true;
                }
                StreamMessage::Error(e) => {
                    shared.on_decode_error(e);
                    ended = true;
                }
            }
        }
        // hang up so a producer blocked on a full channel returns
        drop(rx);
    });

    if !ended && !interrupt.load(Ordering::Acquire) {
        log::warn!("Decoder stopped without reporting the end of stream");
        shared.on_decode_finished();
    }
}
