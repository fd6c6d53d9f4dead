//! Waveform widget state
//!
//! [`WaveformView`] owns the sample ingest and zoom engine of one waveform
//! widget and turns pointer, wheel, timer and player events into window
//! scrolling, zoom changes and subtitle edits. Painting stays with the host:
//! it reads [`WaveformView::zoomed_data`] and [`WaveformView::visible_lines`]
//! and maps them through [`WaveformView::pos_at`].
//!
//! ## Timers
//!
//! The view has no timers of its own. While [`WaveformView::hover_scroll_active`]
//! is true the host calls [`WaveformView::on_hover_scroll_timeout`] every
//! `hover_scroll_interval_ms`; while [`WaveformView::is_animating`] is true it
//! calls [`WaveformView::on_animation_frame`] once per frame.

use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::Receiver;
use subwave_core::config::WaveformConfig;
use subwave_core::stream::StreamSource;
use subwave_core::{SampleIngest, WaveformEvent, ZoomEngine, ZoomedData, SAMPLE_MAX};

use super::cue::{DragMode, WaveCue};
use super::model::{CueLine, SubtitleModel};
use super::scroll::{hover_scroll_amount, ScrollAnimation};

/// Pointer shape to show over the waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Default,
    /// Over a line that cannot be edited while anchors exist
    Forbidden,
    /// Over the body of a line (moves the whole line)
    SizeLine,
    /// Over a show or hide edge
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Notifications for the host application (all times in milliseconds)
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    DragStart { index: usize, mode: DragMode },
    DragEnd { index: usize, mode: DragMode },
    MiddleMouseDown(f64),
    MiddleMouseMove(f64),
    MiddleMouseUp(f64),
    DoubleClick(f64),
    /// Right button released; `line` is the line under the release point
    ContextMenu {
        sooner: f64,
        later: f64,
        line: Option<usize>,
    },
}

/// State of one waveform widget
pub struct WaveformView {
    config: WaveformConfig,
    ingest: SampleIngest,
    ingest_events: Receiver<WaveformEvent>,
    subtitle: Option<Box<dyn SubtitleModel>>,

    // Visible window (milliseconds)
    time_start: f64,
    time_end: f64,
    /// Player position
    time_current: f64,
    /// `None` while the pointer is outside the widget
    pointer_time: Option<f64>,

    /// Samples per pixel
    zoom: u32,
    /// Widget length along the time axis, in pixels
    span: u32,

    rmb_down: bool,
    mmb_down: bool,
    rmb_press_time: f64,
    rmb_release_time: f64,

    autoscroll: bool,
    /// Set by user scrolling; cleared when the pointer leaves
    autoscroll_pause: bool,
    hover_scroll_amount: f64,
    hover_scroll_active: bool,
    animation: Option<ScrollAnimation>,

    /// Lines intersecting the window, sorted by show time, without the dragged one
    visible_lines: Vec<WaveCue>,
    visible_lines_dirty: bool,
    dragged: Option<WaveCue>,

    cursor: CursorShape,
    events: Vec<ViewEvent>,
}

impl WaveformView {
    pub fn new(config: WaveformConfig) -> Self {
        let zoom_engine = Arc::new(ZoomEngine::new(&config));
        let ingest = SampleIngest::new(config.clone(), zoom_engine);
        let ingest_events = ingest.events();
        let zoom = config.default_zoom.max(config.min_zoom).max(1);
        Self {
            config,
            ingest,
            ingest_events,
            subtitle: None,
            time_start: 0.0,
            time_end: 0.0,
            time_current: 0.0,
            pointer_time: None,
            zoom,
            span: 0,
            rmb_down: false,
            mmb_down: false,
            rmb_press_time: 0.0,
            rmb_release_time: 0.0,
            autoscroll: true,
            autoscroll_pause: false,
            hover_scroll_amount: 0.0,
            hover_scroll_active: false,
            animation: None,
            visible_lines: Vec::new(),
            visible_lines_dirty: true,
            dragged: None,
            cursor: CursorShape::Default,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &WaveformConfig {
        &self.config
    }

    pub fn ingest(&self) -> &SampleIngest {
        &self.ingest
    }

    pub fn zoom_engine(&self) -> &Arc<ZoomEngine> {
        self.ingest.zoom_engine()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audio stream
    // ─────────────────────────────────────────────────────────────────────

    /// Start decoding `source` and rewind the window
    pub fn set_audio_stream(&mut self, source: Box<dyn StreamSource>, stream_index: usize) {
        self.ingest.set_audio_stream(source, stream_index);
        self.rewind();
    }

    /// Show an empty timeline of `duration_millis` (video without audio)
    pub fn set_null_audio_stream(&mut self, duration_millis: u64) {
        self.ingest.set_null_audio_stream(duration_millis);
        self.rewind();
    }

    pub fn clear_audio_stream(&mut self) {
        self.ingest.clear_audio_stream();
        self.rewind();
    }

    /// Drain ingest notifications and refresh the window geometry
    ///
    /// Call from the host event loop; the events are returned for progress
    /// and error display.
    pub fn poll_events(&mut self) -> Vec<WaveformEvent> {
        let events: Vec<WaveformEvent> = self.ingest_events.try_iter().collect();
        if events
            .iter()
            .any(|e| matches!(e, WaveformEvent::Updated | WaveformEvent::Finished))
        {
            self.on_waveform_resize();
        }
        events
    }

    fn rewind(&mut self) {
        self.animation = None;
        self.time_start = 0.0;
        self.time_current = 0.0;
        self.on_waveform_resize();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Window geometry
    // ─────────────────────────────────────────────────────────────────────

    pub fn time_start(&self) -> f64 {
        self.time_start
    }

    pub fn time_end(&self) -> f64 {
        self.time_end
    }

    pub fn time_current(&self) -> f64 {
        self.time_current
    }

    pub fn pointer_time(&self) -> Option<f64> {
        self.pointer_time
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn span(&self) -> u32 {
        self.span
    }

    pub fn window_size(&self) -> f64 {
        self.time_end - self.time_start
    }

    /// Window size without the autoscroll padding, and that padding
    pub fn window_size_inner(&self) -> (f64, f64) {
        let window = self.window_size();
        let padding = window * self.config.autoscroll_padding_percent as f64 / 100.0;
        ((window - 2.0 * padding).max(1.0), padding)
    }

    pub fn millis_per_pixel(&self) -> f64 {
        self.ingest.millis_per_pixel(self.zoom)
    }

    /// Time under pixel `pos`
    pub fn time_at(&self, pos: f64) -> f64 {
        if self.span == 0 {
            return self.time_start;
        }
        self.time_start + pos * self.window_size() / self.span as f64
    }

    /// Pixel of `time`; may fall outside `0..span`
    pub fn pos_at(&self, time: f64) -> f64 {
        let window = self.window_size();
        if window <= 0.0 {
            return 0.0;
        }
        (time - self.time_start) * self.span as f64 / window
    }

    /// Widget resized to `span` pixels along the time axis
    pub fn resize(&mut self, span: u32) {
        self.span = span;
        self.on_waveform_resize();
    }

    fn on_waveform_resize(&mut self) {
        self.time_end = self.time_start + self.millis_per_pixel() * self.span as f64;
        self.handle_time_update();
    }

    /// Latest window start allowed by the timeline length
    fn max_time_start(&self) -> f64 {
        (self.ingest.length_millis() as f64 - self.window_size()).max(0.0)
    }

    fn handle_time_update(&mut self) {
        let window = self.window_size();
        let max_start = self.max_time_start();
        if self.time_start > max_start || self.time_start < 0.0 {
            self.time_start = self.time_start.clamp(0.0, max_start);
            self.time_end = self.time_start + window;
        }
        if self.ingest.channels() > 0 {
            self.zoom_engine().set_zoom_scale(self.zoom);
        }
        self.visible_lines_dirty = true;
    }

    /// Move the window start, clamped to the timeline (scroll bar value)
    pub fn set_scroll_value(&mut self, time_start: f64) {
        let window = self.window_size();
        self.time_start = time_start.clamp(0.0, self.max_time_start());
        self.time_end = self.time_start + window;
        self.handle_time_update();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Zoom
    // ─────────────────────────────────────────────────────────────────────

    /// Largest useful zoom: the whole timeline in one widget; 0 when unknown
    pub fn max_zoom(&self) -> u32 {
        if self.span == 0 {
            return 0;
        }
        (self.ingest.length_samples() / self.span as usize).min(u32::MAX as usize) as u32
    }

    /// Set samples per pixel, keeping the window centred
    pub fn set_zoom(&mut self, value: u32) {
        let max_zoom = self.max_zoom();
        let mut value = value;
        if max_zoom > 0 && value > max_zoom {
            value = max_zoom;
        }
        value = value.max(self.config.min_zoom).max(1);
        if value == self.zoom {
            return;
        }

        let old_window = self.window_size();
        log::debug!("Waveform zoom {} -> {} samples per pixel", self.zoom, value);
        self.zoom = value;
        if self.ingest.channels() > 0 {
            self.zoom_engine().set_zoom_scale(value);
        }

        let new_window = self.millis_per_pixel() * self.span as f64;
        self.time_start += (old_window - new_window) / 2.0;
        self.time_end = self.time_start + new_window;
        self.handle_time_update();
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom / 2);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_mul(2));
    }

    pub fn can_zoom_in(&self) -> bool {
        self.zoom > self.config.min_zoom
    }

    pub fn can_zoom_out(&self) -> bool {
        self.zoom < self.max_zoom()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rendering data
    // ─────────────────────────────────────────────────────────────────────

    /// Envelope cells of the visible window
    ///
    /// Re-query on every repaint; cells fill in as the zoom worker runs.
    pub fn zoomed_data(&self) -> ZoomedData {
        if self.ingest.channels() == 0 {
            return ZoomedData::empty();
        }
        self.zoom_engine().zoomed_buffer(self.time_start, self.time_end)
    }

    /// Lines to paint, sorted by show time, with drag previews applied
    pub fn visible_lines(&mut self) -> Vec<CueLine> {
        self.update_visible_lines();
        let mut lines: Vec<CueLine> = self.visible_lines.iter().map(|c| *c.line()).collect();
        if let Some(dragged) = &self.dragged {
            let preview = dragged.preview();
            let at = lines.partition_point(|l| l.show_time < preview.show_time);
            lines.insert(at, preview);
        }
        lines
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subtitle model
    // ─────────────────────────────────────────────────────────────────────

    /// Attach a subtitle model; any drag in progress is dropped uncommitted
    pub fn set_subtitle(&mut self, subtitle: Option<Box<dyn SubtitleModel>>) {
        self.subtitle = subtitle;
        self.dragged = None;
        self.visible_lines.clear();
        self.visible_lines_dirty = true;
    }

    pub fn subtitle(&self) -> Option<&dyn SubtitleModel> {
        self.subtitle.as_deref()
    }

    /// Mutable model access; call [`Self::on_subtitle_changed`] after edits
    pub fn subtitle_mut(&mut self) -> Option<&mut (dyn SubtitleModel + 'static)> {
        self.subtitle.as_deref_mut()
    }

    /// Line timing or anchors changed outside the view
    pub fn on_subtitle_changed(&mut self) {
        self.visible_lines_dirty = true;
    }

    /// Rebuild the visible line cache if it is stale
    pub fn update_visible_lines(&mut self) {
        if !self.visible_lines_dirty {
            return;
        }
        self.visible_lines_dirty = false;

        let Some(model) = self.subtitle.as_deref() else {
            self.visible_lines.clear();
            return;
        };

        let dragged_index = self.dragged.as_ref().map(WaveCue::index);
        let mut lines: Vec<WaveCue> = (0..model.line_count())
            .filter(|&i| Some(i) != dragged_index)
            .filter_map(|i| model.line(i))
            .filter(|line| line.intersects_timespan(self.time_start, self.time_end))
            .map(WaveCue::new)
            .collect();
        lines.sort_by(|a, b| a.line().show_time.total_cmp(&b.line().show_time));
        self.visible_lines = lines;
    }

    /// What a left press at `time` would grab
    pub fn draggable_at(&mut self, time: f64) -> DragMode {
        self.hit_test(time).0
    }

    /// Best drag mode at `time` and the position in `visible_lines` it refers to
    fn hit_test(&mut self, time: f64) -> (DragMode, Option<usize>) {
        self.update_visible_lines();
        if self.span == 0 {
            return (DragMode::None, None);
        }
        let has_anchors = self.subtitle.as_deref().is_some_and(|m| m.has_anchors());
        let mut tolerance = self.config.drag_tolerance_pixels as f64 * self.millis_per_pixel();

        let mut mode = DragMode::None;
        let mut found = None;
        for (at, cue) in self.visible_lines.iter().enumerate() {
            let hit = cue.draggable_at(time, has_anchors, &mut tolerance);
            if hit > DragMode::Forbidden || mode == DragMode::None {
                mode = hit;
                if hit > DragMode::Forbidden {
                    found = Some(at);
                }
            }
        }
        (mode, found)
    }

    pub fn dragged_line(&self) -> Option<&WaveCue> {
        self.dragged.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pointer input
    // ─────────────────────────────────────────────────────────────────────

    /// Pointer moved to pixel `pos`
    ///
    /// Updates drags and selections; may queue `MiddleMouseMove`.
    pub fn mouse_move(&mut self, pos: f64) -> CursorShape {
        let time = self.time_at(pos);
        self.pointer_time = Some(time);

        if self.rmb_down {
            self.rmb_release_time = time;
            self.scroll_to_time(time, false);
        }

        if self.mmb_down {
            self.scroll_to_time(time, false);
            self.events.push(ViewEvent::MiddleMouseMove(time));
        }

        if let Some(dragged) = self.dragged.as_mut() {
            dragged.drag_update(time);
            self.scroll_to_time(time, false);
        } else {
            self.cursor = match self.draggable_at(time) {
                DragMode::Forbidden => CursorShape::Forbidden,
                DragMode::Line => CursorShape::SizeLine,
                DragMode::Show | DragMode::Hide => CursorShape::Split,
                DragMode::None => CursorShape::Default,
            };
        }
        self.cursor
    }

    pub fn cursor(&self) -> CursorShape {
        self.cursor
    }

    pub fn mouse_press(&mut self, pos: f64, button: MouseButton) -> Vec<ViewEvent> {
        self.autoscroll_pause = true;
        let time = self.time_at(pos);

        match button {
            MouseButton::Right => {
                self.rmb_press_time = time;
                self.rmb_release_time = time;
                self.rmb_down = true;
            }
            MouseButton::Middle => {
                self.mmb_down = true;
                self.events.push(ViewEvent::MiddleMouseDown(time));
            }
            MouseButton::Left => {
                if let (mode, Some(at)) = self.hit_test(time) {
                    let mut cue = self.visible_lines.remove(at);
                    self.pointer_time = Some(time);
                    cue.drag_start(mode, time);
                    self.events.push(ViewEvent::DragStart {
                        index: cue.index(),
                        mode,
                    });
                    self.dragged = Some(cue);
                }
            }
        }
        std::mem::take(&mut self.events)
    }

    pub fn mouse_release(&mut self, pos: f64, button: MouseButton) -> Vec<ViewEvent> {
        let time = self.time_at(pos);

        match button {
            MouseButton::Right => {
                self.rmb_release_time = time;
                self.stop_hover_scroll();
                let line = self.subtitle_line_at_mouse_position();
                self.events.push(ViewEvent::ContextMenu {
                    sooner: self.right_mouse_sooner_time(),
                    later: self.right_mouse_later_time(),
                    line,
                });
                self.rmb_down = false;
            }
            MouseButton::Middle => {
                self.events.push(ViewEvent::MiddleMouseUp(time));
                self.stop_hover_scroll();
                self.mmb_down = false;
            }
            MouseButton::Left => {
                if let Some(mut cue) = self.dragged.take() {
                    let mode = match self.subtitle.as_deref_mut() {
                        Some(model) => cue.drag_end(time, model),
                        None => DragMode::None,
                    };
                    self.events.push(ViewEvent::DragEnd {
                        index: cue.index(),
                        mode,
                    });
                    self.stop_hover_scroll();
                    self.visible_lines_dirty = true;
                }
            }
        }
        std::mem::take(&mut self.events)
    }

    pub fn double_click(&mut self, pos: f64) -> Vec<ViewEvent> {
        let time = self.time_at(pos);
        self.events.push(ViewEvent::DoubleClick(time));
        std::mem::take(&mut self.events)
    }

    /// Pointer left the widget
    pub fn mouse_leave(&mut self) {
        self.pointer_time = None;

        if self.autoscroll_pause {
            if !self.rmb_down {
                self.autoscroll_pause = false;
            }
            if self.autoscroll && self.dragged.is_none() && !self.autoscroll_pause {
                self.scroll_to_time(self.time_current, true);
            }
        }
    }

    /// Wheel turned by `delta` degrees; returns whether the event was used
    pub fn wheel(&mut self, delta: f64) -> bool {
        if delta == 0.0 || self.span == 0 {
            return false;
        }
        self.autoscroll_pause = true;
        let shift = -4.0 * delta * self.window_size() / self.span as f64;
        self.set_scroll_value(self.time_start + shift);
        true
    }

    /// Events queued outside press/release (middle-button moves)
    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scrolling
    // ─────────────────────────────────────────────────────────────────────

    /// Bring `time` into view
    ///
    /// With `to_page` the window jumps (or animates) to the page holding
    /// `time`. Without it, a `time` beyond the padded edges starts hover
    /// scrolling whose speed grows with the overshoot. Returns whether
    /// `time` was outside the padded window.
    pub fn scroll_to_time(&mut self, time: f64, to_page: bool) -> bool {
        let (inner, mut padding) = self.window_size_inner();
        if self.dragged.is_some() || self.rmb_down || self.mmb_down {
            padding = self.window_size() * self.config.drag_scroll_padding_fraction;
        }

        let top = self.time_start + padding;
        let bottom = self.time_end - padding;
        if time <= bottom && time >= top {
            if !to_page {
                self.stop_hover_scroll();
            }
            return false;
        }

        if to_page {
            let target = ((time / inner).floor() * inner - padding).trunc();
            if self.config.smooth_scroll {
                self.animation = Some(ScrollAnimation::new(
                    self.time_start,
                    target,
                    Instant::now(),
                    self.config.smooth_scroll_duration(),
                ));
            } else {
                self.set_scroll_value(target);
            }
        } else {
            let overshoot = time - if time < top { top } else { bottom };
            self.hover_scroll_amount = hover_scroll_amount(overshoot, padding);
            self.hover_scroll_active = true;
        }
        true
    }

    pub fn hover_scroll_active(&self) -> bool {
        self.hover_scroll_active
    }

    fn stop_hover_scroll(&mut self) {
        self.hover_scroll_amount = 0.0;
        self.hover_scroll_active = false;
    }

    /// Hover scroll timer tick
    ///
    /// Returns whether the timer should keep running.
    pub fn on_hover_scroll_timeout(&mut self) -> bool {
        if self.dragged.is_none() && !self.rmb_down && !self.mmb_down {
            self.stop_hover_scroll();
            return false;
        }
        if self.hover_scroll_amount == 0.0 {
            return self.hover_scroll_active;
        }

        let amount = self.hover_scroll_amount;
        let pointer = self.pointer_time.unwrap_or(self.time_start) + amount;
        if let Some(dragged) = self.dragged.as_mut() {
            dragged.drag_update(pointer);
        }
        if self.rmb_down {
            self.rmb_release_time = pointer;
        }
        self.set_scroll_value(self.time_start + amount);
        self.hover_scroll_active
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance a page scroll animation; returns whether it is still running
    pub fn on_animation_frame(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        let (value, finished) = animation.advance(now);
        self.set_scroll_value(value);
        if finished {
            self.animation = None;
        }
        !finished
    }

    pub fn autoscroll(&self) -> bool {
        self.autoscroll
    }

    pub fn set_autoscroll(&mut self, autoscroll: bool) {
        self.autoscroll = autoscroll;
        self.autoscroll_pause = false;
        if autoscroll {
            self.scroll_to_time(self.time_current, true);
        }
    }

    pub fn autoscroll_paused(&self) -> bool {
        self.autoscroll_pause
    }

    /// Player moved to `millis`; follows it page by page when autoscrolling
    pub fn on_player_position(&mut self, millis: f64) {
        if self.time_current == millis {
            return;
        }
        self.time_current = millis;
        if self.autoscroll && self.dragged.is_none() && !self.autoscroll_pause {
            self.scroll_to_time(millis, true);
        }
    }

    /// Make `millis` visible if it is outside the window
    pub fn set_scroll_position(&mut self, millis: f64) {
        if millis < self.time_start || millis > self.time_end {
            self.scroll_to_time(millis, true);
            self.visible_lines_dirty = true;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Context menu helpers
    // ─────────────────────────────────────────────────────────────────────

    pub fn right_mouse_press_time(&self) -> f64 {
        self.rmb_press_time
    }

    pub fn right_mouse_release_time(&self) -> f64 {
        self.rmb_release_time
    }

    /// Start of the right-button selection
    pub fn right_mouse_sooner_time(&self) -> f64 {
        self.rmb_press_time.min(self.rmb_release_time)
    }

    /// End of the right-button selection
    pub fn right_mouse_later_time(&self) -> f64 {
        self.rmb_press_time.max(self.rmb_release_time)
    }

    /// Index of the first visible line under the pointer (or the right-button release point)
    pub fn subtitle_line_at_mouse_position(&mut self) -> Option<usize> {
        let time = if self.rmb_down {
            self.rmb_release_time
        } else {
            self.pointer_time?
        };
        self.update_visible_lines();
        self.visible_lines
            .iter()
            .find(|cue| cue.line().contains_time(time))
            .map(WaveCue::index)
    }

    /// Insert a line covering the right-button selection
    ///
    /// Short selections are stretched to `min_line_duration_ms`. Returns the
    /// index of the new line, `None` without a model.
    pub fn insert_line_from_selection(&mut self) -> Option<usize> {
        let show = self.right_mouse_sooner_time();
        let later = self.right_mouse_later_time();
        let min_duration = self.config.min_line_duration_ms as f64;
        let hide = if later - show > min_duration {
            later
        } else {
            show + min_duration
        };

        let model = self.subtitle.as_deref_mut()?;
        let index = model.insert_line(show, hide);
        log::debug!("Inserted line {} at {:.0}..{:.0}", index, show, hide);
        self.visible_lines_dirty = true;
        Some(index)
    }
}

impl std::fmt::Debug for WaveformView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformView")
            .field("time_start", &self.time_start)
            .field("time_end", &self.time_end)
            .field("zoom", &self.zoom)
            .field("span", &self.span)
            .field("visible_lines", &self.visible_lines.len())
            .field("dragged", &self.dragged.as_ref().map(WaveCue::index))
            .finish()
    }
}

/// Normalised `(average, peak)` columns per channel, in `0.0..=1.0`
///
/// One column per envelope cell; a painter scales both by half the widget
/// height and draws the peak behind the average.
pub fn envelope_columns(data: &ZoomedData) -> Vec<Vec<(f32, f32)>> {
    let scale = SAMPLE_MAX as f32;
    (0..data.channels() as usize)
        .map(|channel| {
            data.channel(channel)
                .iter()
                .map(|cell| {
                    (
                        (cell.min as f32 / scale).min(1.0),
                        (cell.max as f32 / scale).min(1.0),
                    )
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::model::VecSubtitle;
    use std::time::Duration;
    use subwave_core::stream::MemorySource;

    /// 10 ms per pixel, 100 px wide: a 1000 ms window
    fn view() -> WaveformView {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut view = WaveformView::new(WaveformConfig {
            zoom_ceiling_hz: 1000,
            default_zoom: 10,
            min_zoom: 1,
            smooth_scroll: false,
            zoom_poll_interval_ms: 5,
            ..WaveformConfig::default()
        });
        view.set_null_audio_stream(60_000);
        view.resize(100);
        view
    }

    fn with_lines(times: &[(f64, f64)]) -> WaveformView {
        let mut view = view();
        view.set_subtitle(Some(Box::new(VecSubtitle::from_times(times))));
        view
    }

    fn line_times(view: &WaveformView, index: usize) -> Option<(f64, f64)> {
        view.subtitle()
            .and_then(|m| m.line(index))
            .map(|l| (l.show_time, l.hide_time))
    }

    #[test]
    fn test_time_mapping() {
        let mut view = view();
        assert_eq!(view.window_size(), 1000.0);
        assert_eq!(view.time_at(50.0), 500.0);

        view.set_scroll_value(2000.0);
        assert_eq!(view.time_at(25.0), 2250.0);
        assert_eq!(view.pos_at(2250.0), 25.0);
        assert_eq!(view.pos_at(1900.0), -10.0);
        assert_eq!(view.window_size_inner(), (700.0, 150.0));
    }

    #[test]
    fn test_window_is_clamped_to_timeline() {
        let mut view = view();
        view.set_scroll_value(100_000.0);
        assert_eq!((view.time_start(), view.time_end()), (59_000.0, 60_000.0));
        view.set_scroll_value(-50.0);
        assert_eq!(view.time_start(), 0.0);
    }

    #[test]
    fn test_zoom_keeps_window_centred() {
        let mut view = view();
        view.set_scroll_value(10_000.0);
        view.set_zoom(20);
        assert_eq!(view.zoom(), 20);
        assert_eq!((view.time_start(), view.time_end()), (9500.0, 11_500.0));

        view.zoom_in();
        assert_eq!(view.zoom(), 10);
        assert_eq!((view.time_start(), view.time_end()), (10_000.0, 11_000.0));

        view.set_zoom(0);
        assert_eq!(view.zoom(), 1, "clamped to the minimum zoom");
        assert!(!view.can_zoom_in());
    }

    #[test]
    fn test_zoom_out_near_start_clamps_window() {
        let mut view = view();
        view.zoom_out();
        assert_eq!(view.zoom(), 20);
        assert_eq!((view.time_start(), view.time_end()), (0.0, 2000.0));
    }

    #[test]
    fn test_edge_drag_commits_to_model() {
        let mut view = with_lines(&[(1000.0, 2000.0), (3000.0, 4000.0)]);
        view.set_scroll_value(500.0);

        // 10 px tolerance at 10 ms per pixel
        assert_eq!(view.mouse_move(52.0), CursorShape::Split);
        assert_eq!(view.mouse_move(80.0), CursorShape::SizeLine);
        assert_eq!(view.mouse_move(10.0), CursorShape::Default);

        let events = view.mouse_press(52.0, MouseButton::Left);
        assert_eq!(
            events,
            vec![ViewEvent::DragStart {
                index: 0,
                mode: DragMode::Show
            }]
        );
        view.mouse_move(70.0);
        assert_eq!(view.visible_lines()[0].show_time, 1180.0);
        assert_eq!(line_times(&view, 0), Some((1000.0, 2000.0)), "preview only");

        let events = view.mouse_release(70.0, MouseButton::Left);
        assert_eq!(
            events,
            vec![ViewEvent::DragEnd {
                index: 0,
                mode: DragMode::Show
            }]
        );
        assert_eq!(line_times(&view, 0), Some((1180.0, 2000.0)));
        assert!(view.dragged_line().is_none());
    }

    #[test]
    fn test_line_drag_past_timeline_start_keeps_duration() {
        let mut view = with_lines(&[(100.0, 1100.0)]);
        let events = view.mouse_press(60.0, MouseButton::Left);
        assert_eq!(
            events,
            vec![ViewEvent::DragStart {
                index: 0,
                mode: DragMode::Line
            }]
        );
        view.mouse_release(20.0, MouseButton::Left);
        assert_eq!(line_times(&view, 0), Some((0.0, 1000.0)));
    }

    #[test]
    fn test_dragged_line_stays_visible_outside_window() {
        let mut view = with_lines(&[(1000.0, 2000.0)]);
        view.set_scroll_value(500.0);
        view.mouse_press(100.0, MouseButton::Left);
        assert_eq!(view.dragged_line().map(|c| c.drag_mode()), Some(DragMode::Line));

        view.set_scroll_value(30_000.0);
        let lines = view.visible_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].index, 0);
    }

    #[test]
    fn test_anchors_forbid_unanchored_lines() {
        let mut model = VecSubtitle::from_times(&[(100.0, 400.0), (600.0, 900.0)]);
        model.toggle_anchor(1);
        let mut view = view();
        view.set_subtitle(Some(Box::new(model)));

        assert_eq!(view.mouse_move(20.0), CursorShape::Forbidden);
        assert!(view.mouse_press(20.0, MouseButton::Left).is_empty());
        assert!(view.dragged_line().is_none());

        // anchored lines only move as a whole
        assert_eq!(view.mouse_move(60.0), CursorShape::SizeLine);
        let events = view.mouse_press(60.0, MouseButton::Left);
        assert_eq!(
            events,
            vec![ViewEvent::DragStart {
                index: 1,
                mode: DragMode::Line
            }]
        );
        view.mouse_release(65.0, MouseButton::Left);
        assert_eq!(line_times(&view, 1), Some((650.0, 950.0)));
    }

    #[test]
    fn test_hover_scroll_while_dragging() {
        let mut view = with_lines(&[(1000.0, 2000.0)]);
        view.set_scroll_value(500.0);
        view.mouse_press(100.0, MouseButton::Left);

        // drag padding is a fifth of the window: 200 ms past the 1300 ms edge
        view.mouse_move(100.0);
        assert!(view.hover_scroll_active());
        assert!(view.on_hover_scroll_timeout());
        let expected = 500.0 + 200.0_f64.powi(3) / (3.0 * 200.0 * 200.0);
        assert!((view.time_start() - expected).abs() < 1e-9);

        view.mouse_move(50.0);
        assert!(!view.hover_scroll_active(), "back inside the padding");

        view.mouse_release(50.0, MouseButton::Left);
        assert!(!view.on_hover_scroll_timeout());
    }

    #[test]
    fn test_player_follow_pages() {
        let mut view = view();
        view.on_player_position(5000.0);
        // page of the inner window, minus the padding
        assert_eq!(view.time_start(), 7.0 * 700.0 - 150.0);

        view.on_player_position(5200.0);
        assert_eq!(view.time_start(), 4750.0, "still inside the padded window");

        view.set_autoscroll(false);
        view.on_player_position(20_000.0);
        assert_eq!(view.time_start(), 4750.0);
    }

    #[test]
    fn test_user_scroll_pauses_follow_until_leave() {
        let mut view = view();
        assert!(view.wheel(15.0));
        assert!(view.autoscroll_paused());

        view.on_player_position(8000.0);
        assert_eq!(view.time_start(), 0.0);

        view.mouse_leave();
        assert!(!view.autoscroll_paused());
        assert!(view.time_start() > 7000.0 && view.time_end() > 8000.0);
        assert_eq!(view.pointer_time(), None);
    }

    #[test]
    fn test_right_button_keeps_pause() {
        let mut view = view();
        view.mouse_press(10.0, MouseButton::Right);
        view.mouse_leave();
        assert!(view.autoscroll_paused());
    }

    #[test]
    fn test_wheel_scrolls_by_window_fraction() {
        let mut view = view();
        view.set_scroll_value(10_000.0);
        view.wheel(15.0);
        assert_eq!(view.time_start(), 9400.0);
        view.wheel(-15.0);
        assert_eq!(view.time_start(), 10_000.0);
        assert!(!view.wheel(0.0));
    }

    #[test]
    fn test_smooth_page_scroll() {
        let mut view = WaveformView::new(WaveformConfig {
            zoom_ceiling_hz: 1000,
            default_zoom: 10,
            smooth_scroll: true,
            ..WaveformConfig::default()
        });
        view.set_null_audio_stream(60_000);
        view.resize(100);

        view.set_scroll_position(5000.0);
        assert!(view.is_animating());
        assert_eq!(view.time_start(), 0.0);
        assert!(!view.on_animation_frame(Instant::now() + Duration::from_secs(1)));
        assert_eq!(view.time_start(), 4750.0);
        assert!(!view.is_animating());
    }

    #[test]
    fn test_context_menu_selection() {
        let mut view = with_lines(&[(1000.0, 2000.0)]);
        view.mouse_press(30.0, MouseButton::Right);
        view.mouse_move(10.0);
        let events = view.mouse_release(10.0, MouseButton::Right);
        assert_eq!(
            events,
            vec![ViewEvent::ContextMenu {
                sooner: 100.0,
                later: 300.0,
                line: None
            }]
        );

        assert_eq!(view.insert_line_from_selection(), Some(0));
        assert_eq!(line_times(&view, 0), Some((100.0, 1100.0)));
        assert_eq!(line_times(&view, 1), Some((1000.0, 2000.0)));

        view.mouse_move(50.0);
        assert_eq!(view.subtitle_line_at_mouse_position(), Some(0));
    }

    #[test]
    fn test_long_selection_is_kept() {
        let mut view = with_lines(&[]);
        view.set_zoom(20);
        view.mouse_press(90.0, MouseButton::Right);
        view.mouse_release(10.0, MouseButton::Right);
        assert_eq!(view.insert_line_from_selection(), Some(0));
        assert_eq!(line_times(&view, 0), Some((200.0, 1800.0)));
    }

    #[test]
    fn test_middle_button_and_double_click_events() {
        let mut view = view();
        assert_eq!(
            view.mouse_press(10.0, MouseButton::Middle),
            vec![ViewEvent::MiddleMouseDown(100.0)]
        );
        view.mouse_move(20.0);
        assert_eq!(view.take_events(), vec![ViewEvent::MiddleMouseMove(200.0)]);
        assert_eq!(
            view.mouse_release(20.0, MouseButton::Middle),
            vec![ViewEvent::MiddleMouseUp(200.0)]
        );
        assert_eq!(view.double_click(40.0), vec![ViewEvent::DoubleClick(400.0)]);
    }

    #[test]
    fn test_no_model_no_lines() {
        let mut view = view();
        assert!(view.visible_lines().is_empty());
        assert_eq!(view.draggable_at(500.0), DragMode::None);
        assert_eq!(view.insert_line_from_selection(), None);
    }

    #[test]
    fn test_decoded_stream_feeds_envelope() {
        let mut view = view();
        let source = MemorySource::new(1000, 1, vec![16384; 5000]).with_chunk_frames(500);
        view.set_audio_stream(Box::new(source), 0);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut finished = false;
        while !finished && Instant::now() < deadline {
            finished = view
                .poll_events()
                .iter()
                .any(|e| *e == WaveformEvent::Finished);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(finished);
        assert_eq!(view.zoom_engine().samples_per_pixel(), 10);
        assert_eq!(view.max_zoom(), 50);

        let mut data = view.zoomed_data();
        while data.len() < 100 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            data = view.zoomed_data();
        }
        assert_eq!(data.len(), 100);

        let columns = envelope_columns(&data);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].len(), 100);
        assert!(columns[0]
            .iter()
            .all(|&(avg, peak)| avg > 0.5 && avg <= peak && peak <= 1.0));
    }
}
