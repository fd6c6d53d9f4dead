//! Subtitle lines as seen by the waveform view
//!
//! The view never owns subtitle text or styling. It reads line timing
//! through [`SubtitleModel`] and writes back only show/hide times, always
//! referring to lines by index.

use serde::{Deserialize, Serialize};

/// Timing of one subtitle line (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueLine {
    /// Position of the line in its model
    pub index: usize,
    pub show_time: f64,
    pub hide_time: f64,
    /// Anchored lines are the only draggable ones while any anchor exists
    pub anchored: bool,
}

impl CueLine {
    pub fn duration(&self) -> f64 {
        self.hide_time - self.show_time
    }

    /// Whether any part of the line falls inside `[start, end]`
    pub fn intersects_timespan(&self, start: f64, end: f64) -> bool {
        self.show_time <= end && self.hide_time >= start
    }

    pub fn contains_time(&self, time: f64) -> bool {
        self.show_time <= time && time <= self.hide_time
    }
}

/// Subtitle document interface used by the view
pub trait SubtitleModel {
    fn line_count(&self) -> usize;

    /// Timing of line `index`, `None` when out of range
    fn line(&self, index: usize) -> Option<CueLine>;

    /// Whether any line is anchored
    fn has_anchors(&self) -> bool;

    fn set_show_time(&mut self, index: usize, millis: f64);

    fn set_hide_time(&mut self, index: usize, millis: f64);

    /// Set both edges at once; `show <= hide` is guaranteed by the caller
    fn set_times(&mut self, index: usize, show_millis: f64, hide_millis: f64);

    /// Insert a new line and return its index
    fn insert_line(&mut self, show_millis: f64, hide_millis: f64) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Timing {
    show: f64,
    hide: f64,
    #[serde(default)]
    anchored: bool,
}

/// Minimal in-memory subtitle model
///
/// Lines stay sorted by show time on insert. Edits through the view keep
/// indices stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VecSubtitle {
    lines: Vec<Timing>,
}

impl VecSubtitle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(show, hide)` pairs, in the given order
    pub fn from_times(times: &[(f64, f64)]) -> Self {
        Self {
            lines: times
                .iter()
                .map(|&(show, hide)| Timing {
                    show,
                    hide,
                    anchored: false,
                })
                .collect(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = CueLine> + '_ {
        (0..self.lines.len()).filter_map(|i| self.line(i))
    }

    /// Flip the anchor of line `index`; returns the new state
    pub fn toggle_anchor(&mut self, index: usize) -> bool {
        match self.lines.get_mut(index) {
            Some(line) => {
                line.anchored = !line.anchored;
                line.anchored
            }
            None => false,
        }
    }
}

impl SubtitleModel for VecSubtitle {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<CueLine> {
        self.lines.get(index).map(|t| CueLine {
            index,
            show_time: t.show,
            hide_time: t.hide,
            anchored: t.anchored,
        })
    }

    fn has_anchors(&self) -> bool {
        self.lines.iter().any(|t| t.anchored)
    }

    fn set_show_time(&mut self, index: usize, millis: f64) {
        if let Some(line) = self.lines.get_mut(index) {
            line.show = millis;
        }
    }

    fn set_hide_time(&mut self, index: usize, millis: f64) {
        if let Some(line) = self.lines.get_mut(index) {
            line.hide = millis;
        }
    }

    fn set_times(&mut self, index: usize, show_millis: f64, hide_millis: f64) {
        if let Some(line) = self.lines.get_mut(index) {
            line.show = show_millis;
            line.hide = hide_millis;
        }
    }

    fn insert_line(&mut self, show_millis: f64, hide_millis: f64) -> usize {
        let at = self.lines.partition_point(|t| t.show <= show_millis);
        self.lines.insert(
            at,
            Timing {
                show: show_millis,
                hide: hide_millis,
                anchored: false,
            },
        );
        at
    }
}
