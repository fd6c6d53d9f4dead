//! Hit-testing and drag state of one visible subtitle line

use super::model::{CueLine, SubtitleModel};

/// What a pointer at some time would grab
///
/// Ordered by priority: when several lines are near the pointer, any mode
/// above `Forbidden` wins over `None` and `Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DragMode {
    #[default]
    None,
    /// Line is hit but not editable while anchors exist
    Forbidden,
    /// Show edge
    Show,
    /// Whole line
    Line,
    /// Hide edge
    Hide,
}

/// A visible subtitle line and its in-progress drag
#[derive(Debug, Clone)]
pub struct WaveCue {
    line: CueLine,
    drag_mode: DragMode,
    drag_time: f64,
    drag_time_offset: f64,
}

impl WaveCue {
    pub fn new(line: CueLine) -> Self {
        Self {
            line,
            drag_mode: DragMode::None,
            drag_time: 0.0,
            drag_time_offset: 0.0,
        }
    }

    /// Committed timing, ignoring any drag preview
    pub fn line(&self) -> &CueLine {
        &self.line
    }

    pub fn index(&self) -> usize {
        self.line.index
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag_mode
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_mode != DragMode::None
    }

    /// What a pointer at `time` would grab
    ///
    /// `tolerance` is in milliseconds and is tightened whenever an edge is
    /// closer than it, so a later line only wins with an even closer edge.
    pub fn draggable_at(&self, time: f64, has_anchors: bool, tolerance: &mut f64) -> DragMode {
        if !self.line.intersects_timespan(time - *tolerance, time + *tolerance) {
            return DragMode::None;
        }
        if has_anchors && !self.line.anchored {
            return DragMode::Forbidden;
        }

        let show_distance = (self.line.show_time - time).abs();
        if *tolerance > show_distance {
            *tolerance = show_distance;
            return if has_anchors { DragMode::Line } else { DragMode::Show };
        }

        let hide_distance = (self.line.hide_time - time).abs();
        if *tolerance > hide_distance {
            *tolerance = hide_distance;
            return if has_anchors { DragMode::Line } else { DragMode::Hide };
        }

        DragMode::Line
    }

    /// Start dragging; `Forbidden` and `None` leave the line idle
    pub fn drag_start(&mut self, mode: DragMode, time: f64) {
        if matches!(mode, DragMode::None | DragMode::Forbidden) {
            self.drag_time = 0.0;
            self.drag_mode = DragMode::None;
            return;
        }

        self.drag_time = time;
        self.drag_mode = mode;
        self.drag_time_offset = match mode {
            DragMode::Hide => time - self.line.hide_time,
            _ => time - self.line.show_time,
        };
    }

    pub fn drag_update(&mut self, time: f64) {
        self.drag_time = time;
    }

    /// Dragged position of the grabbed edge; the timeline starts at 0
    fn new_time(&self) -> f64 {
        (self.drag_time - self.drag_time_offset).max(0.0)
    }

    /// Preview show time while dragging
    pub fn show_time(&self) -> f64 {
        let new_time = self.new_time();
        match self.drag_mode {
            DragMode::Line => new_time,
            DragMode::Show => new_time.min(self.line.hide_time),
            DragMode::Hide => new_time.min(self.line.show_time),
            DragMode::None | DragMode::Forbidden => self.line.show_time,
        }
    }

    /// Preview hide time while dragging
    pub fn hide_time(&self) -> f64 {
        let new_time = self.new_time();
        match self.drag_mode {
            DragMode::Line => new_time + self.line.duration(),
            DragMode::Show => new_time.max(self.line.hide_time),
            DragMode::Hide => new_time.max(self.line.show_time),
            DragMode::None | DragMode::Forbidden => self.line.hide_time,
        }
    }

    /// Timing including the drag preview
    pub fn preview(&self) -> CueLine {
        CueLine {
            show_time: self.show_time(),
            hide_time: self.hide_time(),
            ..self.line
        }
    }

    /// Commit the drag at `time` to `model`; returns the finished mode
    ///
    /// An edge dragged past the opposite one swaps roles, so the committed
    /// pair is always ordered.
    pub fn drag_end(&mut self, time: f64, model: &mut dyn SubtitleModel) -> DragMode {
        let mode = self.drag_mode;
        if mode == DragMode::None {
            return mode;
        }
        self.drag_time = time;
        let new_time = self.new_time();
        let index = self.line.index;

        match mode {
            DragMode::Line => model.set_times(index, new_time, new_time + self.line.duration()),
            DragMode::Show if new_time > self.line.hide_time => {
                model.set_times(index, self.line.hide_time, new_time)
            }
            DragMode::Show => model.set_show_time(index, new_time),
            DragMode::Hide if new_time < self.line.show_time => {
                model.set_times(index, new_time, self.line.show_time)
            }
            DragMode::Hide => model.set_hide_time(index, new_time),
            DragMode::None | DragMode::Forbidden => {}
        }

        self.line = self.preview();
        self.drag_mode = DragMode::None;
        log::debug!(
            "Line {} dragged ({:?}) to {:.0}..{:.0}",
            index,
            mode,
            self.line.show_time,
            self.line.hide_time
        );
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::model::VecSubtitle;

    fn cue(show: f64, hide: f64, anchored: bool) -> WaveCue {
        WaveCue::new(CueLine {
            index: 0,
            show_time: show,
            hide_time: hide,
            anchored,
        })
    }

    #[test]
    fn test_hit_testing() {
        let cue = cue(1000.0, 2000.0, false);

        let mut tol = 50.0;
        assert_eq!(cue.draggable_at(900.0, false, &mut tol), DragMode::None);

        let mut tol = 50.0;
        assert_eq!(cue.draggable_at(1020.0, false, &mut tol), DragMode::Show);
        assert_eq!(tol, 20.0, "tolerance tightened to the edge distance");

        let mut tol = 50.0;
        assert_eq!(cue.draggable_at(1990.0, false, &mut tol), DragMode::Hide);
        assert_eq!(tol, 10.0);

        let mut tol = 50.0;
        assert_eq!(cue.draggable_at(1500.0, false, &mut tol), DragMode::Line);
        assert_eq!(tol, 50.0);

        // an earlier hit already tightened the tolerance
        let mut tol = 5.0;
        assert_eq!(cue.draggable_at(1020.0, false, &mut tol), DragMode::Line);
    }

    #[test]
    fn test_anchors_restrict_dragging() {
        let free = cue(1000.0, 2000.0, false);
        let anchored = cue(1000.0, 2000.0, true);

        let mut tol = 50.0;
        assert_eq!(free.draggable_at(1010.0, true, &mut tol), DragMode::Forbidden);

        let mut tol = 50.0;
        assert_eq!(anchored.draggable_at(1010.0, true, &mut tol), DragMode::Line);
        let mut tol = 50.0;
        assert_eq!(anchored.draggable_at(1995.0, true, &mut tol), DragMode::Line);
    }

    #[test]
    fn test_forbidden_start_is_idle() {
        let mut cue = cue(1000.0, 2000.0, false);
        cue.drag_start(DragMode::Forbidden, 1500.0);
        assert!(!cue.is_dragging());
        let mut model = VecSubtitle::from_times(&[(1000.0, 2000.0)]);
        assert_eq!(cue.drag_end(1800.0, &mut model), DragMode::None);
        assert_eq!(model, VecSubtitle::from_times(&[(1000.0, 2000.0)]));
    }

    #[test]
    fn test_line_drag_keeps_duration() {
        let mut model = VecSubtitle::from_times(&[(1000.0, 2000.0)]);
        let mut cue = cue(1000.0, 2000.0, false);
        cue.drag_start(DragMode::Line, 1500.0);
        cue.drag_update(1700.0);
        assert_eq!((cue.show_time(), cue.hide_time()), (1200.0, 2200.0));

        assert_eq!(cue.drag_end(1800.0, &mut model), DragMode::Line);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((1300.0, 2300.0)));
        assert!(!cue.is_dragging());
        assert_eq!(cue.line().show_time, 1300.0);
    }

    #[test]
    fn test_show_edge_past_hide_swaps_roles() {
        let mut model = VecSubtitle::from_times(&[(1000.0, 2000.0)]);
        let mut cue = cue(1000.0, 2000.0, false);
        cue.drag_start(DragMode::Show, 1000.0);
        cue.drag_update(2500.0);
        assert_eq!((cue.show_time(), cue.hide_time()), (2000.0, 2500.0));

        cue.drag_end(2500.0, &mut model);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((2000.0, 2500.0)));
    }

    #[test]
    fn test_hide_edge_drag() {
        let mut model = VecSubtitle::from_times(&[(1000.0, 2000.0)]);
        let mut cue = cue(1000.0, 2000.0, false);
        cue.drag_start(DragMode::Hide, 1990.0);
        assert_eq!(cue.drag_end(2490.0, &mut model), DragMode::Hide);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((1000.0, 2500.0)));

        let mut cue = WaveCue::new(model.line(0).unwrap());
        cue.drag_start(DragMode::Hide, 2500.0);
        cue.drag_update(400.0);
        assert_eq!((cue.show_time(), cue.hide_time()), (400.0, 1000.0));
        cue.drag_end(400.0, &mut model);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((400.0, 1000.0)));
    }

    #[test]
    fn test_drags_stop_at_timeline_start() {
        let mut model = VecSubtitle::from_times(&[(100.0, 1100.0)]);
        let mut line = cue(100.0, 1100.0, false);
        line.drag_start(DragMode::Line, 600.0);
        line.drag_update(200.0);
        assert_eq!((line.show_time(), line.hide_time()), (0.0, 1000.0));
        line.drag_end(200.0, &mut model);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((0.0, 1000.0)));

        let mut model = VecSubtitle::from_times(&[(100.0, 1100.0)]);
        let mut show = cue(100.0, 1100.0, false);
        show.drag_start(DragMode::Show, 110.0);
        show.drag_end(-50.0, &mut model);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((0.0, 1100.0)));

        let mut model = VecSubtitle::from_times(&[(100.0, 1100.0)]);
        let mut hide = cue(100.0, 1100.0, false);
        hide.drag_start(DragMode::Hide, 1100.0);
        hide.drag_end(-400.0, &mut model);
        assert_eq!(model.line(0).map(|l| (l.show_time, l.hide_time)), Some((0.0, 100.0)));
    }

    #[test]
    fn test_idle_preview_is_committed_timing() {
        let cue = cue(1000.0, 2000.0, false);
        assert_eq!(cue.preview(), *cue.line());
    }
}
