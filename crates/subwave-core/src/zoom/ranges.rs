//! Pending-range bookkeeping of the zoom worker
//!
//! Every envelope cell index is in exactly one of four states: not yet
//! covered (`>= covered`), pending, active (being computed) or computed.
//! Cells only ever move forward through those states, except that the
//! unprocessed tail of an interrupted active range goes back to pending.

use crate::types::DataRange;

#[derive(Debug, Default)]
pub(crate) struct RangeQueue {
    /// Sorted, non-overlapping
    pending: Vec<DataRange>,
    active: Option<DataRange>,
    /// Cells `[0, covered)` have been queued at some point
    covered: u32,
    /// Window the UI asked for most recently
    request: Option<DataRange>,
}

impl RangeQueue {
    pub fn new(initial_end: u32) -> Self {
        let mut queue = Self::default();
        queue.extend_coverage(initial_end);
        queue
    }

    pub fn covered(&self) -> u32 {
        self.covered
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    /// Whether `take_next(limit)` would return a range
    pub fn has_ready(&self, limit: u32) -> bool {
        self.active.is_none() && self.pending.first().is_some_and(|r| r.start < limit)
    }

    /// Queue the newly available cells `[covered, end)`
    pub fn extend_coverage(&mut self, end: u32) -> bool {
        if end <= self.covered {
            return false;
        }
        self.insert(DataRange::new(self.covered, end));
        self.covered = end;
        true
    }

    /// Insert keeping the list sorted; touching neighbours are merged
    pub fn insert(&mut self, range: DataRange) {
        if range.is_empty() {
            return;
        }
        let at = self.pending.partition_point(|r| r.start < range.start);
        self.pending.insert(at, range);

        if at + 1 < self.pending.len() && self.pending[at].end >= self.pending[at + 1].start {
            let next = self.pending.remove(at + 1);
            self.pending[at].end = self.pending[at].end.max(next.end);
        }
        if at > 0 && self.pending[at - 1].end >= self.pending[at].start {
            let current = self.pending.remove(at);
            self.pending[at - 1].end = self.pending[at - 1].end.max(current.end);
        }
    }

    /// Pop the next range to compute and mark it active
    ///
    /// Only cells below `limit` (those whose samples are written) are
    /// eligible. The part of a pending range inside the requested window
    /// goes first; its remainders stay pending in order.
    pub fn take_next(&mut self, limit: u32) -> Option<DataRange> {
        if self.active.is_some() {
            return None;
        }

        let prioritized = self.request.and_then(|request| {
            let window = DataRange::new(request.start, request.end.min(limit));
            let at = self.pending.iter().position(|r| r.intersects(&window))?;
            Some((at, window))
        });

        let (at, window) = match prioritized {
            Some(found) => found,
            None => match self.pending.first() {
                Some(first) if first.start < limit => (0, DataRange::new(first.start, limit)),
                _ => return None,
            },
        };

        let range = self.pending.remove(at);
        let part = DataRange::new(range.start.max(window.start), range.end.min(window.end));
        self.insert(DataRange::new(range.start, part.start));
        self.insert(DataRange::new(part.end, range.end));

        self.active = Some(part);
        Some(part)
    }

    /// Mark the active range computed up to `cursor`; the rest goes back
    pub fn finish_active(&mut self, cursor: u32) {
        if let Some(active) = self.active.take() {
            let cursor = cursor.clamp(active.start, active.end);
            self.insert(DataRange::new(cursor, active.end));
        }
    }

    /// Record the requested window
    ///
    /// Returns true when the worker should be re-targeted: it is busy
    /// outside the window while part of the window is pending, or its
    /// active range reaches into the window from before it.
    pub fn set_request(&mut self, window: DataRange) -> bool {
        self.request = Some(window);
        let Some(active) = self.active else {
            return false;
        };
        if active.intersects(&window) {
            active.start < window.start
        } else {
            self.pending.iter().any(|r| r.intersects(&window))
        }
    }

    /// Number of computed cells at the start of `window`
    pub fn readable_len(&self, window: DataRange) -> u32 {
        let mut first_blocked = self.covered.max(window.start);
        for range in self.pending.iter().chain(self.active.iter()) {
            if range.end > window.start {
                first_blocked = first_blocked.min(range.start.max(window.start));
            }
        }
        first_blocked.min(window.end).saturating_sub(window.start)
    }

    /// Pending and active ranges in index order
    pub fn snapshot(&self) -> Vec<DataRange> {
        let mut ranges: Vec<DataRange> = self.pending.iter().chain(self.active.iter()).copied().collect();
        ranges.sort_by_key(|r| r.start);
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u32, end: u32) -> DataRange {
        DataRange::new(start, end)
    }

    #[test]
    fn test_insert_merges_neighbours() {
        let mut queue = RangeQueue::default();
        queue.insert(r(10, 20));
        queue.insert(r(30, 40));
        queue.insert(r(0, 5));
        assert_eq!(queue.snapshot(), vec![r(0, 5), r(10, 20), r(30, 40)]);
        queue.insert(r(20, 30));
        assert_eq!(queue.snapshot(), vec![r(0, 5), r(10, 40)]);
        queue.insert(r(5, 5));
        assert_eq!(queue.snapshot(), vec![r(0, 5), r(10, 40)]);
    }

    #[test]
    fn test_take_next_in_order_without_request() {
        let mut queue = RangeQueue::new(100);
        assert_eq!(queue.take_next(u32::MAX), Some(r(0, 100)));
        assert_eq!(queue.take_next(u32::MAX), None, "one active range at a time");
        queue.finish_active(100);
        assert!(queue.is_idle());
        assert_eq!(queue.take_next(u32::MAX), None);
    }

    #[test]
    fn test_request_splits_pending_range() {
        let mut queue = RangeQueue::new(100);
        assert!(!queue.set_request(r(40, 50)), "worker is idle");
        assert_eq!(queue.take_next(u32::MAX), Some(r(40, 50)));
        assert_eq!(queue.snapshot(), vec![r(0, 40), r(40, 50), r(50, 100)]);
        queue.finish_active(50);
        // request is kept but fully computed, so order resumes from the front
        assert_eq!(queue.take_next(u32::MAX), Some(r(0, 40)));
    }

    #[test]
    fn test_take_next_skips_unwritten_cells() {
        let mut queue = RangeQueue::new(20);
        assert!(!queue.has_ready(0));
        assert_eq!(queue.take_next(0), None);
        assert!(queue.has_ready(5));
        assert_eq!(queue.take_next(5), Some(r(0, 5)));
        assert!(!queue.has_ready(20));
        queue.finish_active(5);
        assert_eq!(queue.snapshot(), vec![r(5, 20)]);

        // the requested window is clipped the same way
        queue.set_request(r(8, 15));
        assert_eq!(queue.take_next(12), Some(r(8, 12)));
        queue.finish_active(12);
        assert_eq!(queue.snapshot(), vec![r(5, 8), r(12, 20)]);
        assert_eq!(queue.readable_len(r(0, 20)), 5);

        // nothing of the window is written yet, so older cells go first
        queue.set_request(r(14, 18));
        assert_eq!(queue.take_next(13), Some(r(5, 8)));
    }

    #[test]
    fn test_interrupted_range_goes_back() {
        let mut queue = RangeQueue::new(100);
        queue.take_next(u32::MAX);
        assert!(queue.set_request(r(80, 90)));
        queue.finish_active(30);
        assert_eq!(queue.snapshot(), vec![r(30, 100)]);
        assert_eq!(queue.take_next(u32::MAX), Some(r(80, 90)));
        assert_eq!(queue.snapshot(), vec![r(30, 80), r(80, 90), r(90, 100)]);
    }

    #[test]
    fn test_set_request_inside_active_range() {
        let mut queue = RangeQueue::new(100);
        queue.take_next(u32::MAX);
        assert!(!queue.set_request(r(0, 20)), "already computing the window");
        assert!(queue.set_request(r(10, 20)));
        assert!(!queue.set_request(r(200, 300)), "nothing pending there");
    }

    #[test]
    fn test_readable_len() {
        let mut queue = RangeQueue::new(100);
        assert_eq!(queue.readable_len(r(0, 100)), 0);

        queue.set_request(r(40, 60));
        queue.take_next(u32::MAX);
        queue.finish_active(60);
        assert_eq!(queue.readable_len(r(40, 60)), 20);
        assert_eq!(queue.readable_len(r(45, 80)), 15);
        assert_eq!(queue.readable_len(r(0, 50)), 0);
        assert_eq!(queue.readable_len(r(60, 70)), 0);

        // cells past the covered end are never readable
        let mut queue = RangeQueue::new(10);
        queue.take_next(u32::MAX);
        queue.finish_active(10);
        assert_eq!(queue.readable_len(r(0, 20)), 10);
        assert_eq!(queue.readable_len(r(15, 20)), 0);
    }

    #[test]
    fn test_extend_coverage() {
        let mut queue = RangeQueue::new(0);
        assert!(queue.is_idle());
        assert!(queue.extend_coverage(10));
        assert!(!queue.extend_coverage(10));
        assert!(queue.extend_coverage(15));
        assert_eq!(queue.snapshot(), vec![r(0, 15)]);
        assert_eq!(queue.covered(), 15);
    }
}
