//! Scroll motion helpers
//!
//! Page scrolls may animate linearly over a fixed duration. Hover scrolling
//! (pointer held past the padded window edge) moves by an amount that grows
//! with the cube of the overshoot.

use std::time::{Duration, Instant};

/// Linear animation of the window start between two times
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
}

impl ScrollAnimation {
    pub fn new(from: f64, to: f64, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    /// Window start at `now` and whether the animation has finished
    pub fn advance(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration || self.duration.is_zero() {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * t, false)
    }
}

/// Scroll per hover tick for a pointer `overshoot` ms past a `padding` ms edge
///
/// Signed like `overshoot`. Equals the overshoot itself once it reaches
/// `sqrt(3)` paddings.
pub fn hover_scroll_amount(overshoot: f64, padding: f64) -> f64 {
    if padding <= 0.0 {
        return overshoot;
    }
    overshoot.powi(3) / (3.0 * padding * padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_is_linear_and_finishes() {
        let start = Instant::now();
        let anim = ScrollAnimation::new(1000.0, 2000.0, start, Duration::from_millis(100));
        assert_eq!(anim.advance(start), (1000.0, false));

        let (mid, done) = anim.advance(start + Duration::from_millis(50));
        assert!(!done);
        assert!((mid - 1500.0).abs() < 1e-6);

        assert_eq!(anim.advance(start + Duration::from_millis(100)), (2000.0, true));
        assert_eq!(anim.advance(start + Duration::from_secs(5)), (2000.0, true));
    }

    #[test]
    fn test_zero_duration_jumps() {
        let start = Instant::now();
        let anim = ScrollAnimation::new(0.0, 500.0, start, Duration::ZERO);
        assert_eq!(anim.advance(start), (500.0, true));
    }

    #[test]
    fn test_hover_amount_is_cubic() {
        assert_eq!(hover_scroll_amount(0.0, 100.0), 0.0);
        assert_eq!(hover_scroll_amount(30.0, 100.0), 27000.0 / 30000.0);
        assert_eq!(hover_scroll_amount(-30.0, 100.0), -0.9);
        assert_eq!(hover_scroll_amount(30.0, 0.0), 30.0);
    }
}
