//! Pointer motion planning.
//!
//! A move from one point to another is split into `steps` increments along a
//! smoothstep (ease-in-out) curve. Each increment is the difference between
//! the new target cumulative displacement and the one already emitted, so
//! integer truncation never accumulates drift: the increments always sum to
//! the full displacement.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of increments for a pointer move.
pub const DEFAULT_STEPS: u32 = 20;

/// Default duration of a pointer move in seconds.
pub const DEFAULT_DURATION_SECS: f64 = 0.5;

/// A screen position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Screen bounding box of a UI element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBounds {
    /// Center of the box shifted by an offset, truncated to whole pixels.
    pub fn center_with_offset(&self, offset_x: i32, offset_y: i32) -> Point {
        let x = self.x + self.width / 2.0 + f64::from(offset_x);
        let y = self.y + self.height / 2.0 + f64::from(offset_y);
        Point::new(x as i32, y as i32)
    }
}

/// One increment of a motion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionStep {
    /// Relative change from the previous increment.
    pub dx: i32,
    pub dy: i32,
    /// Absolute position after applying this increment.
    pub position: Point,
}

/// Ease-in-out curve with zero velocity at both ends.
pub fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Lazy sequence of increments between two points.
///
/// Yields `steps + 1` items for `i` in `0..=steps` (the first is always a
/// zero increment). A path with zero steps yields nothing; the caller is
/// expected to jump straight to the target. Cloning a path restarts it.
#[derive(Debug, Clone)]
pub struct MotionPath {
    from: Point,
    total_dx: i32,
    total_dy: i32,
    steps: u32,
    next: u32,
    moved_x: i32,
    moved_y: i32,
}

impl MotionPath {
    pub fn new(from: Point, to: Point, steps: u32) -> Self {
        Self {
            from,
            total_dx: to.x - from.x,
            total_dy: to.y - from.y,
            steps,
            next: 0,
            moved_x: 0,
            moved_y: 0,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Real-time pause after each increment for a move lasting `duration`.
    pub fn interval(&self, duration: Duration) -> Duration {
        if self.steps == 0 {
            Duration::ZERO
        } else {
            duration / self.steps
        }
    }
}

impl Iterator for MotionPath {
    type Item = MotionStep;

    fn next(&mut self) -> Option<MotionStep> {
        if self.steps == 0 || self.next > self.steps {
            return None;
        }

        let t = smoothstep(f64::from(self.next) / f64::from(self.steps));
        let target_x = (f64::from(self.total_dx) * t) as i32;
        let target_y = (f64::from(self.total_dy) * t) as i32;

        let step = MotionStep {
            dx: target_x - self.moved_x,
            dy: target_y - self.moved_y,
            position: Point::new(self.from.x + target_x, self.from.y + target_y),
        };

        self.moved_x = target_x;
        self.moved_y = target_y;
        self.next += 1;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.steps == 0 {
            0
        } else {
            (self.steps + 1).saturating_sub(self.next) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MotionPath {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(path: MotionPath) -> (i32, i32) {
        path.fold((0, 0), |(x, y), step| (x + step.dx, y + step.dy))
    }

    #[test]
    fn test_deltas_sum_to_displacement() {
        for d in [-1000, 0, 1, 999] {
            for n in [1, 5, 20] {
                let path = MotionPath::new(Point::new(0, 0), Point::new(d, -d), n);
                assert_eq!(sum(path), (d, -d), "drift for d={} n={}", d, n);
            }
        }
    }

    #[test]
    fn test_deltas_sum_from_nonzero_origin() {
        let from = Point::new(960, 540);
        let to = Point::new(3, 1079);
        let (dx, dy) = sum(MotionPath::new(from, to, 7));
        assert_eq!(Point::new(from.x + dx, from.y + dy), to);
    }

    #[test]
    fn test_last_position_is_target() {
        let to = Point::new(-37, 412);
        let last = MotionPath::new(Point::new(100, 100), to, 20).last().unwrap();
        assert_eq!(last.position, to);
    }

    #[test]
    fn test_emits_steps_plus_one_with_zero_first() {
        let mut path = MotionPath::new(Point::new(0, 0), Point::new(100, 0), 5);
        assert_eq!(path.len(), 6);
        let first = path.next().unwrap();
        assert_eq!((first.dx, first.dy), (0, 0));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_zero_steps_emits_nothing() {
        let path = MotionPath::new(Point::new(0, 0), Point::new(50, 50), 0);
        assert_eq!(path.len(), 0);
        assert_eq!(path.count(), 0);
    }

    #[test]
    fn test_clone_restarts_sequence() {
        let path = MotionPath::new(Point::new(0, 0), Point::new(300, 200), 10);
        let first: Vec<_> = path.clone().collect();
        let second: Vec<_> = path.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ease_in_out_is_slow_at_ends() {
        let steps: Vec<_> = MotionPath::new(Point::new(0, 0), Point::new(1000, 0), 20).collect();
        let start = steps[1].dx;
        let middle = steps[10].dx;
        let end = steps[20].dx;
        assert!(middle > start * 3, "middle {} start {}", middle, start);
        assert!(middle > end * 3, "middle {} end {}", middle, end);
    }

    #[test]
    fn test_interval_splits_duration() {
        let path = MotionPath::new(Point::new(0, 0), Point::new(10, 10), 20);
        assert_eq!(
            path.interval(Duration::from_millis(500)),
            Duration::from_millis(25)
        );
        let path = MotionPath::new(Point::new(0, 0), Point::new(10, 10), 0);
        assert_eq!(path.interval(Duration::from_millis(500)), Duration::ZERO);
    }

    #[test]
    fn test_element_center_with_offset() {
        let bounds = ElementBounds {
            x: 100.0,
            y: 40.0,
            width: 51.0,
            height: 20.0,
        };
        assert_eq!(bounds.center_with_offset(0, 0), Point::new(125, 50));
        assert_eq!(bounds.center_with_offset(-5, 10), Point::new(120, 60));
    }
}
