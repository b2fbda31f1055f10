//! Damped scalar animator
//!
//! Not a physical mass-spring: the value follows a single exponential
//! ease from start to target over a fixed duration, then snaps exactly
//! onto the target. Time is passed in as milliseconds on a monotonic clock.

/// Snapshot of one end of the animation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpringState {
    pub value: f64,
    /// Milliseconds
    pub time: f64,
}

/// Scalar animator used for center x, center y and zoom
#[derive(Debug, Clone)]
pub struct Spring {
    pub current: SpringState,
    pub start: SpringState,
    pub target: SpringState,
    /// Exponential stiffness constant `k`
    pub stiffness: f64,
    /// Seconds for a full transition
    pub animation_time: f64,
}

impl Spring {
    pub fn new(initial: f64, stiffness: f64, animation_time: f64) -> Self {
        let state = SpringState { value: initial, time: 0.0 };
        Self {
            current: state,
            start: state,
            target: state,
            stiffness,
            animation_time,
        }
    }

    /// Snap to `target` without animating
    pub fn reset_to(&mut self, target: f64) {
        self.target.value = target;
        self.target.time = self.current.time;
        self.start = self.target;
        self.current.value = target;
    }

    /// Begin an eased transition from the current value to `target`
    pub fn spring_to(&mut self, target: f64) {
        self.start = self.current;
        self.target.value = target;
        self.target.time = self.start.time + 1000.0 * self.animation_time;
    }

    /// Translate the whole animation by `delta` without restarting the clock
    pub fn shift_by(&mut self, delta: f64) {
        self.start.value += delta;
        self.target.value += delta;
    }

    /// Recompute the current value at `now` (ms)
    pub fn update(&mut self, now: f64) {
        self.current.time = now;
        self.current.value = if now >= self.target.time {
            self.target.value
        } else {
            let progress = (now - self.start.time) / (self.target.time - self.start.time);
            self.start.value
                + (self.target.value - self.start.value) * ease(self.stiffness, progress.clamp(0.0, 1.0))
        };
    }

    /// True once the current value has reached the target
    pub fn is_settled(&self) -> bool {
        self.current.value == self.target.value
    }
}

fn ease(stiffness: f64, x: f64) -> f64 {
    (1.0 - (-stiffness * x).exp()) / (1.0 - (-stiffness).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_immediate() {
        let mut spring = Spring::new(0.0, 5.0, 1.5);
        spring.update(100.0);
        spring.reset_to(3.0);
        spring.update(100.0);
        assert_eq!(spring.current.value, 3.0);
    }

    #[test]
    fn test_reset_moves_current_without_update() {
        let mut spring = Spring::new(0.0, 5.0, 1.5);
        spring.update(100.0);
        spring.spring_to(1.0);
        spring.update(200.0);
        spring.reset_to(-2.0);
        assert_eq!(spring.current.value, -2.0);
        assert_eq!(spring.start.value, -2.0);
        assert!(spring.is_settled());
    }

    #[test]
    fn test_terminal_convergence_is_exact() {
        let mut spring = Spring::new(0.1, 5.0, 1.5);
        spring.update(1000.0);
        spring.spring_to(0.7);

        let mut now = 1000.0;
        let mut last = spring.current.value;
        while now < spring.target.time {
            now += 16.0;
            spring.update(now);
            assert!(spring.current.value >= last);
            last = spring.current.value;
        }
        assert_eq!(spring.current.value, 0.7);
        assert!(spring.is_settled());
    }

    #[test]
    fn test_midpoint_follows_curve() {
        let mut spring = Spring::new(0.0, 5.0, 1.0);
        spring.update(0.0);
        spring.spring_to(1.0);
        spring.update(500.0);
        let expected = (1.0 - (-2.5f64).exp()) / (1.0 - (-5.0f64).exp());
        assert!((spring.current.value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_shift_keeps_clock() {
        let mut spring = Spring::new(0.0, 5.0, 1.0);
        spring.update(0.0);
        spring.spring_to(1.0);
        let target_time = spring.target.time;
        spring.shift_by(2.0);
        assert_eq!(spring.target.time, target_time);
        spring.update(target_time);
        assert_eq!(spring.current.value, 3.0);
    }
}
