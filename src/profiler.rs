//! Update-loop profiler (zero-allocation ring buffer)
//!
//! Times each drawer pass and the idle gap before it. Recent update times
//! live in a fixed ring buffer with a cached sum, so averages are O(1).

use std::time::{Duration, Instant};

/// Running min/avg/max over every sample since the last clear
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl Extremes {
    const EMPTY: Self = Self {
        min: f64::INFINITY,
        avg: 0.0,
        max: 0.0,
    };

    fn record(&mut self, count: usize, ms: f64) {
        self.avg = (self.avg * (count - 1) as f64 + ms) / count as f64;
        self.min = self.min.min(ms);
        self.max = self.max.max(ms);
    }
}

pub struct Profiler {
    /// Ring buffer of update durations (ms)
    update_times: Vec<f64>,
    /// Current write index (head of ring buffer)
    head: usize,
    /// Cached sum of `update_times`
    total_time: f64,
    num_updates: usize,
    update: Extremes,
    idle: Extremes,
    last_begin: Option<Instant>,
    last_end: Option<Instant>,
}

impl Profiler {
    pub fn new() -> Self {
        const CAPACITY: usize = 120; // 2 seconds at 60fps
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            update_times: vec![0.0; capacity.max(1)],
            head: 0,
            total_time: 0.0,
            num_updates: 0,
            update: Extremes::EMPTY,
            idle: Extremes::EMPTY,
            last_begin: None,
            last_end: None,
        }
    }

    pub fn begin_update(&mut self) {
        self.begin_update_at(Instant::now());
    }

    pub fn end_update(&mut self) {
        self.end_update_at(Instant::now());
    }

    fn begin_update_at(&mut self, now: Instant) {
        if self.is_mid_update() {
            self.end_update_at(now);
        }
        self.last_begin = Some(now);

        // idle time is only known from the second update on
        if let Some(end) = self.last_end {
            let idle = ms(now.saturating_duration_since(end));
            self.idle.record(self.num_updates, idle);
        }
    }

    fn end_update_at(&mut self, now: Instant) {
        let Some(begin) = self.last_begin.take() else {
            return;
        };
        self.last_end = Some(now);

        let elapsed = ms(now.saturating_duration_since(begin));
        self.num_updates += 1;
        self.update.record(self.num_updates, elapsed);

        // Ring buffer update: subtract old value, add new value
        let old = self.update_times[self.head];
        self.update_times[self.head] = elapsed;
        self.total_time = self.total_time - old + elapsed;
        self.head = (self.head + 1) % self.update_times.len();
    }

    pub fn is_mid_update(&self) -> bool {
        self.last_begin.is_some()
    }

    pub fn num_updates(&self) -> usize {
        self.num_updates
    }

    pub fn update_times(&self) -> Extremes {
        self.update
    }

    pub fn idle_times(&self) -> Extremes {
        self.idle
    }

    /// Average over the ring buffer only
    pub fn recent_avg_update_time(&self) -> f64 {
        let filled = self.num_updates.min(self.update_times.len());
        if filled == 0 {
            0.0
        } else {
            self.total_time / filled as f64
        }
    }

    /// Update rate implied by average update plus idle time
    pub fn updates_per_second(&self) -> f64 {
        let period = self.update.avg + self.idle.avg;
        if period > 0.001 {
            1000.0 / period
        } else {
            0.0
        }
    }

    pub fn clear(&mut self) {
        *self = Self::with_capacity(self.update_times.len());
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
