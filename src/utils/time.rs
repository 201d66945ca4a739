//! Frame Clock
//!
//! Tracks frame deltas and a smoothed frame rate averaged over a sliding
//! window of recent frames.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frame clock shared by everything that needs frame timing.
///
/// The clock is advanced explicitly with the frame delta, which keeps the
/// orchestrator deterministic; [`tick_now`](Self::tick_now) measures the
/// delta from the wall clock instead.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_update: Instant,
    /// Time since last tick, in seconds
    pub dt: f32,
    /// Total frame time since creation, in seconds
    pub frame_time: f32,
    /// Number of ticks so far
    pub frame_count: u64,
    average_interval: f32,
    history: VecDeque<f32>,
    history_time: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Averaging window used for the smoothed frame rate.
    pub const DEFAULT_AVERAGE_INTERVAL: f32 = 3.0;

    /// Upper bound on the number of frames kept for averaging.
    pub const MAX_HISTORY_LEN: usize = 4096;

    #[must_use]
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            dt: 0.0,
            frame_time: 0.0,
            frame_count: 0,
            average_interval: Self::DEFAULT_AVERAGE_INTERVAL,
            history: VecDeque::new(),
            history_time: 0.0,
        }
    }

    pub fn set_average_frame_rate_interval(&mut self, seconds: f32) {
        self.average_interval = seconds.max(f32::EPSILON);
        self.trim_history();
    }

    /// Advances the clock by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.last_update = Instant::now();
        self.dt = dt;
        self.frame_time += dt;
        self.frame_count += 1;

        // Zero-length frames carry no rate information.
        if dt > 0.0 {
            self.history.push_back(dt);
            self.history_time += dt;
            self.trim_history();
        }
    }

    /// Advances the clock by the wall time elapsed since the previous tick.
    pub fn tick_now(&mut self) {
        let elapsed: Duration = Instant::now() - self.last_update;
        self.tick(elapsed.as_secs_f32());
    }

    /// Frames per second averaged over the averaging interval.
    #[must_use]
    pub fn average_frame_rate(&self) -> f32 {
        if self.history_time <= 0.0 {
            return 0.0;
        }
        self.history.len() as f32 / self.history_time
    }

    /// Frame delta derived from the averaged frame rate.
    #[must_use]
    pub fn smooth_dt(&self) -> f32 {
        1.0 / self.average_frame_rate().max(1e-5)
    }

    fn trim_history(&mut self) {
        while self.history.len() > Self::MAX_HISTORY_LEN
            || (self.history.len() > 1 && self.history_time > self.average_interval)
        {
            if let Some(oldest) = self.history.pop_front() {
                self.history_time -= oldest;
            }
        }
    }
}
