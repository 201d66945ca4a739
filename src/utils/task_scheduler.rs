//! Frame-Distributed Task Scheduler
//!
//! Spreads expensive periodic work (shadow updates, probe captures, ...) over
//! a repeating sequence of frames. Each frame of the schedule lists the task
//! names allowed to run on that frame; plugins ask
//! [`TaskScheduler::is_scheduled`] before doing the work.

use log::error;

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    frames: Vec<Vec<String>>,
    frame_index: usize,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(frames: Vec<Vec<String>>) -> Self {
        Self {
            frames,
            frame_index: 0,
        }
    }

    /// Number of frames after which the schedule repeats.
    #[inline]
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Index of the current frame within the schedule.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Returns whether `task` runs on the current frame.
    ///
    /// A task that appears in no frame of the schedule is a configuration
    /// mistake; it is reported and never runs.
    #[must_use]
    pub fn is_scheduled(&self, task: &str) -> bool {
        let Some(current) = self.frames.get(self.frame_index) else {
            return false;
        };
        if current.iter().any(|t| t == task) {
            return true;
        }
        if !self.frames.iter().flatten().any(|t| t == task) {
            error!("Task '{task}' is not part of any scheduled frame");
        }
        false
    }

    /// Moves to the next frame of the schedule.
    pub fn step(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        self.frame_index = (self.frame_index + 1) % self.frames.len();
    }
}
