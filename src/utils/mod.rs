//! Utility Module
//!
//! - [`interner`]: String interning for define names and values
//! - [`time`]: Frame clock with smoothed frame rate
//! - [`task_scheduler`]: Distributes periodic work over frames
//!
//! ```rust,ignore
//! use dusk::utils::interner;
//!
//! let a = interner::intern("HAVE_PLUGIN_ao");
//! let b = interner::intern("HAVE_PLUGIN_ao");
//! assert_eq!(a, b); // O(1) comparison
//! ```

pub mod interner;
pub mod task_scheduler;
pub mod time;

pub use interner::Symbol;
pub use task_scheduler::TaskScheduler;
pub use time::FrameClock;
