//! Stage Graph
//!
//! - [`stage`]: the [`RenderStage`] trait, the data-driven [`ShaderStage`]
//!   and the core stages every pipeline has
//! - [`manager`]: ordered stage list, define surface and shader reloads
//! - [`autoconfig`]: the generated shader configuration artifact

pub mod autoconfig;
pub mod manager;
pub mod stage;

pub use autoconfig::{DEFAULT_CONFIG_PATH, render_autoconfig};
pub use manager::{ShaderInput, StageManager};
pub use stage::{RenderStage, ShaderStage, core_stages, final_stage};
