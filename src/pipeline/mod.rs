//! Frame Orchestration
//!
//! The [`RenderPipeline`] and the state it shares with every component.

#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod session;
pub mod settings;

pub use pipeline::{PipelineBuilder, PipelineState, RenderPipeline};
pub use session::{LightGrid, RenderSession, floor_to_multiple_of_4};
pub use settings::{
    DefaultEffect, LightCullingSettings, PipelineSettings, ShadowSettings, StateCacheSettings,
};
