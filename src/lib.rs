//! # Dusk
//!
//! Runtime core of a plugin-driven deferred rendering pipeline.
//!
//! The crate sequences rendering work without owning a graphics device:
//! plugins contribute stages, settings and defines; effects bind per-pass
//! shaders to scene nodes; the [`RenderPipeline`] drives everything once per
//! frame through the collaborators in [`backend`].
//!
//! ```rust,ignore
//! use dusk::{PipelineBuilder, PipelineSettings};
//!
//! let settings = PipelineSettings::from_yaml(&std::fs::read_to_string("pipeline.yaml")?)?;
//! let mut pipeline = PipelineBuilder::new(settings)
//!     .with_plugin("bloom", Bloom::default)
//!     .create(host)?;
//!
//! pipeline.update(1.0 / 60.0)?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod effects;
pub mod errors;
pub mod pipeline;
pub mod plugins;
pub mod resources;
pub mod settings;
pub mod stages;
pub mod utils;

pub use backend::{Host, NodeId, ShaderHandle, ShaderProgram};
pub use effects::{EffectOptions, RenderPass};
pub use errors::{PipelineError, Result, ValidationError};
pub use pipeline::{PipelineBuilder, PipelineSettings, PipelineState, RenderPipeline, RenderSession};
pub use plugins::{Hook, HookSet, Plugin, PluginContext, Propagation};
pub use resources::{GroupedInputBlock, ShaderDefines};
pub use settings::{Setting, SettingValue};
pub use stages::{RenderStage, ShaderStage, StageManager};
pub use utils::interner;
