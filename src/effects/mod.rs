//! Effect Dispatch
//!
//! Resolves declarative per-object effects into pass visibility and shader
//! bindings:
//!
//! - [`pass`]: the five scene passes and their camera masks
//! - [`effect`]: effect declarations and option resolution
//! - [`tag_state`]: tag-state bookkeeping for the non-gbuffer passes
//! - [`dispatch`]: the cached, replayable application of effects to nodes

pub mod dispatch;
pub mod effect;
pub mod pass;
pub mod tag_state;

pub use dispatch::{AppliedEffect, CompiledEffect, DispatchTarget, EffectDispatcher, pass_sort};
pub use effect::{DEFAULT_OPTIONS, Effect, EffectOptions, ResolvedOptions};
pub use pass::{CameraMask, RenderPass};
pub use tag_state::TagStateManager;
