//! Lifecycle Hooks
//!
//! Plugins opt into lifecycle events by returning a [`HookSet`] from
//! [`Plugin::hooks`](super::Plugin::hooks). The registry only calls
//! [`Plugin::on_hook`](super::Plugin::on_hook) for events in that set.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Set of hooks a plugin listens to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookSet: u8 {
        const STAGE_SETUP        = 1 << 0;
        const POST_STAGE_SETUP   = 1 << 1;
        const PIPELINE_CREATED   = 1 << 2;
        const SHADER_RELOAD      = 1 << 3;
        const WINDOW_RESIZED     = 1 << 4;
        const PRE_RENDER_UPDATE  = 1 << 5;
        const POST_RENDER_UPDATE = 1 << 6;
    }
}

/// A lifecycle event dispatched to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Plugins add their stages.
    StageSetup,
    /// All plugin stages exist; plugins may look up each other's stages.
    PostStageSetup,
    PipelineCreated,
    /// Shaders were recompiled.
    ShaderReload,
    /// The render resolution changed.
    WindowResized,
    PreRenderUpdate,
    PostRenderUpdate,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Self::StageSetup,
        Self::PostStageSetup,
        Self::PipelineCreated,
        Self::ShaderReload,
        Self::WindowResized,
        Self::PreRenderUpdate,
        Self::PostRenderUpdate,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StageSetup => "stage_setup",
            Self::PostStageSetup => "post_stage_setup",
            Self::PipelineCreated => "pipeline_created",
            Self::ShaderReload => "shader_reload",
            Self::WindowResized => "window_resized",
            Self::PreRenderUpdate => "pre_render_update",
            Self::PostRenderUpdate => "post_render_update",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.name() == name)
    }

    #[inline]
    #[must_use]
    pub const fn flag(self) -> HookSet {
        match self {
            Self::StageSetup => HookSet::STAGE_SETUP,
            Self::PostStageSetup => HookSet::POST_STAGE_SETUP,
            Self::PipelineCreated => HookSet::PIPELINE_CREATED,
            Self::ShaderReload => HookSet::SHADER_RELOAD,
            Self::WindowResized => HookSet::WINDOW_RESIZED,
            Self::PreRenderUpdate => HookSet::PRE_RENDER_UPDATE,
            Self::PostRenderUpdate => HookSet::POST_RENDER_UPDATE,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
