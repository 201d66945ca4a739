//! Render Passes and Visibility Masks
//!
//! Every object takes part in up to five scene passes. Each pass is rendered
//! by its own camera, which only traverses nodes visible under that pass's
//! [`CameraMask`] bit.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Per-pass visibility bits.
    ///
    /// Bit 0 belongs to the host's default camera and is never touched by
    /// effect dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CameraMask: u32 {
        const GBUFFER  = 1 << 1;
        const SHADOW   = 1 << 2;
        const VOXELIZE = 1 << 3;
        const ENVMAP   = 1 << 4;
        const FORWARD  = 1 << 5;
    }
}

/// The scene passes an effect can take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderPass {
    GBuffer = 0,
    Shadow = 1,
    Voxelize = 2,
    EnvMap = 3,
    Forward = 4,
}

impl RenderPass {
    /// All passes, in dispatch order.
    pub const ALL: [RenderPass; 5] = [
        Self::GBuffer,
        Self::Shadow,
        Self::Voxelize,
        Self::EnvMap,
        Self::Forward,
    ];

    /// Position in dispatch order; feeds the tag-state sort.
    #[inline]
    #[must_use]
    pub const fn index(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GBuffer => "gbuffer",
            Self::Shadow => "shadow",
            Self::Voxelize => "voxelize",
            Self::EnvMap => "envmap",
            Self::Forward => "forward",
        }
    }

    /// Name of the effect option enabling this pass.
    #[must_use]
    pub const fn option_name(self) -> &'static str {
        match self {
            Self::GBuffer => "render_gbuffer",
            Self::Shadow => "render_shadow",
            Self::Voxelize => "render_voxelize",
            Self::EnvMap => "render_envmap",
            Self::Forward => "render_forward",
        }
    }

    /// Node tag key the pass camera matches its tag states against.
    #[must_use]
    pub const fn tag_key(self) -> &'static str {
        match self {
            Self::GBuffer => "gbuffer_effect",
            Self::Shadow => "shadow_effect",
            Self::Voxelize => "voxelize_effect",
            Self::EnvMap => "envmap_effect",
            Self::Forward => "forward_effect",
        }
    }

    #[must_use]
    pub const fn mask(self) -> CameraMask {
        match self {
            Self::GBuffer => CameraMask::GBUFFER,
            Self::Shadow => CameraMask::SHADOW,
            Self::Voxelize => CameraMask::VOXELIZE,
            Self::EnvMap => CameraMask::ENVMAP,
            Self::Forward => CameraMask::FORWARD,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
