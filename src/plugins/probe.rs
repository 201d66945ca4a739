//! Environment Probes
//!
//! Probes are created by the environment-probe plugin. When that plugin is
//! not loaded the pipeline hands out a [`NullEnvironmentProbe`] instead, so
//! scene code can configure probes unconditionally.

use glam::Mat4;

/// A localized environment capture volume.
pub trait EnvironmentProbe {
    fn set_transform(&mut self, transform: Mat4);

    fn set_border_smoothness(&mut self, smoothness: f32);

    fn set_parallax_correction(&mut self, enabled: bool);

    /// Whether the probe actually contributes to lighting.
    fn is_active(&self) -> bool;
}

/// A probe that ignores every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEnvironmentProbe;

impl EnvironmentProbe for NullEnvironmentProbe {
    fn set_transform(&mut self, _transform: Mat4) {}

    fn set_border_smoothness(&mut self, _smoothness: f32) {}

    fn set_parallax_correction(&mut self, _enabled: bool) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// A probe that stores its parameters for the owning plugin to upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeVolume {
    pub transform: Mat4,
    pub border_smoothness: f32,
    pub parallax_correction: bool,
}

impl Default for ProbeVolume {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            border_smoothness: 0.1,
            parallax_correction: true,
        }
    }
}

impl EnvironmentProbe for ProbeVolume {
    fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    fn set_border_smoothness(&mut self, smoothness: f32) {
        self.border_smoothness = smoothness.clamp(0.0, 1.0);
    }

    fn set_parallax_correction(&mut self, enabled: bool) {
        self.parallax_correction = enabled;
    }

    fn is_active(&self) -> bool {
        true
    }
}
