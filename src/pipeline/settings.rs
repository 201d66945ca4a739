//! Pipeline Settings
//!
//! Startup configuration of a [`RenderPipeline`](super::RenderPipeline). It
//! is consumed once by [`PipelineBuilder::create`](super::PipelineBuilder::create);
//! plugin settings are configured separately through their descriptors.
//!
//! # Example
//!
//! ```yaml
//! plugins: [ao, bloom, env_probes]
//! resolution_scale: 0.75
//! light_culling:
//!     grid_size_x: 32
//!     grid_size_y: 18
//! task_schedule:
//!     - [pssm_scene_shadows, envprobes_capture]
//!     - [pssm_distant_shadows]
//! ```
//!
//! Every field is optional:
//!
//! | Field                       | Default                          |
//! |-----------------------------|----------------------------------|
//! | `plugins`                   | none                             |
//! | `resolution_scale`          | `1.0`                            |
//! | `reference_mode`            | `false`                          |
//! | `use_r11_g11_b10`           | `false`                          |
//! | `plugin_dir`                | `plugins`                        |
//! | `daytime_config`            | `config/daytime.yaml`            |
//! | `requires_daytime_settings` | `true`                           |
//! | `shader_config_path`        | `temp/pipeline_config.inc.glsl`  |
//! | `scene_data_path`           | `temp/main_scene_data.inc.glsl`  |
//! | `default_effect`            | `effects/default.yaml`, sort -10 |
//! | `time_of_day`               | `0.5`                            |

use serde::Deserialize;

use crate::errors::{PipelineError, Result};
use crate::resources::frame_inputs::DEFAULT_SCENE_DATA_PATH;
use crate::stages::DEFAULT_CONFIG_PATH;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Clustered light culling parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightCullingSettings {
    pub grid_size_x: u32,
    pub grid_size_y: u32,
    pub slices: u32,
    pub max_distance: f32,
    pub slice_width: u32,
    pub max_lights_per_cell: u32,
}

impl Default for LightCullingSettings {
    fn default() -> Self {
        Self {
            grid_size_x: 24,
            grid_size_y: 16,
            slices: 32,
            max_distance: 500.0,
            slice_width: 2048,
            max_lights_per_cell: 64,
        }
    }
}

/// Shadow atlas parameters, exported as defines for the light system.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowSettings {
    pub atlas_size: u32,
    pub max_update_distance: f32,
    pub max_updates: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: 4096,
            max_update_distance: 150.0,
            max_updates: 8,
        }
    }
}

/// Effect applied to the scene root after creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultEffect {
    pub source: String,
    pub sort: i32,
}

impl Default for DefaultEffect {
    fn default() -> Self {
        Self {
            source: "effects/default.yaml".to_string(),
            sort: -10,
        }
    }
}

/// Timing of the periodic render-state cache clearing, in seconds of frame
/// time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateCacheSettings {
    pub first_clear: f32,
    pub interval: f32,
}

impl Default for StateCacheSettings {
    fn default() -> Self {
        Self {
            first_clear: 0.5,
            interval: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Plugin ids to load, in registration order.
    pub plugins: Vec<String>,
    /// Internal render resolution relative to the window.
    pub resolution_scale: f32,
    pub reference_mode: bool,
    pub use_r11_g11_b10: bool,

    pub light_culling: LightCullingSettings,
    pub shadows: ShadowSettings,

    pub plugin_dir: String,
    pub daytime_config: String,
    pub requires_daytime_settings: bool,
    pub shader_config_path: String,
    pub scene_data_path: String,

    /// `None` skips applying a default effect.
    pub default_effect: Option<DefaultEffect>,
    pub state_cache: StateCacheSettings,
    /// Task names per frame; the schedule repeats.
    pub task_schedule: Vec<Vec<String>>,
    /// Initial time of day in `[0, 1)`.
    pub time_of_day: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            resolution_scale: 1.0,
            reference_mode: false,
            use_r11_g11_b10: false,
            light_culling: LightCullingSettings::default(),
            shadows: ShadowSettings::default(),
            plugin_dir: "plugins".to_string(),
            daytime_config: "config/daytime.yaml".to_string(),
            requires_daytime_settings: true,
            shader_config_path: DEFAULT_CONFIG_PATH.to_string(),
            scene_data_path: DEFAULT_SCENE_DATA_PATH.to_string(),
            default_effect: Some(DefaultEffect::default()),
            state_cache: StateCacheSettings::default(),
            task_schedule: Vec::new(),
            time_of_day: 0.5,
        }
    }
}

impl PipelineSettings {
    /// Parses and validates a settings document. An empty document yields
    /// the defaults.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let settings: Self = if source.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(source)?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resolution_scale > 0.0 && self.resolution_scale <= 4.0) {
            return Err(PipelineError::config(format!(
                "resolution_scale must be in (0, 4], got {}",
                self.resolution_scale
            )));
        }

        let lc = &self.light_culling;
        if lc.grid_size_x == 0 || lc.grid_size_y == 0 || lc.slices == 0 {
            return Err(PipelineError::config(
                "light culling grid size and slices must be positive",
            ));
        }
        if !self.shadows.atlas_size.is_power_of_two() {
            return Err(PipelineError::config(format!(
                "shadow atlas size {} is not a power of two",
                self.shadows.atlas_size
            )));
        }

        for (i, id) in self.plugins.iter().enumerate() {
            if self.plugins[..i].contains(id) {
                return Err(PipelineError::config(format!("plugin '{id}' is listed twice")));
            }
        }

        if self.state_cache.first_clear < 0.0 || self.state_cache.interval <= 0.0 {
            return Err(PipelineError::config(
                "state cache timings must be non-negative with a positive interval",
            ));
        }
        if !(0.0..1.0).contains(&self.time_of_day) {
            return Err(PipelineError::config(format!(
                "time_of_day must be in [0, 1), got {}",
                self.time_of_day
            )));
        }
        Ok(())
    }
}
