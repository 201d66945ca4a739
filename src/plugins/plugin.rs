//! Plugin Interface
//!
//! A plugin is an extension hosted by the pipeline. Every method has a
//! default, so a plugin implements only what it needs:
//!
//! ```rust,ignore
//! struct Bloom;
//!
//! impl Plugin for Bloom {
//!     fn hooks(&self) -> HookSet {
//!         HookSet::STAGE_SETUP
//!     }
//!
//!     fn on_hook(&mut self, hook: Hook, ctx: &mut PluginContext<'_>) -> Result<()> {
//!         if hook == Hook::StageSetup {
//!             ctx.add_stage(Box::new(ShaderStage::new("BloomStage").requires("ShadedScene")))?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use super::hooks::{Hook, HookSet};
use super::probe::EnvironmentProbe;
use crate::errors::Result;
use crate::pipeline::RenderSession;
use crate::settings::{DaySetting, Setting, SettingMap, SettingValue};
use crate::stages::{RenderStage, StageManager};

/// What a plugin can reach while one of its callbacks runs.
pub struct PluginContext<'a> {
    pub plugin_id: &'a str,
    pub settings: &'a SettingMap<Setting>,
    pub day_settings: &'a SettingMap<DaySetting>,
    pub stages: &'a mut StageManager,
    pub session: &'a RenderSession,
}

impl PluginContext<'_> {
    /// Current value of one of the plugin's own settings.
    #[must_use]
    pub fn setting(&self, id: &str) -> Option<&SettingValue> {
        self.settings.get(id).map(Setting::value)
    }

    /// Adds a stage owned by this plugin.
    pub fn add_stage(&mut self, stage: Box<dyn RenderStage>) -> Result<()> {
        self.stages.add_stage_owned(self.plugin_id, stage)
    }
}

/// An extension of the render pipeline.
pub trait Plugin {
    /// Hooks this plugin wants to receive.
    fn hooks(&self) -> HookSet {
        HookSet::empty()
    }

    /// Called for every hook in [`hooks`](Self::hooks), in registration order.
    fn on_hook(&mut self, _hook: Hook, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether [`on_setting_update`](Self::on_setting_update) handles
    /// `setting_id`.
    fn has_setting_callback(&self, _setting_id: &str) -> bool {
        false
    }

    /// Reacts to a runtime change of `setting_id`. The new value is already
    /// stored in `ctx.settings`; returning an error puts the old one back.
    fn on_setting_update(&mut self, _setting_id: &str, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Rebuilds the shaders of this plugin's stages.
    fn reload_shaders(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        ctx.stages.reload_stages_of(ctx.plugin_id).map(|_| ())
    }

    /// Creates an environment probe. Only the probe plugin returns one.
    fn create_environment_probe(&mut self) -> Option<Box<dyn EnvironmentProbe>> {
        None
    }
}
