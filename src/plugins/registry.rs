//! Plugin Registry
//!
//! Loads plugins with their settings, dispatches lifecycle hooks and turns
//! setting changes into the cheapest sufficient reaction.
//!
//! # Setting change propagation
//!
//! | Setting facets                         | Reaction                                  |
//! |----------------------------------------|-------------------------------------------|
//! | static                                 | value stored ([`Propagation::ValueOnly`]) |
//! | `runtime`, plugin has a callback       | value stored, plugin callback runs        |
//! | `shader_runtime`                       | defines regenerated, configuration rewritten, plugin stages reloaded |

use rustc_hash::FxHashMap;

use super::factory::PluginFactory;
use super::hooks::Hook;
use super::plugin::{Plugin, PluginContext};
use super::probe::EnvironmentProbe;
use crate::backend::Vfs;
use crate::errors::{PipelineError, Result};
use crate::pipeline::RenderSession;
use crate::resources::ShaderDefines;
use crate::settings::{
    DaySetting, DayTimeOverrides, PluginDescriptor, PluginInfo, Setting, SettingMap, SettingValue,
};
use crate::stages::StageManager;

/// Id of the plugin that provides environment probes.
pub const ENV_PROBE_PLUGIN: &str = "env_probes";

/// How far a setting change propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Unknown plugin or setting; nothing happened.
    Ignored,
    ValueOnly,
    InstanceCallback,
    ShaderReload,
}

/// One loaded plugin.
pub struct PluginEntry {
    pub id: String,
    pub info: PluginInfo,
    pub instance: Box<dyn Plugin>,
    pub settings: SettingMap<Setting>,
    pub day_settings: SettingMap<DaySetting>,
}

pub struct PluginRegistry {
    plugins: Vec<PluginEntry>,
    index: FxHashMap<String, usize>,
    plugin_dir: String,
    daytime_config: String,
    requires_daytime_settings: bool,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new("plugins", "config/daytime.yaml")
    }
}

impl PluginRegistry {
    #[must_use]
    pub fn new(plugin_dir: &str, daytime_config: &str) -> Self {
        Self {
            plugins: Vec::new(),
            index: FxHashMap::default(),
            plugin_dir: plugin_dir.trim_end_matches('/').to_string(),
            daytime_config: daytime_config.to_string(),
            requires_daytime_settings: true,
        }
    }

    /// Whether day settings and the global control-point document are loaded.
    pub fn set_requires_daytime_settings(&mut self, required: bool) {
        self.requires_daytime_settings = required;
    }

    #[must_use]
    pub fn descriptor_path(&self, id: &str) -> String {
        format!("{}/{id}/config.yaml", self.plugin_dir)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Instantiates and configures every plugin in `ids`, in order.
    ///
    /// The registry is only modified when every plugin loaded.
    pub fn load(&mut self, ids: &[String], factory: &PluginFactory, vfs: &dyn Vfs) -> Result<()> {
        let mut staged: Vec<PluginEntry> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.index.contains_key(id) || staged.iter().any(|e| &e.id == id) {
                return Err(PipelineError::config(format!("plugin '{id}' is listed twice")));
            }
            let instance = factory.create(id).ok_or_else(|| PipelineError::PluginLoad {
                plugin: id.clone(),
                reason: "no implementation is registered under this id".into(),
            })?;
            staged.push(PluginEntry {
                id: id.clone(),
                info: PluginInfo::default(),
                instance,
                settings: SettingMap::new(),
                day_settings: SettingMap::new(),
            });
        }

        for entry in &mut staged {
            let path = self.descriptor_path(&entry.id);
            let source = vfs.read_to_string(&path).map_err(|e| PipelineError::PluginLoad {
                plugin: entry.id.clone(),
                reason: format!("cannot read {path}: {e}"),
            })?;
            let descriptor = PluginDescriptor::from_yaml(&source)
                .map_err(|e| PipelineError::config(format!("plugin '{}': {e}", entry.id)))?;
            entry.info = descriptor.info;
            entry.settings = descriptor.settings;
            if self.requires_daytime_settings {
                entry.day_settings = descriptor.day_settings;
            }
        }

        if self.requires_daytime_settings {
            self.apply_daytime_overrides(&mut staged, ids, vfs)?;
        }

        for entry in staged {
            log::info!(
                "Loaded plugin '{}' ({} settings, {} daytime settings)",
                entry.id,
                entry.settings.len(),
                entry.day_settings.len()
            );
            self.index.insert(entry.id.clone(), self.plugins.len());
            self.plugins.push(entry);
        }
        Ok(())
    }

    fn apply_daytime_overrides(
        &self,
        staged: &mut [PluginEntry],
        ids: &[String],
        vfs: &dyn Vfs,
    ) -> Result<()> {
        if !vfs.exists(&self.daytime_config) {
            log::debug!("No daytime overrides at {}", self.daytime_config);
            return Ok(());
        }
        let overrides = DayTimeOverrides::from_yaml(&vfs.read_to_string(&self.daytime_config)?)?;

        for (plugin, settings) in &overrides.control_points {
            if !ids.contains(plugin) {
                log::debug!("Skipping daytime overrides of inactive plugin '{plugin}'");
                continue;
            }
            let Some(entry) = staged.iter_mut().find(|e| &e.id == plugin) else {
                continue;
            };
            for (setting_id, points) in settings {
                let setting = entry.day_settings.get_mut(setting_id).ok_or_else(|| {
                    PipelineError::config(format!(
                        "daytime override for unknown setting '{plugin}.{setting_id}'"
                    ))
                })?;
                setting.load_control_points(points).map_err(|e| {
                    PipelineError::config(format!("daytime override '{plugin}.{setting_id}': {e}"))
                })?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Plugin ids in registration order.
    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|e| e.id.as_str())
    }

    #[must_use]
    pub fn plugin(&self, id: &str) -> Option<&PluginEntry> {
        self.index.get(id).map(|&i| &self.plugins[i])
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn get_setting_handle(&self, plugin_id: &str, setting_id: &str) -> Result<&Setting> {
        self.plugin(plugin_id)
            .and_then(|e| e.settings.get(setting_id))
            .ok_or_else(|| PipelineError::NotFound {
                plugin: plugin_id.to_string(),
                setting: setting_id.to_string(),
            })
    }

    pub fn day_setting(&self, plugin_id: &str, setting_id: &str) -> Result<&DaySetting> {
        self.plugin(plugin_id)
            .and_then(|e| e.day_settings.get(setting_id))
            .ok_or_else(|| PipelineError::NotFound {
                plugin: plugin_id.to_string(),
                setting: setting_id.to_string(),
            })
    }

    /// Every day setting as `(plugin_id, setting_id, setting)`, in load order.
    pub fn day_settings(&self) -> impl Iterator<Item = (&str, &str, &DaySetting)> {
        self.plugins.iter().flat_map(|e| {
            e.day_settings
                .iter()
                .map(move |(id, setting)| (e.id.as_str(), id, setting))
        })
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Dispatches the hook named `name`. Unknown names reach no plugin.
    ///
    /// Returns the number of plugins called.
    pub fn trigger_hook(
        &mut self,
        name: &str,
        stages: &mut StageManager,
        session: &RenderSession,
    ) -> Result<usize> {
        match Hook::from_name(name) {
            Some(hook) => self.trigger(hook, stages, session),
            None => {
                log::trace!("No plugin hook is named '{name}'");
                Ok(0)
            }
        }
    }

    /// Calls `hook` on every plugin listening to it, in registration order.
    pub fn trigger(
        &mut self,
        hook: Hook,
        stages: &mut StageManager,
        session: &RenderSession,
    ) -> Result<usize> {
        let mut called = 0;
        for entry in &mut self.plugins {
            if !entry.instance.hooks().contains(hook.flag()) {
                continue;
            }
            let mut ctx = PluginContext {
                plugin_id: &entry.id,
                settings: &entry.settings,
                day_settings: &entry.day_settings,
                stages: &mut *stages,
                session,
            };
            entry
                .instance
                .on_hook(hook, &mut ctx)
                .map_err(|e| PipelineError::Hook {
                    plugin: entry.id.clone(),
                    hook: hook.name(),
                    source: Box::new(e),
                })?;
            called += 1;
        }
        Ok(called)
    }

    // ========================================================================
    // Defines & settings
    // ========================================================================

    /// Regenerates the plugin define set from scratch.
    pub fn init_defines(&self, defines: &mut ShaderDefines) {
        defines.clear();
        for entry in &self.plugins {
            defines.set(&format!("HAVE_PLUGIN_{}", entry.id), "1");
            for (setting_id, setting) in entry.settings.iter() {
                if setting.exports_define() {
                    setting.add_defines(&entry.id, setting_id, defines);
                }
            }
        }
    }

    /// Applies a runtime setting change.
    ///
    /// Unknown plugins and settings are logged and ignored. A rejected value
    /// returns the validation error and keeps the previous value, as does a
    /// failing update callback. A failing shader reload keeps the new value.
    pub fn on_setting_changed(
        &mut self,
        plugin_id: &str,
        setting_id: &str,
        value: impl Into<SettingValue>,
        stages: &mut StageManager,
        session: &RenderSession,
        vfs: &dyn Vfs,
    ) -> Result<Propagation> {
        let Some(&idx) = self.index.get(plugin_id) else {
            log::warn!("Got invalid setting change: {plugin_id}/{setting_id}");
            return Ok(Propagation::Ignored);
        };
        let Some(setting) = self.plugins[idx].settings.get_mut(setting_id) else {
            log::warn!("Got invalid setting change: {plugin_id}/{setting_id}");
            return Ok(Propagation::Ignored);
        };

        let previous = setting.value().clone();
        let needs_reload = setting.set_value(value)?;
        let runtime = setting.runtime();
        log::info!("Setting {plugin_id}.{setting_id} = {}", setting.value());

        let mut propagation = Propagation::ValueOnly;
        let entry = &mut self.plugins[idx];
        if runtime && entry.instance.has_setting_callback(setting_id) {
            let mut ctx = PluginContext {
                plugin_id: &entry.id,
                settings: &entry.settings,
                day_settings: &entry.day_settings,
                stages: &mut *stages,
                session,
            };
            if let Err(e) = entry.instance.on_setting_update(setting_id, &mut ctx) {
                if let Some(setting) = entry.settings.get_mut(setting_id) {
                    setting.restore(previous);
                }
                log::warn!("Update of {plugin_id}.{setting_id} failed, value restored");
                return Err(e);
            }
            propagation = Propagation::InstanceCallback;
        }

        if needs_reload {
            self.init_defines(stages.plugin_defines_mut());
            stages.write_autoconfig(vfs)?;
            let entry = &mut self.plugins[idx];
            let mut ctx = PluginContext {
                plugin_id: &entry.id,
                settings: &entry.settings,
                day_settings: &entry.day_settings,
                stages: &mut *stages,
                session,
            };
            entry.instance.reload_shaders(&mut ctx)?;
            propagation = Propagation::ShaderReload;
        }
        Ok(propagation)
    }

    /// Asks the probe plugin for a new probe. `None` when it is not loaded.
    pub fn create_environment_probe(&mut self) -> Option<Box<dyn EnvironmentProbe>> {
        let &idx = self.index.get(ENV_PROBE_PLUGIN)?;
        self.plugins[idx].instance.create_environment_probe()
    }
}
