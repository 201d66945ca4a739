//! Time of Day
//!
//! Owns the current time of day and publishes every day setting, evaluated
//! at that time, through the `TimeOfDay` input block. Each member is named
//! `{plugin}_{setting}`.

use crate::errors::{PipelineError, Result};
use crate::resources::GroupedInputBlock;
use crate::settings::day_setting::wrap_time_of_day;
use crate::stages::StageManager;

use super::registry::PluginRegistry;

/// Name of the input block holding evaluated day settings.
pub const TIME_OF_DAY_BLOCK: &str = "TimeOfDay";

#[derive(Debug, Clone)]
pub struct DayTimeManager {
    time: f32,
}

impl DayTimeManager {
    #[must_use]
    pub fn new(time: f32) -> Self {
        let mut manager = Self { time: 0.0 };
        manager.set_time(time);
        manager
    }

    /// Current time of day in `[0, 1)`; `0.5` is noon.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Sets the time of day, wrapping values outside `[0, 1)`.
    ///
    /// Non-finite times are ignored.
    pub fn set_time(&mut self, time: f32) {
        if time.is_finite() {
            self.time = wrap_time_of_day(time);
        }
    }

    /// The time formatted as `HH:MM`.
    #[must_use]
    pub fn formatted_time(&self) -> String {
        let minutes = (self.time * 24.0 * 60.0).round() as u32 % (24 * 60);
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }

    /// Registers the `TimeOfDay` block with one member per day setting.
    pub fn load_settings(&self, registry: &PluginRegistry, stages: &mut StageManager) -> Result<()> {
        let mut block = GroupedInputBlock::new(TIME_OF_DAY_BLOCK);
        for (plugin_id, setting_id, setting) in registry.day_settings() {
            block.register_pta(&format!("{plugin_id}_{setting_id}"), setting.kind().pta_type())?;
        }
        log::debug!("Registered {} daytime inputs", block.len());
        stages.register_input_block(block)?;
        self.update(registry, stages)
    }

    /// Evaluates every day setting at the current time.
    pub fn update(&self, registry: &PluginRegistry, stages: &mut StageManager) -> Result<()> {
        let block = stages.input_block_mut(TIME_OF_DAY_BLOCK).ok_or_else(|| {
            PipelineError::InvalidState("daytime settings were not loaded".into())
        })?;
        for (plugin_id, setting_id, setting) in registry.day_settings() {
            let value = setting.evaluate(self.time).map_err(|e| {
                PipelineError::config(format!("daytime setting '{plugin_id}.{setting_id}': {e}"))
            })?;
            block.update_input(&format!("{plugin_id}_{setting_id}"), value)?;
        }
        Ok(())
    }
}

impl Default for DayTimeManager {
    fn default() -> Self {
        Self::new(0.5)
    }
}
