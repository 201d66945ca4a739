//! Render Pipeline
//!
//! [`RenderPipeline`] is the central coordinator. It owns the stage graph,
//! the plugin registry, the effect dispatcher and the shared frame inputs,
//! and it drives them from the host's collaborators.
//!
//! # Lifecycle
//!
//! ```text
//! PipelineBuilder ──create──▶ Created ──update──▶ Running ⇄ Resizing
//!                                  │                  │
//!                                  └────shutdown──────┴──▶ TornDown
//! ```
//!
//! # Frame order
//!
//! Every [`update`](RenderPipeline::update) runs, in this order:
//!
//! 1. task scheduler, time of day and light system
//! 2. the `pre_render_update` hook
//! 3. the `post_render_update` hook
//! 4. the `MainSceneData` block, then every stage
//!
//! followed by the periodic render-state cache clearing.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut pipeline = PipelineBuilder::new(settings)
//!     .with_plugin("ao", AmbientOcclusion::default)
//!     .create(host)?;
//!
//! loop {
//!     pipeline.handle_window_event()?;
//!     pipeline.update(dt)?;
//! }
//! ```

use std::rc::Rc;

use glam::UVec2;

use super::session::{LightGrid, RenderSession, floor_to_multiple_of_4};
use super::settings::PipelineSettings;
use crate::backend::{
    Host, IesProfileHandle, LightHandle, LightSystem, NodeId, SceneGraph, ShaderProgram, Vfs,
    WindowSystem,
};
use crate::effects::{CompiledEffect, DispatchTarget, EffectDispatcher, EffectOptions, TagStateManager};
use crate::errors::{PipelineError, Result, ValidationError};
use crate::plugins::{
    DayTimeManager, ENV_PROBE_PLUGIN, EnvironmentProbe, Hook, NullEnvironmentProbe, Plugin,
    PluginFactory, PluginRegistry, Propagation,
};
use crate::resources::{FrameInputs, ShaderDefines};
use crate::settings::SettingValue;
use crate::stages::{RenderStage, StageManager, core_stages, final_stage};
use crate::utils::{FrameClock, TaskScheduler, interner};

/// Drivers that reject non-const array initializers.
const CONST_ARRAY_DRIVERS: [&str; 1] = ["NVIDIA 361.43"];

/// Lifecycle state of a created pipeline. The builder is the uninitialized
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Set up, no frame rendered yet.
    Created,
    Running,
    /// Inside [`RenderPipeline::handle_window_event`].
    Resizing,
    TornDown,
}

// ============================================================================
// Builder
// ============================================================================

/// Collects plugin constructors and extra stages before creation.
pub struct PipelineBuilder {
    settings: PipelineSettings,
    factory: PluginFactory,
    stages: Vec<Box<dyn RenderStage>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            factory: PluginFactory::new(),
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Makes the plugin `id` loadable. Only ids listed in the settings are
    /// actually loaded.
    pub fn register_plugin<F, P>(&mut self, id: &str, constructor: F)
    where
        F: Fn() -> P + 'static,
        P: Plugin + 'static,
    {
        self.factory.register(id, constructor);
    }

    #[must_use]
    pub fn with_plugin<F, P>(mut self, id: &str, constructor: F) -> Self
    where
        F: Fn() -> P + 'static,
        P: Plugin + 'static,
    {
        self.register_plugin(id, constructor);
        self
    }

    /// Adds a pipeline-owned stage, created after the core stages and before
    /// plugin stages.
    #[must_use]
    pub fn with_stage(mut self, stage: impl RenderStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Creates the pipeline: loads plugins, sets up every stage, compiles all
    /// shaders and applies the default effect.
    pub fn create(self, host: Host) -> Result<RenderPipeline> {
        let Self {
            settings,
            factory,
            stages: extra_stages,
        } = self;
        settings.validate()?;
        interner::preload_pipeline_defines();

        let Host {
            vfs,
            compiler,
            scene,
            window,
            lights,
        } = host;

        let native = window.size();
        let lc = &settings.light_culling;
        let grid = LightGrid::new(UVec2::new(lc.grid_size_x, lc.grid_size_y), lc.slices);
        let mut session = RenderSession::new(native, settings.resolution_scale, grid);
        session
            .clock
            .set_average_frame_rate_interval(FrameClock::DEFAULT_AVERAGE_INTERVAL);
        log::info!(
            "Creating pipeline at {}x{} (render {}x{})",
            native.x,
            native.y,
            session.resolution.x,
            session.resolution.y
        );

        let mut stages = StageManager::new(compiler).with_config_path(&settings.shader_config_path);
        for stage in core_stages() {
            stages.add_stage(Box::new(stage))?;
        }
        for stage in extra_stages {
            stages.add_stage(stage)?;
        }

        let mut registry = PluginRegistry::new(&settings.plugin_dir, &settings.daytime_config);
        registry.set_requires_daytime_settings(settings.requires_daytime_settings);

        let mut pipeline = RenderPipeline {
            scheduler: TaskScheduler::new(settings.task_schedule.clone()),
            daytime: DayTimeManager::new(settings.time_of_day),
            frame_inputs: FrameInputs::new(&settings.scene_data_path),
            tags: TagStateManager::new(),
            effects: EffectDispatcher::new(),
            last_window_dims: native,
            next_cache_clear: settings.state_cache.first_clear,
            state: PipelineState::Created,
            settings,
            session,
            stages,
            registry,
            vfs,
            scene,
            window,
            lights,
        };
        pipeline.initialize(&factory)?;
        Ok(pipeline)
    }
}

// ============================================================================
// RenderPipeline
// ============================================================================

pub struct RenderPipeline {
    settings: PipelineSettings,
    session: RenderSession,
    state: PipelineState,

    stages: StageManager,
    registry: PluginRegistry,
    tags: TagStateManager,
    effects: EffectDispatcher,
    daytime: DayTimeManager,
    scheduler: TaskScheduler,
    frame_inputs: FrameInputs,

    vfs: Rc<dyn Vfs>,
    scene: Box<dyn SceneGraph>,
    window: Box<dyn WindowSystem>,
    lights: Box<dyn LightSystem>,

    last_window_dims: UVec2,
    next_cache_clear: f32,
}

impl RenderPipeline {
    fn initialize(&mut self, factory: &PluginFactory) -> Result<()> {
        self.registry.load(&self.settings.plugins, factory, &*self.vfs)?;

        self.trigger(Hook::StageSetup)?;
        self.trigger(Hook::PostStageSetup)?;
        self.stages.add_stage(Box::new(final_stage()))?;

        if self.settings.requires_daytime_settings {
            self.daytime.load_settings(&self.registry, &mut self.stages)?;
        }

        self.frame_inputs.setup(&mut self.stages, &*self.scene)?;
        self.frame_inputs.write_config(&self.stages, &*self.vfs)?;

        self.init_defines();
        self.stages.setup(&self.session)?;
        self.stages.write_autoconfig(&*self.vfs)?;
        self.stages.reload_shaders()?;

        self.lights.reload_shaders();
        self.lights.init_shadows();

        self.trigger(Hook::PipelineCreated)?;

        if let Some(default) = self.settings.default_effect.clone() {
            let root = self.scene.root();
            self.set_effect(root, &default.source, &EffectOptions::new(), default.sort)?;
        }
        log::info!(
            "Pipeline created with {} plugins and {} stages",
            self.registry.len(),
            self.stages.stage_names().count()
        );
        Ok(())
    }

    fn trigger(&mut self, hook: Hook) -> Result<usize> {
        self.registry.trigger(hook, &mut self.stages, &self.session)
    }

    fn ensure_alive(&self, operation: &str) -> Result<()> {
        if self.state == PipelineState::TornDown {
            return Err(PipelineError::InvalidState(format!(
                "cannot {operation} after shutdown"
            )));
        }
        Ok(())
    }

    /// Regenerates the pipeline, light and plugin define sets.
    fn init_defines(&mut self) {
        let camera = self.scene.main_camera();
        let driver = self.window.driver_version();

        let defines = self.stages.defines_mut();
        defines.clear();
        write_pipeline_defines(defines, &self.settings, camera.near, camera.far, &driver);
        self.lights.init_defines(self.stages.defines_mut());
        self.registry.init_defines(self.stages.plugin_defines_mut());
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    #[must_use]
    pub fn stages(&self) -> &StageManager {
        &self.stages
    }

    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    #[must_use]
    pub fn tags(&self) -> &TagStateManager {
        &self.tags
    }

    #[must_use]
    pub fn effects(&self) -> &EffectDispatcher {
        &self.effects
    }

    #[must_use]
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn frame_inputs(&self) -> &FrameInputs {
        &self.frame_inputs
    }

    #[must_use]
    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.registry.is_plugin_enabled(id)
    }

    #[must_use]
    pub fn time_of_day(&self) -> f32 {
        self.daytime.time()
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Advances the pipeline by one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        self.ensure_alive("update")?;
        self.state = PipelineState::Running;
        self.session.clock.tick(dt);

        self.scheduler.step();
        if self.settings.requires_daytime_settings {
            self.daytime.update(&self.registry, &mut self.stages)?;
        }
        self.lights.update();

        self.trigger(Hook::PreRenderUpdate)?;
        self.trigger(Hook::PostRenderUpdate)?;

        let camera = self.scene.main_camera();
        self.frame_inputs
            .update(&mut self.stages, &self.session, &camera)?;
        self.stages.update(&self.session);

        if self.session.clock.frame_time >= self.next_cache_clear {
            log::trace!("Clearing render state caches");
            self.scene.clear_state_caches();
            self.next_cache_clear = self.session.clock.frame_time + self.settings.state_cache.interval;
        }
        Ok(())
    }

    /// Checks the window for a new size and reconfigures for it.
    ///
    /// Sizes that are not a multiple of 4 are floored and the corrected size
    /// is requested from the window. Returns whether a resize happened.
    pub fn handle_window_event(&mut self) -> Result<bool> {
        self.ensure_alive("handle window events")?;
        let window_dims = self.window.size();
        if window_dims == self.last_window_dims || window_dims == self.session.native_resolution {
            return Ok(false);
        }

        let previous = self.state;
        self.state = PipelineState::Resizing;
        self.last_window_dims = window_dims;

        let corrected = floor_to_multiple_of_4(window_dims);
        if corrected != window_dims {
            log::info!(
                "Correcting non-multiple of 4 window size {}x{} to {}x{}",
                window_dims.x,
                window_dims.y,
                corrected.x,
                corrected.y
            );
            self.window.request_size(corrected);
        }

        self.session.native_resolution = corrected;
        self.session.compute_render_resolution();
        self.session.light_grid.compute_tile_size(self.session.resolution);
        self.stages.handle_window_resize(&self.session);
        let result = self.trigger(Hook::WindowResized);

        self.state = previous;
        log::info!(
            "Resized to {}x{} (render {}x{})",
            corrected.x,
            corrected.y,
            self.session.resolution.x,
            self.session.resolution.y
        );
        result.map(|_| true)
    }

    // ========================================================================
    // Shaders & effects
    // ========================================================================

    /// Recompiles every shader and re-applies every recorded effect.
    ///
    /// Defines are regenerated and the shader configuration is rewritten
    /// first. If a stage fails to compile, the previously bound shaders and
    /// tag states stay in place.
    pub fn reload_shaders(&mut self) -> Result<()> {
        self.ensure_alive("reload shaders")?;
        log::info!("Reloading shaders");

        self.init_defines();
        self.stages.write_autoconfig(&*self.vfs)?;
        self.stages.reload_shaders()?;

        self.tags.cleanup_states(&mut *self.scene);
        self.lights.reload_shaders();
        self.trigger(Hook::ShaderReload)?;

        self.effects.evict();
        log::info!("Re-applying {} custom shaders", self.effects.applied().len());
        let (vfs, effects) = (&*self.vfs, &mut self.effects);
        with_dispatch_target(vfs, &mut *self.scene, &mut self.tags, &mut self.stages, |target| {
            effects.replay(target)
        });
        Ok(())
    }

    /// Applies the effect at `source` to `node` and its subtree.
    ///
    /// On error `node` keeps its previous state and nothing is recorded for
    /// replay.
    pub fn set_effect(
        &mut self,
        node: NodeId,
        source: &str,
        options: &EffectOptions,
        sort: i32,
    ) -> Result<Rc<CompiledEffect>> {
        self.ensure_alive("set effects")?;
        let (vfs, effects) = (&*self.vfs, &mut self.effects);
        with_dispatch_target(vfs, &mut *self.scene, &mut self.tags, &mut self.stages, |target| {
            effects.apply(target, node, source, options, sort)
        })
    }

    // ========================================================================
    // Lights & probes
    // ========================================================================

    pub fn add_light(&mut self, light: LightHandle) {
        self.lights.add_light(light);
    }

    pub fn remove_light(&mut self, light: LightHandle) {
        self.lights.remove_light(light);
    }

    pub fn load_ies_profile(&mut self, path: &str) -> Result<IesProfileHandle> {
        self.lights
            .load_ies_profile(path)
            .map_err(|e| PipelineError::config(format!("cannot load IES profile '{path}': {e}")))
    }

    /// Creates an environment probe. Without the probe plugin the returned
    /// probe accepts every call and has no effect.
    pub fn add_environment_probe(&mut self) -> Box<dyn EnvironmentProbe> {
        if !self.registry.is_plugin_enabled(ENV_PROBE_PLUGIN) {
            log::warn!("{ENV_PROBE_PLUGIN} plugin is not loaded - cannot add environment probe");
            return Box::new(NullEnvironmentProbe);
        }
        self.registry.create_environment_probe().unwrap_or_else(|| {
            log::warn!("{ENV_PROBE_PLUGIN} plugin did not create a probe");
            Box::new(NullEnvironmentProbe)
        })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Applies a runtime setting change. See [`PluginRegistry::on_setting_changed`].
    pub fn on_setting_changed(
        &mut self,
        plugin_id: &str,
        setting_id: &str,
        value: impl Into<SettingValue>,
    ) -> Result<Propagation> {
        self.ensure_alive("change settings")?;
        self.registry.on_setting_changed(
            plugin_id,
            setting_id,
            value,
            &mut self.stages,
            &self.session,
            &*self.vfs,
        )
    }

    /// Sets the time of day and re-evaluates every day setting.
    ///
    /// NaN and infinite times are rejected and the current time is kept.
    pub fn set_time_of_day(&mut self, time: f32) -> Result<()> {
        self.ensure_alive("set the time of day")?;
        if !time.is_finite() {
            return Err(ValidationError::NotFinite(time).into());
        }
        self.daytime.set_time(time);
        if self.settings.requires_daytime_settings {
            self.daytime.update(&self.registry, &mut self.stages)?;
        }
        Ok(())
    }

    /// Removes every tag state from the scene. Further frame, effect and
    /// reload calls fail.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::TornDown {
            return;
        }
        self.tags.cleanup_states(&mut *self.scene);
        self.state = PipelineState::TornDown;
        log::info!("Pipeline shut down");
    }
}

fn with_dispatch_target<R>(
    vfs: &dyn Vfs,
    scene: &mut dyn SceneGraph,
    tags: &mut TagStateManager,
    stages: &mut StageManager,
    f: impl FnOnce(&mut DispatchTarget<'_>) -> R,
) -> R {
    let mut compile = |program: &ShaderProgram| stages.compile(program);
    let mut target = DispatchTarget {
        vfs,
        scene,
        tags,
        compile: &mut compile,
    };
    f(&mut target)
}

/// Writes the defines every shader sees regardless of plugins.
fn write_pipeline_defines(
    defines: &mut ShaderDefines,
    settings: &PipelineSettings,
    near: f32,
    far: f32,
    driver: &str,
) {
    defines.set("CAMERA_NEAR", &format!("{near:?}"));
    defines.set("CAMERA_FAR", &format!("{far:?}"));

    let const_array = CONST_ARRAY_DRIVERS.iter().any(|d| driver.contains(d));
    defines.set("CONST_ARRAY", if const_array { "const" } else { "" });

    defines.set_flag("REFERENCE_MODE", settings.reference_mode);
    defines.set_flag("USE_R11G11B10", settings.use_r11_g11_b10);

    let lc = &settings.light_culling;
    defines.set_display("LC_TILE_SLICES", lc.slices);
    defines.set("LC_MAX_DISTANCE", &format!("{:?}", lc.max_distance));
    defines.set_display("LC_SLICE_WIDTH", lc.slice_width);
    defines.set_display("LC_MAX_LIGHTS_PER_CELL", lc.max_lights_per_cell);

    let shadows = &settings.shadows;
    defines.set_display("SHADOW_ATLAS_SIZE", shadows.atlas_size);
    defines.set_display("SHADOW_MAX_UPDATES", shadows.max_updates);
    defines.set(
        "SHADOW_MAX_UPDATE_DISTANCE",
        &format!("{:?}", shadows.max_update_distance),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defines() {
        let mut defines = ShaderDefines::new();
        write_pipeline_defines(
            &mut defines,
            &PipelineSettings::default(),
            0.1,
            1000.0,
            "4.5.0 NVIDIA 361.43",
        );

        assert_eq!(defines.get("CAMERA_NEAR").as_deref(), Some("0.1"));
        assert_eq!(defines.get("CAMERA_FAR").as_deref(), Some("1000.0"));
        assert_eq!(defines.get("CONST_ARRAY").as_deref(), Some("const"));
        assert_eq!(defines.get("REFERENCE_MODE").as_deref(), Some("0"));
        assert_eq!(defines.get("LC_TILE_SLICES").as_deref(), Some("32"));
        assert_eq!(defines.get("SHADOW_ATLAS_SIZE").as_deref(), Some("4096"));
    }

    #[test]
    fn test_const_array_is_empty_for_other_drivers() {
        let mut defines = ShaderDefines::new();
        write_pipeline_defines(&mut defines, &PipelineSettings::default(), 0.1, 100.0, "Mesa 23.1");

        assert_eq!(defines.get("CONST_ARRAY").as_deref(), Some(""));
    }
}
