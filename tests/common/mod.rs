//! Shared fixtures for the integration tests.
//!
//! Headless collaborators share their state through `Rc`, so the fixture
//! keeps a handle to each one and inspects it after handing clones to the
//! pipeline.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use dusk::backend::Host;
use dusk::backend::headless::{
    HeadlessCompiler, HeadlessLights, HeadlessScene, HeadlessWindow, MemoryVfs,
};
use dusk::plugins::{Hook, HookSet, Plugin, PluginContext};
use dusk::stages::ShaderStage;
use dusk::{PipelineBuilder, PipelineSettings, RenderPipeline, Result};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Fixture {
    pub vfs: MemoryVfs,
    pub compiler: HeadlessCompiler,
    pub scene: HeadlessScene,
    pub window: HeadlessWindow,
    pub lights: HeadlessLights,
}

impl Fixture {
    pub fn new(width: u32, height: u32) -> Self {
        init_logger();
        let vfs = MemoryVfs::new();
        vfs.insert("effects/default.yaml", "");
        Self {
            vfs,
            compiler: HeadlessCompiler::new(),
            scene: HeadlessScene::new(),
            window: HeadlessWindow::new(width, height),
            lights: HeadlessLights::new(),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            vfs: Rc::new(self.vfs.clone()),
            compiler: Box::new(self.compiler.clone()),
            scene: Box::new(self.scene.clone()),
            window: Box::new(self.window.clone()),
            lights: Box::new(self.lights.clone()),
        }
    }

    pub fn add_plugin(&self, id: &str, descriptor: &str) {
        self.vfs.insert(&format!("plugins/{id}/config.yaml"), descriptor);
    }

    /// Creates a pipeline with a [`Recorder`] registered for every id in
    /// `settings.plugins`.
    pub fn create(&self, settings: PipelineSettings, log: &CallLog) -> Result<RenderPipeline> {
        let mut builder = PipelineBuilder::new(settings.clone());
        for id in &settings.plugins {
            let (id, log) = (id.clone(), log.clone());
            let plugin_id = id.clone();
            builder.register_plugin(&id, move || Recorder::new(&plugin_id, HookSet::all(), &log));
        }
        builder.create(self.host())
    }
}

pub fn settings_with_plugins(plugins: &[&str]) -> PipelineSettings {
    PipelineSettings {
        plugins: plugins.iter().map(ToString::to_string).collect(),
        ..PipelineSettings::default()
    }
}

// ============================================================================
// Recording plugin
// ============================================================================

pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Logs every hook as `"{id}:{hook}"`. On `stage_setup` it adds one stage
/// named `{id}Stage` that reads the shaded scene.
pub struct Recorder {
    id: String,
    hooks: HookSet,
    log: CallLog,
    callbacks: Vec<String>,
}

impl Recorder {
    pub fn new(id: &str, hooks: HookSet, log: &CallLog) -> Self {
        Self {
            id: id.to_string(),
            hooks,
            log: log.clone(),
            callbacks: Vec::new(),
        }
    }

    pub fn with_callback(mut self, setting: &str) -> Self {
        self.callbacks.push(setting.to_string());
        self
    }
}

impl Plugin for Recorder {
    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn on_hook(&mut self, hook: Hook, ctx: &mut PluginContext<'_>) -> Result<()> {
        self.log.borrow_mut().push(format!("{}:{}", self.id, hook));
        if hook == Hook::StageSetup {
            let stage = ShaderStage::new(&format!("{}Stage", self.id))
                .requires("ShadedScene")
                .with_fragment(&self.id);
            ctx.add_stage(Box::new(stage))?;
        }
        Ok(())
    }

    fn has_setting_callback(&self, setting_id: &str) -> bool {
        self.callbacks.iter().any(|s| s == setting_id)
    }

    fn on_setting_update(&mut self, setting_id: &str, ctx: &mut PluginContext<'_>) -> Result<()> {
        let value = ctx
            .setting(setting_id)
            .map(ToString::to_string)
            .unwrap_or_default();
        self.log
            .borrow_mut()
            .push(format!("{}:update_{setting_id}={value}", self.id));
        Ok(())
    }
}
