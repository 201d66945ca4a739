//! Stage Manager
//!
//! Owns the ordered stage list, the shader compiler and the define surface.
//!
//! # Define layers
//!
//! | Layer             | Written by                                  |
//! |-------------------|---------------------------------------------|
//! | `defines`         | the pipeline (camera, light culling, flags) |
//! | `plugin_defines`  | the plugin registry, regenerated wholesale  |
//! | stage defines     | each stage's `add_defines`                  |
//!
//! [`StageManager::effective_defines`] merges them in that order; every
//! compiled program sees the result plus its own program defines.
//!
//! # Reloading
//!
//! A reload compiles every program of every affected stage first and binds
//! only when all of them compiled. A failure reports the stage and program
//! and leaves the previously bound shaders in place.

use std::collections::BTreeMap;

use crate::backend::{NodeId, ShaderCompiler, ShaderHandle, ShaderProgram, Vfs};
use crate::errors::{PipelineError, Result};
use crate::pipeline::RenderSession;
use crate::resources::{GroupedInputBlock, PtaValue, ShaderDefines};

use super::autoconfig::{self, DEFAULT_CONFIG_PATH};
use super::stage::RenderStage;

/// A global shader input visible to every stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderInput {
    Value(PtaValue),
    Node(NodeId),
}

struct StageEntry {
    owner: Option<String>,
    stage: Box<dyn RenderStage>,
    bound: Vec<(String, ShaderHandle)>,
}

pub struct StageManager {
    compiler: Box<dyn ShaderCompiler>,
    stages: Vec<StageEntry>,
    defines: ShaderDefines,
    plugin_defines: ShaderDefines,
    inputs: BTreeMap<String, ShaderInput>,
    input_blocks: Vec<GroupedInputBlock>,
    config_path: String,
    config: String,
    created: bool,
}

impl StageManager {
    #[must_use]
    pub fn new(compiler: Box<dyn ShaderCompiler>) -> Self {
        Self {
            compiler,
            stages: Vec::new(),
            defines: ShaderDefines::new(),
            plugin_defines: ShaderDefines::new(),
            inputs: BTreeMap::new(),
            input_blocks: Vec::new(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            config: String::new(),
            created: false,
        }
    }

    #[must_use]
    pub fn with_config_path(mut self, path: &str) -> Self {
        self.config_path = path.to_string();
        self
    }

    // ========================================================================
    // Stages
    // ========================================================================

    /// Adds a pipeline-owned stage. Only allowed before [`setup`](Self::setup).
    pub fn add_stage(&mut self, stage: Box<dyn RenderStage>) -> Result<()> {
        self.push_stage(None, stage)
    }

    /// Adds a stage owned by a plugin, so the plugin can reload it alone.
    pub fn add_stage_owned(&mut self, owner: &str, stage: Box<dyn RenderStage>) -> Result<()> {
        self.push_stage(Some(owner.to_string()), stage)
    }

    fn push_stage(&mut self, owner: Option<String>, stage: Box<dyn RenderStage>) -> Result<()> {
        if self.created {
            return Err(PipelineError::config(format!(
                "cannot add stage '{}' after the pipeline was set up",
                stage.name()
            )));
        }
        if self.stage(stage.name()).is_some() {
            return Err(PipelineError::config(format!(
                "stage '{}' was added twice",
                stage.name()
            )));
        }
        log::debug!("Adding stage {}", stage.name());
        self.stages.push(StageEntry {
            owner,
            stage,
            bound: Vec::new(),
        });
        Ok(())
    }

    /// Stage names in insertion order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|e| e.stage.name())
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&dyn RenderStage> {
        self.stages
            .iter()
            .find(|e| e.stage.name() == name)
            .map(|e| e.stage.as_ref())
    }

    #[must_use]
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.stages
            .iter()
            .find(|e| e.stage.name() == name)
            .and_then(|e| e.owner.as_deref())
    }

    /// Programs bound to `stage` by the last successful reload.
    #[must_use]
    pub fn bound_shaders(&self, stage: &str) -> Option<&[(String, ShaderHandle)]> {
        self.stages
            .iter()
            .find(|e| e.stage.name() == stage)
            .map(|e| e.bound.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.created
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    pub fn set_input(&mut self, name: &str, input: ShaderInput) {
        self.inputs.insert(name.to_string(), input);
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<ShaderInput> {
        self.inputs.get(name).copied()
    }

    /// Adds a grouped input block. Block names are unique.
    pub fn register_input_block(&mut self, block: GroupedInputBlock) -> Result<()> {
        if self.input_block(block.name()).is_some() {
            return Err(PipelineError::config(format!(
                "input block '{}' is already registered",
                block.name()
            )));
        }
        self.input_blocks.push(block);
        Ok(())
    }

    #[must_use]
    pub fn input_block(&self, name: &str) -> Option<&GroupedInputBlock> {
        self.input_blocks.iter().find(|b| b.name() == name)
    }

    pub fn input_block_mut(&mut self, name: &str) -> Option<&mut GroupedInputBlock> {
        self.input_blocks.iter_mut().find(|b| b.name() == name)
    }

    #[must_use]
    pub fn input_blocks(&self) -> &[GroupedInputBlock] {
        &self.input_blocks
    }

    // ========================================================================
    // Defines
    // ========================================================================

    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    pub fn defines_mut(&mut self) -> &mut ShaderDefines {
        &mut self.defines
    }

    #[must_use]
    pub fn plugin_defines(&self) -> &ShaderDefines {
        &self.plugin_defines
    }

    pub fn plugin_defines_mut(&mut self) -> &mut ShaderDefines {
        &mut self.plugin_defines
    }

    /// Pipeline, plugin and stage defines merged in that order.
    #[must_use]
    pub fn effective_defines(&self) -> ShaderDefines {
        let mut defines = self.defines.merged_with(&self.plugin_defines);
        for entry in &self.stages {
            entry.stage.add_defines(&mut defines);
        }
        defines
    }

    /// The shader configuration artifact as last written.
    #[must_use]
    pub fn config(&self) -> &str {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    /// Regenerates the shader configuration artifact and writes it to `vfs`.
    pub fn write_autoconfig(&mut self, vfs: &dyn Vfs) -> Result<()> {
        let text = autoconfig::render_autoconfig(&self.effective_defines(), &self.input_blocks)?;
        vfs.write(&self.config_path, &text)?;
        log::debug!("Wrote shader configuration to {}", self.config_path);
        self.config = text;
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Creates every stage in insertion order.
    ///
    /// Each required pipe must be produced by an earlier stage or exist as a
    /// global input or input block. Nothing is created if a pipe is missing.
    pub fn setup(&mut self, session: &RenderSession) -> Result<()> {
        if self.created {
            return Err(PipelineError::InvalidState(
                "stages were already set up".into(),
            ));
        }

        let mut available: Vec<String> = self
            .inputs
            .keys()
            .cloned()
            .chain(self.input_blocks.iter().map(|b| b.name().to_string()))
            .collect();
        for entry in &self.stages {
            for pipe in entry.stage.required_pipes() {
                if !available.contains(&pipe) {
                    return Err(PipelineError::config(format!(
                        "stage '{}' requires pipe '{pipe}', which no earlier stage produces",
                        entry.stage.name()
                    )));
                }
            }
            available.extend(entry.stage.produced_pipes());
        }

        for entry in &mut self.stages {
            entry.stage.create(session)?;
        }
        self.created = true;
        log::info!("Set up {} stages", self.stages.len());
        Ok(())
    }

    /// Compiles one program against the current configuration.
    pub fn compile(&mut self, program: &ShaderProgram) -> std::result::Result<ShaderHandle, String> {
        let mut program = program.clone();
        program.defines = self.effective_defines().merged_with(&program.defines);
        self.compiler.compile(&program, &self.config)
    }

    /// Recompiles and rebinds the programs of every stage.
    pub fn reload_shaders(&mut self) -> Result<()> {
        let count = self.reload_where(|_| true)?;
        log::info!("Reloaded shaders of {count} stages");
        Ok(())
    }

    /// Recompiles and rebinds only the stages owned by `owner`.
    pub fn reload_stages_of(&mut self, owner: &str) -> Result<usize> {
        let count = self.reload_where(|e| e.owner.as_deref() == Some(owner))?;
        log::info!("Reloaded {count} stages of plugin '{owner}'");
        Ok(count)
    }

    fn reload_where(&mut self, filter: impl Fn(&StageEntry) -> bool) -> Result<usize> {
        if !self.created {
            return Err(PipelineError::InvalidState(
                "shaders cannot be reloaded before setup".into(),
            ));
        }

        let defines = self.effective_defines();
        let mut compiled = Vec::new();
        for (idx, entry) in self.stages.iter().enumerate() {
            if !filter(entry) {
                continue;
            }
            let mut handles = Vec::new();
            for program in entry.stage.shader_programs() {
                let mut program = program;
                program.defines = defines.merged_with(&program.defines);
                let handle = self.compiler.compile(&program, &self.config).map_err(|message| {
                    PipelineError::ShaderCompile {
                        stage: entry.stage.name().to_string(),
                        program: program.name.clone(),
                        message,
                    }
                })?;
                handles.push((program.name, handle));
            }
            compiled.push((idx, handles));
        }

        let count = compiled.len();
        for (idx, handles) in compiled {
            let entry = &mut self.stages[idx];
            entry.stage.bind_shaders(&handles);
            entry.bound = handles;
        }
        Ok(count)
    }

    pub fn handle_window_resize(&mut self, session: &RenderSession) {
        for entry in &mut self.stages {
            entry.stage.handle_window_resize(session);
        }
    }

    pub fn update(&mut self, session: &RenderSession) {
        for entry in &mut self.stages {
            entry.stage.update(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::backend::headless::{HeadlessCompiler, MemoryVfs};
    use crate::pipeline::LightGrid;
    use crate::stages::ShaderStage;

    fn session() -> RenderSession {
        RenderSession::new(UVec2::new(800, 600), 1.0, LightGrid::new(UVec2::new(24, 16), 32))
    }

    fn stage(name: &str, fragment: &str) -> Box<ShaderStage> {
        Box::new(
            ShaderStage::new(name).with_program(
                ShaderProgram::new(fragment).with_fragment(&format!("shader/{fragment}.frag.glsl")),
            ),
        )
    }

    #[test]
    fn test_add_after_setup_fails() {
        let mut manager = StageManager::new(Box::new(HeadlessCompiler::new()));
        manager.add_stage(stage("A", "a")).unwrap();
        manager.setup(&session()).unwrap();

        let err = manager.add_stage(stage("B", "b")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_missing_pipe_fails_setup() {
        let mut manager = StageManager::new(Box::new(HeadlessCompiler::new()));
        manager
            .add_stage(Box::new(ShaderStage::new("Blur").requires("ShadedScene")))
            .unwrap();
        manager
            .add_stage(Box::new(ShaderStage::new("Lights").produces("ShadedScene")))
            .unwrap();

        assert!(manager.setup(&session()).unwrap_err().is_config_error());
        assert!(!manager.is_created());
    }

    #[test]
    fn test_reload_is_all_or_nothing() {
        let compiler = HeadlessCompiler::new();
        let mut manager = StageManager::new(Box::new(compiler.clone()));
        manager.add_stage(stage("A", "a")).unwrap();
        manager.add_stage(stage("B", "b")).unwrap();
        manager.setup(&session()).unwrap();
        manager.reload_shaders().unwrap();
        let bound_a = manager.bound_shaders("A").unwrap().to_vec();

        compiler.fail_on("shader/b.frag.glsl");
        let err = manager.reload_shaders().unwrap_err();
        match err {
            PipelineError::ShaderCompile { stage, program, .. } => {
                assert_eq!(stage, "B");
                assert_eq!(program, "b");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(manager.bound_shaders("A").unwrap(), &bound_a[..]);
    }

    #[test]
    fn test_reload_owned_stages_only() {
        let compiler = HeadlessCompiler::new();
        let mut manager = StageManager::new(Box::new(compiler.clone()));
        manager.add_stage(stage("Core", "core")).unwrap();
        manager.add_stage_owned("bloom", stage("BloomStage", "bloom")).unwrap();
        manager.setup(&session()).unwrap();

        assert_eq!(manager.reload_stages_of("bloom").unwrap(), 1);
        assert_eq!(compiler.compiled_names(), vec!["bloom".to_string()]);
        assert_eq!(manager.owner_of("BloomStage"), Some("bloom"));
    }

    #[test]
    fn test_programs_see_effective_defines() {
        let mut manager = StageManager::new(Box::new(HeadlessCompiler::new()));
        manager.defines_mut().set("CAMERA_FAR", "1000.0");
        manager.plugin_defines_mut().set("HAVE_PLUGIN_ao", "1");
        manager
            .add_stage(Box::new(ShaderStage::new("S").with_define("S_TILE", "8")))
            .unwrap();

        let defines = manager.effective_defines();
        assert_eq!(defines.get("CAMERA_FAR").as_deref(), Some("1000.0"));
        assert_eq!(defines.get("HAVE_PLUGIN_ao").as_deref(), Some("1"));
        assert_eq!(defines.get("S_TILE").as_deref(), Some("8"));
    }

    #[test]
    fn test_write_autoconfig() {
        let vfs = MemoryVfs::new();
        let mut manager = StageManager::new(Box::new(HeadlessCompiler::new()));
        manager.plugin_defines_mut().set("HAVE_PLUGIN_ao", "1");
        manager.write_autoconfig(&vfs).unwrap();

        let written = vfs.contents(DEFAULT_CONFIG_PATH).unwrap();
        assert!(written.contains("#define HAVE_PLUGIN_ao 1"));
        assert_eq!(manager.config(), written);
    }
}
