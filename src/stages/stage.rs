//! Render Stages
//!
//! A stage is one named unit of rendering work. It declares the pipes
//! (named render targets and buffers) it consumes and produces, the shader
//! programs it needs, and the defines it contributes to every shader.
//!
//! The [`StageManager`](super::StageManager) drives stages through their
//! lifecycle:
//!
//! | Call                    | When                                        |
//! |-------------------------|---------------------------------------------|
//! | `create`                | once, during setup, in insertion order      |
//! | `shader_programs`       | on every shader reload (compile phase)      |
//! | `bind_shaders`          | on every successful reload (bind phase)     |
//! | `handle_window_resize`  | after the render resolution changed         |
//! | `update`                | every frame                                 |

use std::collections::BTreeMap;

use glam::UVec2;
use rustc_hash::FxHashMap;

use crate::backend::{ShaderHandle, ShaderProgram};
use crate::errors::Result;
use crate::pipeline::RenderSession;
use crate::resources::{PtaValue, ShaderDefines};

/// A unit of rendering work managed by the stage graph.
pub trait RenderStage {
    fn name(&self) -> &str;

    /// Pipes that must exist before this stage is created.
    fn required_pipes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Pipes this stage makes available to later stages.
    fn produced_pipes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Allocates the stage's resources.
    fn create(&mut self, _session: &RenderSession) -> Result<()> {
        Ok(())
    }

    /// Programs to compile on reload.
    fn shader_programs(&self) -> Vec<ShaderProgram> {
        Vec::new()
    }

    /// Receives the programs compiled from [`shader_programs`](Self::shader_programs),
    /// keyed by program name.
    fn bind_shaders(&mut self, _shaders: &[(String, ShaderHandle)]) {}

    fn add_defines(&self, _defines: &mut ShaderDefines) {}

    fn handle_window_resize(&mut self, _session: &RenderSession) {}

    fn update(&mut self, _session: &RenderSession) {}
}

/// A stage described entirely by data: programs, pipes, defines and inputs.
///
/// Core stages and most plugin stages need nothing more.
#[derive(Debug, Clone, Default)]
pub struct ShaderStage {
    name: String,
    programs: Vec<ShaderProgram>,
    required: Vec<String>,
    produced: Vec<String>,
    defines: ShaderDefines,
    inputs: BTreeMap<String, PtaValue>,
    bound: FxHashMap<String, ShaderHandle>,
    resolution: UVec2,
    created: bool,
    resize_count: u32,
    update_count: u64,
}

impl ShaderStage {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: ShaderProgram) -> Self {
        self.programs.push(program);
        self
    }

    /// Adds a fullscreen fragment program at `shader/stages/<name>.frag.glsl`.
    #[must_use]
    pub fn with_fragment(self, program: &str) -> Self {
        let path = format!("shader/stages/{program}.frag.glsl");
        self.with_program(
            ShaderProgram::new(program)
                .with_vertex("shader/default_post_process.vert.glsl")
                .with_fragment(&path),
        )
    }

    #[must_use]
    pub fn requires(mut self, pipe: &str) -> Self {
        self.required.push(pipe.to_string());
        self
    }

    #[must_use]
    pub fn produces(mut self, pipe: &str) -> Self {
        self.produced.push(pipe.to_string());
        self
    }

    #[must_use]
    pub fn with_define(mut self, name: &str, value: &str) -> Self {
        self.defines.set(name, value);
        self
    }

    pub fn set_input(&mut self, name: &str, value: impl Into<PtaValue>) {
        self.inputs.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<PtaValue> {
        self.inputs.get(name).copied()
    }

    #[must_use]
    pub fn bound_shader(&self, program: &str) -> Option<ShaderHandle> {
        self.bound.get(program).copied()
    }

    #[must_use]
    pub fn is_created(&self) -> bool {
        self.created
    }

    #[must_use]
    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    #[must_use]
    pub fn resize_count(&self) -> u32 {
        self.resize_count
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }
}

impl RenderStage for ShaderStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_pipes(&self) -> Vec<String> {
        self.required.clone()
    }

    fn produced_pipes(&self) -> Vec<String> {
        self.produced.clone()
    }

    fn create(&mut self, session: &RenderSession) -> Result<()> {
        self.resolution = session.resolution;
        self.created = true;
        Ok(())
    }

    fn shader_programs(&self) -> Vec<ShaderProgram> {
        self.programs.clone()
    }

    fn bind_shaders(&mut self, shaders: &[(String, ShaderHandle)]) {
        self.bound = shaders.iter().cloned().collect();
    }

    fn add_defines(&self, defines: &mut ShaderDefines) {
        defines.merge(&self.defines);
    }

    fn handle_window_resize(&mut self, session: &RenderSession) {
        self.resolution = session.resolution;
        self.resize_count += 1;
    }

    fn update(&mut self, session: &RenderSession) {
        self.set_input("frame_index", session.clock.frame_count as i32);
        self.update_count += 1;
    }
}

/// Stages every pipeline has, independent of plugins. The final stage is
/// created by [`final_stage`] and added after plugin stages.
#[must_use]
pub fn core_stages() -> Vec<ShaderStage> {
    vec![
        ShaderStage::new("GBufferStage")
            .produces("GBuffer")
            .with_program(
                ShaderProgram::new("gbuffer_resolve")
                    .with_vertex("shader/default_post_process.vert.glsl")
                    .with_fragment("shader/stages/gbuffer_resolve.frag.glsl"),
            ),
        ShaderStage::new("DownscaleZStage")
            .requires("GBuffer")
            .produces("DownscaledDepth")
            .with_fragment("downscale_depth"),
        ShaderStage::new("CombineVelocityStage")
            .requires("GBuffer")
            .produces("CombinedVelocity")
            .with_fragment("combine_velocity"),
        ShaderStage::new("ApplyLightsStage")
            .requires("GBuffer")
            .produces("ShadedScene")
            .with_fragment("apply_lights"),
        ShaderStage::new("AmbientStage")
            .requires("GBuffer")
            .requires("ShadedScene")
            .produces("ShadedScene")
            .with_fragment("ambient_stage"),
    ]
}

#[must_use]
pub fn final_stage() -> ShaderStage {
    ShaderStage::new("FinalStage")
        .requires("ShadedScene")
        .produces("FinalImage")
        .with_fragment("final_stage")
}
