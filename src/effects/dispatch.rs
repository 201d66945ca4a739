//! Effect Dispatch
//!
//! Turns effect applications into per-pass scene state and keeps a log of
//! them. A full shader reload invalidates every compiled shader, so the log
//! is replayed afterwards in application order.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::effect::{Effect, EffectOptions, ResolvedOptions};
use super::pass::RenderPass;
use super::tag_state::TagStateManager;
use crate::backend::{NodeId, SceneGraph, ShaderHandle, ShaderProgram, Vfs};
use crate::errors::{PipelineError, Result};

/// Priority of the directly bound gbuffer shader.
pub const GBUFFER_SHADER_PRIORITY: i32 = 25;

/// Sort of the tag state of `pass` for an effect applied with `sort`.
#[inline]
#[must_use]
pub const fn pass_sort(pass: RenderPass, sort: i32) -> i32 {
    25 + 10 * pass.index() + sort
}

/// One recorded effect application.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEffect {
    pub node: NodeId,
    pub source: String,
    pub options: EffectOptions,
    pub sort: i32,
}

/// An effect together with the compiled shader of every enabled pass.
#[derive(Debug)]
pub struct CompiledEffect {
    pub effect: Effect,
    pub shaders: [Option<ShaderHandle>; 5],
}

impl CompiledEffect {
    #[inline]
    #[must_use]
    pub fn shader(&self, pass: RenderPass) -> Option<ShaderHandle> {
        self.shaders[pass as usize]
    }
}

/// Collaborators an effect application writes to.
pub struct DispatchTarget<'a> {
    pub vfs: &'a dyn Vfs,
    pub scene: &'a mut dyn SceneGraph,
    pub tags: &'a mut TagStateManager,
    pub compile: &'a mut dyn FnMut(&ShaderProgram) -> std::result::Result<ShaderHandle, String>,
}

#[derive(Debug, Default)]
pub struct EffectDispatcher {
    cache: FxHashMap<(String, ResolvedOptions), Rc<CompiledEffect>>,
    applied: Vec<AppliedEffect>,
    /// Previous application per node, kept until its replacement replays.
    superseded: FxHashMap<NodeId, AppliedEffect>,
}

impl EffectDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the effect at `source` to `node` and records the application.
    ///
    /// On error the node is left as it was and nothing is recorded.
    pub fn apply(
        &mut self,
        target: &mut DispatchTarget<'_>,
        node: NodeId,
        source: &str,
        options: &EffectOptions,
        sort: i32,
    ) -> Result<Rc<CompiledEffect>> {
        let compiled = self.apply_unrecorded(target, node, source, options, sort)?;

        // Each application fully determines the node's pass state, so only
        // the latest one per node needs replaying.
        if let Some(pos) = self.applied.iter().position(|a| a.node == node) {
            let previous = self.applied.remove(pos);
            self.superseded.insert(node, previous);
        }
        self.applied.push(AppliedEffect {
            node,
            source: source.to_string(),
            options: options.clone(),
            sort,
        });
        Ok(compiled)
    }

    /// Re-applies every recorded application in order. Returns the number
    /// restored.
    ///
    /// When the latest application of a node fails, the application it
    /// replaced is tried instead and takes its place in the log once it
    /// succeeds. If neither can be restored the failure is logged and the
    /// record is kept for the next reload.
    pub fn replay(&mut self, target: &mut DispatchTarget<'_>) -> usize {
        let mut records = std::mem::take(&mut self.applied);
        let mut restored = 0;
        for record in &mut records {
            match self.reapply(target, record) {
                Ok(()) => {
                    self.superseded.remove(&record.node);
                    restored += 1;
                }
                Err(e) => {
                    log::error!(
                        "Could not restore effect '{}' on {}: {e}",
                        record.source,
                        record.node
                    );
                    let Some(previous) = self.superseded.remove(&record.node) else {
                        continue;
                    };
                    match self.reapply(target, &previous) {
                        Ok(()) => {
                            log::warn!(
                                "Restored earlier effect '{}' on {} instead",
                                previous.source,
                                previous.node
                            );
                            *record = previous;
                            restored += 1;
                        }
                        Err(_) => {
                            self.superseded.insert(record.node, previous);
                        }
                    }
                }
            }
        }
        self.applied = records;
        log::debug!("Replayed {restored}/{} effect applications", self.applied.len());
        restored
    }

    /// Drops every cached effect. Called when compiled shaders become invalid.
    pub fn evict(&mut self) {
        self.cache.clear();
    }

    /// Recorded applications, in replay order.
    #[must_use]
    pub fn applied(&self) -> &[AppliedEffect] {
        &self.applied
    }

    #[inline]
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn reapply(&mut self, target: &mut DispatchTarget<'_>, record: &AppliedEffect) -> Result<()> {
        self.apply_unrecorded(target, record.node, &record.source, &record.options, record.sort)
            .map(|_| ())
    }

    fn apply_unrecorded(
        &mut self,
        target: &mut DispatchTarget<'_>,
        node: NodeId,
        source: &str,
        options: &EffectOptions,
        sort: i32,
    ) -> Result<Rc<CompiledEffect>> {
        let compiled = self.resolve(target, source, options)?;
        let tag = compiled.effect.tag();

        for pass in RenderPass::ALL {
            let mask = target.tags.get_mask(pass);
            let Some(shader) = compiled.shader(pass) else {
                target.scene.hide(node, mask);
                continue;
            };
            if pass == RenderPass::GBuffer {
                target
                    .scene
                    .set_shader(node, shader, GBUFFER_SHADER_PRIORITY);
            } else {
                target.tags.apply_state(
                    &mut *target.scene,
                    pass,
                    node,
                    shader,
                    &tag,
                    pass_sort(pass, sort),
                );
            }
            target.scene.show_through(node, mask);
        }
        Ok(compiled)
    }

    fn resolve(
        &mut self,
        target: &mut DispatchTarget<'_>,
        source: &str,
        options: &EffectOptions,
    ) -> Result<Rc<CompiledEffect>> {
        let resolved = options.resolve().map_err(|name| PipelineError::Effect {
            source_path: source.to_string(),
            reason: format!("unknown option '{name}'"),
        })?;
        let key = (source.to_string(), resolved);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Rc::clone(hit));
        }

        let effect = Effect::load(target.vfs, source, options)?;
        let mut shaders = [None; 5];
        for pass in RenderPass::ALL {
            if let Some(program) = effect.program(pass) {
                let handle = (target.compile)(program).map_err(|message| {
                    PipelineError::ShaderCompile {
                        stage: source.to_string(),
                        program: program.name.clone(),
                        message,
                    }
                })?;
                shaders[pass as usize] = Some(handle);
            }
        }

        log::debug!("Loaded effect '{source}' as {}", effect.tag());
        let compiled = Rc::new(CompiledEffect { effect, shaders });
        self.cache.insert(key, Rc::clone(&compiled));
        Ok(compiled)
    }
}
