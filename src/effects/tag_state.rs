//! Tag States
//!
//! Pass cameras other than the gbuffer camera select shaders through tag
//! states: a node carries a `<pass>_effect` tag, and the pass camera maps
//! tag values to `(shader, sort)`. The manager mirrors every tag state it
//! pushes to the scene so it can drop them all before a shader reload.

use rustc_hash::FxHashMap;

use super::pass::{CameraMask, RenderPass};
use crate::backend::{NodeId, SceneGraph, ShaderHandle};

#[derive(Debug, Default)]
pub struct TagStateManager {
    states: FxHashMap<(RenderPass, String), (ShaderHandle, i32)>,
}

impl TagStateManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags `node` with `tag` for `pass` and registers the tag state on the
    /// pass camera.
    pub fn apply_state(
        &mut self,
        scene: &mut dyn SceneGraph,
        pass: RenderPass,
        node: NodeId,
        shader: ShaderHandle,
        tag: &str,
        sort: i32,
    ) {
        scene.set_tag(node, pass.tag_key(), tag);
        scene.set_tag_state(pass, tag, shader, sort);
        self.states.insert((pass, tag.to_string()), (shader, sort));
    }

    /// Removes every registered tag state from the scene.
    pub fn cleanup_states(&mut self, scene: &mut dyn SceneGraph) {
        log::debug!("Clearing {} tag states", self.states.len());
        for pass in RenderPass::ALL {
            scene.clear_tag_states(pass);
        }
        self.states.clear();
    }

    /// Camera mask of the pass.
    #[inline]
    #[must_use]
    pub fn get_mask(&self, pass: RenderPass) -> CameraMask {
        pass.mask()
    }

    #[must_use]
    pub fn state(&self, pass: RenderPass, tag: &str) -> Option<(ShaderHandle, i32)> {
        self.states.get(&(pass, tag.to_string())).copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
