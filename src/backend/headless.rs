//! Headless Collaborators
//!
//! In-memory implementations of the [`backend`](super) traits. Every type is
//! a cheap handle around shared state (`Rc<RefCell<..>>`): clone it before
//! handing it to the pipeline and keep the clone to inspect what the
//! pipeline did.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::UVec2;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    CameraState, IesProfileHandle, LightHandle, LightSystem, NodeId, SceneGraph, ShaderCompiler,
    ShaderHandle, ShaderProgram, Vfs, WindowSystem,
};
use crate::effects::{CameraMask, RenderPass};
use crate::errors::Result;
use crate::resources::ShaderDefines;

// ============================================================================
// File systems
// ============================================================================

/// A file system held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    files: Rc<RefCell<FxHashMap<String, String>>>,
}

impl MemoryVfs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, contents: &str) {
        self.files
            .borrow_mut()
            .insert(path.to_string(), contents.to_string());
    }

    #[must_use]
    pub fn contents(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }
}

impl Vfs for MemoryVfs {
    fn read_to_string(&self, path: &str) -> Result<String> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file")).into()
        })
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        self.insert(path, contents);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }
}

/// A file system rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskVfs {
    root: PathBuf,
}

impl DiskVfs {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Vfs for DiskVfs {
    fn read_to_string(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.resolve(path))?)
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, contents)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

// ============================================================================
// Shader compiler
// ============================================================================

#[derive(Debug, Default)]
struct CompilerState {
    next_handle: u64,
    compiled: Vec<(String, ShaderHandle)>,
    failing: FxHashSet<String>,
    last_config: String,
}

/// Hands out a fresh handle per compiled program. Programs can be made to
/// fail by name or by template path.
#[derive(Debug, Clone, Default)]
pub struct HeadlessCompiler {
    state: Rc<RefCell<CompilerState>>,
}

impl HeadlessCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every program named `key`, or using the template `key`, fail.
    pub fn fail_on(&self, key: &str) {
        self.state.borrow_mut().failing.insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failing.clear();
    }

    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.state.borrow().compiled.len()
    }

    /// Names of all programs compiled so far, in order.
    #[must_use]
    pub fn compiled_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .compiled
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    #[must_use]
    pub fn last_config(&self) -> String {
        self.state.borrow().last_config.clone()
    }
}

impl ShaderCompiler for HeadlessCompiler {
    fn compile(
        &mut self,
        program: &ShaderProgram,
        config: &str,
    ) -> std::result::Result<ShaderHandle, String> {
        let mut state = self.state.borrow_mut();
        state.last_config = config.to_string();

        let failing = state.failing.contains(&program.name)
            || program.sources().any(|s| state.failing.contains(s));
        if failing {
            return Err(format!("{}: syntax error", program.name));
        }

        state.next_handle += 1;
        let handle = ShaderHandle(state.next_handle);
        state.compiled.push((program.name.clone(), handle));
        Ok(handle)
    }
}

// ============================================================================
// Scene graph
// ============================================================================

/// Shader and visibility state of one headless node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    pub hidden: CameraMask,
    pub shown: CameraMask,
    pub shader: Option<(ShaderHandle, i32)>,
    pub tags: BTreeMap<String, String>,
}

impl NodeState {
    /// Whether the node is traversed by the camera of `pass`.
    #[must_use]
    pub fn is_visible_in(&self, pass: RenderPass) -> bool {
        self.shown.contains(pass.mask()) || !self.hidden.intersects(pass.mask())
    }
}

#[derive(Debug)]
struct SceneState {
    nodes: FxHashMap<NodeId, NodeState>,
    next_id: u64,
    root: NodeId,
    camera_node: NodeId,
    camera: CameraState,
    tag_states: FxHashMap<(RenderPass, String), (ShaderHandle, i32)>,
    cache_clears: u32,
}

/// A flat scene graph that records every state change.
#[derive(Debug, Clone)]
pub struct HeadlessScene {
    state: Rc<RefCell<SceneState>>,
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessScene {
    #[must_use]
    pub fn new() -> Self {
        let root = NodeId(0);
        let camera_node = NodeId(1);
        let mut nodes = FxHashMap::default();
        nodes.insert(root, NodeState::default());
        nodes.insert(camera_node, NodeState::default());
        Self {
            state: Rc::new(RefCell::new(SceneState {
                nodes,
                next_id: 2,
                root,
                camera_node,
                camera: CameraState::default(),
                tag_states: FxHashMap::default(),
                cache_clears: 0,
            })),
        }
    }

    pub fn create_node(&self) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId(state.next_id);
        state.next_id += 1;
        state.nodes.insert(id, NodeState::default());
        id
    }

    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<NodeState> {
        self.state.borrow().nodes.get(&node).cloned()
    }

    pub fn set_camera(&self, camera: CameraState) {
        self.state.borrow_mut().camera = camera;
    }

    #[must_use]
    pub fn tag_state(&self, pass: RenderPass, tag: &str) -> Option<(ShaderHandle, i32)> {
        self.state
            .borrow()
            .tag_states
            .get(&(pass, tag.to_string()))
            .copied()
    }

    #[must_use]
    pub fn tag_state_count(&self) -> usize {
        self.state.borrow().tag_states.len()
    }

    #[must_use]
    pub fn cache_clear_count(&self) -> u32 {
        self.state.borrow().cache_clears
    }

    fn with_node(&self, node: NodeId, f: impl FnOnce(&mut NodeState)) {
        let mut state = self.state.borrow_mut();
        f(state.nodes.entry(node).or_default());
    }
}

impl SceneGraph for HeadlessScene {
    fn root(&self) -> NodeId {
        self.state.borrow().root
    }

    fn camera_node(&self) -> NodeId {
        self.state.borrow().camera_node
    }

    fn main_camera(&self) -> CameraState {
        self.state.borrow().camera
    }

    fn hide(&mut self, node: NodeId, mask: CameraMask) {
        self.with_node(node, |n| {
            n.hidden |= mask;
            n.shown -= mask;
        });
    }

    fn show_through(&mut self, node: NodeId, mask: CameraMask) {
        self.with_node(node, |n| {
            n.shown |= mask;
            n.hidden -= mask;
        });
    }

    fn set_shader(&mut self, node: NodeId, shader: ShaderHandle, priority: i32) {
        self.with_node(node, |n| n.shader = Some((shader, priority)));
    }

    fn set_tag(&mut self, node: NodeId, key: &str, value: &str) {
        self.with_node(node, |n| {
            n.tags.insert(key.to_string(), value.to_string());
        });
    }

    fn set_tag_state(&mut self, pass: RenderPass, tag: &str, shader: ShaderHandle, sort: i32) {
        self.state
            .borrow_mut()
            .tag_states
            .insert((pass, tag.to_string()), (shader, sort));
    }

    fn clear_tag_states(&mut self, pass: RenderPass) {
        self.state
            .borrow_mut()
            .tag_states
            .retain(|(p, _), _| *p != pass);
    }

    fn clear_state_caches(&mut self) {
        self.state.borrow_mut().cache_clears += 1;
    }
}

// ============================================================================
// Window
// ============================================================================

#[derive(Debug)]
struct WindowState {
    size: UVec2,
    requests: Vec<UVec2>,
    driver: String,
}

/// A window whose size is set by the test. Size requests apply immediately.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    state: Rc<RefCell<WindowState>>,
}

impl HeadlessWindow {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(WindowState {
                size: UVec2::new(width, height),
                requests: Vec::new(),
                driver: "headless".to_string(),
            })),
        }
    }

    /// Simulates the user resizing the window.
    pub fn resize(&self, width: u32, height: u32) {
        self.state.borrow_mut().size = UVec2::new(width, height);
    }

    pub fn set_driver_version(&self, driver: &str) {
        self.state.borrow_mut().driver = driver.to_string();
    }

    /// Sizes requested by the pipeline, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<UVec2> {
        self.state.borrow().requests.clone()
    }
}

impl WindowSystem for HeadlessWindow {
    fn size(&self) -> UVec2 {
        self.state.borrow().size
    }

    fn request_size(&mut self, size: UVec2) {
        let mut state = self.state.borrow_mut();
        state.requests.push(size);
        state.size = size;
    }

    fn driver_version(&self) -> String {
        self.state.borrow().driver.clone()
    }
}

// ============================================================================
// Lights
// ============================================================================

#[derive(Debug, Default)]
struct LightState {
    lights: Vec<LightHandle>,
    ies_profiles: Vec<String>,
    updates: u64,
    reloads: u32,
    shadows_initialized: bool,
}

/// Keeps a list of lights and counts the calls made by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLights {
    state: Rc<RefCell<LightState>>,
}

impl HeadlessLights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lights(&self) -> Vec<LightHandle> {
        self.state.borrow().lights.clone()
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.state.borrow().updates
    }

    #[must_use]
    pub fn reload_count(&self) -> u32 {
        self.state.borrow().reloads
    }

    #[must_use]
    pub fn shadows_initialized(&self) -> bool {
        self.state.borrow().shadows_initialized
    }
}

impl LightSystem for HeadlessLights {
    fn add_light(&mut self, light: LightHandle) {
        self.state.borrow_mut().lights.push(light);
    }

    fn remove_light(&mut self, light: LightHandle) {
        self.state.borrow_mut().lights.retain(|l| *l != light);
    }

    fn load_ies_profile(&mut self, path: &str) -> std::result::Result<IesProfileHandle, String> {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.ies_profiles.iter().position(|p| p == path) {
            return Ok(IesProfileHandle(idx as u32));
        }
        state.ies_profiles.push(path.to_string());
        Ok(IesProfileHandle((state.ies_profiles.len() - 1) as u32))
    }

    fn init_defines(&self, defines: &mut ShaderDefines) {
        defines.set_display("MAX_IES_PROFILES", 64);
    }

    fn reload_shaders(&mut self) {
        self.state.borrow_mut().reloads += 1;
    }

    fn init_shadows(&mut self) {
        self.state.borrow_mut().shadows_initialized = true;
    }

    fn update(&mut self) {
        self.state.borrow_mut().updates += 1;
    }
}
