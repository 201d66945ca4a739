//! External Collaborators
//!
//! The pipeline core sequences work but does not own a graphics device, a
//! scene graph, a window or a file system. This module defines the narrow
//! interfaces it needs from each of them:
//!
//! | Trait              | Provides                                              |
//! |--------------------|-------------------------------------------------------|
//! | [`Vfs`]            | Reading descriptors/effects, writing the shader config |
//! | [`ShaderCompiler`] | Compiling a [`ShaderProgram`] into a bindable handle  |
//! | [`SceneGraph`]     | Per-node shaders, visibility masks, tag states, camera |
//! | [`WindowSystem`]   | Window size and size requests                         |
//! | [`LightSystem`]    | Light bookkeeping, IES profiles, shadow setup         |
//!
//! [`headless`] contains in-memory implementations used by tests and tools.

pub mod headless;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use glam::{Mat4, UVec2, Vec2, Vec3};

use crate::effects::{CameraMask, RenderPass};
use crate::errors::Result;
use crate::resources::ShaderDefines;

// ============================================================================
// Handles
// ============================================================================

/// Identifies a node of the host scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A compiled shader program owned by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// A light registered with the light system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightHandle(pub u64);

/// A loaded IES light profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IesProfileHandle(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// ============================================================================
// Shader programs
// ============================================================================

/// Description of a shader program to compile.
///
/// Sources are template paths resolved by the compiler; `injections` fill
/// named insertion points of the templates and `defines` are prepended after
/// the generated shader configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderProgram {
    pub name: String,
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub compute: Option<String>,
    pub injections: BTreeMap<String, String>,
    pub defines: ShaderDefines,
}

impl ShaderProgram {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_vertex(mut self, path: &str) -> Self {
        self.vertex = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn with_fragment(mut self, path: &str) -> Self {
        self.fragment = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn with_compute(mut self, path: &str) -> Self {
        self.compute = Some(path.to_string());
        self
    }

    /// Template paths referenced by the program, in vertex/fragment/compute order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        [&self.vertex, &self.fragment, &self.compute]
            .into_iter()
            .filter_map(|s| s.as_deref())
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Main camera data read once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform, including any sub-pixel jitter.
    pub projection: Mat4,
    /// World-space camera position.
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    /// Sub-pixel film offset (jitter) in clip units.
    pub film_offset: Vec2,
}

impl Default for CameraState {
    fn default() -> Self {
        let near = 0.1;
        let far = 1000.0;
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(60_f32.to_radians(), 16.0 / 9.0, near, far),
            position: Vec3::ZERO,
            near,
            far,
            film_offset: Vec2::ZERO,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Virtual file system the pipeline reads its descriptors from and writes
/// its generated shader configuration to.
pub trait Vfs {
    fn read_to_string(&self, path: &str) -> Result<String>;

    fn write(&self, path: &str, contents: &str) -> Result<()>;

    fn exists(&self, path: &str) -> bool;
}

/// Shader compilation front of the graphics device.
pub trait ShaderCompiler {
    /// Compiles `program`. `config` is the current shader configuration
    /// artifact, which every program includes.
    fn compile(
        &mut self,
        program: &ShaderProgram,
        config: &str,
    ) -> std::result::Result<ShaderHandle, String>;
}

/// The host scene graph, as far as shader binding and visibility go.
pub trait SceneGraph {
    fn root(&self) -> NodeId;

    fn camera_node(&self) -> NodeId;

    fn main_camera(&self) -> CameraState;

    /// Excludes `node` (and its subtree) from the passes in `mask`.
    fn hide(&mut self, node: NodeId, mask: CameraMask);

    /// Includes `node` in the passes in `mask`, overriding hidden parents.
    fn show_through(&mut self, node: NodeId, mask: CameraMask);

    fn set_shader(&mut self, node: NodeId, shader: ShaderHandle, priority: i32);

    fn set_tag(&mut self, node: NodeId, key: &str, value: &str);

    /// Makes the camera of `pass` render nodes tagged `tag` with `shader`.
    fn set_tag_state(&mut self, pass: RenderPass, tag: &str, shader: ShaderHandle, sort: i32);

    fn clear_tag_states(&mut self, pass: RenderPass);

    /// Drops render/transform states cached by the scene graph.
    fn clear_state_caches(&mut self);
}

/// The window the pipeline renders into.
pub trait WindowSystem {
    fn size(&self) -> UVec2;

    /// Asks the window system to resize; may take effect later.
    fn request_size(&mut self, size: UVec2);

    fn driver_version(&self) -> String {
        String::new()
    }
}

/// Light management and shadow scheduling.
pub trait LightSystem {
    fn add_light(&mut self, light: LightHandle);

    fn remove_light(&mut self, light: LightHandle);

    fn load_ies_profile(&mut self, path: &str) -> std::result::Result<IesProfileHandle, String>;

    fn init_defines(&self, _defines: &mut ShaderDefines) {}

    fn reload_shaders(&mut self) {}

    fn init_shadows(&mut self) {}

    fn update(&mut self) {}
}

/// Every collaborator the pipeline needs, handed over at creation.
pub struct Host {
    pub vfs: Rc<dyn Vfs>,
    pub compiler: Box<dyn ShaderCompiler>,
    pub scene: Box<dyn SceneGraph>,
    pub window: Box<dyn WindowSystem>,
    pub lights: Box<dyn LightSystem>,
}
