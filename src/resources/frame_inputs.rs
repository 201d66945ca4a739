//! Shared Frame Inputs
//!
//! The `MainSceneData` block carries everything shaders need to know about
//! the current frame: camera matrices with and without jitter, last frame's
//! matrices for reprojection, timing, resolutions, the light-culling tile
//! count and the four frustum corner directions.
//!
//! The block lives in the [`StageManager`] so it is declared in the shader
//! configuration like any other input block. Only the frame orchestrator
//! calls [`FrameInputs::update`].

use glam::{Mat4, Vec3, Vec4};

use super::input_block::{GroupedInputBlock, PtaType, PtaValue};
use crate::backend::{CameraState, SceneGraph, Vfs};
use crate::errors::{PipelineError, Result};
use crate::pipeline::RenderSession;
use crate::stages::{ShaderInput, StageManager};

/// Name of the per-frame input block.
pub const MAIN_SCENE_DATA: &str = "MainSceneData";

/// Where the block declaration is written for shaders to include.
pub const DEFAULT_SCENE_DATA_PATH: &str = "temp/main_scene_data.inc.glsl";

const MEMBERS: [(&str, PtaType); 18] = [
    ("camera_pos", PtaType::Vec3),
    ("view_proj_mat_no_jitter", PtaType::Mat4),
    ("last_view_proj_mat_no_jitter", PtaType::Mat4),
    ("last_inv_view_proj_mat_no_jitter", PtaType::Mat4),
    ("view_mat_z_up", PtaType::Mat4),
    ("proj_mat", PtaType::Mat4),
    ("inv_proj_mat", PtaType::Mat4),
    ("view_mat_billboard", PtaType::Mat4),
    ("frame_delta", PtaType::Float),
    ("smooth_frame_delta", PtaType::Float),
    ("frame_time", PtaType::Float),
    ("current_film_offset", PtaType::Vec2),
    ("frame_index", PtaType::Int),
    ("screen_size", PtaType::IVec2),
    ("native_screen_size", PtaType::IVec2),
    ("lc_tile_count", PtaType::IVec2),
    ("ws_frustum_directions", PtaType::Mat4),
    ("vs_frustum_directions", PtaType::Mat4),
];

/// Converts z-up world coordinates into the y-up convention of the camera.
const Z_UP_TO_Y_UP: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::W,
);

const FRUSTUM_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];

/// Creates an empty `MainSceneData` block with every member declared.
pub fn main_scene_data_block() -> Result<GroupedInputBlock> {
    let mut block = GroupedInputBlock::new(MAIN_SCENE_DATA);
    for (name, ty) in MEMBERS {
        block.register_pta(name, ty)?;
    }
    Ok(block)
}

/// Removes the sub-pixel film offset from a projection matrix.
#[inline]
#[must_use]
pub fn strip_jitter(mut projection: Mat4) -> Mat4 {
    projection.z_axis.x = 0.0;
    projection.z_axis.y = 0.0;
    projection
}

#[derive(Debug, Clone)]
pub struct FrameInputs {
    config_path: String,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self::new(DEFAULT_SCENE_DATA_PATH)
    }
}

impl FrameInputs {
    #[must_use]
    pub fn new(config_path: &str) -> Self {
        Self {
            config_path: config_path.to_string(),
        }
    }

    #[must_use]
    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    /// Registers the block and the `mainCam`/`mainRender` inputs.
    ///
    /// The unjittered view-projection is seeded from the current camera so
    /// the first frame reprojects onto itself.
    pub fn setup(&self, stages: &mut StageManager, scene: &dyn SceneGraph) -> Result<()> {
        let camera = scene.main_camera();
        let mut block = main_scene_data_block()?;
        block.update_input(
            "view_proj_mat_no_jitter",
            strip_jitter(camera.projection) * camera.view,
        )?;
        stages.register_input_block(block)?;
        stages.set_input("mainCam", ShaderInput::Node(scene.camera_node()));
        stages.set_input("mainRender", ShaderInput::Node(scene.root()));
        Ok(())
    }

    /// Writes the block declaration to the configured path.
    pub fn write_config(&self, stages: &StageManager, vfs: &dyn Vfs) -> Result<()> {
        let block = Self::block(stages)?;
        vfs.write(&self.config_path, &block.generate_shader_code())
    }

    /// Recomputes every member for the current frame.
    pub fn update(
        &self,
        stages: &mut StageManager,
        session: &RenderSession,
        camera: &CameraState,
    ) -> Result<()> {
        let block = stages
            .input_block_mut(MAIN_SCENE_DATA)
            .ok_or_else(|| PipelineError::InvalidState("frame inputs were not set up".into()))?;
        update_block(block, session, camera)
    }

    fn block(stages: &StageManager) -> Result<&GroupedInputBlock> {
        stages
            .input_block(MAIN_SCENE_DATA)
            .ok_or_else(|| PipelineError::InvalidState("frame inputs were not set up".into()))
    }
}

/// Fills `block` (a `MainSceneData` block) for the current frame.
pub fn update_block(
    block: &mut GroupedInputBlock,
    session: &RenderSession,
    camera: &CameraState,
) -> Result<()> {
    let view = camera.view;
    let view_inv = view.inverse();

    block.update_input("view_mat_z_up", view * Z_UP_TO_Y_UP)?;

    let mut billboard = view;
    billboard.x_axis = Vec4::X;
    billboard.y_axis = Vec4::Y;
    billboard.z_axis = Vec4::Z;
    block.update_input("view_mat_billboard", billboard)?;

    block.update_input("camera_pos", camera.position)?;

    let last_vp = match block.get_input("view_proj_mat_no_jitter") {
        Some(PtaValue::Mat4(m)) => m,
        _ => Mat4::IDENTITY,
    };
    block.update_input("last_view_proj_mat_no_jitter", last_vp)?;
    block.update_input("last_inv_view_proj_mat_no_jitter", last_vp.inverse())?;

    let projection = camera.projection;
    let inv_projection = projection.inverse();
    block.update_input("proj_mat", projection)?;
    block.update_input("inv_proj_mat", inv_projection)?;
    block.update_input("view_proj_mat_no_jitter", strip_jitter(projection) * view)?;

    let clock = &session.clock;
    block.update_input("frame_delta", clock.dt)?;
    block.update_input("smooth_frame_delta", clock.smooth_dt())?;
    block.update_input("frame_time", clock.frame_time)?;
    block.update_input("current_film_offset", camera.film_offset)?;
    block.update_input("frame_index", clock.frame_count as i32)?;

    let mut ws_rows = [Vec4::ZERO; 4];
    let mut vs_rows = [Vec4::ZERO; 4];
    for (i, (x, y)) in FRUSTUM_CORNERS.into_iter().enumerate() {
        let far = inv_projection * Vec4::new(x, y, 1.0, 1.0);
        let vs_point: Vec3 = far.truncate() / far.w;
        vs_rows[i] = vs_point.normalize_or_zero().extend(1.0);
        ws_rows[i] = view_inv * vs_point.extend(0.0);
    }
    block.update_input("ws_frustum_directions", Mat4::from_cols_array_2d(&rows(ws_rows)))?;
    block.update_input("vs_frustum_directions", Mat4::from_cols_array_2d(&rows(vs_rows)))?;

    block.update_input("screen_size", session.resolution.as_ivec2())?;
    block.update_input("native_screen_size", session.native_resolution.as_ivec2())?;
    block.update_input("lc_tile_count", session.light_grid.num_tiles.as_ivec2())?;
    Ok(())
}

/// Packs four directions so that `m[i]` in GLSL addresses direction `i`.
fn rows(rows: [Vec4; 4]) -> [[f32; 4]; 4] {
    rows.map(|row| row.to_array())
}
