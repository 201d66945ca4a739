//! Shader-facing resources: define sets and grouped input blocks.

pub mod frame_inputs;
pub mod input_block;
pub mod shader_defines;

pub use frame_inputs::{FrameInputs, MAIN_SCENE_DATA};
pub use input_block::{GroupedInputBlock, PtaType, PtaValue};
pub use shader_defines::ShaderDefines;
