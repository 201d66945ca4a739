//! Grouped Shader Inputs
//!
//! A [`GroupedInputBlock`] is a named, ordered set of typed values
//! ("persistent target arrays", PTAs) that is visible to every shader as one
//! uniform block. Values are updated in place by name; the block knows how to
//! declare itself in GLSL and how to pack itself with std140 layout for
//! upload.

use std::fmt;
use std::fmt::Write as _;

use glam::{IVec2, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::errors::{PipelineError, Result};

// ============================================================================
// Types
// ============================================================================

/// Declared type of a block member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PtaType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    Mat4,
}

impl PtaType {
    /// GLSL spelling of the type.
    #[must_use]
    pub const fn glsl_name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::Mat4 => "mat4",
        }
    }

    /// std140 base alignment in bytes.
    #[must_use]
    pub const fn std140_alignment(self) -> usize {
        match self {
            Self::Int | Self::Float => 4,
            Self::Vec2 | Self::IVec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat4 => 16,
        }
    }

    /// Zero value of this type.
    #[must_use]
    pub fn zero(self) -> PtaValue {
        match self {
            Self::Int => PtaValue::Int(0),
            Self::Float => PtaValue::Float(0.0),
            Self::Vec2 => PtaValue::Vec2(Vec2::ZERO),
            Self::Vec3 => PtaValue::Vec3(Vec3::ZERO),
            Self::Vec4 => PtaValue::Vec4(Vec4::ZERO),
            Self::IVec2 => PtaValue::IVec2(IVec2::ZERO),
            Self::Mat4 => PtaValue::Mat4(Mat4::IDENTITY),
        }
    }
}

impl fmt::Display for PtaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A typed member value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PtaValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    IVec2(IVec2),
    Mat4(Mat4),
}

impl PtaValue {
    #[must_use]
    pub const fn ty(&self) -> PtaType {
        match self {
            Self::Int(_) => PtaType::Int,
            Self::Float(_) => PtaType::Float,
            Self::Vec2(_) => PtaType::Vec2,
            Self::Vec3(_) => PtaType::Vec3,
            Self::Vec4(_) => PtaType::Vec4,
            Self::IVec2(_) => PtaType::IVec2,
            Self::Mat4(_) => PtaType::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Int(v) => bytemuck::bytes_of(v),
            Self::Float(v) => bytemuck::bytes_of(v),
            Self::Vec2(v) => bytemuck::bytes_of(v),
            Self::Vec3(v) => bytemuck::bytes_of(v),
            Self::Vec4(v) => bytemuck::bytes_of(v),
            Self::IVec2(v) => bytemuck::bytes_of(v),
            Self::Mat4(v) => bytemuck::bytes_of(v),
        }
    }
}

macro_rules! impl_from_pta {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for PtaValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from_pta!(
    i32 => Int,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    IVec2 => IVec2,
    Mat4 => Mat4,
);

// ============================================================================
// GroupedInputBlock
// ============================================================================

/// A named uniform block made of individually updatable members.
#[derive(Debug, Clone)]
pub struct GroupedInputBlock {
    name: String,
    members: Vec<(String, PtaValue)>,
    index: FxHashMap<String, usize>,
    version: u64,
}

impl GroupedInputBlock {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            index: FxHashMap::default(),
            version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Incremented on every successful update.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Declares a new member, initialized to the zero value of its type.
    pub fn register_pta(&mut self, name: &str, ty: PtaType) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(PipelineError::config(format!(
                "input '{name}' is already registered in block '{}'",
                self.name
            )));
        }
        self.index.insert(name.to_string(), self.members.len());
        self.members.push((name.to_string(), ty.zero()));
        Ok(())
    }

    /// Replaces the value of a registered member. The type must match the
    /// declaration.
    pub fn update_input(&mut self, name: &str, value: impl Into<PtaValue>) -> Result<()> {
        let value = value.into();
        let &idx = self.index.get(name).ok_or_else(|| {
            PipelineError::config(format!("block '{}' has no input '{name}'", self.name))
        })?;
        let slot = &mut self.members[idx].1;
        if slot.ty() != value.ty() {
            return Err(PipelineError::config(format!(
                "input '{}.{name}' is declared as {} but got {}",
                self.name,
                slot.ty(),
                value.ty()
            )));
        }
        *slot = value;
        self.version += 1;
        Ok(())
    }

    #[must_use]
    pub fn get_input(&self, name: &str) -> Option<PtaValue> {
        self.index.get(name).map(|&idx| self.members[idx].1)
    }

    /// Member names and types, in declaration order.
    pub fn members(&self) -> impl Iterator<Item = (&str, PtaType)> {
        self.members.iter().map(|(n, v)| (n.as_str(), v.ty()))
    }

    /// GLSL declaration of the block.
    #[must_use]
    pub fn generate_shader_code(&self) -> String {
        let mut code = String::new();
        let _ = writeln!(code, "layout(std140) uniform {}_UBO {{", self.name);
        for (name, ty) in self.members() {
            let _ = writeln!(code, "    {} {};", ty.glsl_name(), name);
        }
        let _ = writeln!(code, "}} {};", self.name);
        code
    }

    /// Packs all members with std140 layout rules.
    #[must_use]
    pub fn pack_std140(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.members.len() * 16);
        for (_, value) in &self.members {
            let align = value.ty().std140_alignment();
            bytes.resize(bytes.len().next_multiple_of(align), 0);
            bytes.extend_from_slice(value.bytes());
        }
        bytes.resize(bytes.len().next_multiple_of(16), 0);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_update() {
        let mut block = GroupedInputBlock::new("TestBlock");
        block.register_pta("exposure", PtaType::Float).unwrap();
        block.update_input("exposure", 2.5_f32).unwrap();

        assert_eq!(block.get_input("exposure"), Some(PtaValue::Float(2.5)));
        assert_eq!(block.version(), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut block = GroupedInputBlock::new("TestBlock");
        block.register_pta("a", PtaType::Int).unwrap();
        assert!(block.register_pta("a", PtaType::Float).is_err());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut block = GroupedInputBlock::new("TestBlock");
        block.register_pta("screen_size", PtaType::IVec2).unwrap();

        assert!(block.update_input("screen_size", 1.0_f32).is_err());
        assert_eq!(
            block.get_input("screen_size"),
            Some(PtaValue::IVec2(IVec2::ZERO))
        );
        assert_eq!(block.version(), 0);
    }

    #[test]
    fn test_generate_shader_code() {
        let mut block = GroupedInputBlock::new("MainSceneData");
        block.register_pta("camera_pos", PtaType::Vec3).unwrap();
        block.register_pta("proj_mat", PtaType::Mat4).unwrap();

        let code = block.generate_shader_code();
        assert!(code.contains("uniform MainSceneData_UBO {"));
        assert!(code.contains("    vec3 camera_pos;"));
        assert!(code.contains("    mat4 proj_mat;"));
        assert!(code.trim_end().ends_with("} MainSceneData;"));
    }

    #[test]
    fn test_std140_packing() {
        let mut block = GroupedInputBlock::new("Packed");
        block.register_pta("a", PtaType::Float).unwrap();
        block.register_pta("b", PtaType::Vec3).unwrap();
        block.register_pta("c", PtaType::Vec2).unwrap();

        // float at 0, vec3 aligned to 16, vec2 at 28 -> 8-aligned to 32, padded to 48
        let bytes = block.pack_std140();
        assert_eq!(bytes.len(), 48);
    }
}
