//! Render Session
//!
//! State shared by every component of one pipeline instance: resolutions,
//! the frame clock and the light-culling grid. It is created once per
//! pipeline and passed by reference; there is no process-wide copy.

use glam::UVec2;

use crate::utils::FrameClock;

/// Floors both components to a multiple of 4.
#[inline]
#[must_use]
pub fn floor_to_multiple_of_4(size: UVec2) -> UVec2 {
    size - size % 4
}

#[inline]
fn div_ceil(a: UVec2, b: UVec2) -> UVec2 {
    (a + b - UVec2::ONE) / b
}

/// Screen-space tiling of the clustered light culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightGrid {
    /// Number of tiles the screen is split into, per axis.
    pub grid_size: UVec2,
    /// Depth slices per tile.
    pub slices: u32,
    /// Size of one tile in pixels.
    pub tile_size: UVec2,
    /// Tiles needed to cover the render resolution.
    pub num_tiles: UVec2,
}

impl LightGrid {
    #[must_use]
    pub fn new(grid_size: UVec2, slices: u32) -> Self {
        Self {
            grid_size: grid_size.max(UVec2::ONE),
            slices,
            tile_size: UVec2::ONE,
            num_tiles: grid_size,
        }
    }

    /// Recomputes tile size and tile count for `resolution`.
    pub fn compute_tile_size(&mut self, resolution: UVec2) {
        self.tile_size = div_ceil(resolution, self.grid_size).max(UVec2::ONE);
        self.num_tiles = div_ceil(resolution, self.tile_size);
        log::debug!(
            "Light grid: {}x{} tiles of {}x{} px",
            self.num_tiles.x,
            self.num_tiles.y,
            self.tile_size.x,
            self.tile_size.y
        );
    }
}

/// Per-pipeline shared state.
#[derive(Debug, Clone)]
pub struct RenderSession {
    /// Window size in pixels.
    pub native_resolution: UVec2,
    /// Internal render size: `native * scale`, floored to a multiple of 4.
    pub resolution: UVec2,
    pub resolution_scale: f32,
    pub clock: FrameClock,
    pub light_grid: LightGrid,
}

impl RenderSession {
    #[must_use]
    pub fn new(native_resolution: UVec2, resolution_scale: f32, light_grid: LightGrid) -> Self {
        let mut session = Self {
            native_resolution,
            resolution: native_resolution,
            resolution_scale,
            clock: FrameClock::new(),
            light_grid,
        };
        session.compute_render_resolution();
        session.light_grid.compute_tile_size(session.resolution);
        session
    }

    /// Derives the render resolution from the native one.
    pub fn compute_render_resolution(&mut self) {
        let scaled = (self.native_resolution.as_vec2() * self.resolution_scale).as_uvec2();
        self.resolution = floor_to_multiple_of_4(scaled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_resolution_is_multiple_of_4() {
        let session = RenderSession::new(
            UVec2::new(1920, 1080),
            0.75,
            LightGrid::new(UVec2::new(24, 16), 32),
        );
        // 1440 x 810 -> 1440 x 808
        assert_eq!(session.resolution, UVec2::new(1440, 808));
    }

    #[test]
    fn test_tile_size() {
        let mut grid = LightGrid::new(UVec2::new(24, 16), 32);
        grid.compute_tile_size(UVec2::new(1920, 1080));

        assert_eq!(grid.tile_size, UVec2::new(80, 68));
        assert_eq!(grid.num_tiles, UVec2::new(24, 16));
    }

    #[test]
    fn test_floor_to_multiple_of_4() {
        assert_eq!(floor_to_multiple_of_4(UVec2::new(1023, 767)), UVec2::new(1020, 764));
        assert_eq!(floor_to_multiple_of_4(UVec2::new(1024, 768)), UVec2::new(1024, 768));
    }
}
