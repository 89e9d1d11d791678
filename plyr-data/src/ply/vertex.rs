//! PLY vertex data structures

use glam::Vec3;

/// Position and color of one `vertex` instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlyVertex {
    pub position: Vec3,
    /// RGB color in the 0-1 range.
    pub color: Vec3,
}

impl PlyVertex {
    /// Color used when the file carries none.
    pub const DEFAULT_COLOR: Vec3 = Vec3::splat(0.8);

    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}
