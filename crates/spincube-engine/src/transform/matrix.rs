use std::ops::Index;

use bytemuck::{Pod, Zeroable};

/// 4x4 float matrix, column-major, in the layout uploaded to a `mat4x4<f32>` uniform.
///
/// Element `[c * 4 + r]` is column `c`, row `r`. Positions carry meaning for the
/// projection: `[0]`, `[5]` scale, `[10]`/`[14]` map depth, `[11]` produces `w = -z`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Matrix4(pub [f32; 16]);

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    #[inline]
    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }
}

impl Index<usize> for Matrix4 {
    type Output = f32;

    #[inline]
    fn index(&self, i: usize) -> &f32 {
        &self.0[i]
    }
}
