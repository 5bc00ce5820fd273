use std::borrow::Cow;

/// Immutable vertex/fragment source pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    vertex: Cow<'static, str>,
    fragment: Cow<'static, str>,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<Cow<'static, str>>, fragment: impl Into<Cow<'static, str>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The cube shaders: positions through `u_projectionMatrix * u_modelViewMatrix`,
    /// solid green fill.
    pub fn reference() -> Self {
        Self::new(
            include_str!("shaders/cube_vertex.wgsl"),
            include_str!("shaders/cube_fragment.wgsl"),
        )
    }

    #[inline]
    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    #[inline]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

impl Default for ShaderSource {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec4};

    use super::*;
    use crate::device::{GpuContext, RecordingContext, ShaderStage};
    use crate::transform::perspective;

    const DEPTH_REMAP: &str = "vec4<f32>(clip.xy, 0.5 * (clip.z + clip.w), clip.w)";

    /// What the reference vertex stage returns for a GL clip-space position.
    fn remap(clip: Vec4) -> Vec4 {
        Vec4::new(clip.x, clip.y, 0.5 * (clip.z + clip.w), clip.w)
    }

    #[test]
    fn reference_vertex_stage_compiles_with_depth_remap() {
        let source = ShaderSource::reference();
        assert!(source.vertex().contains(DEPTH_REMAP));

        let mut ctx = RecordingContext::new(800, 600);
        assert!(ctx.compile_shader(ShaderStage::Vertex, source.vertex()).is_ok());
        assert!(ctx.compile_shader(ShaderStage::Fragment, source.fragment()).is_ok());
    }

    #[test]
    fn remap_keeps_the_whole_gl_depth_range_visible() {
        let projection = perspective(45.0, 800.0 / 600.0, 0.1, 100.0);
        let m = Mat4::from_cols_array(projection.as_array());

        for z in [-0.1f32, -0.12, -0.15, -0.19, -0.25, -10.0, -100.0] {
            let clip = m.mul_vec4(Vec4::new(0.0, 0.0, z, 1.0));
            let tol = 1e-5 * clip.w.max(1.0);
            assert!(clip.z.abs() <= clip.w + tol, "gl z={z}: {clip:?}");

            let out = remap(clip);
            assert!(out.z >= -tol && out.z <= out.w + tol, "view z={z}: {out:?}");
        }
    }

    #[test]
    fn remap_sends_near_to_zero_and_far_to_one() {
        let m = Mat4::from_cols_array(perspective(45.0, 1.0, 0.1, 100.0).as_array());

        let near = remap(m.mul_vec4(Vec4::new(0.0, 0.0, -0.1, 1.0)));
        assert!((near.z / near.w).abs() < 1e-5);

        let far = remap(m.mul_vec4(Vec4::new(0.0, 0.0, -100.0, 1.0)));
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }
}
