use std::fmt;

use crate::error::RenderError;
use crate::transform::Matrix4;

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Handle to a compiled (not yet linked) shader stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderId(pub(crate) u32);

/// Handle to a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramId(pub(crate) u32);

/// Handle to a GPU vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Resolved uniform slot inside a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub(crate) program: ProgramId,
    pub(crate) group: u32,
    pub(crate) binding: u32,
}

/// Primitive topology for `draw_arrays`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    /// Vertex `first` is the apex shared by every triangle.
    TriangleFan,
}

/// Byte layout of one float attribute inside a vertex buffer.
///
/// `stride == 0` means tightly packed (`components * 4` bytes).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttributeLayout {
    pub components: u8,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u64,
}

impl AttributeLayout {
    pub const fn packed(components: u8) -> Self {
        Self {
            components,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }

    /// Distance in bytes between consecutive vertices.
    pub fn effective_stride(&self) -> u64 {
        if self.stride == 0 {
            self.components as u64 * std::mem::size_of::<f32>() as u64
        } else {
            self.stride as u64
        }
    }
}

impl Default for AttributeLayout {
    fn default() -> Self {
        Self::packed(3)
    }
}

/// Linear RGBA clear color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl ClearColor {
    pub const BLACK: ClearColor = ClearColor::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// Drawing capability the pipeline consumes from its host.
///
/// Modeled on a GL-style immediate API: objects are named by handles, state set
/// through the context applies to subsequent draws, and `present` hands the frame
/// to the host. Implementations must not be shared between threads while a frame
/// is being recorded; the render loop owns its context exclusively.
pub trait GpuContext {
    /// Returns `false` once the context can no longer accept work.
    fn is_valid(&self) -> bool;

    /// Drawable size in physical pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Compiles one stage. `Err` carries the compiler's diagnostic log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    /// Links a vertex and a fragment stage. `Err` carries the link log.
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn delete_program(&mut self, program: ProgramId);

    fn use_program(&mut self, program: ProgramId);

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Allocates a buffer sized to `data`, copies it once and marks it static.
    fn create_static_buffer(&mut self, data: &[f32]) -> Result<BufferId, RenderError>;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Sources attribute `location` from `buffer` with the given layout and enables it.
    fn vertex_attribute(&mut self, buffer: BufferId, location: u32, layout: AttributeLayout);

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Matrix4);

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    fn clear_color(&mut self, color: ClearColor);

    /// Clears the color buffer only.
    fn clear(&mut self);

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Submits everything recorded since the previous present.
    fn present(&mut self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_stride_is_derived_from_components() {
        assert_eq!(AttributeLayout::packed(3).effective_stride(), 12);
        assert_eq!(AttributeLayout::packed(2).effective_stride(), 8);
    }

    #[test]
    fn explicit_stride_wins() {
        let layout = AttributeLayout {
            stride: 24,
            ..AttributeLayout::default()
        };
        assert_eq!(layout.effective_stride(), 24);
    }

    #[test]
    fn default_layout_matches_position_data() {
        let layout = AttributeLayout::default();
        assert_eq!(layout.components, 3);
        assert!(!layout.normalized);
        assert_eq!(layout.offset, 0);
    }
}
