//! Shader program lifecycle.
//!
//! Compiles a vertex/fragment pair through a `GpuContext` and owns the linked program.

mod program;
mod source;

pub use program::ShaderProgram;
pub use source::ShaderSource;
