//! Render loop.
//!
//! Ties the shader program, the cube geometry and the transform math together and
//! drives one frame per scheduler tick.
//!
//! Convention:
//! - the loop owns its `GpuContext` exclusively; nothing else touches it mid-frame
//! - errors are only expected while initializing; steady-state frames do not fail
//!   unless the context is lost

mod cancel;
mod config;
mod render_loop;

pub use cancel::CancelToken;
pub use config::LoopConfig;
pub use render_loop::{FrameStats, LoopState, RenderLoop};
