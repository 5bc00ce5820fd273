//! Spincube engine crate.
//!
//! Draws a rotating cube through an explicit GPU context: shader program,
//! static geometry, transform math and the render loop that ties them together,
//! plus the winit/wgpu host that drives it in a window.

pub mod device;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod render;
pub mod shader;
pub mod time;
pub mod transform;
pub mod window;

pub use error::{BindingKind, RenderError};
