//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single viewer window, and drives the
//! render loop from redraw requests.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
