//! Transform math.
//!
//! Pure functions producing the per-frame projection and model-view matrices.
//! Nothing here touches the GPU; everything is safe to call from any thread.
//!
//! Convention:
//! - matrices are 16 `f32` values in column-major order, uploaded as-is
//! - intermediate math runs in `f64` and is rounded once on store

mod matrix;
mod projection;

pub use matrix::Matrix4;
pub use projection::{perspective, rotation};
