//! Static vertex geometry.
//!
//! Uploads vertex data once and describes how shader attributes read it.

mod buffer;
mod cube;

pub use buffer::GeometryBuffer;
pub use cube::{CUBE_FACES, CUBE_VERTICES, FLOATS_PER_VERTEX, VERTICES_PER_FACE};
pub use crate::device::AttributeLayout;
