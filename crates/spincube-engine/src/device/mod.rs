//! GPU context layer.
//!
//! This module is responsible for:
//! - the `GpuContext` capability the pipeline draws through
//! - the wgpu implementation bound to a window surface
//! - a headless recording implementation used by tests
//! - WGSL compile/link checks shared by both

mod context;
mod gpu;
mod recording;
mod reflect;
mod wgpu_context;

pub use context::{
    AttributeLayout, BufferId, ClearColor, GpuContext, ProgramId, ShaderId, ShaderStage, Topology,
    UniformLocation,
};
pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
pub use recording::{GpuCall, Recorder, RecordingContext};
pub use wgpu_context::WgpuContext;
