//! Headless `GpuContext` that records every call.
//!
//! Shader compile and link go through the same reflection as the wgpu backend, so
//! diagnostics and locations are real; nothing is rasterized. The call log lives
//! behind a shared handle ([`Recorder`]) so it can be inspected after the context
//! has been moved into, or dropped by, its owner.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;
use crate::transform::Matrix4;

use super::reflect::{self, ProgramReflection, StageReflection};
use super::{
    AttributeLayout, BufferId, ClearColor, GpuContext, ProgramId, ShaderId, ShaderStage, Topology,
    UniformLocation,
};

/// One recorded context call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CompileShader { stage: ShaderStage, ok: bool },
    DeleteShader(ShaderId),
    LinkProgram { vertex: ShaderId, fragment: ShaderId, ok: bool },
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    CreateStaticBuffer { buffer: BufferId, floats: usize },
    DeleteBuffer(BufferId),
    VertexAttribute { buffer: BufferId, location: u32, layout: AttributeLayout },
    UniformMatrix4 { location: UniformLocation, value: Matrix4 },
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    ClearColor(ClearColor),
    Clear,
    DrawArrays { topology: Topology, first: u32, count: u32 },
    Present,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<GpuCall>,
    lost: bool,
    size: (u32, u32),
    next_id: u32,
    shaders: HashMap<u32, StageReflection>,
    programs: HashMap<u32, ProgramReflection>,
    buffers: HashMap<u32, usize>,
}

impl State {
    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared view of a [`RecordingContext`]'s log.
#[derive(Debug, Clone)]
pub struct Recorder(Rc<RefCell<State>>);

impl Recorder {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<GpuCall> {
        self.0.borrow().calls.clone()
    }

    /// `(topology, first, count)` of every draw so far.
    pub fn draws(&self) -> Vec<(Topology, u32, u32)> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::DrawArrays { topology, first, count } => Some((*topology, *first, *count)),
                _ => None,
            })
            .collect()
    }

    /// Number of `present` calls so far.
    pub fn presents(&self) -> usize {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, GpuCall::Present))
            .count()
    }

    /// Shaders, programs and buffers that have been created and not deleted.
    pub fn live_objects(&self) -> usize {
        let state = self.0.borrow();
        state.shaders.len() + state.programs.len() + state.buffers.len()
    }

    /// Drops the log while keeping live objects.
    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    /// Simulates losing the context; subsequent presents fail.
    pub fn lose_context(&self) {
        self.0.borrow_mut().lost = true;
    }

    pub fn set_surface_size(&self, width: u32, height: u32) {
        self.0.borrow_mut().size = (width, height);
    }
}

/// Headless recording context.
#[derive(Debug)]
pub struct RecordingContext {
    state: Rc<RefCell<State>>,
}

impl RecordingContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                size: (width, height),
                ..State::default()
            })),
        }
    }

    /// A context that was never usable.
    pub fn lost() -> Self {
        let ctx = Self::new(0, 0);
        ctx.state.borrow_mut().lost = true;
        ctx
    }

    pub fn recorder(&self) -> Recorder {
        Recorder(Rc::clone(&self.state))
    }

    fn record(&self, call: GpuCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl GpuContext for RecordingContext {
    fn is_valid(&self) -> bool {
        !self.state.borrow().lost
    }

    fn surface_size(&self) -> (u32, u32) {
        self.state.borrow().size
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let result = reflect::compile_stage(stage, source);
        self.record(GpuCall::CompileShader { stage, ok: result.is_ok() });

        let reflection = result?;
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.shaders.insert(id, reflection);
        Ok(ShaderId(id))
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.record(GpuCall::DeleteShader(shader));
        self.state.borrow_mut().shaders.remove(&shader.0);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let result = {
            let state = self.state.borrow();
            match (state.shaders.get(&vertex.0), state.shaders.get(&fragment.0)) {
                (Some(vs), Some(fs)) => reflect::link(vs, fs),
                _ => Err("unknown shader handle".to_owned()),
            }
        };
        self.record(GpuCall::LinkProgram { vertex, fragment, ok: result.is_ok() });

        let reflection = result?;
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.programs.insert(id, reflection);
        Ok(ProgramId(id))
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.record(GpuCall::DeleteProgram(program));
        self.state.borrow_mut().programs.remove(&program.0);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.record(GpuCall::UseProgram(program));
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let state = self.state.borrow();
        state.programs.get(&program.0)?.attributes.get(name).copied()
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let slot = state.programs.get(&program.0)?.uniforms.get(name)?;
        Some(UniformLocation {
            program,
            group: slot.group,
            binding: slot.binding,
        })
    }

    fn create_static_buffer(&mut self, data: &[f32]) -> Result<BufferId, RenderError> {
        if !self.is_valid() {
            return Err(RenderError::invalid_context("context lost"));
        }
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.alloc_id();
            state.buffers.insert(id, data.len());
            BufferId(id)
        };
        self.record(GpuCall::CreateStaticBuffer { buffer: id, floats: data.len() });
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.record(GpuCall::DeleteBuffer(buffer));
        self.state.borrow_mut().buffers.remove(&buffer.0);
    }

    fn vertex_attribute(&mut self, buffer: BufferId, location: u32, layout: AttributeLayout) {
        self.record(GpuCall::VertexAttribute { buffer, location, layout });
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Matrix4) {
        self.record(GpuCall::UniformMatrix4 { location, value: *value });
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(GpuCall::Viewport { x, y, width, height });
    }

    fn clear_color(&mut self, color: ClearColor) {
        self.record(GpuCall::ClearColor(color));
    }

    fn clear(&mut self) {
        self.record(GpuCall::Clear);
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.record(GpuCall::DrawArrays { topology, first, count });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if !self.is_valid() {
            return Err(RenderError::invalid_context("context lost"));
        }
        self.record(GpuCall::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_outlives_context() {
        let rec = {
            let mut ctx = RecordingContext::new(4, 4);
            ctx.clear();
            ctx.draw_arrays(Topology::TriangleFan, 0, 4);
            ctx.recorder()
        };
        assert_eq!(rec.calls().len(), 2);
        assert_eq!(rec.draws(), vec![(Topology::TriangleFan, 0, 4)]);
    }

    #[test]
    fn lost_context_rejects_present() {
        let mut ctx = RecordingContext::new(4, 4);
        let rec = ctx.recorder();
        assert!(ctx.present().is_ok());
        rec.lose_context();
        assert!(!ctx.is_valid());
        assert!(ctx.present().unwrap_err().is_fatal());
        assert_eq!(rec.presents(), 1);
    }

    #[test]
    fn handles_are_unique_across_kinds() {
        let mut ctx = RecordingContext::new(4, 4);
        let a = ctx.create_static_buffer(&[0.0]).unwrap();
        let b = ctx.create_static_buffer(&[0.0]).unwrap();
        assert_ne!(a, b);
    }
}
