use crate::device::{AttributeLayout, GpuContext, Topology, UniformLocation};
use crate::error::RenderError;
use crate::geometry::{CUBE_FACES, CUBE_VERTICES, FLOATS_PER_VERTEX, GeometryBuffer, VERTICES_PER_FACE};
use crate::shader::{ShaderProgram, ShaderSource};
use crate::time::{FrameClock, FrameTime};
use crate::transform::{perspective, rotation};

use super::{CancelToken, LoopConfig};

const POSITION_ATTRIBUTE: &str = "a_position";
const MODEL_VIEW_UNIFORM: &str = "u_modelViewMatrix";
const PROJECTION_UNIFORM: &str = "u_projectionMatrix";

/// Lifecycle of a [`RenderLoop`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    /// Created; no GPU resources yet.
    Uninitialized,
    /// Program linked, geometry uploaded, bindings resolved.
    Ready,
    /// At least one frame has been issued.
    Running,
    /// Initialization failed or the context was lost. No draws are issued.
    Failed,
}

/// Summary of one issued frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    /// Rotation angle used for the model-view matrix, in radians.
    pub angle: f64,
    pub draw_calls: u32,
}

struct Resources {
    program: ShaderProgram,
    geometry: GeometryBuffer,
    model_view: UniformLocation,
    projection: UniformLocation,
}

/// Owns the GPU context and issues the cube's frames.
///
/// Resources are released when the loop is dropped.
pub struct RenderLoop<C: GpuContext> {
    ctx: C,
    config: LoopConfig,
    state: LoopState,
    resources: Option<Resources>,
    failure: Option<RenderError>,
}

impl<C: GpuContext> RenderLoop<C> {
    pub fn new(ctx: C, config: LoopConfig) -> Self {
        Self {
            ctx,
            config,
            state: LoopState::Uninitialized,
            resources: None,
            failure: None,
        }
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The error that put the loop into `Failed`, if any.
    pub fn failure(&self) -> Option<&RenderError> {
        self.failure.as_ref()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// `false` while the surface has no pixels (e.g. a minimized window).
    pub fn is_drawable(&self) -> bool {
        let (width, height) = self.ctx.surface_size();
        width > 0 && height > 0
    }

    /// Compiles `source`, uploads the cube and resolves bindings.
    ///
    /// Valid from `Uninitialized` and from `Failed` (retry). On error the loop is
    /// left in `Failed` and nothing it allocated is kept.
    pub fn initialize(&mut self, source: &ShaderSource) -> Result<(), RenderError> {
        if matches!(self.state, LoopState::Ready | LoopState::Running) {
            log::warn!("render loop already initialized; ignoring");
            return Ok(());
        }

        match self.build_resources(source) {
            Ok(resources) => {
                self.resources = Some(resources);
                self.failure = None;
                self.state = LoopState::Ready;
                log::info!("render loop ready");
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Issues one frame: clear, matrices, two fan draws.
    ///
    /// Does not present; see [`RenderLoop::present`].
    pub fn tick(&mut self, time: &FrameTime) -> Result<FrameStats, RenderError> {
        match self.state {
            LoopState::Uninitialized | LoopState::Failed => return Err(self.not_drawing()),
            LoopState::Ready => {
                self.state = LoopState::Running;
                log::info!("render loop running");
            }
            LoopState::Running => {}
        }

        if !self.ctx.is_valid() {
            return Err(self.fail(RenderError::invalid_context("context lost while running")));
        }

        let Some(res) = self.resources.as_ref() else {
            return Err(RenderError::NotReady);
        };

        let angle = time.elapsed.as_secs_f64() * self.config.rotation_speed;
        if !self.is_drawable() {
            log::trace!("frame {} skipped: zero-sized surface", time.frame_index);
            return Ok(FrameStats {
                frame_index: time.frame_index,
                angle,
                draw_calls: 0,
            });
        }

        self.ctx.clear();

        let (width, height) = self.ctx.surface_size();
        let cfg = &self.config;
        let aspect = width as f64 / height as f64;
        let projection = perspective(cfg.fov_degrees, aspect, cfg.near, cfg.far);
        let [x, y, z] = cfg.rotation_axis;
        let model_view = rotation(angle, x, y, z);

        self.ctx.uniform_matrix4(res.projection, &projection);
        self.ctx.uniform_matrix4(res.model_view, &model_view);

        for face in 0..CUBE_FACES {
            self.ctx
                .draw_arrays(Topology::TriangleFan, face * VERTICES_PER_FACE, VERTICES_PER_FACE);
        }

        log::trace!("frame {} angle {angle:.4}", time.frame_index);

        Ok(FrameStats {
            frame_index: time.frame_index,
            angle,
            draw_calls: CUBE_FACES,
        })
    }

    /// Hands the issued frame to the context. A fatal error fails the loop.
    ///
    /// Like [`RenderLoop::tick`], refuses to submit before initialization or after
    /// a failure.
    pub fn present(&mut self) -> Result<(), RenderError> {
        if matches!(self.state, LoopState::Uninitialized | LoopState::Failed) {
            return Err(self.not_drawing());
        }

        self.ctx.present().map_err(|err| {
            if err.is_fatal() {
                self.fail(err)
            } else {
                err
            }
        })
    }

    /// Updates the viewport after the drawable size changed.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.resources.is_none() {
            return;
        }
        log::debug!("viewport resized to {width}x{height}");
        self.ctx.viewport(0, 0, width, height);
    }

    /// Runs frames until `cancel` is set.
    ///
    /// Each iteration checks the token, ticks `clock`, issues a frame and calls
    /// `present`, which is expected to submit and wait for the next frame slot.
    /// Returns the number of frames issued.
    pub fn run<P>(
        &mut self,
        clock: &mut FrameClock,
        cancel: &CancelToken,
        mut present: P,
    ) -> Result<u64, RenderError>
    where
        P: FnMut(&mut C) -> Result<(), RenderError>,
    {
        let mut frames = 0u64;
        while !cancel.is_cancelled() {
            let time = clock.tick();
            self.tick(&time)?;

            if let Err(err) = present(&mut self.ctx) {
                return Err(if err.is_fatal() { self.fail(err) } else { err });
            }
            frames += 1;
        }

        log::info!("render loop cancelled after {frames} frames");
        Ok(frames)
    }

    /// The error reported by frame operations outside `Ready`/`Running`.
    fn not_drawing(&self) -> RenderError {
        match self.state {
            LoopState::Failed => self.failure.clone().unwrap_or(RenderError::NotReady),
            _ => RenderError::NotReady,
        }
    }

    fn fail(&mut self, err: RenderError) -> RenderError {
        log::error!("render loop failed: {err}");
        self.state = LoopState::Failed;
        self.failure = Some(err.clone());
        err
    }

    fn build_resources(&mut self, source: &ShaderSource) -> Result<Resources, RenderError> {
        let ctx = &mut self.ctx;

        let program = ShaderProgram::compile(ctx, source)?;

        let geometry = match GeometryBuffer::upload(ctx, &CUBE_VERTICES) {
            Ok(geometry) => geometry,
            Err(err) => {
                program.release(ctx);
                return Err(err);
            }
        };

        let (position, model_view, projection) = match resolve_bindings(&program, &*ctx) {
            Ok(bindings) => bindings,
            Err(err) => {
                geometry.release(ctx);
                program.release(ctx);
                return Err(err);
            }
        };

        program.bind(ctx);
        geometry.describe_attribute(ctx, position, AttributeLayout::packed(FLOATS_PER_VERTEX));

        let (width, height) = ctx.surface_size();
        ctx.viewport(0, 0, width, height);
        ctx.clear_color(self.config.clear_color);

        Ok(Resources {
            program,
            geometry,
            model_view,
            projection,
        })
    }
}

impl<C: GpuContext> Drop for RenderLoop<C> {
    fn drop(&mut self) {
        if let Some(res) = self.resources.take() {
            res.geometry.release(&mut self.ctx);
            res.program.release(&mut self.ctx);
            log::debug!("render loop resources released");
        }
    }
}

fn resolve_bindings<C: GpuContext + ?Sized>(
    program: &ShaderProgram,
    ctx: &C,
) -> Result<(u32, UniformLocation, UniformLocation), RenderError> {
    let position = program.attribute_location(ctx, POSITION_ATTRIBUTE)?;
    let model_view = program.uniform_location(ctx, MODEL_VIEW_UNIFORM)?;
    let projection = program.uniform_location(ctx, PROJECTION_UNIFORM)?;
    Ok((position, model_view, projection))
}
