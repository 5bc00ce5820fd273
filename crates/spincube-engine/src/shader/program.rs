use crate::device::{GpuContext, ProgramId, ShaderId, ShaderStage, UniformLocation};
use crate::error::{BindingKind, RenderError};

use super::ShaderSource;

/// A linked GPU program.
///
/// A value of this type always refers to a successfully linked program; failed
/// compiles and links never produce one, so an invalid program cannot be bound.
/// The handle is owned and must be returned with [`ShaderProgram::release`].
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
}

impl ShaderProgram {
    /// Compiles both stages and links them.
    ///
    /// If a stage fails to compile, linking is skipped. Intermediate stage objects
    /// are deleted on every path.
    pub fn compile<C>(ctx: &mut C, source: &ShaderSource) -> Result<Self, RenderError>
    where
        C: GpuContext + ?Sized,
    {
        if !ctx.is_valid() {
            return Err(RenderError::invalid_context("cannot compile shaders on a lost context"));
        }

        let vertex = compile_stage(ctx, ShaderStage::Vertex, source.vertex())?;
        let fragment = match compile_stage(ctx, ShaderStage::Fragment, source.fragment()) {
            Ok(shader) => shader,
            Err(err) => {
                ctx.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = ctx.link_program(vertex, fragment);
        ctx.delete_shader(vertex);
        ctx.delete_shader(fragment);

        match linked {
            Ok(id) => {
                log::debug!("shader program {id:?} linked");
                Ok(Self { id })
            }
            Err(log) => {
                log::error!("shader program failed to link: {log}");
                Err(RenderError::ShaderLink { log })
            }
        }
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Makes this the active program for subsequent uniform writes and draws.
    pub fn bind<C: GpuContext + ?Sized>(&self, ctx: &mut C) {
        ctx.use_program(self.id);
    }

    pub fn attribute_location<C: GpuContext + ?Sized>(
        &self,
        ctx: &C,
        name: &str,
    ) -> Result<u32, RenderError> {
        ctx.attribute_location(self.id, name)
            .ok_or_else(|| RenderError::MissingBinding {
                kind: BindingKind::Attribute,
                name: name.to_owned(),
            })
    }

    pub fn uniform_location<C: GpuContext + ?Sized>(
        &self,
        ctx: &C,
        name: &str,
    ) -> Result<UniformLocation, RenderError> {
        ctx.uniform_location(self.id, name)
            .ok_or_else(|| RenderError::MissingBinding {
                kind: BindingKind::Uniform,
                name: name.to_owned(),
            })
    }

    pub fn release<C: GpuContext + ?Sized>(self, ctx: &mut C) {
        ctx.delete_program(self.id);
    }
}

fn compile_stage<C>(ctx: &mut C, stage: ShaderStage, source: &str) -> Result<ShaderId, RenderError>
where
    C: GpuContext + ?Sized,
{
    ctx.compile_shader(stage, source).map_err(|log| {
        log::error!("{stage} shader failed to compile: {log}");
        RenderError::ShaderCompile { stage, log }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GpuCall, RecordingContext};

    const BROKEN_FRAGMENT: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(0.0, 1.0 }";

    #[test]
    fn reference_sources_link() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();

        let program = ShaderProgram::compile(&mut ctx, &ShaderSource::reference()).unwrap();
        assert_eq!(program.attribute_location(&ctx, "a_position"), Ok(0));
        assert!(program.uniform_location(&ctx, "u_modelViewMatrix").is_ok());
        assert!(program.uniform_location(&ctx, "u_projectionMatrix").is_ok());

        // Only the program survives; both stage objects were deleted after linking.
        assert_eq!(rec.live_objects(), 1);
        program.release(&mut ctx);
        assert_eq!(rec.live_objects(), 0);
    }

    #[test]
    fn broken_fragment_is_a_compile_error_and_skips_linking() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();
        let source = ShaderSource::new(ShaderSource::reference().vertex().to_owned(), BROKEN_FRAGMENT);

        let err = ShaderProgram::compile(&mut ctx, &source).unwrap_err();
        match err {
            RenderError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let calls = rec.calls();
        assert!(!calls.iter().any(|c| matches!(c, GpuCall::LinkProgram { .. })));
        assert!(!calls.iter().any(|c| matches!(c, GpuCall::UseProgram(_))));
        assert_eq!(rec.live_objects(), 0);
    }

    #[test]
    fn broken_vertex_skips_fragment_compile() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();
        let source = ShaderSource::new("@vertex fn vs_main( {", ShaderSource::reference().fragment().to_owned());

        let err = ShaderProgram::compile(&mut ctx, &source).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { stage: ShaderStage::Vertex, .. }));
        let compiles = rec
            .calls()
            .iter()
            .filter(|c| matches!(c, GpuCall::CompileShader { .. }))
            .count();
        assert_eq!(compiles, 1);
    }

    #[test]
    fn incompatible_stages_are_a_link_error() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();
        let fragment = "@fragment fn fs_main(@location(2) shade: vec4<f32>) -> @location(0) vec4<f32> { return shade; }";
        let source = ShaderSource::new(ShaderSource::reference().vertex().to_owned(), fragment);

        let err = ShaderProgram::compile(&mut ctx, &source).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLink { .. }));
        assert_eq!(rec.live_objects(), 0);
    }

    #[test]
    fn unknown_names_are_missing_bindings() {
        let mut ctx = RecordingContext::new(800, 600);
        let program = ShaderProgram::compile(&mut ctx, &ShaderSource::reference()).unwrap();
        assert_eq!(
            program.uniform_location(&ctx, "u_normalMatrix"),
            Err(RenderError::MissingBinding {
                kind: BindingKind::Uniform,
                name: "u_normalMatrix".into(),
            })
        );
        assert!(program.attribute_location(&ctx, "a_normal").is_err());
    }

    #[test]
    fn lost_context_is_reported_before_compiling() {
        let mut ctx = RecordingContext::lost();
        let err = ShaderProgram::compile(&mut ctx, &ShaderSource::reference()).unwrap_err();
        assert!(err.is_fatal());
    }
}
