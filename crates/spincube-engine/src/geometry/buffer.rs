use crate::device::{AttributeLayout, BufferId, GpuContext};
use crate::error::RenderError;

/// Static vertex buffer owned by the pipeline.
///
/// The data is copied to the GPU once at upload and never written again.
#[derive(Debug)]
pub struct GeometryBuffer {
    id: BufferId,
}

impl GeometryBuffer {
    /// Allocates GPU memory sized to `vertices` and copies them in.
    ///
    /// Fails only when the context itself is unusable.
    pub fn upload<C>(ctx: &mut C, vertices: &[f32]) -> Result<Self, RenderError>
    where
        C: GpuContext + ?Sized,
    {
        if !ctx.is_valid() {
            return Err(RenderError::invalid_context("cannot upload geometry on a lost context"));
        }

        let id = ctx.create_static_buffer(vertices)?;
        log::debug!("uploaded {} floats to buffer {id:?}", vertices.len());

        Ok(Self { id })
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Feeds attribute `location` from this buffer.
    ///
    /// `location` must come from the linked program that will draw with it, and
    /// `layout.components` must equal the floats per vertex in the uploaded data.
    /// Neither is checked here.
    pub fn describe_attribute<C>(&self, ctx: &mut C, location: u32, layout: AttributeLayout)
    where
        C: GpuContext + ?Sized,
    {
        ctx.vertex_attribute(self.id, location, layout);
    }

    pub fn release<C: GpuContext + ?Sized>(self, ctx: &mut C) {
        ctx.delete_buffer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GpuCall, RecordingContext};
    use crate::geometry::CUBE_VERTICES;

    #[test]
    fn upload_copies_all_floats_once() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();

        let buffer = GeometryBuffer::upload(&mut ctx, &CUBE_VERTICES).unwrap();

        let uploads: Vec<_> = rec
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GpuCall::CreateStaticBuffer { .. }))
            .collect();
        assert_eq!(uploads, vec![GpuCall::CreateStaticBuffer { buffer: buffer.id(), floats: 24 }]);
    }

    #[test]
    fn describe_attribute_forwards_layout() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();
        let buffer = GeometryBuffer::upload(&mut ctx, &CUBE_VERTICES).unwrap();

        buffer.describe_attribute(&mut ctx, 0, AttributeLayout::default());

        assert_eq!(
            rec.calls().last(),
            Some(&GpuCall::VertexAttribute {
                buffer: buffer.id(),
                location: 0,
                layout: AttributeLayout::packed(3),
            })
        );
    }

    #[test]
    fn release_frees_the_buffer() {
        let mut ctx = RecordingContext::new(800, 600);
        let rec = ctx.recorder();
        let buffer = GeometryBuffer::upload(&mut ctx, &CUBE_VERTICES).unwrap();
        assert_eq!(rec.live_objects(), 1);
        buffer.release(&mut ctx);
        assert_eq!(rec.live_objects(), 0);
    }

    #[test]
    fn upload_on_lost_context_is_fatal() {
        let mut ctx = RecordingContext::lost();
        let err = GeometryBuffer::upload(&mut ctx, &CUBE_VERTICES).unwrap_err();
        assert!(err.is_fatal());
    }
}
