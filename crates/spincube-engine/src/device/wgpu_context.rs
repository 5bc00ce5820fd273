use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::error::RenderError;
use crate::transform::Matrix4;

use super::gpu::{Gpu, SurfaceErrorAction};
use super::reflect::{self, ProgramReflection, StageReflection, UniformSlot};
use super::{
    AttributeLayout, BufferId, ClearColor, GpuContext, ProgramId, ShaderId, ShaderStage, Topology,
    UniformLocation,
};

/// `GpuContext` backed by wgpu and a window surface.
///
/// Draws are recorded during the frame and encoded into a single render pass at
/// `present`. Uniform writes go straight to the queue, so every draw in a frame
/// sees the last value written before `present`.
pub struct WgpuContext<'w> {
    gpu: Gpu<'w>,
    lost: bool,
    next_id: u32,

    shaders: HashMap<u32, CompiledStage>,
    programs: HashMap<u32, LinkedProgram>,
    buffers: HashMap<u32, wgpu::Buffer>,

    /// Enabled attributes by shader location.
    attributes: BTreeMap<u32, (BufferId, AttributeLayout)>,
    current_program: Option<ProgramId>,
    viewport: Option<(i32, i32, u32, u32)>,
    clear_color: wgpu::Color,
    frame: FramePlan,

    index_buffer: Option<wgpu::Buffer>,
    index_capacity: usize,

    warned_no_program: bool,
}

struct CompiledStage {
    module: wgpu::ShaderModule,
    reflection: StageReflection,
}

struct LinkedProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    reflection: ProgramReflection,
    layout: wgpu::PipelineLayout,
    bind_groups: Vec<wgpu::BindGroup>,
    uniform_buffers: HashMap<(u32, u32), wgpu::Buffer>,
    /// Built on first draw; dropped when the vertex layout changes.
    pipeline: Option<wgpu::RenderPipeline>,
}

#[derive(Default)]
struct FramePlan {
    clear: bool,
    draws: Vec<Draw>,
}

#[derive(Debug, Copy, Clone)]
struct Draw {
    program: ProgramId,
    first: u32,
    count: u32,
}

impl<'w> WgpuContext<'w> {
    pub fn new(gpu: Gpu<'w>) -> Self {
        Self {
            gpu,
            lost: false,
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            attributes: BTreeMap::new(),
            current_program: None,
            viewport: None,
            clear_color: wgpu::Color::BLACK,
            frame: FramePlan::default(),
            index_buffer: None,
            index_capacity: 0,
            warned_no_program: false,
        }
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// Reconfigures the surface. The caller updates the viewport separately.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_index_capacity(&mut self, required: usize) {
        if required <= self.index_capacity && self.index_buffer.is_some() {
            return;
        }

        let new_cap = required.next_power_of_two().max(64);
        self.index_buffer = Some(self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("spincube fan ibo"),
            size: (new_cap * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.index_capacity = new_cap;
    }

    fn create_program(
        &self,
        vertex: &CompiledStage,
        fragment: &CompiledStage,
        reflection: ProgramReflection,
    ) -> LinkedProgram {
        let device = self.gpu.device();

        let mut groups: BTreeMap<u32, Vec<UniformSlot>> = BTreeMap::new();
        for slot in reflection.uniforms.values() {
            groups.entry(slot.group).or_default().push(*slot);
        }
        let group_count = groups.keys().next_back().map_or(0, |g| g + 1);

        let mut layouts = Vec::with_capacity(group_count as usize);
        let mut bind_groups = Vec::with_capacity(group_count as usize);
        let mut uniform_buffers = HashMap::new();

        for group in 0..group_count {
            let slots = groups.get(&group).map(Vec::as_slice).unwrap_or(&[]);

            let entries: Vec<_> = slots
                .iter()
                .map(|slot| wgpu::BindGroupLayoutEntry {
                    binding: slot.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(slot.size),
                    },
                    count: None,
                })
                .collect();

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spincube uniform bgl"),
                entries: &entries,
            });

            for slot in slots {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("spincube uniform ubo"),
                    size: slot.size.max(16),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                uniform_buffers.insert((slot.group, slot.binding), buffer);
            }

            let bind_entries: Vec<_> = slots
                .iter()
                .filter_map(|slot| {
                    let buffer = uniform_buffers.get(&(slot.group, slot.binding))?;
                    Some(wgpu::BindGroupEntry {
                        binding: slot.binding,
                        resource: buffer.as_entire_binding(),
                    })
                })
                .collect();

            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("spincube uniform bind group"),
                layout: &layout,
                entries: &bind_entries,
            }));
            layouts.push(layout);
        }

        let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spincube pipeline layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        LinkedProgram {
            vertex: vertex.module.clone(),
            fragment: fragment.module.clone(),
            reflection,
            layout,
            bind_groups,
            uniform_buffers,
            pipeline: None,
        }
    }
}

impl GpuContext for WgpuContext<'_> {
    fn is_valid(&self) -> bool {
        !self.lost
    }

    fn surface_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let reflection = reflect::compile_stage(stage, source)?;

        let label = match stage {
            ShaderStage::Vertex => "spincube vertex shader",
            ShaderStage::Fragment => "spincube fragment shader",
        };
        let module = self
            .gpu
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
            });

        let id = self.alloc_id();
        self.shaders.insert(id, CompiledStage { module, reflection });
        Ok(ShaderId(id))
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex.0), self.shaders.get(&fragment.0))
        else {
            return Err("unknown shader handle".to_owned());
        };

        let reflection = reflect::link(&vs.reflection, &fs.reflection)?;
        let program = self.create_program(vs, fs, reflection);

        let id = self.alloc_id();
        self.programs.insert(id, program);
        Ok(ProgramId(id))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(linked) = self.programs.remove(&program.0) {
            for buffer in linked.uniform_buffers.values() {
                buffer.destroy();
            }
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program.0)?
            .reflection
            .attributes
            .get(name)
            .copied()
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let slot = self.programs.get(&program.0)?.reflection.uniforms.get(name)?;
        Some(UniformLocation {
            program,
            group: slot.group,
            binding: slot.binding,
        })
    }

    fn create_static_buffer(&mut self, data: &[f32]) -> Result<BufferId, RenderError> {
        if self.lost {
            return Err(RenderError::invalid_context("device lost"));
        }

        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("spincube vertex vbo"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let id = self.alloc_id();
        self.buffers.insert(id, buffer);
        Ok(BufferId(id))
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(&buffer.0) {
            b.destroy();
        }
        self.attributes.retain(|_, (bound, _)| *bound != buffer);
    }

    fn vertex_attribute(&mut self, buffer: BufferId, location: u32, layout: AttributeLayout) {
        if vertex_format(layout.components).is_none() {
            log::warn!(
                "attribute {location}: {} components is not a float vector size; ignored",
                layout.components
            );
            return;
        }

        if self.attributes.insert(location, (buffer, layout)) != Some((buffer, layout)) {
            // Pipelines bake the vertex layout.
            for program in self.programs.values_mut() {
                program.pipeline = None;
            }
        }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Matrix4) {
        let Some(program) = self.programs.get(&location.program.0) else { return };
        let Some(buffer) = program.uniform_buffers.get(&(location.group, location.binding)) else {
            return;
        };

        let fits = program
            .reflection
            .uniform_by_slot(location.group, location.binding)
            .is_some_and(|slot| slot.size >= std::mem::size_of::<Matrix4>() as u64);
        if !fits {
            log::warn!("uniform at @group({}) @binding({}) is smaller than a mat4", location.group, location.binding);
            return;
        }

        self.gpu.queue().write_buffer(buffer, 0, bytemuck::bytes_of(value));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn clear_color(&mut self, color: ClearColor) {
        self.clear_color = wgpu::Color {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
    }

    fn clear(&mut self) {
        self.frame.clear = true;
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let Some(program) = self.current_program else {
            if !self.warned_no_program {
                log::warn!("draw issued with no program bound; ignored");
                self.warned_no_program = true;
            }
            return;
        };

        // Fans are the only topology; they are expanded to indices at present.
        let Topology::TriangleFan = topology;
        self.frame.draws.push(Draw {
            program,
            first,
            count,
        });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if self.lost {
            return Err(RenderError::invalid_context("device lost"));
        }

        let plan = std::mem::take(&mut self.frame);
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        // Build pipelines and fan indices before borrowing anything for the pass.
        let mut indices: Vec<u32> = Vec::new();
        let mut batches = Vec::with_capacity(plan.draws.len());
        let format = self.gpu.surface_format();
        let device = self.gpu.device();

        for draw in &plan.draws {
            let Some(program) = self.programs.get_mut(&draw.program.0) else { continue };

            if program.pipeline.is_none() {
                let inputs = vertex_inputs(&program.reflection, &self.attributes);
                program.pipeline = Some(build_pipeline(device, format, program, &inputs));
            }

            let start = indices.len() as u32;
            fan_indices(draw.first, draw.count, &mut indices);
            batches.push((draw.program, start..indices.len() as u32));
        }

        if !indices.is_empty() {
            self.ensure_index_capacity(indices.len());
            if let Some(ibo) = self.index_buffer.as_ref() {
                self.gpu.queue().write_buffer(ibo, 0, bytemuck::cast_slice(&indices));
            }
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        self.lost = true;
                        Err(RenderError::invalid_context("surface out of memory"))
                    }
                    action => {
                        log::debug!("frame skipped: {action:?}");
                        Ok(())
                    }
                };
            }
        };

        {
            let load = if plan.clear {
                wgpu::LoadOp::Clear(self.clear_color)
            } else {
                wgpu::LoadOp::Load
            };

            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("spincube pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut visible = true;
            if let Some(rect) = self.viewport {
                let (x, y, w, h) = clamp_viewport(rect, size);
                visible = w > 0.0 && h > 0.0;
                if visible {
                    rpass.set_viewport(x, y, w, h, 0.0, 1.0);
                }
            }

            // An empty viewport still clears and presents.
            let batches = match (visible, self.index_buffer.as_ref()) {
                (true, Some(ibo)) => {
                    rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                    batches.as_slice()
                }
                _ => &[],
            };

            for (program, range) in batches {
                if range.is_empty() {
                    continue;
                }
                let Some(program) = self.programs.get(&program.0) else { continue };
                let Some(pipeline) = program.pipeline.as_ref() else { continue };

                rpass.set_pipeline(pipeline);
                for (group, bind_group) in program.bind_groups.iter().enumerate() {
                    rpass.set_bind_group(group as u32, bind_group, &[]);
                }

                let inputs = vertex_inputs(&program.reflection, &self.attributes);
                let mut bound = true;
                for (slot, (_, buffer, layout)) in inputs.iter().enumerate() {
                    let Some(vbo) = self.buffers.get(&buffer.0) else {
                        bound = false;
                        break;
                    };
                    rpass.set_vertex_buffer(slot as u32, vbo.slice(layout.offset..));
                }
                if !bound {
                    continue;
                }

                rpass.draw_indexed(range.clone(), 0, 0..1);
            }
        }

        self.gpu.submit(frame);
        Ok(())
    }
}

/// Attributes the program reads, ordered by location: `(location, buffer, layout)`.
fn vertex_inputs(
    program: &ProgramReflection,
    attributes: &BTreeMap<u32, (BufferId, AttributeLayout)>,
) -> Vec<(u32, BufferId, AttributeLayout)> {
    attributes
        .iter()
        .filter(|(location, _)| program.attributes.values().any(|l| l == *location))
        .map(|(location, (buffer, layout))| (*location, *buffer, *layout))
        .collect()
}

fn build_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    program: &LinkedProgram,
    inputs: &[(u32, BufferId, AttributeLayout)],
) -> wgpu::RenderPipeline {
    let attrs: Vec<[wgpu::VertexAttribute; 1]> = inputs
        .iter()
        .filter_map(|(location, _, layout)| {
            Some([wgpu::VertexAttribute {
                format: vertex_format(layout.components)?,
                offset: 0,
                shader_location: *location,
            }])
        })
        .collect();

    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = inputs
        .iter()
        .zip(attrs.iter())
        .map(|((_, _, layout), attr)| wgpu::VertexBufferLayout {
            array_stride: layout.effective_stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attr,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("spincube pipeline"),
        layout: Some(&program.layout),

        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(program.reflection.vertex_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(program.reflection.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        // Fans arrive as indexed triangle lists.
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        // No depth attachment: draw order decides overlap.
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn vertex_format(components: u8) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

/// Expands a fan over `first..first + count` into triangle-list indices.
pub(crate) fn fan_indices(first: u32, count: u32, out: &mut Vec<u32>) {
    for i in 1..count.saturating_sub(1) {
        out.extend_from_slice(&[first, first + i, first + i + 1]);
    }
}

/// Clips a viewport rectangle to the render target.
fn clamp_viewport(
    (x, y, w, h): (i32, i32, u32, u32),
    target: PhysicalSize<u32>,
) -> (f32, f32, f32, f32) {
    let x0 = x.clamp(0, target.width as i32) as f32;
    let y0 = y.clamp(0, target.height as i32) as f32;
    let x1 = (x as i64 + w as i64).clamp(0, target.width as i64) as f32;
    let y1 = (y as i64 + h as i64).clamp(0, target.height as i64) as f32;
    (x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
}
