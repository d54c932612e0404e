use std::collections::{HashMap, HashSet};

use pollster::block_on;
use wgpu::{util::DeviceExt, PollType, TexelCopyBufferLayout, TexelCopyTextureInfo};

use crate::error::RenderError;
use crate::rendering::backend::{
    DrawCall, GeometryId, GraphicsBackend, ProgramId, ShaderSource, TextureId,
};
use crate::rendering::geometry::{GeometryData, Vertex};
use crate::rendering::texture::TextureData;
use crate::rendering::uniforms::UniformValue;

const UNIFORM_GROUP: u32 = 0;
const TEXTURE_GROUP: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct UniformSlot {
    offset: usize,
    stride: Option<usize>,
}

/// What a compiled program expects, read from the WGSL module.
#[derive(Debug, Default)]
struct ProgramReflection {
    uniform_size: usize,
    uniforms: HashMap<String, UniformSlot>,
    /// (binding, texture name), sorted by binding.
    textures: Vec<(u32, String)>,
    samplers: Vec<u32>,
}

impl ProgramReflection {
    fn from_wgsl(name: &str, wgsl: &str) -> Result<Self, RenderError> {
        let module =
            naga::front::wgsl::parse_str(wgsl).map_err(|e| RenderError::ShaderCompilation {
                name: name.to_string(),
                message: e.emit_to_string(wgsl),
            })?;

        let mut reflection = ProgramReflection::default();

        for (_, variable) in module.global_variables.iter() {
            let Some(binding) = &variable.binding else {
                continue;
            };

            match (variable.space, &module.types[variable.ty].inner) {
                (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span })
                    if binding.group == UNIFORM_GROUP && binding.binding == 0 =>
                {
                    reflection.uniform_size = *span as usize;

                    for member in members {
                        let Some(member_name) = &member.name else {
                            continue;
                        };

                        let stride = match module.types[member.ty].inner {
                            naga::TypeInner::Array { stride, .. } => Some(stride as usize),
                            _ => None,
                        };

                        reflection.uniforms.insert(
                            member_name.clone(),
                            UniformSlot {
                                offset: member.offset as usize,
                                stride,
                            },
                        );
                    }
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Image { .. })
                    if binding.group == TEXTURE_GROUP =>
                {
                    if let Some(texture_name) = &variable.name {
                        reflection
                            .textures
                            .push((binding.binding, texture_name.clone()));
                    }
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. })
                    if binding.group == TEXTURE_GROUP =>
                {
                    reflection.samplers.push(binding.binding);
                }
                _ => {}
            }
        }

        reflection.textures.sort_by_key(|(binding, _)| *binding);
        reflection.samplers.sort_unstable();

        Ok(reflection)
    }
}

struct Program {
    name: String,
    pipeline: wgpu::RenderPipeline,
    reflection: ProgramReflection,
}

struct GpuGeometry {
    vertices: wgpu::Buffer,
    indices: Option<wgpu::Buffer>,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct PendingDraw {
    pipeline: wgpu::RenderPipeline,
    uniforms: Option<wgpu::BindGroup>,
    textures: Option<wgpu::BindGroup>,
    vertices: wgpu::Buffer,
    indices: Option<wgpu::Buffer>,
    call: DrawCall,
}

/// `GraphicsBackend` on top of wgpu.
///
/// Each program is a WGSL module with a uniform struct at `@group(0)
/// @binding(0)` and its textures and samplers in `@group(1)`. Draws are
/// recorded as they come in and replayed by `flush` into a single render pass.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,

    programs: Vec<Program>,
    geometries: HashMap<GeometryId, GpuGeometry>,
    textures: HashMap<TextureId, GpuTexture>,
    next_geometry: u32,
    next_texture: u32,

    sampler: wgpu::Sampler,
    fallback_texture: GpuTexture,

    current_program: Option<ProgramId>,
    current_geometry: Option<GeometryId>,
    uniform_data: Vec<u8>,
    texture_units: HashMap<u32, TextureId>,
    texture_uniforms: HashMap<String, u32>,
    warned_uniforms: HashSet<(ProgramId, String)>,

    pending: Vec<PendingDraw>,
}

impl WgpuBackend {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = create_texture(
            &device,
            &queue,
            &TextureData::solid("Fallback texture", [255, 255, 255, 255]),
        );

        Self {
            device,
            queue,
            color_format,
            depth_format,
            programs: Vec::new(),
            geometries: HashMap::new(),
            textures: HashMap::new(),
            next_geometry: 0,
            next_texture: 0,
            sampler,
            fallback_texture,
            current_program: None,
            current_geometry: None,
            uniform_data: Vec::new(),
            texture_units: HashMap::new(),
            texture_uniforms: HashMap::new(),
            warned_uniforms: HashSet::new(),
            pending: Vec::new(),
        }
    }

    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Drops draws recorded for a frame that will not be presented.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Replays every draw recorded since the last flush into one render pass.
    pub fn flush(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_color: wgpu::Color,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        for draw in self.pending.drain(..) {
            render_pass.set_pipeline(&draw.pipeline);

            if let Some(uniforms) = &draw.uniforms {
                render_pass.set_bind_group(UNIFORM_GROUP, uniforms, &[]);
            }

            if let Some(textures) = &draw.textures {
                render_pass.set_bind_group(TEXTURE_GROUP, textures, &[]);
            }

            render_pass.set_vertex_buffer(0, draw.vertices.slice(..));

            match (draw.call, &draw.indices) {
                (DrawCall::Indexed { index_count }, Some(indices)) => {
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..index_count, 0, 0..1);
                }
                (DrawCall::Arrays { vertex_count }, _) => {
                    render_pass.draw(0..vertex_count, 0..1);
                }
                (DrawCall::Indexed { .. }, None) => {
                    log::warn!("Indexed draw without an index buffer, skipping");
                }
            }
        }
    }

    fn create_pipeline(
        &self,
        source: ShaderSource<'_>,
    ) -> Result<wgpu::RenderPipeline, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.name),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(source.name),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[Vertex::LAYOUT],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: self.depth_format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        if let Err(error) = self.device.poll(PollType::Wait) {
            log::warn!("Failed to poll device after compiling {}: {error}", source.name);
        }

        if let Some(error) = block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderLink {
                name: source.name.to_string(),
                message: error.to_string(),
            });
        }

        Ok(pipeline)
    }

    fn program(&self, program: ProgramId) -> Option<&Program> {
        self.programs.get(program.0 as usize)
    }

    fn texture_bind_group(&self, program: &Program) -> Option<wgpu::BindGroup> {
        let reflection = &program.reflection;
        if reflection.textures.is_empty() && reflection.samplers.is_empty() {
            return None;
        }

        let mut entries = Vec::new();

        for (binding, name) in &reflection.textures {
            let texture = self
                .texture_uniforms
                .get(name)
                .and_then(|unit| self.texture_units.get(unit))
                .and_then(|texture| self.textures.get(texture))
                .unwrap_or_else(|| {
                    log::trace!("No texture bound for {name} in {}", program.name);
                    &self.fallback_texture
                });

            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
        }

        for binding in &reflection.samplers {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material textures"),
            layout: &program.pipeline.get_bind_group_layout(TEXTURE_GROUP),
            entries: &entries,
        }))
    }

    fn uniform_bind_group(&self, program: &Program) -> Option<wgpu::BindGroup> {
        if program.reflection.uniform_size == 0 {
            return None;
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Draw uniforms"),
                contents: &self.uniform_data,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw uniforms"),
            layout: &program.pipeline.get_bind_group_layout(UNIFORM_GROUP),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        }))
    }
}

impl GraphicsBackend for WgpuBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramId, RenderError> {
        let reflection = ProgramReflection::from_wgsl(source.name, source.wgsl)?;
        let pipeline = self.create_pipeline(source)?;

        log::debug!(
            "Compiled program {} ({} uniforms, {} textures)",
            source.name,
            reflection.uniforms.len(),
            reflection.textures.len()
        );

        self.programs.push(Program {
            name: source.name.to_string(),
            pipeline,
            reflection,
        });

        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn upload_geometry(&mut self, geometry: &GeometryData) -> Result<GeometryId, RenderError> {
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex buffer"),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let indices = geometry.indices.as_ref().map(|indices| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                })
        });

        self.next_geometry += 1;
        let id = GeometryId(self.next_geometry);
        self.geometries.insert(id, GpuGeometry { vertices, indices });
        Ok(id)
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureId, RenderError> {
        texture.validate()?;

        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.textures
            .insert(id, create_texture(&self.device, &self.queue, texture));
        Ok(id)
    }

    fn release_geometry(&mut self, geometry: GeometryId) {
        self.geometries.remove(&geometry);
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn use_program(&mut self, program: ProgramId) {
        let size = self
            .program(program)
            .map(|program| program.reflection.uniform_size)
            .unwrap_or(0);

        self.current_program = Some(program);
        self.uniform_data.clear();
        self.uniform_data.resize(size, 0);
        self.texture_units.clear();
        self.texture_uniforms.clear();
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        let Some(program_id) = self.current_program else {
            log::warn!("Uniform {name} set without a program");
            return;
        };

        if let UniformValue::TextureUnit(unit) = value {
            self.texture_uniforms.insert(name.to_string(), *unit);
            return;
        }

        let slot = self
            .program(program_id)
            .and_then(|program| program.reflection.uniforms.get(name).copied());

        let written = match slot {
            Some(slot) => value.write_bytes(&mut self.uniform_data, slot.offset, slot.stride),
            None => false,
        };

        if !written && self.warned_uniforms.insert((program_id, name.to_string())) {
            log::warn!("Ignoring uniform {name} for program {}", program_id.0);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.texture_units.insert(unit, texture);
    }

    fn bind_geometry(&mut self, geometry: GeometryId) {
        self.current_geometry = Some(geometry);
    }

    fn draw(&mut self, call: DrawCall) {
        let (Some(program_id), Some(geometry_id)) = (self.current_program, self.current_geometry)
        else {
            log::warn!("Draw without a program or geometry, skipping");
            return;
        };

        let (Some(program), Some(geometry)) = (
            self.program(program_id),
            self.geometries.get(&geometry_id),
        ) else {
            log::warn!("Draw references released resources, skipping");
            return;
        };

        let draw = PendingDraw {
            pipeline: program.pipeline.clone(),
            uniforms: self.uniform_bind_group(program),
            textures: self.texture_bind_group(program),
            vertices: geometry.vertices.clone(),
            indices: geometry.indices.clone(),
            call,
        };

        self.pending.push(draw);
    }
}

fn create_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };

    let format = if data.srgb {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&data.name),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.pixels,
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: None,
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    GpuTexture {
        _texture: texture,
        view,
    }
}
