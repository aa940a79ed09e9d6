mod texture;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::Projection;
use crate::config::SnowConfig;
use crate::error::{GpuError, ShaderError, SnowfallError, TextureError};
use crate::geometry::ParticleGeometry;
use crate::render_loop::{Frame, FrameSink};
use crate::shader::{ShaderProgram, FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::textures::SnowflakeImage;
use crate::vertex::DriftParams;
use crate::wind::WIND_HISTORY_LEN;

pub use texture::SnowTexture;

/// Additive blending: flakes layer brightness instead of occluding.
const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

const WIND_BUFFER_SIZE: u64 = (WIND_HISTORY_LEN * std::mem::size_of::<f32>()) as u64;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    time: f32,
    billboard_size: f32,
    wind_scale: f32,
    ticks_per_second: f32,
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffers: Vec<wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    frame_buffer: wgpu::Buffer,
    wind_buffer: wgpu::Buffer,
    uniform_group: u32,
    uniform_bind_group: wgpu::BindGroup,
    texture_group: u32,
    texture_layout: wgpu::BindGroupLayout,
    snow_texture: Option<SnowTexture>,
    projection: Projection,
    projection_matrix: Mat4,
    drift: DriftParams,
    clear_color: wgpu::Color,
}

impl GpuState {
    /// Create the surface, upload the static geometry and build the pipeline.
    ///
    /// `geometry` is checked before anything is uploaded; it is never
    /// touched again afterwards.
    pub async fn new(
        window: Arc<Window>,
        geometry: &ParticleGeometry,
        program: &ShaderProgram,
        snow: &SnowConfig,
    ) -> Result<Self, SnowfallError> {
        geometry.validate()?;
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(GpuError::from)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::from)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format =
            pick_surface_format(&surface_caps.formats).ok_or(GpuError::UnsupportedSurface)?;
        if surface_format.is_srgb() {
            log::warn!("no linear surface format, colours will be sRGB-encoded");
        }
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(GpuError::UnsupportedSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "surface configured {}x{} as {:?}",
            config.width,
            config.height,
            config.format
        );

        let attribute_names = program.attributes().iter().map(|a| a.name);
        let vertex_buffers: Vec<wgpu::Buffer> = attribute_names
            .zip(geometry.attribute_bytes())
            .map(|(name, contents)| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(name),
                    contents,
                    usage: wgpu::BufferUsages::VERTEX,
                })
            })
            .collect();

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: geometry.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::debug!(
            "uploaded {} vertices and {} indices",
            geometry.vertex_count(),
            geometry.index_count()
        );

        let mut projection = Projection::new(snow.fov_y, 1.0, snow.near, snow.far);
        projection.resize(config.width, config.height);
        let projection_matrix = projection.matrix();

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let wind_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wind History Buffer"),
            size: WIND_BUFFER_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (uniform_group, texture_group) = bind_group_indices(program)?;

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Bind Group Layout"),
                entries: &[
                    uniform_layout_entry(program.frame_uniforms().binding),
                    uniform_layout_entry(program.wind_history().binding),
                ],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: program.frame_uniforms().binding,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: program.wind_history().binding,
                    resource: wind_buffer.as_entire_binding(),
                },
            ],
        });

        let texture_layout = texture::bind_group_layout(&device, program);

        let mut group_layouts = [&uniform_bind_group_layout, &texture_layout];
        if uniform_group == 1 {
            group_layouts.swap(0, 1);
        }

        // Pipeline creation reports WGSL problems naga let through (backend
        // limits, layout mismatches) as validation errors; surface them as a
        // link failure instead of a panic in the uncaptured error handler.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Snow Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Snow Fragment Shader"),
            source: wgpu::ShaderSource::Wgsl(program.fragment_source().into()),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

        let vertex_layouts = program.vertex_buffer_layouts();
        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &vertex_layouts,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(ADDITIVE_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(ShaderError::Link {
                log: error.to_string(),
            }
            .into());
        }
        log::debug!("render pipeline created");

        let [r, g, b, a] = snow.clear_color;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            render_pipeline,
            vertex_buffers,
            index_buffer,
            index_count: geometry.index_count(),
            frame_buffer,
            wind_buffer,
            uniform_group,
            uniform_bind_group,
            texture_group,
            texture_layout,
            snow_texture: None,
            projection,
            projection_matrix,
            drift: snow.drift(),
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    /// Upload the decoded snowflake and bind it for drawing.
    ///
    /// Images beyond the device's 2D texture limit are rejected before any
    /// GPU call is made.
    pub fn set_texture(
        &mut self,
        program: &ShaderProgram,
        image: &SnowflakeImage,
    ) -> Result<(), TextureError> {
        image.fits_within(self.device.limits().max_texture_dimension_2d)?;
        self.snow_texture = Some(SnowTexture::upload(
            &self.device,
            &self.queue,
            &self.texture_layout,
            program,
            image,
        ));
        log::debug!("snowflake texture {}x{} bound", image.width, image.height);
        Ok(())
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.projection.resize(new_size.width, new_size.height);
            self.projection_matrix = self.projection.matrix();
        }
    }

    /// Reconfigure the surface with its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn update_uniforms(&self, frame: &Frame<'_>) {
        let uniforms = FrameUniforms {
            projection: self.projection_matrix.to_cols_array_2d(),
            view: frame.view.to_cols_array_2d(),
            time: frame.time,
            billboard_size: self.drift.billboard_size,
            wind_scale: self.drift.wind_scale,
            ticks_per_second: self.drift.ticks_per_second,
        };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.queue
            .write_buffer(&self.wind_buffer, 0, bytemuck::cast_slice(frame.wind_history));
    }
}

impl FrameSink for GpuState {
    type Error = wgpu::SurfaceError;

    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), wgpu::SurfaceError> {
        self.update_uniforms(frame);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(snow_texture) = &self.snow_texture {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_bind_group(self.uniform_group, &self.uniform_bind_group, &[]);
                render_pass.set_bind_group(self.texture_group, &snow_texture.bind_group, &[]);
                for (slot, buffer) in self.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

/// Prefer a non-sRGB surface so clear colours and additive blending work
/// on the raw channel values, as a plain 8-bit canvas does.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
}

fn uniform_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Uniforms and the texture each need their own bind group, numbered 0 and 1.
fn bind_group_indices(program: &ShaderProgram) -> Result<(u32, u32), ShaderError> {
    let uniforms = program.frame_uniforms().group;
    let texture = program.texture().group;
    let consistent = program.wind_history().group == uniforms
        && program.sampler().group == texture
        && uniforms != texture
        && uniforms < 2
        && texture < 2;
    if consistent {
        Ok((uniforms, texture))
    } else {
        Err(ShaderError::Link {
            log: format!(
                "uniforms must share one bind group and the texture/sampler the other \
                 (groups 0 and 1); found frame={}, wind={}, texture={}, sampler={}",
                uniforms,
                program.wind_history().group,
                texture,
                program.sampler().group
            ),
        })
    }
}
