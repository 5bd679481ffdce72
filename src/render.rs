use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::info;
use serde::{Deserialize, Serialize};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::driver::{DrawError, RenderBackend};
use crate::geometry::{Mesh, VERTEX_STRIDE};
use crate::scene::{Light, Renderable, Scene, ShadowProjection};

/// Shadow map filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowFilter {
    /// Single comparison tap per fragment.
    Hard,
    /// 3x3 percentage-closer filtering.
    Soft,
}

/// Renderer-level shadow quality switches; per-light map size and clip
/// planes live on the light itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub filter: ShadowFilter,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: ShadowFilter::Soft,
        }
    }
}

/// Static renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RendererConfig {
    pub shadows: ShadowSettings,
}

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.03,
    g: 0.03,
    b: 0.05,
    a: 1.0,
};
const SHADOW_BIAS: f32 = 0.002;

/// GPU renderer backed by wgpu that draws a scene snapshot each frame.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    shadow_globals_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    color_sampler: wgpu::Sampler,
    default_color_view: wgpu::TextureView,
    texture_cache: HashMap<usize, wgpu::TextureView>,
    mesh_cache: HashMap<usize, MeshBuffers>,
    shadow: ShadowMap,
    shadows: ShadowSettings,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window. The scene is
    /// only inspected for its shadow casting light; geometry and textures
    /// are uploaded lazily on first draw.
    pub async fn new(window: Arc<Window>, scene: &Scene, config: RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let depth = DepthBuffer::create(&device, size.width, size.height);

        let shadow_projection = scene
            .point_light()
            .and_then(|light| match light {
                Light::Point { shadow, .. } => *shadow,
                Light::Ambient { .. } => None,
            })
            .filter(|_| config.shadows.enabled);
        let shadow = ShadowMap::create(&device, shadow_projection);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewer-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        // Main pass globals: uniform block, shadow map, comparison sampler.
        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        // The shadow pass reads the same uniform buffer but must not bind
        // the map it is writing, hence the second layout.
        let shadow_globals_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shadow-globals-layout"),
                entries: &[uniform_entry(0)],
            });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: global_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow.sampler),
                },
            ],
        });
        let shadow_globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-globals-bind-group"),
            layout: &shadow_globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: (3 * std::mem::size_of::<f32>()) as u64,
                    shader_location: 1,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: (6 * std::mem::size_of::<f32>()) as u64,
                    shader_location: 2,
                },
            ],
        };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewer-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout.clone()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let shadow_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shadow-pipeline-layout"),
                bind_group_layouts: &[&shadow_globals_layout, &object_layout],
                push_constant_ranges: &[],
            });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow-pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: ShadowMap::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview: None,
            cache: None,
        });

        let color_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("color-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let default_color_view = upload_rgba(
            &device,
            &queue,
            1,
            1,
            &[255, 255, 255, 255],
            "default-color-map",
        );

        info!(
            "renderer ready: {}x{} {:?}, shadows {}",
            size.width,
            size.height,
            surface_format,
            if shadow.projection.is_some() {
                "on"
            } else {
                "off"
            }
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config: surface_config,
            size,
            depth,
            pipeline,
            shadow_pipeline,
            global_buffer,
            global_bind_group,
            shadow_globals_bind_group,
            object_layout,
            color_sampler,
            default_color_view,
            texture_cache: HashMap::new(),
            mesh_cache: HashMap::new(),
            shadow,
            shadows: config.shadows,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn update_globals(&self, scene: &Scene, camera: &Camera) {
        let (light_position, light_color, light_intensity, shadow_projection) =
            match scene.point_light() {
                Some(Light::Point {
                    color,
                    intensity,
                    position,
                    shadow,
                }) => (*position, *color, *intensity, *shadow),
                _ => (Vec3::new(3.0, 5.0, -3.0), Vec3::ONE, 0.0, None),
            };
        let (ambient_color, ambient_intensity) = scene.ambient();

        let shadow_active = self.shadow.projection.is_some() && shadow_projection.is_some();
        let light_view_proj = shadow_projection
            .filter(|_| shadow_active)
            .map(|projection| light_matrix(light_position, &projection))
            .unwrap_or(Mat4::IDENTITY);
        let mode = if !shadow_active {
            0.0
        } else if self.shadows.filter == ShadowFilter::Hard {
            1.0
        } else {
            2.0
        };

        let uniform = GlobalUniform {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            light_position: light_position.extend(light_intensity).into(),
            light_color: light_color.extend(1.0).into(),
            ambient_color: ambient_color.extend(ambient_intensity).into(),
            shadow_params: [mode, 1.0 / self.shadow.size as f32, SHADOW_BIAS, 0.0],
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn render(&mut self, scene: &Scene) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        // Upload any geometry or textures this frame sees for the first
        // time; the store is insert-only so indices stay valid.
        for (index, renderable) in scene.renderables().iter().enumerate() {
            self.ensure_mesh_uploaded(index, &renderable.mesh);
            self.ensure_texture_uploaded(index, renderable);
        }

        let mut bind_groups = Vec::with_capacity(scene.renderables().len());
        for (index, renderable) in scene.renderables().iter().enumerate() {
            let model = renderable.transform.matrix();
            let normal = Mat3::from_mat4(model).inverse().transpose();
            let constants = ObjectConstants {
                model: model.to_cols_array_2d(),
                normal: mat3_to_3x4(normal),
                color: renderable.material.base_color.extend(1.0).into(),
                material: [
                    renderable.material.metalness,
                    renderable.material.roughness,
                    if renderable.receive_shadow { 1.0 } else { 0.0 },
                    0.0,
                ],
            };

            let object_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("object-uniform"),
                    contents: bytemuck::bytes_of(&constants),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
            let color_view = self
                .texture_cache
                .get(&index)
                .unwrap_or(&self.default_color_view);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("object-bind-group"),
                layout: &self.object_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: object_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(color_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.color_sampler),
                    },
                ],
            });
            bind_groups.push(bind_group);
        }

        if self.shadow.projection.is_some() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.shadow_pipeline);
            pass.set_bind_group(0, &self.shadow_globals_bind_group, &[]);
            for (index, renderable) in scene.renderables().iter().enumerate() {
                if !renderable.cast_shadow {
                    continue;
                }
                let Some(mesh) = self.mesh_cache.get(&index) else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, &bind_groups[index], &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.global_bind_group, &[]);

        for (index, _renderable) in scene.renderables().iter().enumerate() {
            let Some(mesh) = self.mesh_cache.get(&index) else {
                continue;
            };
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.set_bind_group(1, &bind_groups[index], &[]);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        drop(pass); // explicit to satisfy lifetimes on some backends
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn ensure_mesh_uploaded(&mut self, index: usize, mesh: &Mesh) {
        if self.mesh_cache.contains_key(&index) {
            return;
        }
        let buffers = MeshBuffers::from_mesh(&self.device, mesh, &format!("mesh-{index}"));
        self.mesh_cache.insert(index, buffers);
    }

    fn ensure_texture_uploaded(&mut self, index: usize, renderable: &Renderable) {
        if self.texture_cache.contains_key(&index) {
            return;
        }
        let Some(image) = renderable.material.color_map.as_ref() else {
            return;
        };
        let view = upload_rgba(
            &self.device,
            &self.queue,
            image.width,
            image.height,
            &image.pixels,
            &format!("color-map-{index}"),
        );
        self.texture_cache.insert(index, view);
    }
}

impl RenderBackend for Renderer {
    fn draw(&mut self, scene: &Scene, camera: &Camera) -> Result<(), DrawError> {
        self.update_globals(scene, camera);
        match self.render(scene) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                // Reconfiguring recovers on the next frame.
                let size = self.window.inner_size();
                self.resize(size);
                Err(DrawError::FrameDropped(
                    "surface lost or outdated, reconfigured".into(),
                ))
            }
            Err(wgpu::SurfaceError::Timeout) => {
                Err(DrawError::FrameDropped("surface timeout".into()))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(DrawError::ContextLost("GPU is out of memory".into()))
            }
            Err(err) => Err(DrawError::ContextLost(err.to_string())),
        }
    }
}

/// View-projection of the shadow casting light, aimed at the scene origin.
fn light_matrix(position: Vec3, projection: &ShadowProjection) -> Mat4 {
    let direction = (-position).normalize_or_zero();
    let up = if direction.cross(Vec3::Y).length_squared() > f32::EPSILON {
        Vec3::Y
    } else {
        Vec3::Z
    };
    let view = Mat4::look_at_rh(position, Vec3::ZERO, up);
    let proj = Mat4::perspective_rh(
        90.0_f32.to_radians(),
        1.0,
        projection.near.max(1e-3),
        projection.far.max(projection.near + 1e-3),
    );
    proj * view
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
    label: &str,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct ShadowMap {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: u32,
    projection: Option<ShadowProjection>,
}

impl ShadowMap {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// A 1x1 placeholder map is created even with shadows disabled so the
    /// global bind group layout stays uniform.
    fn create(device: &wgpu::Device, projection: Option<ShadowProjection>) -> Self {
        let size = projection.map(|p| p.map_size.max(1)).unwrap_or(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
            sampler,
            size,
            projection,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
    ambient_color: [f32; 4],
    shadow_params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    material: [f32; 4],
}

const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    ambient_color: vec4<f32>,
    shadow_params: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    material: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
@group(0) @binding(1)
var shadow_map: texture_depth_2d;
@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;
@group(1) @binding(1)
var color_map: texture_2d<f32>;
@group(1) @binding(2)
var color_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    out.uv = input.uv;
    return out;
}

@vertex
fn vs_shadow(input: VertexInput) -> @builtin(position) vec4<f32> {
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    return globals.light_view_proj * world_position;
}

// shadow_params: x = mode (0 off, 1 hard, 2 soft), y = texel size, z = bias.
fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    let mode = globals.shadow_params.x;
    if (mode < 0.5) {
        return 1.0;
    }
    let clip = globals.light_view_proj * vec4<f32>(world_pos, 1.0);
    if (clip.w <= 0.0) {
        return 1.0;
    }
    let ndc = clip.xyz / clip.w;
    let uv = ndc.xy * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5, 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }
    let depth_ref = ndc.z - globals.shadow_params.z;
    if (mode < 1.5) {
        return textureSampleCompareLevel(shadow_map, shadow_sampler, uv, depth_ref);
    }
    let texel = globals.shadow_params.y;
    var sum = 0.0;
    for (var dy = -1; dy <= 1; dy = dy + 1) {
        for (var dx = -1; dx <= 1; dx = dx + 1) {
            let offset = vec2<f32>(f32(dx), f32(dy)) * texel;
            sum = sum + textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, depth_ref);
        }
    }
    return sum / 9.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let albedo = object.color.rgb * textureSample(color_map, color_sampler, input.uv).rgb;
    let metalness = object.material.x;
    let roughness = object.material.y;

    let light_dir = normalize(globals.light_position.xyz - input.world_pos);
    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    let half_dir = normalize(light_dir + view_dir);

    let diffuse = max(dot(normal, light_dir), 0.0) * (1.0 - metalness * 0.5);
    let shininess = mix(64.0, 4.0, roughness);
    let spec_strength = mix(0.04, 1.0, metalness);
    let specular = pow(max(dot(normal, half_dir), 0.0), shininess) * spec_strength;

    let sampled = shadow_factor(input.world_pos);
    var shadow = 1.0;
    if (object.material.z > 0.5) {
        shadow = sampled;
    }

    let intensity = globals.light_position.w;
    let ambient = globals.ambient_color.rgb * globals.ambient_color.w * albedo;
    let direct = globals.light_color.rgb * intensity * shadow
        * (albedo * diffuse + vec3<f32>(specular));
    return vec4<f32>(ambient + direct, object.color.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_matrix_is_finite_for_the_demo_light() {
        let matrix = light_matrix(
            Vec3::new(30.0, 20.0, 20.0),
            &ShadowProjection::default(),
        );
        assert!(matrix.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn light_matrix_handles_a_vertical_light() {
        // A light straight above the target must not produce a degenerate
        // up vector.
        let matrix = light_matrix(Vec3::new(0.0, 50.0, 0.0), &ShadowProjection::default());
        assert!(matrix.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 2 * 64 + 5 * 16);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 64 + 48 + 16 + 16);
    }
}
