//! WebGPU forward renderer for the catalog scene.

mod environment;
mod helpers;
mod mesh;

use catalog_core::model::TextureData;
use catalog_core::scene::{DrawItem, MeshId, Scene};
use environment::Environment;
use fnv::FnvHashMap;
use glam::{Mat4, Vec3};
use helpers::{create_depth_texture, make_scene_pipeline, solid_texture, upload_rgba_texture};
use mesh::{GpuMesh, Vertex};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use web_sys as web;

/// Set from the device-lost callback, polled by the frame loop.
static DEVICE_LOST: AtomicBool = AtomicBool::new(false);

pub fn take_device_lost() -> bool {
    DEVICE_LOST.swap(false, Ordering::SeqCst)
}

const AMBIENT: f32 = 0.9;
const LIGHT_DIR: Vec3 = Vec3::new(3.0, 2.0, 5.0);

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    light: [f32; 4],
    env: [f32; 4],
}

struct GpuTexture {
    // keeps the pointer key alive while cached
    source: Rc<TextureData>,
    _tex: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bgl: wgpu::BindGroupLayout,
    globals_bg: wgpu::BindGroup,
    mesh_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    env_sampler: wgpu::Sampler,
    _white_tex: wgpu::Texture,
    white_view: wgpu::TextureView,
    environment: Environment,
    depth: (wgpu::Texture, wgpu::TextureView),
    meshes: FnvHashMap<MeshId, GpuMesh>,
    textures: FnvHashMap<usize, GpuTexture>,
    width: u32,
    height: u32,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuState {
    pub async fn new(canvas: &web::HtmlCanvasElement) -> anyhow::Result<Self> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No WebGPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;
        device.set_device_lost_callback(|reason, message| {
            log::warn!("[gpu] device lost ({:?}): {}", reason, message);
            DEVICE_LOST.store(true, Ordering::SeqCst);
        });

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                )
            })
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        // the page shows through wherever nothing is drawn
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(catalog_core::SCENE_WGSL.into()),
        });
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bgl"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });
        let mesh_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh_bgl"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pl"),
            bind_group_layouts: &[&globals_bgl, &mesh_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = make_scene_pipeline(&device, &pipeline_layout, &shader, Vertex::layout(), format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("base_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("env_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let (white_tex, white_view) = solid_texture(&device, &queue, "white", [255; 4]);
        let environment = Environment::neutral(&device, &queue);
        let globals_bg =
            Self::make_globals_bg(&device, &globals_bgl, &globals_buf, &environment, &env_sampler);
        let depth = create_depth_texture(&device, width, height);
        log::info!("[gpu] ready {}x{} format={:?} alpha={:?}", width, height, format, alpha_mode);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            globals_buf,
            globals_bgl,
            globals_bg,
            mesh_bgl,
            sampler,
            env_sampler,
            _white_tex: white_tex,
            white_view,
            environment,
            depth,
            meshes: FnvHashMap::default(),
            textures: FnvHashMap::default(),
            width,
            height,
        })
    }

    fn make_globals_bg(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buf: &wgpu::Buffer,
        env: &Environment,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&env.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    pub fn set_environment(&mut self, data: &TextureData) {
        self.environment = Environment::from_texture(&self.device, &self.queue, data);
        self.globals_bg = Self::make_globals_bg(
            &self.device,
            &self.globals_bgl,
            &self.globals_buf,
            &self.environment,
            &self.env_sampler,
        );
    }

    pub fn resize_if_needed(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth = create_depth_texture(&self.device, width, height);
        }
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Free GPU buffers for meshes that left the scene, then any texture
    /// no remaining mesh refers to.
    pub fn release(&mut self, ids: &[MeshId]) {
        if ids.is_empty() {
            return;
        }
        for id in ids {
            if let Some(m) = self.meshes.remove(id) {
                m.destroy();
            }
        }
        self.textures.retain(|_, t| Rc::strong_count(&t.source) > 1);
        log::info!("[gpu] released {} meshes ({} live)", ids.len(), self.meshes.len());
    }

    fn upload_missing(&mut self, draws: &[DrawItem]) {
        for d in draws {
            if self.meshes.contains_key(&d.mesh) {
                continue;
            }
            let key = d.data.material.base_color_texture.as_ref().map(|t| {
                let key = Rc::as_ptr(t) as usize;
                if !self.textures.contains_key(&key) {
                    let (tex, view) = upload_rgba_texture(&self.device, &self.queue, "base_color", t);
                    self.textures.insert(
                        key,
                        GpuTexture {
                            source: Rc::clone(t),
                            _tex: tex,
                            view,
                        },
                    );
                }
                key
            });
            let view = key
                .and_then(|k| self.textures.get(&k))
                .map(|t| &t.view)
                .unwrap_or(&self.white_view);
            let mesh = GpuMesh::new(&self.device, &self.mesh_bgl, &d.data, view, &self.sampler);
            self.meshes.insert(d.mesh, mesh);
        }
    }

    pub fn render(&mut self, scene: &Scene, view_proj: Mat4, eye: Vec3) -> Result<(), wgpu::SurfaceError> {
        let frame = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draws = scene.collect_draws();
        self.upload_missing(&draws);
        self.queue.write_buffer(
            &self.globals_buf,
            0,
            bytemuck::bytes_of(&Globals {
                view_proj: view_proj.to_cols_array_2d(),
                camera_pos: eye.extend(1.0).to_array(),
                light: LIGHT_DIR.normalize().extend(AMBIENT).to_array(),
                env: self.environment.params(),
            }),
        );
        for d in &draws {
            if let Some(m) = self.meshes.get(&d.mesh) {
                m.write_transform(&self.queue, d.world);
            }
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.1,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.globals_bg, &[]);
            for d in &draws {
                if let Some(m) = self.meshes.get(&d.mesh) {
                    m.draw(&mut rpass);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
