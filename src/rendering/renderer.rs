use std::sync::Arc;

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    config::EngineConfig,
    error::RenderError,
    rendering::{
        backend::wgpu_backend::WgpuBackend, depth_texture::DepthTexture,
        imgui_renderer::ImguiRenderer, pipeline::Pipeline, FrameStats,
    },
    scene_graph::Scene,
};

/// Owns the window surface and everything needed to turn a scene into a frame.
pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,

    depth_texture: DepthTexture,
    backend: WgpuBackend,
    pipeline: Pipeline,
    imgui: ImguiRenderer,

    clear_color: wgpu::Color,
    last_stats: FrameStats,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        config: &EngineConfig,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let surface_config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .context("Surface is not supported by the adapter")?;
        surface.configure(&device, &surface_config);

        log::info!(
            "Using {} ({:?}), surface format {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            surface_config.format
        );

        let depth_texture = DepthTexture::new(&device, &surface_config, "Depth Texture");

        let backend = WgpuBackend::new(
            device.clone(),
            queue.clone(),
            surface_config.format,
            DepthTexture::DEPTH_FORMAT,
        );

        let imgui = ImguiRenderer::new(&device, &queue, surface_config.format, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            surface_config,
            depth_texture,
            backend,
            pipeline: Pipeline::new(),
            imgui,
            clear_color: config.clear_color,
            last_stats: FrameStats::default(),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            log::info!("Resizing to {}x{}", new_size.width, new_size.height);
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_texture.resize(&self.device, &self.surface_config);
        }
    }

    pub fn aspect(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height.max(1) as f32
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn backend_mut(&mut self) -> &mut WgpuBackend {
        &mut self.backend
    }

    pub fn render(
        &mut self,
        scene: &Scene,
        imgui_context: &mut imgui::Context,
    ) -> Result<FrameStats, RenderError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let aspect = self.aspect();
        let stats = match self.pipeline.render(scene, &mut self.backend, aspect) {
            Ok(stats) => stats,
            Err(e) => {
                self.backend.discard_pending();
                return Err(e);
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.backend.flush(
            &mut encoder,
            &view,
            self.depth_texture.view(),
            self.clear_color,
        );

        self.imgui
            .render(&view, imgui_context, &self.device, &self.queue, &mut encoder);

        self.queue.submit([encoder.finish()]);
        output.present();

        self.last_stats = stats;
        Ok(stats)
    }
}
