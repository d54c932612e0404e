use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    config::EngineConfig, demo::DemoState, engine, error::RenderError, frame_timer::FrameTimer,
    rendering::renderer::Renderer,
};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

struct App {
    config: EngineConfig,
    renderer: Option<Renderer>,
    demo_state: DemoState,
    imgui: Option<ImguiState>,
    timer: FrameTimer,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig, demo_state: DemoState) -> Self {
        Self {
            timer: FrameTimer::new(config.frame_budget),
            config,
            renderer: None,
            demo_state,
            imgui: None,
            error: None,
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // INI support is broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut imgui = Self::setup_imgui(&window);
        let renderer = pollster::block_on(Renderer::new(
            window,
            &self.config,
            &mut imgui.context,
        ))
        .context("Failed to create renderer")?;

        self.imgui = Some(imgui);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        imgui.platform.handle_event::<()>(
            imgui.context.io_mut(),
            &renderer.window,
            &Event::WindowEvent {
                window_id,
                event: event.clone(),
            },
        );
        let ui_wants_mouse = imgui.context.io().want_capture_mouse;

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                renderer.resize(new_size);
            }
            WindowEvent::RedrawRequested => {
                let delta = self.timer.begin_frame();
                imgui.context.io_mut().update_delta_time(delta);

                renderer.window.request_redraw();

                if let Err(e) = imgui
                    .platform
                    .prepare_frame(imgui.context.io_mut(), &renderer.window)
                {
                    log::warn!("Failed to prepare imgui frame: {e}");
                }

                let ui = imgui.context.new_frame();

                let update = engine::update(
                    &mut self.demo_state,
                    renderer,
                    ui,
                    &self.timer,
                    delta,
                    self.config.show_inspector,
                );
                if let Err(e) = update {
                    self.fail(event_loop, e.context("Error during engine::update"));
                    return;
                }

                imgui.platform.prepare_render(ui, &renderer.window);

                match renderer.render(&self.demo_state.scene, &mut imgui.context) {
                    Ok(_) => {}
                    Err(RenderError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        renderer.resize(renderer.size);
                    }
                    Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                        log::warn!("Timeout");
                    }
                    Err(e) => {
                        self.fail(event_loop, anyhow::Error::new(e).context("Rendering failed"));
                        return;
                    }
                }

                self.timer.throttle();
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let pressed = state == ElementState::Pressed;
                self.demo_state.orbit.set_dragging(pressed && !ui_wants_mouse);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.demo_state
                    .orbit
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } if !ui_wants_mouse => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
                };
                self.demo_state.orbit.zoom(lines);
            }
            _ => (),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    log::info!("Frame budget {:?}", config.frame_budget);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let demo_state = DemoState::new().context("Failed to create demo state")?;
    let mut app = App::new(config, demo_state);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
