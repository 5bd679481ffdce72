use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::controls::{DragGesture, OrbitControls};
use crate::driver::FrameDriver;
use crate::render::{Renderer, RendererConfig};
use crate::scene::Scene;

/// Pixels of wheel travel treated as one zoom step.
const WHEEL_PIXELS_PER_STEP: f32 = 50.0;

/// Owns the whole running scene: graph, camera, controls, driver and
/// renderer. Everything that used to be module-level state in the
/// original demo lives here with a single owner.
pub struct App {
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    driver: FrameDriver,
    renderer_config: RendererConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    cursor: Vec2,
    last_error: Option<anyhow::Error>,
    title: String,
}

impl App {
    pub fn new(
        scene: Scene,
        camera: Camera,
        controls: OrbitControls,
        renderer_config: RendererConfig,
        title: impl Into<String>,
    ) -> Self {
        Self {
            scene,
            camera,
            controls,
            driver: FrameDriver::new(),
            renderer_config,
            window: None,
            renderer: None,
            cursor: Vec2::ZERO,
            last_error: None,
            title: title.into(),
        }
    }

    /// Runs the event loop until the window closes or the driver halts.
    /// A fatal render failure is returned to the caller instead of being
    /// swallowed by the loop.
    pub fn run(mut self) -> Result<Scene> {
        let event_loop = EventLoop::new()
            .map_err(|err| WindowInitError::new("event loop", &err))
            .context("windowing is unavailable")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        if let Some(err) = self.last_error.take() {
            return Err(err);
        }
        Ok(self.scene)
    }

    pub fn ticks(&self) -> u64 {
        self.driver.ticks()
    }

    fn tick(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Err(err) = self.driver.tick(
            &mut self.scene,
            &mut self.controls,
            &mut self.camera,
            renderer,
        ) {
            self.last_error = Some(err.into());
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.last_error = Some(WindowInitError::new("window", &err).into());
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.camera.set_viewport(size.width, size.height);

        match block_on(Renderer::new(
            Arc::clone(&window),
            &self.scene,
            self.renderer_config,
        )) {
            Ok(renderer) => {
                info!("window ready at {}x{}", size.width, size.height);
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(err) => {
                self.last_error = Some(err.context("failed to initialize the renderer"));
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let owns_window = self
            .renderer
            .as_ref()
            .is_some_and(|renderer| renderer.window_id() == window_id);
        if !owns_window {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.driver.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
                self.camera.set_viewport(size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = self.window.as_ref() {
                    let size = window.inner_size();
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.resize(PhysicalSize::new(size.width, size.height));
                    }
                    self.camera.set_viewport(size.width, size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let gesture = match button {
                    MouseButton::Left => Some(DragGesture::Orbit),
                    MouseButton::Right => Some(DragGesture::Pan),
                    _ => None,
                };
                match (state, gesture) {
                    (ElementState::Pressed, Some(gesture)) => {
                        self.controls.begin_drag(gesture, self.cursor);
                    }
                    (ElementState::Released, Some(_)) => {
                        self.controls.end_drag();
                    }
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                self.controls.drag_to(self.cursor);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => lines,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / WHEEL_PIXELS_PER_STEP
                    }
                };
                self.controls.zoom_by(steps);
            }
            WindowEvent::RedrawRequested => {
                self.tick(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Re-arming the next frame is a flag check: once the driver stops,
        // no further redraw is requested and the loop winds down.
        if !self.driver.is_running() {
            event_loop.exit();
            return;
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

/// Window or event-loop creation failure, kept as its own type so callers
/// can fall back to headless operation.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn new(stage: &str, err: &dyn fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}
