//! Snowfall builder and runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::camera::CameraController;
use crate::config::SnowConfig;
use crate::error::{SnowfallError, TextureError};
use crate::geometry::{GeometryBuilder, ParticleGeometry};
use crate::gpu::GpuState;
use crate::input::{Action, InputMapper};
use crate::render_loop::RenderLoop;
use crate::shader::ShaderProgram;
use crate::textures::SnowflakeImage;
use crate::time::FrameTimer;
use crate::wind::Wind;

/// Edge length of the procedural flake used when no image is configured.
const PROCEDURAL_FLAKE_SIZE: u32 = 64;

/// A snowfall effect builder.
///
/// Use method chaining to configure, then call `.run()` to open the window.
///
/// ```ignore
/// Snowfall::new()
///     .with_particle_count(500)
///     .with_texture("snowflake.png")
///     .run()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Snowfall {
    config: SnowConfig,
}

impl Snowfall {
    /// Create a snowfall with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: SnowConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of particles.
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.config.particle_count = count;
        self
    }

    /// Fix the particle generator seed for a reproducible field.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Snowflake image to load (BMP, PNG or JPEG).
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.texture = Some(path.into());
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.config.window_size = (width, height);
        self
    }

    pub fn with_clear_color(mut self, color: [f64; 4]) -> Self {
        self.config.clear_color = color;
        self
    }

    /// Simulated time the first frame starts at.
    pub fn with_initial_time(mut self, seconds: f32) -> Self {
        self.config.initial_time = seconds;
        self
    }

    pub fn config(&self) -> &SnowConfig {
        &self.config
    }

    /// Generate the particle field for this configuration.
    pub fn build_geometry(&self) -> Result<ParticleGeometry, SnowfallError> {
        let builder = GeometryBuilder::new(self.config.particle_count)?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(builder.build(&mut rng))
    }

    /// Open the window and run until it is closed.
    pub fn run(self) -> Result<(), SnowfallError> {
        self.config.validate()?;
        let program = ShaderProgram::snow()?;
        let geometry = self.build_geometry()?;
        log::info!(
            "snowfall: {} particles, {} indices",
            geometry.particle_count(),
            geometry.index_count()
        );

        let event_loop = EventLoop::<SnowEvent>::with_user_event().build()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config, program, geometry, event_loop.create_proxy());
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Events posted to the loop from outside it.
#[derive(Debug)]
pub enum SnowEvent {
    /// The snowflake image finished loading (or failed to).
    TextureLoaded(Result<SnowflakeImage, TextureError>),
}

struct App {
    config: SnowConfig,
    program: ShaderProgram,
    geometry: ParticleGeometry,
    proxy: EventLoopProxy<SnowEvent>,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    camera: CameraController,
    input: InputMapper,
    wind: Wind,
    timer: FrameTimer,
    render_loop: RenderLoop,
    error: Option<SnowfallError>,
}

impl App {
    fn new(
        config: SnowConfig,
        program: ShaderProgram,
        geometry: ParticleGeometry,
        proxy: EventLoopProxy<SnowEvent>,
    ) -> Self {
        let now = Instant::now();
        Self {
            input: InputMapper::new(config.wind_keys),
            wind: Wind::starting_at(config.wind_interval, config.wind_step, now),
            timer: FrameTimer::starting_at(now),
            render_loop: RenderLoop::new(config.initial_time),
            camera: CameraController::new(),
            config,
            program,
            geometry,
            proxy,
            window: None,
            gpu_state: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SnowfallError) {
        log::error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }

    /// Start loading the snowflake off the event loop thread.
    fn request_texture(&self) {
        let proxy = self.proxy.clone();
        match self.config.texture.clone() {
            Some(path) => {
                log::info!("loading snowflake texture {}", path.display());
                std::thread::spawn(move || {
                    let result = SnowflakeImage::load(&path);
                    if proxy.send_event(SnowEvent::TextureLoaded(result)).is_err() {
                        log::debug!("event loop closed before texture arrived");
                    }
                });
            }
            None => {
                let flake = SnowflakeImage::soft_flake(PROCEDURAL_FLAKE_SIZE);
                if proxy.send_event(SnowEvent::TextureLoaded(Ok(flake))).is_err() {
                    log::debug!("event loop closed before texture arrived");
                }
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };

        let now = Instant::now();
        self.wind.update(now);
        let delta = self.timer.lap_at(now);

        match self
            .render_loop
            .tick(delta, self.wind.history(), &self.camera, gpu_state)
        {
            Ok(_) => {}
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("surface {e:?}, reconfiguring");
                gpu_state.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::error!("render error: {e:?}"),
        }
    }
}

impl ApplicationHandler<SnowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.config.window_size;
        let window_attrs = Window::default_attributes()
            .with_title("Snowfall")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(
            window.clone(),
            &self.geometry,
            &self.program,
            &self.config,
        )) {
            Ok(gpu_state) => self.gpu_state = Some(gpu_state),
            Err(err) => return self.fail(event_loop, err),
        }

        self.request_texture();
        window.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: SnowEvent) {
        match event {
            SnowEvent::TextureLoaded(result) => {
                let Some(gpu_state) = &mut self.gpu_state else {
                    return;
                };
                let uploaded =
                    result.and_then(|image| gpu_state.set_texture(&self.program, &image));
                if let Err(err) = uploaded {
                    log::warn!("{err}; using procedural snowflake");
                    let flake = SnowflakeImage::soft_flake(PROCEDURAL_FLAKE_SIZE);
                    if let Err(err) = gpu_state.set_texture(&self.program, &flake) {
                        log::error!("{err}");
                        return;
                    }
                }
                if self.render_loop.activate() {
                    log::info!("snowflake ready, drawing");
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(action) = self.input.handle(&event) {
            match action {
                Action::Drag { dx, dy } => self.camera.apply_drag(dx, dy),
                Action::Wind(direction) => self.wind.nudge(direction),
            }
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!(
                    "closing after {} frames ({} drawn)",
                    self.render_loop.clock().frame(),
                    self.render_loop.draws()
                );
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.wind.update(Instant::now());
    }
}
