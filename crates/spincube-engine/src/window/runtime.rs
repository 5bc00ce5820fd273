use anyhow::{Context, Result, anyhow};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuInit, WgpuContext};
use crate::error::RenderError;
use crate::render::{LoopConfig, RenderLoop};
use crate::shader::ShaderSource;
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "spincube".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Entry point for the windowed viewer.
pub struct Runtime;

impl Runtime {
    /// Opens one window and spins the cube in it until the window is closed or
    /// Escape is pressed.
    ///
    /// Fails if the window, the GPU or the render loop cannot be brought up, or
    /// if the context is lost while running.
    pub fn run(
        window: RuntimeConfig,
        gpu_init: GpuInit,
        loop_config: LoopConfig,
        source: ShaderSource,
    ) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(window, gpu_init, loop_config, source);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    render_loop: RenderLoop<WgpuContext<'this>>,
}

struct AppState {
    window_config: RuntimeConfig,
    gpu_init: GpuInit,
    loop_config: LoopConfig,
    source: ShaderSource,

    entry: Option<WindowEntry>,
    error: Option<anyhow::Error>,
    exit_requested: bool,
}

impl AppState {
    fn new(
        window_config: RuntimeConfig,
        gpu_init: GpuInit,
        loop_config: LoopConfig,
        source: ShaderSource,
    ) -> Self {
        Self {
            window_config,
            gpu_init,
            loop_config,
            source,
            entry: None,
            error: None,
            exit_requested: false,
        }
    }

    fn create_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.window_config.title.clone())
            .with_inner_size(self.window_config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let loop_config = self.loop_config.clone();
        let source = &self.source;

        WindowEntryTryBuilder {
            clock: FrameClock::new(),
            window,
            render_loop_builder: |w| build_render_loop(w, gpu_init, loop_config, source),
        }
        .try_build()
    }

    /// Drops the window and its GPU resources, then stops the event loop.
    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.entry = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error.get_or_insert(err);
        self.request_exit(event_loop);
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        entry.with_render_loop_mut(|render_loop| {
            render_loop.context_mut().resize(size);
            render_loop.resize(size.width, size.height);
        });
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let result = entry.with_mut(|fields| -> Result<bool, RenderError> {
            let time = fields.clock.tick();
            fields.render_loop.tick(&time)?;
            fields.render_loop.present()?;
            Ok(fields.render_loop.is_drawable())
        });

        match result {
            Ok(true) => entry.with_window(|w| w.request_redraw()),
            // Minimized: the next `Resized` re-arms the redraw.
            Ok(false) => log::debug!("surface is empty; pausing redraws"),
            Err(err) if err.is_fatal() => {
                self.fail(event_loop, anyhow!(err).context("render loop stopped"));
            }
            Err(err) => {
                log::warn!("frame dropped: {err}");
                entry.with_window(|w| w.request_redraw());
            }
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        match self.create_entry(event_loop) {
            Ok(mut entry) => {
                // GPU bring-up may take a while; start the rotation from the first frame.
                entry.with_clock_mut(|clock| clock.restart());
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
            }
            Err(err) => self.fail(event_loop, err.context("failed to start viewer")),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Frames are paced by `request_redraw` after each present.
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed");
                self.request_exit(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } if is_escape_press(&event) => {
                log::info!("escape pressed");
                self.request_exit(event_loop);
            }

            WindowEvent::Resized(new_size) => self.resize(new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self
                    .entry
                    .as_ref()
                    .map(|entry| entry.with_window(|w| w.inner_size()))
                {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}

fn build_render_loop<'w>(
    window: &'w Window,
    gpu_init: GpuInit,
    loop_config: LoopConfig,
    source: &ShaderSource,
) -> Result<RenderLoop<WgpuContext<'w>>> {
    let gpu = pollster::block_on(Gpu::new(window, gpu_init))
        .context("GPU initialization failed for window")?;

    let mut render_loop = RenderLoop::new(WgpuContext::new(gpu), loop_config);
    render_loop
        .initialize(source)
        .map_err(|err| anyhow!(err))
        .context("failed to initialize render loop")?;

    Ok(render_loop)
}

fn is_escape_press(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && !event.repeat
        && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
}
