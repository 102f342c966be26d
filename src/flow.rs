//! Frame timing and the application event loop.
//!
//! [`RenderLoop`] is the per-refresh glue: it turns tick timestamps into
//! elapsed time, runs the update hook and then, if the surface has a frame,
//! the render hook. [`run`] opens a window and drives a `RenderLoop` from
//! winit's `RedrawRequested` events.
//!
//! # Lifecycle
//!
//! Each tick follows this pattern:
//! 1. Compute the delta since the previous tick (zero on the first one)
//! 2. Call `on_update` with that delta
//! 3. Ask the drawable source for this refresh's target
//! 4. Call `on_render` with the target, or skip rendering if there is none

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{config::EngineConfig, context::Context, gpu::DrawableSource, render::Frame};

/// Receiver of the loop's update and render hooks.
///
/// `T` is the render target type handed out by the loop's drawable source.
pub trait RenderDelegate<T> {
    /// Advance logic by `dt`. Runs on every tick, also when nothing is drawn.
    fn on_update(&mut self, dt: Duration);

    /// Draw into `target` and schedule it for presentation.
    fn on_render(&mut self, target: T) -> anyhow::Result<()>;

    /// The drawable area changed size, in physical pixels.
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// Release anything that might still block the control thread.
    fn on_shutdown(&mut self) {}
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Rendered,
    /// No drawable was available; logic time still advanced.
    Skipped,
}

pub struct RenderLoop<T> {
    last_frame: Option<Instant>,
    delegate: Box<dyn RenderDelegate<T>>,
}

impl<T> RenderLoop<T> {
    pub fn new(delegate: Box<dyn RenderDelegate<T>>) -> Self {
        Self {
            last_frame: None,
            delegate,
        }
    }

    /// Runs one refresh at `now`.
    ///
    /// Timestamps are expected to be monotonic; one that goes backwards
    /// counts as zero elapsed time.
    pub fn tick(
        &mut self,
        now: Instant,
        drawables: &mut dyn DrawableSource<Target = T>,
    ) -> anyhow::Result<Tick> {
        let dt = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_frame = Some(now);

        self.delegate.on_update(dt);

        match drawables.next_drawable()? {
            Some(target) => {
                self.delegate.on_render(target)?;
                Ok(Tick::Rendered)
            }
            None => {
                log::trace!("no drawable available, skipping render");
                Ok(Tick::Skipped)
            }
        }
    }

    pub fn delegate(&self) -> &dyn RenderDelegate<T> {
        self.delegate.as_ref()
    }

    pub fn delegate_mut(&mut self) -> &mut dyn RenderDelegate<T> {
        self.delegate.as_mut()
    }

    pub fn shutdown(&mut self) {
        self.delegate.on_shutdown();
    }
}

/// Builds the app's delegate once the window and GPU are ready.
pub type SceneConstructor =
    Box<dyn FnOnce(&Context, &EngineConfig) -> anyhow::Result<Box<dyn RenderDelegate<Frame>>>>;

/// Everything that exists once the window is up. The loop is declared first
/// so scene pools drain before the context and its poller go away.
struct AppState {
    render_loop: RenderLoop<Frame>,
    ctx: Context,
}

// `state` is declared before the runtime so the window and GPU objects are
// released before the runtime shuts down.
pub struct App {
    state: Option<AppState>,
    async_runtime: tokio::runtime::Runtime,
    config: EngineConfig,
    constructor: Option<SceneConstructor>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig, constructor: SceneConstructor) -> anyhow::Result<Self> {
        Ok(Self {
            state: None,
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            constructor: Some(constructor),
            error: None,
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attributes =
            Window::default_attributes().with_title(self.config.window_title.clone());
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let ctx = self
            .async_runtime
            .block_on(Context::new(window, &self.config))?;
        let constructor = self
            .constructor
            .take()
            .ok_or_else(|| anyhow::anyhow!("scene constructor already consumed"))?;
        let delegate = constructor(&ctx, &self.config)?;
        Ok(AppState {
            render_loop: RenderLoop::new(delegate),
            ctx,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if let Some(state) = self.state.as_mut() {
            state.render_loop.shutdown();
        }
        self.error.get_or_insert(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                state.ctx.window().request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e.context("App initialization failed")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                state.render_loop.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.ctx.resize(size.width, size.height);
                state
                    .render_loop
                    .delegate_mut()
                    .on_resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                // invoke main render loop
                state.ctx.window().request_redraw();
                if let Err(e) = state.render_loop.tick(Instant::now(), &mut state.ctx) {
                    self.fail(event_loop, e.context("Unable to render"));
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.render_loop.shutdown();
        }
    }
}

/// Opens a window and renders the delegate built by `constructor` until the
/// window is closed or a tick fails.
pub fn run(config: EngineConfig, constructor: SceneConstructor) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        log::warn!("Could not initialize logger: {}", e);
    }
    config.validate()?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, constructor)?;

    event_loop.run_app(&mut app)?;
    app.state.take();

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
