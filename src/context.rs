//! Window, surface and device setup.
//!
//! [`Context`] owns everything tied to the window: the wgpu surface and its
//! configuration, the shared [`Renderer`], and the [`DevicePoller`] that keeps
//! completion callbacks flowing while the control thread is busy or blocked.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    config::EngineConfig,
    gpu::DrawableSource,
    render::{Frame, Renderer},
};

pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub renderer: Arc<Renderer>,
    is_surface_configured: bool,
    _poller: DevicePoller,
}

impl Context {
    pub async fn new(window: Arc<Window>, engine: &EngineConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter can present to this window")?;
        log::info!("adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("frame-ngin device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create the device and queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour, so prefer an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no supported formats")?;
        let present_mode = if surface_caps.present_modes.contains(&engine.present_mode) {
            engine.present_mode
        } else {
            log::warn!(
                "present mode {:?} unsupported, falling back to Fifo",
                engine.present_mode
            );
            wgpu::PresentMode::Fifo
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: u32::try_from(engine.in_flight_frames)
                .unwrap_or(u32::MAX)
                .saturating_sub(1)
                .max(1),
        };

        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let poller = DevicePoller::spawn(device.clone())?;
        let renderer = Arc::new(Renderer::new(device, queue, surface_format));

        Ok(Self {
            window,
            surface,
            config,
            renderer,
            is_surface_configured,
            _poller: poller,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.renderer.device, &self.config);
            self.is_surface_configured = true;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.config.width.max(1) as f32 / self.config.height.max(1) as f32
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize(size.width, size.height);
    }
}

impl DrawableSource for Context {
    type Target = Frame;

    fn next_drawable(&mut self) -> anyhow::Result<Option<Frame>> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(None);
        }
        match self.surface.get_current_texture() {
            Ok(surface_texture) => Ok(Some(Frame::new(surface_texture))),
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost or outdated, reconfiguring");
                self.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out waiting for a drawable, skipping frame");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                anyhow::bail!("the surface ran out of memory")
            }
            Err(e) => {
                log::warn!("no drawable this frame: {}", e);
                Ok(None)
            }
        }
    }
}

/// Polls the device on its own thread so completion callbacks run even
/// while the control thread waits inside a frame pool.
///
/// The thread belongs to the poller alone: dropping or stopping the poller
/// ends the loop and joins it, whatever else is torn down around it.
pub struct DevicePoller {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl DevicePoller {
    const WAIT: Duration = Duration::from_millis(100);

    pub fn spawn(device: wgpu::Device) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("frame-ngin device poller".to_string())
            .spawn(move || {
                let mut idle = IdleBackoff::default();
                while !flag.load(Ordering::Acquire) {
                    match device.poll(wgpu::PollType::Wait {
                        submission_index: None,
                        timeout: Some(Self::WAIT),
                    }) {
                        Ok(status) if matches!(status, wgpu::PollStatus::QueueEmpty) => {
                            std::thread::sleep(idle.next());
                        }
                        Ok(_) => idle.reset(),
                        Err(wgpu::PollError::Timeout) => {
                            log::trace!("device poll timed out, GPU still busy");
                        }
                        Err(e) => {
                            log::error!("device poll failed: {}", e);
                            std::thread::sleep(Self::WAIT);
                        }
                    }
                }
                log::debug!("device poller stopped");
            })
            .context("failed to start the device poller")?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Ends the polling loop and waits for the thread. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("device poller panicked");
            }
        }
    }
}

impl Drop for DevicePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep between polls of an idle queue: starts short so a fresh submission
/// is picked up quickly, doubles while the queue stays empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IdleBackoff {
    current: Duration,
}

impl IdleBackoff {
    const MIN: Duration = Duration::from_millis(1);
    const MAX: Duration = Duration::from_millis(16);

    fn next(&mut self) -> Duration {
        let sleep = self.current;
        self.current = (self.current * 2).min(Self::MAX);
        sleep
    }

    fn reset(&mut self) {
        self.current = Self::MIN;
    }
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self { current: Self::MIN }
    }
}
