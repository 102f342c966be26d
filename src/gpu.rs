//! Capabilities the engine core needs from a graphics backend.
//!
//! Scene nodes and frame pools only talk to the GPU through [`Gpu`], and the
//! render loop only asks a [`DrawableSource`] for targets. The wgpu backend
//! lives in [`crate::render::Renderer`] and [`crate::context::Context`];
//! tests drive the same code with a recording mock.

use std::ops::Range;

/// Called once when the GPU has finished a submission.
pub type CompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// A graphics device plus its command queue.
pub trait Gpu {
    /// GPU-writable memory a frame pool hands out per frame.
    type UniformBuffer;
    /// Immutable GPU-resident geometry.
    type VertexBuffer;
    /// A texture bound together with its sampler.
    type Texture;
    /// The render target of one display refresh.
    type Target;

    fn create_uniform_buffer(&self, label: &str, size: u64) -> Self::UniformBuffer;

    fn create_vertex_buffer(&self, label: &str, contents: &[u8]) -> Self::VertexBuffer;

    /// Copies `contents` to the start of `buffer`.
    ///
    /// The caller guarantees no GPU read of `buffer` is still in flight.
    fn write_uniforms(&self, buffer: &Self::UniformBuffer, contents: &[u8]);

    /// Encodes and submits one draw into `target`.
    ///
    /// `on_complete` must run exactly once, after the GPU has finished the
    /// submission. It may run on any thread.
    fn submit(&self, draw: DrawCall<'_, Self>, target: &Self::Target, on_complete: CompletionHandler);

    /// Schedules `target` for presentation after everything submitted so far.
    fn present(&self, target: Self::Target);
}

/// Everything bound for a single triangle-list draw.
pub struct DrawCall<'a, G: Gpu + ?Sized> {
    pub label: &'a str,
    pub vertex_buffer: &'a G::VertexBuffer,
    pub uniforms: &'a G::UniformBuffer,
    pub texture: Option<&'a G::Texture>,
    pub vertices: Range<u32>,
    pub instances: Range<u32>,
    /// `Some` clears the target before drawing, `None` draws on top.
    pub clear: Option<wgpu::Color>,
}

/// Yields the render target for the current tick, if the surface has one.
pub trait DrawableSource {
    type Target;

    /// `Ok(None)` means no frame is available right now; the tick skips
    /// rendering. Errors are fatal device conditions.
    fn next_drawable(&mut self) -> anyhow::Result<Option<Self::Target>>;
}
