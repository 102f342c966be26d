//! frame-ngin
//!
//! A small wgpu renderer built around frame pipelining: the CPU prepares up
//! to `N` frames ahead of the GPU, every scene node writes its transforms
//! into a ring of per-frame uniform buffers, and a slot only comes back into
//! use once the GPU reports that the draw reading it has completed.
//!
//! High-level modules
//! - `config`: engine settings (in-flight frames, clear colour, projection)
//! - `context`: window surface, device setup and the device poller
//! - `data_structures`: transforms, vertices, textures, the frame buffer pool and scene nodes
//! - `flow`: the render loop and the winit application driver
//! - `gpu`: the backend capabilities the core is written against
//! - `pipelines`: the basic textured pipeline and its shader
//! - `render`: the wgpu backend
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod gpu;
pub mod pipelines;
pub mod render;

// Re-exports commonly used crates for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit::event::WindowEvent;
