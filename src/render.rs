//! The wgpu implementation of [`Gpu`].
//!
//! Every [`DrawCall`] becomes its own command buffer with a single render
//! pass over the frame's view. The first pass of a frame clears, the ones
//! after it load what is already there. Completion is reported through
//! [`wgpu::Queue::on_submitted_work_done`], which fires once the device is
//! polled (see [`crate::context::DevicePoller`]).
//!
//! # Key types
//!
//! - [`Renderer`] holds the device, queue, pipeline and bind group layouts
//! - [`UniformSlot`] is one uniform buffer plus the bind group that exposes it
//! - [`TextureBinding`] is a [`Texture`] ready to be bound at group 1
//! - [`Frame`] is the acquired surface texture and its view

use std::iter;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    gpu::{CompletionHandler, DrawCall, Gpu},
    pipelines::basic,
};

pub struct UniformSlot {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

pub struct TextureBinding {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

/// One refresh of the surface.
pub struct Frame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl Frame {
    pub fn new(surface_texture: wgpu::SurfaceTexture) -> Self {
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            surface_texture,
            view,
        }
    }
}

pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    uniforms_layout: wgpu::BindGroupLayout,
    diffuse_layout: wgpu::BindGroupLayout,
    fallback: TextureBinding,
}

impl Renderer {
    /// Builds the basic pipeline for `color_format` and a 1×1 white texture
    /// that untextured nodes sample from.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let uniforms_layout = basic::uniforms_layout(&device);
        let diffuse_layout = basic::diffuse_layout(&device);
        let pipeline = basic::mk_basic_pipeline(&device, color_format, &uniforms_layout, &diffuse_layout);
        let white = Texture::solid(&device, &queue, [255, 255, 255, 255], "fallback white");
        let fallback = bind_diffuse(&device, &diffuse_layout, white, "fallback");
        log::info!("basic pipeline ready for {:?}", color_format);
        Self {
            device,
            queue,
            pipeline,
            uniforms_layout,
            diffuse_layout,
            fallback,
        }
    }

    /// Wraps `texture` in a bind group matching the pipeline's group 1.
    pub fn bind_texture(&self, texture: Texture, label: &str) -> TextureBinding {
        bind_diffuse(&self.device, &self.diffuse_layout, texture, label)
    }
}

fn bind_diffuse(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: Texture,
    label: &str,
) -> TextureBinding {
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
        label: Some(&format!("{label} diffuse bind group")),
    });
    TextureBinding {
        texture,
        bind_group,
    }
}

impl Gpu for Renderer {
    type UniformBuffer = UniformSlot;
    type VertexBuffer = wgpu::Buffer;
    type Texture = TextureBinding;
    type Target = Frame;

    fn create_uniform_buffer(&self, label: &str, size: u64) -> UniformSlot {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        UniformSlot { buffer, bind_group }
    }

    fn create_vertex_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    fn write_uniforms(&self, buffer: &UniformSlot, contents: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, 0, contents);
    }

    fn submit(&self, draw: DrawCall<'_, Self>, target: &Frame, on_complete: CompletionHandler) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(draw.label),
            });
        {
            let load = match draw.clear {
                Some(colour) => wgpu::LoadOp::Clear(colour),
                None => wgpu::LoadOp::Load,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(draw.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let texture = draw.texture.unwrap_or(&self.fallback);
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
            render_pass.set_bind_group(0, &draw.uniforms.bind_group, &[]);
            render_pass.set_bind_group(1, &texture.bind_group, &[]);
            render_pass.draw(draw.vertices, draw.instances);
        }
        self.queue.submit(iter::once(encoder.finish()));
        self.queue.on_submitted_work_done(on_complete);
    }

    fn present(&self, target: Frame) {
        target.surface_texture.present();
    }
}
