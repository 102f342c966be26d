//! Scene graph and per-node render submission.
//!
//! A [`SceneNode`] owns its geometry and a [`FrameBufferPool`] of uniform
//! slots. Rendering a node composes its local transform with the parent's,
//! writes the result into the next free slot and submits one draw whose
//! completion hands the slot back. Children are rendered right after their
//! parent, with the parent's world matrix as their frame.
//!
//! A [`Scene`] is the usual owner of a set of root nodes: it keeps the world
//! and projection matrices and plugs into the render loop as its
//! [`RenderDelegate`].

use std::{sync::Arc, time::Duration};

use cgmath::Vector3;

use crate::{
    config::{EngineConfig, Instancing},
    data_structures::{
        frame_pool::{FrameBufferPool, PoolError},
        transform::{Transform, degrees_to_rad},
        vertex::ModelVertex,
    },
    flow::RenderDelegate,
    gpu::{DrawCall, Gpu},
};

/// Runs on every update with the node's transform and its accumulated clock.
pub type Animation = Box<dyn FnMut(&mut NodeTransform, Duration) + Send>;

/// Position, rotation (radians, per axis) and uniform scale of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTransform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: f32,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
        }
    }
}

impl NodeTransform {
    /// translate ∘ rotate ∘ scale: scale and rotation happen in object space,
    /// translation moves the result into the parent's frame.
    pub fn to_matrix(&self) -> Transform {
        let mut matrix = Transform::identity();
        matrix
            .translate(self.position.x, self.position.y, self.position.z)
            .rotate_around(self.rotation.x, self.rotation.y, self.rotation.z)
            .scale(self.scale, self.scale, self.scale);
        matrix
    }
}

pub struct SceneNode<G: Gpu> {
    name: String,
    vertex_buffer: G::VertexBuffer,
    vertex_count: u32,
    pub transform: NodeTransform,
    pool: FrameBufferPool<G::UniformBuffer>,
    texture: Option<Arc<G::Texture>>,
    instancing: Instancing,
    children: Vec<SceneNode<G>>,
    time: Duration,
    animation: Option<Animation>,
}

impl<G: Gpu> SceneNode<G> {
    /// Uploads `vertices` once and allocates the node's uniform ring.
    pub fn new(
        name: impl Into<String>,
        vertices: &[ModelVertex],
        gpu: &G,
        config: &EngineConfig,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        anyhow::ensure!(!vertices.is_empty(), "scene node {name} has no vertices");
        if vertices.len() % 3 != 0 {
            log::warn!(
                "scene node {} has {} vertices, the trailing {} do not form a triangle",
                name,
                vertices.len(),
                vertices.len() % 3
            );
        }
        let vertex_buffer = gpu.create_vertex_buffer(
            &format!("{name} Vertex Buffer"),
            bytemuck::cast_slice(vertices),
        );
        let pool = FrameBufferPool::with_gpu(gpu, &name, config.in_flight_frames)?;

        Ok(Self {
            name,
            vertex_buffer,
            vertex_count: u32::try_from(vertices.len())?,
            transform: NodeTransform::default(),
            pool,
            texture: None,
            instancing: config.instancing,
            children: vec![],
            time: Duration::ZERO,
            animation: None,
        })
    }

    pub fn with_texture(mut self, texture: Arc<G::Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_animation(
        mut self,
        animation: impl FnMut(&mut NodeTransform, Duration) + Send + 'static,
    ) -> Self {
        self.animation = Some(Box::new(animation));
        self
    }

    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_texture(&mut self, texture: Option<Arc<G::Texture>>) {
        self.texture = texture;
    }

    pub fn add_child(&mut self, child: SceneNode<G>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SceneNode<G>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<SceneNode<G>> {
        &mut self.children
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Total time accumulated through [`update_with_delta`](Self::update_with_delta).
    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn pool(&self) -> &FrameBufferPool<G::UniformBuffer> {
        &self.pool
    }

    pub fn compose_model_matrix(&self) -> Transform {
        self.transform.to_matrix()
    }

    /// Advances the animation clock of this node and its children.
    pub fn update_with_delta(&mut self, dt: Duration) {
        self.time += dt;
        if let Some(animation) = self.animation.as_mut() {
            animation(&mut self.transform, self.time);
        }
        for child in self.children.iter_mut() {
            child.update_with_delta(dt);
        }
    }

    /// Draws this node and then its children into `target`.
    ///
    /// Blocks while every uniform slot of a node is still in flight. `clear`
    /// only applies to this node's pass; children always draw on top.
    pub fn render(
        &mut self,
        gpu: &G,
        target: &G::Target,
        parent: &Transform,
        projection: &Transform,
        clear: Option<wgpu::Color>,
    ) -> Result<(), PoolError> {
        let handle = self.pool.acquire_next()?;

        let mut world = self.compose_model_matrix();
        world.multiply_left(parent);
        self.pool.write_transforms(gpu, &handle, &world, projection);

        let draw = DrawCall {
            label: &self.name,
            vertex_buffer: &self.vertex_buffer,
            uniforms: self.pool.slot_for(&handle),
            texture: self.texture.as_deref(),
            vertices: 0..self.vertex_count,
            instances: 0..self.instancing.instance_count(self.vertex_count),
            clear,
        };
        let lease = handle.into_lease();
        gpu.submit(draw, target, Box::new(move || lease.release()));

        for child in self.children.iter_mut() {
            child.render(gpu, target, &world, projection, None)?;
        }
        Ok(())
    }

    /// Drains this node's pool and its children's. Idempotent.
    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.children.iter().for_each(SceneNode::shutdown);
    }
}

/// Root nodes plus the matrices they are rendered with.
pub struct Scene<G: Gpu> {
    gpu: Arc<G>,
    nodes: Vec<SceneNode<G>>,
    pub world: Transform,
    projection: Transform,
    config: EngineConfig,
}

impl<G: Gpu> Scene<G> {
    /// The world matrix starts 4 units in front of the camera, tilted 25° around x.
    pub fn new(gpu: Arc<G>, config: &EngineConfig, aspect: f32) -> Self {
        let mut world = Transform::identity();
        world
            .translate(0.0, 0.0, -4.0)
            .rotate_around(degrees_to_rad(25.0), 0.0, 0.0);
        Self {
            gpu,
            nodes: vec![],
            world,
            projection: projection_for(config, aspect),
            config: config.clone(),
        }
    }

    pub fn gpu(&self) -> &Arc<G> {
        &self.gpu
    }

    pub fn add_node(&mut self, node: SceneNode<G>) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[SceneNode<G>] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<SceneNode<G>> {
        &mut self.nodes
    }

    pub fn projection(&self) -> &Transform {
        &self.projection
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.projection = projection_for(&self.config, aspect);
    }

    pub fn shutdown(&self) {
        self.nodes.iter().for_each(SceneNode::shutdown);
    }
}

fn projection_for(config: &EngineConfig, aspect: f32) -> Transform {
    Transform::perspective(config.field_of_view, aspect, config.near, config.far)
}

impl<G: Gpu> RenderDelegate<G::Target> for Scene<G> {
    fn on_update(&mut self, dt: Duration) {
        for node in self.nodes.iter_mut() {
            node.update_with_delta(dt);
        }
    }

    fn on_render(&mut self, target: G::Target) -> anyhow::Result<()> {
        // Nothing would clear the frame, so it is dropped unpresented.
        if self.nodes.is_empty() {
            log::debug!("scene has no nodes, discarding the frame");
            return Ok(());
        }
        let gpu = self.gpu.as_ref();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let clear = (i == 0).then_some(self.config.clear_colour);
            node.render(gpu, &target, &self.world, &self.projection, clear)?;
        }
        gpu.present(target);
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    fn on_shutdown(&mut self) {
        self.shutdown();
    }
}
