use std::sync::Arc;

use frame_ngin::{
    cgmath::Vector3,
    config::EngineConfig,
    context::Context,
    data_structures::{
        scene_graph::{NodeTransform, Scene, SceneNode},
        shapes,
        texture::Texture,
    },
    flow::{RenderDelegate, SceneConstructor},
    render::Frame,
};

/// A spinning cube with a small triangle attached to it.
fn build_scene(
    ctx: &Context,
    config: &EngineConfig,
    texture_path: Option<&str>,
) -> anyhow::Result<Box<dyn RenderDelegate<Frame>>> {
    let renderer = Arc::clone(&ctx.renderer);
    let texture = match texture_path {
        Some(path) => {
            log::info!("loading cube texture from {}", path);
            let bytes = std::fs::read(path)?;
            Texture::from_bytes(&renderer.device, &renderer.queue, &bytes, path, None)?
        }
        None => Texture::checkerboard(
            &renderer.device,
            &renderer.queue,
            256,
            8,
            [[240, 240, 240, 255], [40, 40, 40, 255]],
        ),
    };
    let texture = Arc::new(renderer.bind_texture(texture, "cube"));

    let mut cube = SceneNode::new("cube", &shapes::cube(), renderer.as_ref(), config)?
        .with_texture(texture)
        .with_animation(shapes::spin(5.0));
    cube.add_child(
        SceneNode::new("triangle", &shapes::triangle(), renderer.as_ref(), config)?
            .with_transform(NodeTransform {
                position: Vector3::new(2.5, 0.0, 0.0),
                scale: 0.5,
                ..Default::default()
            }),
    );

    let mut scene = Scene::new(renderer, config, ctx.aspect());
    scene.add_node(cube);
    Ok(Box::new(scene))
}

/// Pass an image path to texture the cube with it instead of the checkerboard.
fn main() -> anyhow::Result<()> {
    let texture_path = std::env::args().nth(1);

    let constructor: SceneConstructor = Box::new(move |ctx, config| {
        build_scene(ctx, config, texture_path.as_deref())
    });

    frame_ngin::flow::run(
        EngineConfig::default().with_window_title("frame-ngin cube"),
        constructor,
    )
}
