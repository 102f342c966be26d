//! Built-in geometry.
//!
//! Both shapes are plain triangle lists wound counter-clockwise when seen from
//! outside. The cube's texture coordinates address a 4×4 atlas: a cross of
//! faces in the upper three rows.

use std::{f32::consts::PI, time::Duration};

use crate::data_structures::{scene_graph::NodeTransform, vertex::ModelVertex};

pub fn triangle() -> Vec<ModelVertex> {
    vec![
        ModelVertex::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5, 0.0),
        ModelVertex::new(-1.0, -1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0),
        ModelVertex::new(1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0),
    ]
}

pub fn cube() -> Vec<ModelVertex> {
    // front
    let a = ModelVertex::new(-1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.25, 0.25);
    let b = ModelVertex::new(-1.0, -1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.25, 0.50);
    let c = ModelVertex::new(1.0, -1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.50, 0.50);
    let d = ModelVertex::new(1.0, 1.0, 1.0, 0.1, 0.6, 0.4, 1.0, 0.50, 0.25);
    // left
    let e = ModelVertex::new(-1.0, 1.0, -1.0, 1.0, 0.0, 0.0, 1.0, 0.00, 0.25);
    let f = ModelVertex::new(-1.0, -1.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.00, 0.50);
    let g = ModelVertex::new(-1.0, -1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.25, 0.50);
    let h = ModelVertex::new(-1.0, 1.0, 1.0, 0.1, 0.6, 0.4, 1.0, 0.25, 0.25);
    // right
    let i = ModelVertex::new(1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.50, 0.25);
    let j = ModelVertex::new(1.0, -1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.50, 0.50);
    let k = ModelVertex::new(1.0, -1.0, -1.0, 0.0, 0.0, 1.0, 1.0, 0.75, 0.50);
    let l = ModelVertex::new(1.0, 1.0, -1.0, 0.1, 0.6, 0.4, 1.0, 0.75, 0.25);
    // top
    let m = ModelVertex::new(-1.0, 1.0, -1.0, 1.0, 0.0, 0.0, 1.0, 0.25, 0.00);
    let n = ModelVertex::new(-1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.25, 0.25);
    let o = ModelVertex::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.50, 0.25);
    let p = ModelVertex::new(1.0, 1.0, -1.0, 0.1, 0.6, 0.4, 1.0, 0.50, 0.00);
    // bottom
    let q = ModelVertex::new(-1.0, -1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.25, 0.50);
    let r = ModelVertex::new(-1.0, -1.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.25, 0.75);
    let s = ModelVertex::new(1.0, -1.0, -1.0, 0.0, 0.0, 1.0, 1.0, 0.50, 0.75);
    let t = ModelVertex::new(1.0, -1.0, 1.0, 0.1, 0.6, 0.4, 1.0, 0.50, 0.50);
    // back
    let u = ModelVertex::new(1.0, 1.0, -1.0, 1.0, 0.0, 0.0, 1.0, 0.75, 0.25);
    let v = ModelVertex::new(1.0, -1.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.75, 0.50);
    let w = ModelVertex::new(-1.0, -1.0, -1.0, 0.0, 0.0, 1.0, 1.0, 1.00, 0.50);
    let x = ModelVertex::new(-1.0, 1.0, -1.0, 0.1, 0.6, 0.4, 1.0, 1.00, 0.25);

    vec![
        a, b, c, a, c, d, //
        e, f, g, e, g, h, //
        i, j, k, i, k, l, //
        m, n, o, m, o, p, //
        q, r, s, q, s, t, //
        u, v, w, u, w, x,
    ]
}

/// Swings a node back and forth around x and y, one full swing every
/// `seconds_per_move` seconds.
pub fn spin(seconds_per_move: f32) -> impl FnMut(&mut NodeTransform, Duration) + Send + 'static {
    move |transform, time| {
        let phase = (time.as_secs_f32() * 2.0 * PI / seconds_per_move).sin();
        transform.rotation.x = phase;
        transform.rotation.y = phase;
    }
}
