//! Render pipelines.
//!
//! - `basic`: textured, vertex-coloured triangle lists with per-node uniforms

pub mod basic;
