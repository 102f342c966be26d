//! Engine data structures: transforms, geometry, textures and scene nodes.
//!
//! - `transform` is the 4×4 matrix type every node composes and uploads
//! - `vertex` holds the vertex layout shared by all geometry
//! - `shapes` provides built-in geometry and animations
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `frame_pool` is the ring of per-frame uniform buffers
//! - `scene_graph` enables hierarchical scene organization and submission

pub mod frame_pool;
pub mod scene_graph;
pub mod shapes;
pub mod texture;
pub mod transform;
pub mod vertex;
