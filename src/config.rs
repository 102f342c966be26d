//! Engine configuration.
//!
//! [`EngineConfig`] is built once before the window opens and handed to the
//! context and to every scene node that is created. Everything has a sensible
//! default, so most apps only touch the fields they care about.

use cgmath::Deg;

/// How many instances a node's draw call issues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Instancing {
    /// One instance per triangle (`vertex_count / 3`).
    #[default]
    PerTriangle,
    /// A single instance covering the whole mesh.
    Single,
}

impl Instancing {
    pub fn instance_count(&self, vertex_count: u32) -> u32 {
        match self {
            Instancing::PerTriangle => vertex_count / 3,
            Instancing::Single => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Frames the CPU may run ahead of the GPU; the size of every node's uniform ring.
    pub in_flight_frames: usize,
    pub clear_colour: wgpu::Color,
    pub field_of_view: Deg<f32>,
    pub near: f32,
    pub far: f32,
    pub instancing: Instancing,
    pub present_mode: wgpu::PresentMode,
    pub window_title: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            in_flight_frames: 3,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 104.0 / 255.0,
                b: 5.0 / 255.0,
                a: 1.0,
            },
            field_of_view: Deg(85.0),
            near: 0.01,
            far: 100.0,
            instancing: Instancing::default(),
            present_mode: wgpu::PresentMode::Fifo,
            window_title: "frame-ngin".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_in_flight_frames(mut self, frames: usize) -> Self {
        self.in_flight_frames = frames;
        self
    }

    pub fn with_clear_colour(mut self, colour: wgpu::Color) -> Self {
        self.clear_colour = colour;
        self
    }

    pub fn with_instancing(mut self, instancing: Instancing) -> Self {
        self.instancing = instancing;
        self
    }

    pub fn with_present_mode(mut self, present_mode: wgpu::PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Validates values that would otherwise fail deep inside the GPU setup.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.in_flight_frames > 0,
            "at least one frame has to be allowed in flight"
        );
        anyhow::ensure!(
            self.near > 0.0 && self.far > self.near,
            "invalid clip planes: near {} far {}",
            self.near,
            self.far
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.in_flight_frames, 3);
        assert_eq!(config.instancing, Instancing::PerTriangle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_in_flight_frames_is_rejected() {
        let config = EngineConfig::default().with_in_flight_frames(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_clip_planes_are_rejected() {
        let config = EngineConfig {
            near: 10.0,
            far: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn instance_count_follows_policy() {
        assert_eq!(Instancing::PerTriangle.instance_count(36), 12);
        assert_eq!(Instancing::PerTriangle.instance_count(3), 1);
        assert_eq!(Instancing::Single.instance_count(36), 1);
    }
}
