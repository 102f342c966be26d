//! 4×4 transform matrices for node placement and projection.
//!
//! [`Transform`] wraps a column-major `cgmath::Matrix4<f32>` and offers the
//! in-place composition style scene nodes are built with: every `translate`,
//! `rotate_around` and `scale` call post-multiplies, so the last operation
//! applied in code is the first one applied to a vertex.

use std::ops::Mul;

use cgmath::{Deg, Matrix4, Rad, SquareMatrix, Vector3};

/// cgmath produces OpenGL clip space (z in -1..1), wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A 4×4 matrix in column-major order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform(Matrix4<f32>);

impl Transform {
    /// Number of `f32` components in a flattened transform.
    pub const ELEMENTS: usize = 16;

    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Perspective projection mapping camera space into wgpu clip space.
    ///
    /// `aspect` is width divided by height of the drawable.
    pub fn perspective(fovy: impl Into<Rad<f32>>, aspect: f32, near: f32, far: f32) -> Self {
        Self(OPENGL_TO_WGPU_MATRIX * cgmath::perspective(fovy, aspect, near, far))
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.0 = self.0 * Matrix4::from_translation(Vector3::new(x, y, z));
        self
    }

    /// Rotates around the x axis, then y, then z. Angles are in radians.
    ///
    /// Each axis is composed on the right, so a vertex is turned around z
    /// first and around x last.
    pub fn rotate_around(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.0 = self.0
            * Matrix4::from_angle_x(Rad(x))
            * Matrix4::from_angle_y(Rad(y))
            * Matrix4::from_angle_z(Rad(z));
        self
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.0 = self.0 * Matrix4::from_nonuniform_scale(x, y, z);
        self
    }

    /// Replaces `self` with `lhs × self`.
    ///
    /// Used to move a node's local matrix into its parent's frame.
    pub fn multiply_left(&mut self, lhs: &Transform) -> &mut Self {
        self.0 = lhs.0 * self.0;
        self
    }

    /// Column-major components, ready to be copied into GPU memory.
    pub fn raw(&self) -> [f32; Self::ELEMENTS] {
        *AsRef::<[f32; Self::ELEMENTS]>::as_ref(&self.0)
    }

    /// Columns as nested arrays, the layout WGSL expects for `mat4x4<f32>`.
    pub fn columns(&self) -> [[f32; 4]; 4] {
        self.0.into()
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.0
    }
}

/// Converts degrees to radians.
pub fn degrees_to_rad(degrees: f32) -> f32 {
    Rad::from(Deg(degrees)).0
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix4<f32>> for Transform {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self(matrix)
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}
