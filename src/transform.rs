//! Position/rotation/scale with a cached model matrix. The cache is
//! refreshed by an explicit `update` call made from `frame_begin`, not on
//! every accessor call — an explicit prepare phase rather than a
//! mutable-cache-with-dirty-bit.

use crate::math::{Mat4, Quat, Vec3};

#[derive(Clone, Debug)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    model_matrix: Mat4,
    model_matrix_inverse: Mat4,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut t = Self {
            position,
            rotation,
            scale,
            model_matrix: Mat4::identity(),
            model_matrix_inverse: Mat4::identity(),
        };
        t.update();
        t
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::identity(), Vec3::new(1.0, 1.0, 1.0))
    }

    pub fn model_matrix(&self) -> &Mat4 {
        &self.model_matrix
    }

    pub fn model_matrix_inverse(&self) -> &Mat4 {
        &self.model_matrix_inverse
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Recomputes `model_matrix`/`model_matrix_inverse` from the current
    /// position/rotation/scale. Called once per frame from `frame_begin`,
    /// matching the source's `updateMatrices`.
    pub fn update(&mut self) {
        let translation = Mat4::new_translation(&self.position);
        let rotation = self.rotation.to_homogeneous();
        let scale = Mat4::new_nonuniform_scaling(&self.scale);
        self.model_matrix = translation * rotation * scale;
        self.model_matrix_inverse = self
            .model_matrix
            .try_inverse()
            .expect("transform matrix must be invertible (non-zero scale)");
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Quat::identity(), Vec3::new(1.0, 1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{transform_point, Point3};
    use approx::assert_abs_diff_eq;

    #[test]
    fn translation_moves_a_point() {
        let t = Transform::from_position(Vec3::new(5.0, 0.0, 0.0));
        let p = transform_point(t.model_matrix(), Point3::origin());
        assert_abs_diff_eq!(p.x, 5.0);
    }

    #[test]
    fn inverse_undoes_the_forward_transform() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&nalgebra::Vector3::y_axis(), 0.7),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let p = Point3::new(0.3, -0.2, 1.1);
        let forward = transform_point(t.model_matrix(), p);
        let back = transform_point(t.model_matrix_inverse(), forward);
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-5);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-5);
        assert_abs_diff_eq!(back.z, p.z, epsilon = 1e-5);
    }
}
