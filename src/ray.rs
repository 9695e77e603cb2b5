//! Ray: origin, direction (not required to be unit-length), a cached inverse
//! direction for slab tests, and the active `t` interval the BVH traversal
//! and hittables need.

use crate::interval::Interval;
use crate::math::{transform_point, transform_vector, Mat4, Point3, Vec3};

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
    pub t_interval: Interval<f32>,
    /// Diagnostic counters, gated behind the `bvh_test` feature (spec.md
    /// section 6's build-gated `aabbTestCount`/`triangleTestCount` channels).
    #[cfg(feature = "bvh_test")]
    pub aabb_test_count: u32,
    #[cfg(feature = "bvh_test")]
    pub triangle_test_count: u32,
}

impl Ray {
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z),
            t_interval: Interval::new(0.001, f32::INFINITY),
            #[cfg(feature = "bvh_test")]
            aabb_test_count: 0,
            #[cfg(feature = "bvh_test")]
            triangle_test_count: 0,
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Point3 {
        self.origin + self.direction * t
    }

    pub fn direction_negative(&self) -> [bool; 3] {
        [
            self.direction.x < 0.0,
            self.direction.y < 0.0,
            self.direction.z < 0.0,
        ]
    }

    /// Transforms the ray by an affine matrix. `t_interval` carries over
    /// unchanged: for an affine map `M`, `M(origin + t*direction) = M(origin)
    /// + t*M_linear(direction)` for the *same* `t` (`transform_point` carries
    /// the translation, `transform_vector` is purely linear), so the local
    /// and world parametrizations agree exactly — there is no direction-
    /// length ratio to rescale by, even under non-uniform scale.
    pub fn transformed(&self, m: &Mat4) -> Self {
        let origin = transform_point(m, self.origin);
        let direction = transform_vector(m, self.direction);
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z),
            t_interval: self.t_interval,
            #[cfg(feature = "bvh_test")]
            aabb_test_count: 0,
            #[cfg(feature = "bvh_test")]
            triangle_test_count: 0,
        }
    }

    /// Folds another ray's diagnostic counters into this one; used by
    /// `TransformedInstance::hit` to carry counts from the local-space ray
    /// it traces the child against back into the caller's ray.
    #[cfg(feature = "bvh_test")]
    pub fn merge_test_counts(&mut self, other: &Ray) {
        self.aabb_test_count += other.aabb_test_count;
        self.triangle_test_count += other.triangle_test_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn at_follows_parametric_line() {
        let ray = Ray::new(Point3::origin(), Vec3::new(1.0, 0.0, 0.0));
        let p = ray.at(2.0);
        assert_abs_diff_eq!(p.x, 2.0);
    }

    #[test]
    fn default_t_interval_avoids_self_intersection() {
        let ray = Ray::new(Point3::origin(), Vec3::new(0.0, 0.0, 1.0));
        assert!(!ray.t_interval.surrounds(0.0));
        assert!(ray.t_interval.surrounds(0.01));
    }
}
