//! Axis-aligned bounding box and the PBRT-style robust slab test used by BVH
//! traversal, generalized to the `+inf/-inf` empty convention and
//! `Interval<f32>`.

use crate::interval::Interval;
use crate::math::{Point3, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    min: Point3,
    max: Point3,
}

impl Aabb {
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Point3::from(Vec3::repeat(f32::INFINITY)),
            max: Point3::from(Vec3::repeat(f32::NEG_INFINITY)),
        }
    }

    #[inline]
    pub fn from_min_max(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a, Iter>(points: Iter) -> Self
    where
        Iter: IntoIterator<Item = &'a Point3>,
    {
        let mut aabb = Self::empty();
        for point in points {
            aabb.extend(*point);
        }
        aabb
    }

    #[inline]
    pub fn min(&self) -> Point3 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3 {
        self.max
    }

    #[inline]
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    #[inline]
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// `2 * (dx*dy + dy*dz + dz*dx)`. Negative on an empty box (extents are
    /// negative), which keeps it strictly smaller than any real box's area
    /// when compared by BVH split-cost code.
    pub fn surface_area(&self) -> f32 {
        let d = self.extents();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn extend(&mut self, point: Point3) {
        self.min = Point3::from(self.min.coords.inf(&point.coords));
        self.max = Point3::from(self.max.coords.sup(&point.coords));
    }

    pub fn merge(&mut self, other: &Aabb) {
        self.min = Point3::from(self.min.coords.inf(&other.min.coords));
        self.max = Point3::from(self.max.coords.sup(&other.max.coords));
    }

    pub fn merged(&self, other: &Aabb) -> Self {
        let mut result = *self;
        result.merge(other);
        result
    }

    pub fn longest_axis(&self) -> usize {
        let d = self.extents();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Robust ray/AABB slab test (Pharr, Jakob & Humphreys, *PBRT*). Returns
    /// the entry/exit interval in the node's frame, or `None` on a miss.
    /// `inv_direction` and `direction_negative` are precomputed once per ray.
    pub fn hit(
        &self,
        origin: Point3,
        inv_direction: Vec3,
        direction_negative: [bool; 3],
        t_interval: Interval<f32>,
    ) -> Option<Interval<f32>> {
        let mut t_min = t_interval.min;
        let mut t_max = t_interval.max;

        for axis in 0..3 {
            let (near, far) = if direction_negative[axis] {
                (self.max[axis], self.min[axis])
            } else {
                (self.min[axis], self.max[axis])
            };

            let mut t_near = (near - origin[axis]) * inv_direction[axis];
            let mut t_far = (far - origin[axis]) * inv_direction[axis];

            // Robustness bound against the slab test's rounding error, PBRT
            // eq. (6.2): widen the far plane by a gamma(3) factor.
            let gamma3 = 3.0 * f32::EPSILON / (1.0 - 3.0 * f32::EPSILON);
            t_far *= 1.0 + 2.0 * gamma3;

            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_min.max(t_near);
            t_max = t_max.min(t_far);
            if t_min > t_max {
                return None;
            }
        }

        if t_min.is_nan() || t_max.is_nan() {
            return None;
        }

        Some(Interval::new(t_min, t_max))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
