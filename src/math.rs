//! Shared math vocabulary: vector/matrix aliases, the crate's two-stage PRNG
//! (splitmix64 seed expansion feeding xoshiro256**), and the random samplers
//! built on top of it.

use std::f32::consts::PI;

use nalgebra as na;

pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Vec4 = na::Vector4<f32>;
pub type Vec3u = na::Vector3<u32>;
pub type Point2 = na::Point2<f32>;
pub type Point3 = na::Point3<f32>;
pub type Mat3 = na::Matrix3<f32>;
pub type Mat4 = na::Matrix4<f32>;
pub type Quat = na::UnitQuaternion<f32>;

/// A unit-length direction. Not a distinct newtype: callers are expected to
/// keep it normalized, the same convention the source uses for `vec3`
/// surface normals.
pub type Normal = Vec3;

pub const EPSILON: f32 = 1e-8;
pub const TAU: f32 = 2.0 * PI;
pub const INV_PI: f32 = 1.0 / PI;

pub fn near_zero(v: Vec3) -> bool {
    v.x.abs() < EPSILON && v.y.abs() < EPSILON && v.z.abs() < EPSILON
}

pub fn reflect(incoming: Vec3, normal: Vec3) -> Vec3 {
    incoming - 2.0 * incoming.dot(&normal) * normal
}

/// Refracts `incoming` (unit) through a surface with the given outward
/// `normal` (unit) and ratio of refractive indices `eta_ratio = eta_in /
/// eta_out`. Returns `None` on total internal reflection.
pub fn refract(incoming: Vec3, normal: Vec3, eta_ratio: f32) -> Option<Vec3> {
    let cos_theta = (-incoming.dot(&normal)).min(1.0);
    let sin2_theta = (1.0 - cos_theta * cos_theta).max(0.0);
    if eta_ratio * eta_ratio * sin2_theta > 1.0 {
        return None;
    }
    let r_out_perp = eta_ratio * (incoming + cos_theta * normal);
    let r_out_parallel = -((1.0 - r_out_perp.norm_squared()).abs().sqrt()) * normal;
    Some(r_out_perp + r_out_parallel)
}

/// Schlick's approximation to the Fresnel reflectance.
pub fn schlick_reflectance(cosine: f32, refraction_index: f32) -> f32 {
    let r0 = (1.0 - refraction_index) / (1.0 + refraction_index);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

pub fn lerp_scalar(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a * (1.0 - t) + b * t
}

/// Transforms a point by an affine matrix (w = 1).
pub fn transform_point(m: &Mat4, p: Point3) -> Point3 {
    m.transform_point(&p)
}

/// Transforms a direction by an affine matrix (w = 0); does not renormalize.
pub fn transform_vector(m: &Mat4, v: Vec3) -> Vec3 {
    m.transform_vector(&v)
}

/// Transforms a normal by the inverse-transpose of an affine matrix and
/// renormalizes. `inverse` is the caller's cached `modelMatrixInverse`.
pub fn transform_normal(inverse: &Mat4, n: Vec3) -> Vec3 {
    inverse.transpose().transform_vector(&n).normalize()
}

/// Fast pseudo-random number generator by Sebastiano Vigna, used to expand a
/// single `u64` seed into the four-word state of [`Xoshiro256StarStar`].
/// <https://prng.di.unimi.it/splitmix64.c>
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// `xoshiro256**` by David Blackman and Sebastiano Vigna.
/// <https://prng.di.unimi.it/xoshiro256starstar.c>
#[derive(Clone)]
pub struct Xoshiro256StarStar {
    state: [u64; 4],
}

impl Xoshiro256StarStar {
    pub fn seed_from_u64(seed: u64) -> Self {
        let mut expander = SplitMix64::new(seed);
        Self {
            state: [
                expander.next_u64(),
                expander.next_u64(),
                expander.next_u64(),
                expander.next_u64(),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = Self::rotate_left(self.state[1].wrapping_mul(5), 7).wrapping_mul(9);

        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = Self::rotate_left(self.state[3], 45);

        result
    }

    fn rotate_left(value: u64, k: u32) -> u64 {
        (value << k) | (value >> (64 - k))
    }

    /// Uniform f32 in `[0, 1)`. Only 24 bits of the draw are used since
    /// that is all an f32 mantissa can hold.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    pub fn vec2(&mut self, min: f32, max: f32) -> Vec2 {
        Vec2::new(self.range_f32(min, max), self.range_f32(min, max))
    }

    pub fn vec3(&mut self, min: f32, max: f32) -> Vec3 {
        Vec3::new(
            self.range_f32(min, max),
            self.range_f32(min, max),
            self.range_f32(min, max),
        )
    }
}

/// Rejection-sampled random point in the unit disk, `x^2 + y^2 <= 1`.
pub fn random_in_unit_disk(rng: &mut Xoshiro256StarStar) -> Vec2 {
    loop {
        let v = rng.vec2(-1.0, 1.0);
        if v.norm_squared() <= 1.0 {
            return v;
        }
    }
}

/// Rejection-sampled random point in the unit ball, `|v| <= 1`.
pub fn random_in_unit_sphere(rng: &mut Xoshiro256StarStar) -> Vec3 {
    loop {
        let v = rng.vec3(-1.0, 1.0);
        if v.norm_squared() <= 1.0 {
            return v;
        }
    }
}

/// Uniformly-distributed random unit vector (direction on the unit sphere).
pub fn random_unit_vector(rng: &mut Xoshiro256StarStar) -> Vec3 {
    random_in_unit_sphere(rng).normalize()
}

/// Random unit vector on the hemisphere around `normal`.
pub fn random_on_hemisphere(rng: &mut Xoshiro256StarStar, normal: Vec3) -> Vec3 {
    let v = random_unit_vector(rng);
    if v.dot(&normal) >= 0.0 {
        v
    } else {
        -v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reflect_about_axis_normal() {
        let incoming = Vec3::new(1.0, -1.0, 0.0).normalize();
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let reflected = reflect(incoming, normal);
        assert_abs_diff_eq!(reflected.x, incoming.x, epsilon = 1e-6);
        assert_abs_diff_eq!(reflected.y, -incoming.y, epsilon = 1e-6);
    }

    #[test]
    fn splitmix64_matches_reference_first_outputs() {
        // https://prng.di.unimi.it/splitmix64.c reference stream for seed 0.
        let mut gen = SplitMix64::new(0);
        assert_eq!(gen.next_u64(), 0xe220_a839_5b49_c642);
        assert_eq!(gen.next_u64(), 0x6e78_9e6a_a1b9_65f4);
    }

    #[test]
    fn xoshiro_is_deterministic_for_a_fixed_seed() {
        let mut a = Xoshiro256StarStar::seed_from_u64(42);
        let mut b = Xoshiro256StarStar::seed_from_u64(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn random_in_unit_disk_stays_inside() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_in_unit_disk(&mut rng);
            assert!(v.norm_squared() <= 1.0);
        }
    }

    #[test]
    fn random_unit_vector_is_normalized() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_unit_vector(&mut rng);
            assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-5);
        }
    }
}
