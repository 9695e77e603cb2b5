//! The path integrator: repeatedly intersects and scatters a ray against the
//! world until it's absorbed, escapes, or hits the bounce cap.

use std::f32::consts::{PI, TAU};

use crate::color::ColorRgb;
use crate::material::{scatter, ScatterOutput};
use crate::math::{Point2, Xoshiro256StarStar};
use crate::ray::Ray;
use crate::world::World;

/// Equirectangular (longitude/latitude) parameterization of a direction,
/// used to sample the environment texture when a ray escapes the scene.
fn equirectangular_uv(direction: crate::math::Vec3) -> Point2 {
    let d = direction.normalize();
    Point2::new(d.z.atan2(d.x) / TAU + 0.5, d.y.clamp(-1.0, 1.0).acos() / PI)
}

/// Everything one camera-ray sample produces: the path's radiance plus the
/// auxiliary AOVs captured at the first non-transmissive bounce.
#[derive(Clone, Copy, Debug)]
pub struct PathSample {
    pub color: ColorRgb,
    /// Reverse depth in `(0, 1]`; `0` for rays that escape to the
    /// environment.
    pub depth: f32,
    pub normal: crate::math::Vec3,
    pub albedo: ColorRgb,
    pub emission: ColorRgb,
    #[cfg(feature = "bvh_test")]
    pub aabb_test_count: f32,
    #[cfg(feature = "bvh_test")]
    pub triangle_test_count: f32,
}

impl PathSample {
    fn new() -> Self {
        Self {
            color: ColorRgb::BLACK,
            depth: f32::NAN,
            normal: crate::math::Vec3::new(f32::NAN, f32::NAN, f32::NAN),
            albedo: ColorRgb::new(f32::NAN, f32::NAN, f32::NAN),
            emission: ColorRgb::new(f32::NAN, f32::NAN, f32::NAN),
            #[cfg(feature = "bvh_test")]
            aabb_test_count: f32::NAN,
            #[cfg(feature = "bvh_test")]
            triangle_test_count: f32::NAN,
        }
    }
}

/// Intersects `ray` against `world`, resolving alpha-masked hits by
/// re-intersecting from the masked point without counting a bounce — alpha
/// passthrough is free. Falls back to the world's environment material when
/// nothing is hit.
fn sample_ray(
    world: &World,
    ray: &mut Ray,
    rng: &mut Xoshiro256StarStar,
) -> (crate::hittable::HitRecord, ScatterOutput) {
    loop {
        let mut hit = world.root.hit(ray);

        if !hit.hit {
            hit.hit = true;
            hit.point = ray.origin;
            hit.normal = -ray.direction.normalize();
            hit.uv = equirectangular_uv(ray.direction);
            hit.has_uv = true;
            hit.material = Some(world.environment_material.clone());
        } else {
            hit.point = ray.at(ray.t_interval.max);
        }

        let material = hit.material.clone().expect("hit always carries a material");
        let output = scatter(&material, ray.direction, &mut hit, rng);

        if !hit.hit {
            // Alpha-masked: continue from the same point along the same
            // direction without counting a bounce.
            *ray = Ray::new(hit.point, ray.direction);
            continue;
        }

        return (hit, output);
    }
}

/// Traces one camera ray through up to `max_bounces + 1` scatter events,
/// accumulating radiance and capturing the first non-transmissive bounce's
/// normal/albedo/emission as auxiliary output.
pub fn sample_path(
    world: &World,
    mut ray: Ray,
    max_bounces: u32,
    rng: &mut Xoshiro256StarStar,
) -> PathSample {
    let mut output = PathSample::new();

    let mut attenuation = ColorRgb::WHITE;
    let mut incoming_light = ColorRgb::BLACK;
    let mut sampled_non_delta_bounce = false;

    for bounce in 0..=max_bounces {
        let (hit, scatter_output) = sample_ray(world, &mut ray, rng);

        incoming_light += attenuation * scatter_output.emission;
        attenuation *= scatter_output.albedo;

        if bounce == 0 {
            output.depth = if ray.t_interval.max.is_infinite() {
                0.0
            } else {
                1.0 / (ray.t_interval.max * ray.direction.norm() + 1.0)
            };
            #[cfg(feature = "bvh_test")]
            {
                output.aabb_test_count = ray.aabb_test_count as f32;
                output.triangle_test_count = ray.triangle_test_count as f32;
            }
        }

        if !sampled_non_delta_bounce && !scatter_output.is_transmission {
            sampled_non_delta_bounce = true;
            output.normal = hit.normal;
            output.albedo = scatter_output.albedo;
            output.emission = scatter_output.emission;
        }

        if !scatter_output.did_scatter {
            break;
        }

        ray = Ray::new(hit.point, scatter_output.scatter_direction);
    }

    output.color = incoming_light;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::Hittable;
    use crate::material::Material;
    use crate::math::{Point3, Vec3};
    use crate::texture::Texture;
    use crate::transform::Transform;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn empty_world(environment: ColorRgb) -> World {
        World {
            root: Hittable::Group(vec![]),
            environment_material: Arc::new(Material::environment(environment)),
        }
    }

    #[test]
    fn a_ray_into_empty_space_returns_environment_emission_with_zero_depth() {
        let world = empty_world(ColorRgb::new(0.2, 0.3, 0.4));
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let ray = Ray::new(Point3::origin(), Vec3::new(0.0, 0.0, 1.0));
        let sample = sample_path(&world, ray, 5, &mut rng);
        assert_eq!(sample.depth, 0.0);
        assert_eq!(sample.color.r(), 0.2);
    }

    #[test]
    fn bounce_cap_terminates_the_loop_for_a_pure_lambert_sphere() {
        let sphere = Hittable::Sphere {
            center: Point3::origin(),
            radius: 1.0,
            material: Arc::new(Material::lambert(ColorRgb::new(0.9, 0.9, 0.9))),
        };
        let world = World {
            root: sphere,
            environment_material: Arc::new(Material::environment(ColorRgb::BLACK)),
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(9);
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let sample = sample_path(&world, ray, 3, &mut rng);
        // A fully enclosed point inside a white Lambert sphere with no light
        // source converges to black after the bounce cap, never NaN/inf.
        assert!(sample.color.r().is_finite());
        assert!(sample.depth > 0.0);
    }

    #[test]
    fn alpha_masked_disc_does_not_consume_the_bounce_budget() {
        let mut alpha_masked = Material::lambert(ColorRgb::WHITE);
        alpha_masked.alpha_texture = Some(Texture::new(1, 1, 0.0));
        let disc = Hittable::Disc {
            transform: Transform::from_position(Vec3::new(0.0, 0.0, 0.0)),
            material: Arc::new(alpha_masked),
            size: (10.0, 10.0),
        };

        let emissive = ColorRgb::new(0.7, 0.1, 0.1);
        let sphere = Hittable::Sphere {
            center: Point3::new(0.0, 5.0, 0.0),
            radius: 1.0,
            material: Arc::new(Material::lambert_emissive(emissive, 1.0)),
        };

        let world = World {
            root: Hittable::Group(vec![disc, sphere]),
            environment_material: Arc::new(Material::environment(ColorRgb::BLACK)),
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let ray = Ray::new(Point3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 1.0, 0.0));

        // The alpha-masked disc sits directly in front of the emissive
        // sphere. With a zero-bounce budget, reaching the sphere's emission
        // at all proves passing through the mask didn't spend the one
        // allotted bounce.
        let sample = sample_path(&world, ray, 0, &mut rng);
        assert_abs_diff_eq!(sample.color.r(), emissive.r(), epsilon = 1e-5);
        assert_abs_diff_eq!(sample.color.g(), emissive.g(), epsilon = 1e-5);
        assert_abs_diff_eq!(sample.color.b(), emissive.b(), epsilon = 1e-5);
    }
}
