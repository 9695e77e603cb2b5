//! Materials and the scatter functions that drive path bouncing: Lambert,
//! metal, dielectric, and environment, dispatched through a tagged
//! [`MaterialKind`] rather than a function-pointer field — there's no
//! virtual call to make, and a `match` reads better next to the rest of
//! this crate's hittable enum.

use crate::color::ColorRgb;
use crate::hittable::HitRecord;
use crate::math::{self, Point2, Vec3, Xoshiro256StarStar};
use crate::texture::Texture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    Lambert,
    Metal,
    Dielectric,
    /// Struck only when a ray escapes the scene; supplies background
    /// emission and never scatters further.
    Environment,
}

impl MaterialKind {
    pub fn is_dielectric(self) -> bool {
        matches!(self, Self::Dielectric)
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub kind: MaterialKind,
    pub albedo: ColorRgb,
    pub albedo_texture: Option<Texture<ColorRgb>>,
    pub emission: ColorRgb,
    pub emission_intensity: f32,
    pub emission_texture: Option<Texture<ColorRgb>>,
    pub normal_texture: Option<Texture<Vec3>>,
    pub alpha_texture: Option<Texture<f32>>,
    /// Metal roughness: 0 is a perfect mirror.
    pub fuzziness: f32,
    /// Dielectric index of refraction.
    pub ior: f32,
    pub backface_culling: bool,
}

impl Material {
    fn base(kind: MaterialKind) -> Self {
        Self {
            kind,
            albedo: ColorRgb::WHITE,
            albedo_texture: None,
            emission: ColorRgb::BLACK,
            emission_intensity: 1.0,
            emission_texture: None,
            normal_texture: None,
            alpha_texture: None,
            fuzziness: 0.0,
            ior: 1.5,
            backface_culling: true,
        }
    }

    pub fn lambert(albedo: ColorRgb) -> Self {
        Self {
            albedo,
            ..Self::base(MaterialKind::Lambert)
        }
    }

    /// A Lambert surface that also emits light, e.g. an area light panel.
    pub fn lambert_emissive(emission: ColorRgb, emission_intensity: f32) -> Self {
        Self {
            albedo: ColorRgb::BLACK,
            emission,
            emission_intensity,
            ..Self::base(MaterialKind::Lambert)
        }
    }

    pub fn metal(albedo: ColorRgb, fuzziness: f32) -> Self {
        Self {
            albedo,
            fuzziness,
            ..Self::base(MaterialKind::Metal)
        }
    }

    pub fn dielectric(ior: f32) -> Self {
        Self {
            albedo: ColorRgb::WHITE,
            ior,
            backface_culling: false,
            ..Self::base(MaterialKind::Dielectric)
        }
    }

    pub fn environment(emission: ColorRgb) -> Self {
        Self {
            emission,
            ..Self::base(MaterialKind::Environment)
        }
    }

    /// Falls back to the constant `albedo` whenever there's no texture, or
    /// the hit carries no UV to sample it at.
    fn sampled_albedo(&self, hit: &HitRecord) -> ColorRgb {
        match &self.albedo_texture {
            Some(texture) if hit.has_uv => texture.sample(hit.uv),
            _ => self.albedo,
        }
    }

    /// Falls back to the constant `emission` whenever there's no texture, or
    /// the hit carries no UV to sample it at.
    fn sampled_emission(&self, hit: &HitRecord) -> ColorRgb {
        let emission = match &self.emission_texture {
            Some(texture) if hit.has_uv => texture.sample(hit.uv),
            _ => self.emission,
        };
        emission * self.emission_intensity
    }
}

/// What a scatter call produced: whether the path continues, the next
/// direction, and the albedo/emission contributed at this bounce.
#[derive(Clone, Copy, Debug)]
pub struct ScatterOutput {
    pub did_scatter: bool,
    pub is_transmission: bool,
    pub scatter_direction: Vec3,
    pub albedo: ColorRgb,
    pub emission: ColorRgb,
}

impl ScatterOutput {
    fn new(scatter_direction: Vec3, albedo: ColorRgb, emission: ColorRgb) -> Self {
        Self {
            did_scatter: true,
            is_transmission: false,
            scatter_direction,
            albedo,
            emission,
        }
    }

    /// Returned when the alpha-mask prologue rejects the hit; the integrator
    /// reads `hit.hit == false` off the record, not this output, to decide
    /// whether to continue the ray.
    fn alpha_masked() -> Self {
        Self {
            did_scatter: false,
            is_transmission: false,
            scatter_direction: Vec3::zeros(),
            albedo: ColorRgb::BLACK,
            emission: ColorRgb::BLACK,
        }
    }
}

/// Shared Lambert/Metal prologue: alpha-cutout then normal mapping. Both
/// steps are skipped when the hit carries no UV — there's nothing to sample
/// a UV-dependent texture at. Mutates `hit` in place (`hit.hit` on alpha
/// rejection, `hit.normal` on a normal-map hit); returns `true` if the hit
/// survives and scattering should proceed.
fn apply_alpha_and_normal_map(material: &Material, hit: &mut HitRecord) -> bool {
    if hit.has_uv {
        if let Some(alpha) = &material.alpha_texture {
            if alpha.sample(hit.uv) < 0.5 {
                hit.hit = false;
                return false;
            }
        }
    }

    if hit.has_uv {
        if let Some(normal_map) = &material.normal_texture {
            if hit.tangent != Vec3::zeros() && hit.bitangent != Vec3::zeros() {
                let sample = normal_map.sample(hit.uv);
                let tangent_space_normal = 2.0 * sample - Vec3::new(1.0, 1.0, 1.0);
                let world_normal = tangent_space_normal.x * hit.tangent
                    + tangent_space_normal.y * hit.bitangent
                    + tangent_space_normal.z * hit.normal;
                hit.normal = world_normal.normalize();
            }
        }
    }

    true
}

/// Single dispatch point for every material kind, replacing the source's
/// `scatterFunction` pointer. `ray_direction` is the incoming ray's
/// direction (not required unit-length); `hit` carries normal/uv/tangent
/// frame and may be mutated by the alpha/normal-map prologue.
pub fn scatter(
    material: &Material,
    ray_direction: Vec3,
    hit: &mut HitRecord,
    rng: &mut Xoshiro256StarStar,
) -> ScatterOutput {
    match material.kind {
        MaterialKind::Lambert => {
            if !apply_alpha_and_normal_map(material, hit) {
                return ScatterOutput::alpha_masked();
            }
            let normal = hit.normal;
            let mut scatter_direction = normal + math::random_unit_vector(rng);
            if math::near_zero(scatter_direction) {
                scatter_direction = normal;
            }
            ScatterOutput::new(
                scatter_direction,
                material.sampled_albedo(hit),
                material.sampled_emission(hit),
            )
        }
        MaterialKind::Metal => {
            if !apply_alpha_and_normal_map(material, hit) {
                return ScatterOutput::alpha_masked();
            }
            let normal = hit.normal;
            let reflected = math::reflect(ray_direction.normalize(), normal)
                + material.fuzziness * math::random_unit_vector(rng);
            let mut output = ScatterOutput::new(
                reflected,
                material.sampled_albedo(hit),
                material.sampled_emission(hit),
            );
            output.did_scatter = reflected.dot(&normal) > 0.0;
            output
        }
        MaterialKind::Dielectric => {
            let normal = hit.normal;
            let unit_direction = ray_direction.normalize();
            let front_face = unit_direction.dot(&normal) <= 0.0;
            let refraction_ratio = if front_face { 1.0 / material.ior } else { material.ior };
            let outward_normal = if front_face { normal } else { -normal };

            let cos_theta = (-unit_direction.dot(&outward_normal)).min(1.0);
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let total_internal_reflection = refraction_ratio * sin_theta > 1.0;

            let scatter_direction = if total_internal_reflection
                || math::schlick_reflectance(cos_theta, refraction_ratio) > rng.next_f32()
            {
                math::reflect(unit_direction, outward_normal)
            } else {
                math::refract(unit_direction, outward_normal, refraction_ratio)
                    .unwrap_or_else(|| math::reflect(unit_direction, outward_normal))
            };

            ScatterOutput {
                did_scatter: true,
                is_transmission: true,
                scatter_direction,
                albedo: ColorRgb::WHITE,
                emission: ColorRgb::BLACK,
            }
        }
        MaterialKind::Environment => ScatterOutput {
            did_scatter: false,
            is_transmission: false,
            scatter_direction: Vec3::zeros(),
            albedo: ColorRgb::BLACK,
            emission: material.sampled_emission(hit),
        },
    }
}
