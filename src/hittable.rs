//! The scene's geometric hierarchy, expressed as a tagged enum instead of a
//! virtual base class: the set of hittable kinds is closed and known at
//! compile time, and a `match` avoids a vtable indirection per intersection
//! test.

use std::sync::Arc;

use crate::material::Material;
use crate::math::{transform_normal, transform_point, transform_vector, Point2, Point3, Vec3};
use crate::mesh::Mesh;
use crate::ray::Ray;
use crate::transform::Transform;

/// Everything a hit needs to pass on to shading; `material`/`geometry` are
/// borrowed (not owned) since they outlive any single hit within a render.
#[derive(Clone, Debug)]
pub struct HitRecord {
    pub hit: bool,
    pub point: Point3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub uv: Point2,
    /// Whether `uv` was actually interpolated from mesh/surface data, as
    /// opposed to left at its default. Hittables without a UV parameterization
    /// (or meshes loaded without one) leave this `false`, and UV-dependent
    /// texture sampling is skipped rather than sampling a meaningless `uv`.
    pub has_uv: bool,
    pub material: Option<Arc<Material>>,
}

impl HitRecord {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Point3::origin(),
            normal: Vec3::zeros(),
            tangent: Vec3::zeros(),
            bitangent: Vec3::zeros(),
            uv: Point2::origin(),
            has_uv: false,
            material: None,
        }
    }

    /// Orients `normal` against `ray.direction` (outward-facing convention),
    /// matching `HitRecord::setNormal`.
    pub fn set_front_facing_normal(&mut self, ray_direction: Vec3, outward_normal: Vec3) {
        let front_face = ray_direction.dot(&outward_normal) <= 0.0;
        self.normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }

    /// Carries normal/tangent/bitangent from a child's local frame into the
    /// parent's, via the inverse-transpose of `matrix`.
    fn transform_by(&mut self, matrix: &crate::math::Mat4, inverse: &crate::math::Mat4) {
        if self.normal != Vec3::zeros() {
            self.normal = transform_normal(inverse, self.normal);
        }
        if self.tangent != Vec3::zeros() {
            self.tangent = transform_vector(matrix, self.tangent).normalize();
        }
        if self.bitangent != Vec3::zeros() {
            self.bitangent = transform_vector(matrix, self.bitangent).normalize();
        }
    }
}

#[derive(Clone, Debug)]
pub enum Hittable {
    Group(Vec<Hittable>),
    TransformedInstance {
        transform: Transform,
        hittable: Box<Hittable>,
    },
    Sphere {
        center: Point3,
        radius: f32,
        material: Arc<Material>,
    },
    InfinitePlane {
        origin: Point3,
        normal: Vec3,
        material: Arc<Material>,
    },
    Rectangle {
        transform: Transform,
        material: Arc<Material>,
    },
    Disc {
        transform: Transform,
        material: Arc<Material>,
        size: (f32, f32),
    },
    Model(Mesh),
}

impl Hittable {
    /// Per-frame preparation: refreshes cached transform matrices and lazily
    /// builds any pending mesh BVHs, matching the source's `frameBegin`
    /// sweep. `MeshGeometry::ensure_bvh_built` is idempotent, so this is safe
    /// to call every frame and safe to reach the same geometry through
    /// multiple `TransformedInstance`s.
    pub fn frame_begin(&mut self) {
        match self {
            Self::Group(children) => {
                for child in children {
                    child.frame_begin();
                }
            }
            Self::TransformedInstance {
                transform,
                hittable,
            } => {
                transform.update();
                hittable.frame_begin();
            }
            Self::Rectangle { transform, .. } | Self::Disc { transform, .. } => {
                transform.update();
            }
            Self::Model(mesh) => mesh.geometry.ensure_bvh_built(),
            Self::Sphere { .. } | Self::InfinitePlane { .. } => {}
        }
    }

    pub fn hit(&self, ray: &mut Ray) -> HitRecord {
        match self {
            Self::Group(children) => {
                let mut closest = HitRecord::miss();
                for child in children {
                    let candidate = child.hit(ray);
                    if candidate.hit {
                        closest = candidate;
                    }
                }
                closest
            }

            Self::TransformedInstance {
                transform,
                hittable,
            } => {
                let mut local_ray = ray.transformed(transform.model_matrix_inverse());
                let mut hit = hittable.hit(&mut local_ray);
                #[cfg(feature = "bvh_test")]
                ray.merge_test_counts(&local_ray);
                if hit.hit {
                    // The local and world rays share the same parametrization
                    // under an affine transform (see `Ray::transformed`), so
                    // the accepted local `t` is already the world `t` — no
                    // rescaling.
                    ray.t_interval.max = local_ray.t_interval.max;
                    hit.transform_by(transform.model_matrix(), transform.model_matrix_inverse());
                }
                hit
            }

            Self::Sphere {
                center,
                radius,
                material,
            } => sphere_hit(ray, *center, *radius, material),

            Self::InfinitePlane {
                origin,
                normal,
                material,
            } => infinite_plane_hit(ray, *origin, *normal, material),

            Self::Rectangle { transform, material } => rectangle_hit(ray, transform, material),

            Self::Disc {
                transform,
                material,
                size,
            } => disc_hit(ray, transform, material, *size),

            Self::Model(mesh) => model_hit(ray, mesh),
        }
    }
}

fn sphere_hit(ray: &mut Ray, center: Point3, radius: f32, material: &Arc<Material>) -> HitRecord {
    let oc = ray.origin - center;
    let half_b = ray.direction.dot(&oc);
    let c = oc.dot(&oc) - radius * radius;
    let discriminant = half_b * half_b - c;
    if discriminant < 0.0 {
        return HitRecord::miss();
    }
    let sqrt_d = discriminant.sqrt();
    let mut t = -half_b - sqrt_d;
    if !ray.t_interval.surrounds(t) {
        t = -half_b + sqrt_d;
        if !ray.t_interval.surrounds(t) {
            return HitRecord::miss();
        }
    }

    ray.t_interval.max = t;
    let point = ray.at(t);
    let outward_normal = (point - center) / radius;
    let mut hit = HitRecord::miss();
    hit.hit = true;
    hit.point = point;
    hit.set_front_facing_normal(ray.direction, outward_normal);
    hit.material = Some(material.clone());
    hit
}

fn infinite_plane_hit(
    ray: &mut Ray,
    origin: Point3,
    normal: Vec3,
    material: &Arc<Material>,
) -> HitRecord {
    let denom = normal.dot(&ray.direction);
    if denom.abs() < 1e-6 {
        return HitRecord::miss();
    }
    let t = (origin - ray.origin).dot(&normal) / denom;
    if !ray.t_interval.surrounds(t) {
        return HitRecord::miss();
    }
    ray.t_interval.max = t;
    let mut hit = HitRecord::miss();
    hit.hit = true;
    hit.point = ray.at(t);
    hit.normal = if denom < 0.0 { normal } else { -normal };
    hit.material = Some(material.clone());
    hit
}

fn rectangle_hit(ray: &mut Ray, transform: &Transform, material: &Arc<Material>) -> HitRecord {
    let local_ray = ray.transformed(transform.model_matrix_inverse());
    if local_ray.direction.y.abs() < 1e-6 {
        return HitRecord::miss();
    }
    let t = -local_ray.origin.y / local_ray.direction.y;
    let local_point = local_ray.at(t);

    let hit_ok = local_ray.t_interval.surrounds(t)
        && local_point.x.abs() <= 0.5
        && local_point.z.abs() <= 0.5;
    if !hit_ok {
        return HitRecord::miss();
    }

    // Local and world `t` coincide under an affine transform; see
    // `Ray::transformed`.
    ray.t_interval.max = t;

    let local_normal = if local_ray.direction.y < 0.0 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(0.0, -1.0, 0.0)
    };

    let mut hit = HitRecord::miss();
    hit.hit = true;
    hit.point = transform_point(transform.model_matrix(), local_point);
    hit.normal = local_normal;
    hit.material = Some(material.clone());
    hit.transform_by(transform.model_matrix(), transform.model_matrix_inverse());
    hit
}

fn disc_hit(
    ray: &mut Ray,
    transform: &Transform,
    material: &Arc<Material>,
    size: (f32, f32),
) -> HitRecord {
    let normal = transform_vector(transform.model_matrix(), Vec3::new(0.0, 1.0, 0.0));
    let origin = transform.position();
    let u = transform_vector(transform.model_matrix(), Vec3::new(1.0, 0.0, 0.0) * size.0);
    let v = transform_vector(transform.model_matrix(), Vec3::new(0.0, 0.0, 1.0) * size.1);

    let dot = normal.dot(&ray.direction);
    if dot.abs() < 1e-6 {
        return HitRecord::miss();
    }
    let t = (origin - ray.origin).dot(&normal) / dot;
    let plane_point = ray.at(t) - origin;
    let uv = Point2::new(
        plane_point.dot(&u) / u.norm_squared(),
        plane_point.dot(&v) / v.norm_squared(),
    );

    let hit_ok = ray.t_interval.surrounds(t) && (uv.x * uv.x + uv.y * uv.y).sqrt() <= 0.5;
    if !hit_ok {
        return HitRecord::miss();
    }

    ray.t_interval.max = t;
    let mut hit = HitRecord::miss();
    hit.hit = true;
    hit.point = ray.at(t);
    hit.normal = if dot < 0.0 { normal } else { -normal };
    hit.uv = Point2::new(uv.x + 0.5, uv.y + 0.5);
    hit.has_uv = true;
    hit.material = Some(material.clone());
    hit
}

fn model_hit(ray: &mut Ray, mesh: &Mesh) -> HitRecord {
    let geometry = &mesh.geometry;
    let backface_culling = mesh.effective_backface_culling();

    let triangle_hit = geometry
        .bvh()
        .closest_hit(ray, &geometry.positions, geometry.triangles(), backface_culling);

    let Some(triangle_hit) = triangle_hit else {
        return HitRecord::miss();
    };

    let triangle = &geometry.triangles()[triangle_hit.triangle_id as usize];
    let ids = triangle.vertex_ids;
    let (b0, b1, b2) = (
        triangle_hit.barycentric.x,
        triangle_hit.barycentric.y,
        triangle_hit.barycentric.z,
    );

    let mut hit = HitRecord::miss();
    hit.hit = true;
    hit.point = ray.at(triangle_hit.t);
    hit.material = Some(mesh.material_for(triangle).clone());

    if let Some(uvs) = &geometry.uvs {
        hit.uv = Point2::new(
            b0 * uvs[ids.x as usize].x + b1 * uvs[ids.y as usize].x + b2 * uvs[ids.z as usize].x,
            b0 * uvs[ids.x as usize].y + b1 * uvs[ids.y as usize].y + b2 * uvs[ids.z as usize].y,
        );
        hit.has_uv = true;
    }

    hit.normal = if let Some(normals) = &geometry.normals {
        (b0 * normals[ids.x as usize] + b1 * normals[ids.y as usize] + b2 * normals[ids.z as usize])
            .normalize()
    } else {
        let p0 = geometry.positions[ids.x as usize];
        let p1 = geometry.positions[ids.y as usize];
        let p2 = geometry.positions[ids.z as usize];
        (p1 - p0).cross(&(p2 - p0)).normalize()
    };

    if let Some(tangents) = &geometry.tangents {
        let t0 = tangents[ids.x as usize];
        let t1 = tangents[ids.y as usize];
        let t2 = tangents[ids.z as usize];
        let t0_xyz = Vec3::new(t0.x, t0.y, t0.z);
        let t1_xyz = Vec3::new(t1.x, t1.y, t1.z);
        let t2_xyz = Vec3::new(t2.x, t2.y, t2.z);
        let interpolated = b0 * t0_xyz + b1 * t1_xyz + b2 * t2_xyz;
        let handedness = t0.w;
        hit.tangent = (interpolated - interpolated.dot(&hit.normal) * hit.normal).normalize();
        hit.bitangent = (handedness * hit.normal.cross(&hit.tangent)).normalize();
    }

    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorRgb;
    use crate::material::Material;
    use crate::math::{Quat, Vec3};
    use approx::assert_abs_diff_eq;

    fn lambert() -> Arc<Material> {
        Arc::new(Material::lambert(ColorRgb::WHITE))
    }

    #[test]
    fn sphere_hit_from_outside() {
        let sphere = Hittable::Sphere {
            center: Point3::origin(),
            radius: 1.0,
            material: lambert(),
        };
        let mut ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = sphere.hit(&mut ray);
        assert!(hit.hit);
        assert_abs_diff_eq!(ray.t_interval.max, 4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.normal.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn sphere_miss() {
        let sphere = Hittable::Sphere {
            center: Point3::origin(),
            radius: 1.0,
            material: lambert(),
        };
        let mut ray = Ray::new(Point3::new(5.0, 5.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!sphere.hit(&mut ray).hit);
    }

    #[test]
    fn group_reports_the_closest_hit() {
        let near = Hittable::Sphere {
            center: Point3::new(0.0, 0.0, 2.0),
            radius: 0.5,
            material: lambert(),
        };
        let far = Hittable::Sphere {
            center: Point3::new(0.0, 0.0, 5.0),
            radius: 0.5,
            material: lambert(),
        };
        let group = Hittable::Group(vec![far, near]);
        let mut ray = Ray::new(Point3::origin(), Vec3::new(0.0, 0.0, 1.0));
        let hit = group.hit(&mut ray);
        assert!(hit.hit);
        assert_abs_diff_eq!(ray.t_interval.max, 1.5, epsilon = 1e-4);
    }

    #[test]
    fn transformed_instance_moves_the_hit_point() {
        let sphere = Hittable::Sphere {
            center: Point3::origin(),
            radius: 1.0,
            material: lambert(),
        };
        let mut transform = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        transform.update();
        let mut instance = Hittable::TransformedInstance {
            transform,
            hittable: Box::new(sphere),
        };
        instance.frame_begin();

        let mut ray = Ray::new(Point3::new(10.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = instance.hit(&mut ray);
        assert!(hit.hit);
        assert_abs_diff_eq!(hit.point.x, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(ray.t_interval.max, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn transformed_instance_rotation_carries_the_normal() {
        let plane = Hittable::InfinitePlane {
            origin: Point3::origin(),
            normal: Vec3::new(0.0, 1.0, 0.0),
            material: lambert(),
        };
        let mut transform = Transform::new(
            Vec3::zeros(),
            Quat::from_axis_angle(&nalgebra::Vector3::x_axis(), std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 1.0, 1.0),
        );
        transform.update();
        let mut instance = Hittable::TransformedInstance {
            transform,
            hittable: Box::new(plane),
        };
        instance.frame_begin();

        let mut ray = Ray::new(Point3::new(0.0, -5.0, 0.1), Vec3::new(0.0, 1.0, 0.0));
        let hit = instance.hit(&mut ray);
        assert!(hit.hit);
        // The plane's local +y normal, after a +90deg rotation about x,
        // should point roughly along -z or +z in world space.
        assert!(hit.normal.y.abs() < 0.2);
    }

    #[test]
    fn transformed_instance_with_non_uniform_scale_reports_the_true_world_distance() {
        // Non-uniform scale (2,1,2) matches the student's own Cornell-box
        // wall transforms (scenes.rs). The wrapped plane is the world y=0
        // plane both before and after this scale (it only stretches the
        // plane within itself), so the true world hit distance can be
        // computed by hand directly from the unscaled ray: origin (0,-5,0),
        // direction (0.8,5,0) reaches y=0 at t = 5/5 = 1.
        let plane = Hittable::InfinitePlane {
            origin: Point3::origin(),
            normal: Vec3::new(0.0, 1.0, 0.0),
            material: lambert(),
        };
        let mut transform = Transform::new(Vec3::zeros(), Quat::identity(), Vec3::new(2.0, 1.0, 2.0));
        transform.update();
        let mut instance = Hittable::TransformedInstance {
            transform,
            hittable: Box::new(plane),
        };
        instance.frame_begin();

        let mut ray = Ray::new(Point3::new(0.0, -5.0, 0.0), Vec3::new(0.8, 5.0, 0.0));
        let hit = instance.hit(&mut ray);
        assert!(hit.hit);
        assert_abs_diff_eq!(ray.t_interval.max, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.point.x, 0.8, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.point.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn rectangle_with_non_uniform_scale_reports_the_true_world_distance() {
        // Same (2,1,2) scale as the Cornell-box walls. Local hit point
        // (0.4,0,0) is well inside the unit rectangle's [-0.5,0.5] bounds,
        // and the local/world parametric `t` coincide exactly (hand
        // computation: local origin (0,-5,0), local direction (0.4,5,0)
        // reaches local y=0 at t = 5/5 = 1).
        let transform = Transform::new(Vec3::zeros(), Quat::identity(), Vec3::new(2.0, 1.0, 2.0));
        let rectangle = Hittable::Rectangle {
            transform,
            material: lambert(),
        };

        let mut ray = Ray::new(Point3::new(0.0, -5.0, 0.0), Vec3::new(0.8, 5.0, 0.0));
        let hit = rectangle.hit(&mut ray);
        assert!(hit.hit);
        assert_abs_diff_eq!(ray.t_interval.max, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.point.x, 0.8, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.point.y, 0.0, epsilon = 1e-4);
    }
}
