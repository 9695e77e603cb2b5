//! Thin-lens camera: pinhole ray generation plus a defocus disk for depth of
//! field.

use crate::math::{random_in_unit_disk, Point3, Vec2, Vec3, Xoshiro256StarStar};
use crate::ray::Ray;

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3,
    pub look_at: Point3,
    pub up: Vec3,
    /// Vertical field of view, in degrees.
    pub fov: f32,
    /// `0` disables depth of field (pinhole).
    pub defocus_angle: f32,
    pub focus_distance: f32,

    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    pixel_grid_origin: Point3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    pub fn new(position: Point3, look_at: Point3, up: Vec3, fov: f32) -> Self {
        Self {
            position,
            look_at,
            up,
            fov,
            defocus_angle: 0.0,
            focus_distance: 10.0,
            pixel_delta_u: Vec3::zeros(),
            pixel_delta_v: Vec3::zeros(),
            pixel_grid_origin: Point3::origin(),
            defocus_disk_u: Vec3::zeros(),
            defocus_disk_v: Vec3::zeros(),
        }
    }

    /// Caches the viewport basis and pixel deltas for `image_size`. Must be
    /// called (again) whenever the image size or camera parameters change;
    /// called once per render from `Renderer::render_frame`.
    pub fn initialize(&mut self, image_size: (u32, u32)) {
        let aspect_ratio = image_size.0 as f32 / image_size.1 as f32;
        let viewport_height =
            2.0 * self.focus_distance * (self.fov.to_radians() / 2.0).tan();
        let viewport_size = Vec2::new(aspect_ratio * viewport_height, viewport_height);

        let w = (self.position - self.look_at).normalize();
        let u = self.up.cross(&w).normalize();
        let v = w.cross(&u);

        let viewport_u = u * viewport_size.x;
        let viewport_v = -v * viewport_size.y;

        self.pixel_delta_u = viewport_u / image_size.0 as f32;
        self.pixel_delta_v = viewport_v / image_size.1 as f32;
        self.pixel_grid_origin = self.position - self.focus_distance * w - viewport_u / 2.0
            - viewport_v / 2.0
            + self.pixel_delta_u / 2.0
            + self.pixel_delta_v / 2.0;

        let defocus_radius = self.focus_distance * (self.defocus_angle.to_radians() / 2.0).tan();
        self.defocus_disk_u = defocus_radius * u;
        self.defocus_disk_v = defocus_radius * v;
    }

    /// Builds a ray through `pixel`, jittered within the pixel by
    /// `sub_pixel_offset in [-0.5, 0.5]^2`, originating from a random point
    /// on the defocus disk when depth of field is enabled.
    pub fn create_ray(
        &self,
        pixel: (u32, u32),
        sub_pixel_offset: Vec2,
        rng: &mut Xoshiro256StarStar,
    ) -> Ray {
        let pixel_center = self.pixel_grid_origin
            + pixel.0 as f32 * self.pixel_delta_u
            + pixel.1 as f32 * self.pixel_delta_v;
        let sample_point = pixel_center
            + sub_pixel_offset.x * self.pixel_delta_u
            + sub_pixel_offset.y * self.pixel_delta_v;

        let mut origin = self.position;
        if self.defocus_angle > 0.0 {
            let disk = random_in_unit_disk(rng);
            origin += self.defocus_disk_u * disk.x + self.defocus_disk_v * disk.y;
        }

        Ray::new(origin, sample_point - origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pinhole_ray_passes_through_the_pixel_center() {
        let mut camera = Camera::new(
            Point3::new(0.0, 0.0, -5.0),
            Point3::origin(),
            Vec3::new(0.0, 1.0, 0.0),
            90.0,
        );
        camera.initialize((100, 100));
        let ray = camera.create_ray((50, 50), Vec2::new(0.0, 0.0), &mut Xoshiro256StarStar::seed_from_u64(0));
        // The center pixel of a symmetric viewport should point straight
        // down -z (toward look_at), with no horizontal/vertical deflection.
        assert_abs_diff_eq!(ray.direction.x, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(ray.direction.y, 0.0, epsilon = 1e-3);
        assert!(ray.direction.z > 0.0);
    }

    #[test]
    fn defocus_disabled_always_originates_at_the_camera_position() {
        let mut camera = Camera::new(
            Point3::new(1.0, 2.0, 3.0),
            Point3::origin(),
            Vec3::new(0.0, 1.0, 0.0),
            60.0,
        );
        camera.initialize((64, 64));
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        for _ in 0..20 {
            let ray = camera.create_ray((10, 10), Vec2::new(0.2, -0.3), &mut rng);
            assert_abs_diff_eq!(ray.origin.x, 1.0);
            assert_abs_diff_eq!(ray.origin.y, 2.0);
            assert_abs_diff_eq!(ray.origin.z, 3.0);
        }
    }
}
