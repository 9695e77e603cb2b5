//! Built-in scene presets, used when no external scene description is
//! supplied: a Cornell-box-like enclosure and a three-sphere material
//! showcase, the two canonical smoke-test scenes for a path tracer.

use std::sync::Arc;

use crate::camera::Camera;
use crate::color::ColorRgb;
use crate::config::ScenePreset;
use crate::hittable::Hittable;
use crate::material::Material;
use crate::math::{Point3, Vec3};
use crate::transform::Transform;
use crate::world::World;

pub fn build(preset: ScenePreset) -> (World, Camera) {
    match preset {
        ScenePreset::CornellBox => cornell_box(),
        ScenePreset::Spheres => spheres(),
    }
}

/// A minimal Cornell-box-like enclosure: a white floor/ceiling/back wall,
/// red/green side walls, and an emissive rectangle set into the ceiling.
fn cornell_box() -> (World, Camera) {
    let white = Arc::new(Material::lambert(ColorRgb::new(0.73, 0.73, 0.73)));
    let red = Arc::new(Material::lambert(ColorRgb::new(0.65, 0.05, 0.05)));
    let green = Arc::new(Material::lambert(ColorRgb::new(0.12, 0.45, 0.15)));
    let light = Arc::new(Material::lambert_emissive(ColorRgb::WHITE, 15.0));

    let mut floor = Transform::from_position(Vec3::new(0.0, -1.0, 0.0));
    floor.update();
    let mut ceiling = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
    ceiling.update();
    let mut back_wall = Transform::new(
        Vec3::new(0.0, 0.0, 1.0),
        crate::math::Quat::from_axis_angle(&nalgebra::Vector3::x_axis(), std::f32::consts::FRAC_PI_2),
        Vec3::new(2.0, 1.0, 2.0),
    );
    back_wall.update();
    let mut left_wall = Transform::new(
        Vec3::new(-1.0, 0.0, 0.0),
        crate::math::Quat::from_axis_angle(&nalgebra::Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
        Vec3::new(2.0, 1.0, 2.0),
    );
    left_wall.update();
    let mut right_wall = Transform::new(
        Vec3::new(1.0, 0.0, 0.0),
        crate::math::Quat::from_axis_angle(&nalgebra::Vector3::z_axis(), -std::f32::consts::FRAC_PI_2),
        Vec3::new(2.0, 1.0, 2.0),
    );
    right_wall.update();
    let mut light_panel = Transform::new(
        Vec3::new(0.0, 0.999, 0.0),
        crate::math::Quat::identity(),
        Vec3::new(0.5, 1.0, 0.5),
    );
    light_panel.update();

    let root = Hittable::Group(vec![
        Hittable::Rectangle {
            transform: floor,
            material: white.clone(),
        },
        Hittable::Rectangle {
            transform: ceiling,
            material: white.clone(),
        },
        Hittable::Rectangle {
            transform: back_wall,
            material: white,
        },
        Hittable::Rectangle {
            transform: left_wall,
            material: red,
        },
        Hittable::Rectangle {
            transform: right_wall,
            material: green,
        },
        Hittable::Rectangle {
            transform: light_panel,
            material: light,
        },
    ]);

    let environment = Arc::new(Material::environment(ColorRgb::BLACK));
    let world = World::new(root, environment);

    let mut camera = Camera::new(
        Point3::new(0.0, 0.0, -3.5),
        Point3::origin(),
        Vec3::new(0.0, 1.0, 0.0),
        40.0,
    );
    camera.focus_distance = 3.5;
    (world, camera)
}

/// Three spheres (Lambert, metal, dielectric) on a large Lambert "ground"
/// sphere, lit entirely by a bright environment.
fn spheres() -> (World, Camera) {
    let ground = Hittable::Sphere {
        center: Point3::new(0.0, -100.5, -1.0),
        radius: 100.0,
        material: Arc::new(Material::lambert(ColorRgb::new(0.5, 0.5, 0.5))),
    };
    let lambert_sphere = Hittable::Sphere {
        center: Point3::new(-1.0, 0.0, -1.0),
        radius: 0.5,
        material: Arc::new(Material::lambert(ColorRgb::new(0.1, 0.2, 0.5))),
    };
    let metal_sphere = Hittable::Sphere {
        center: Point3::new(1.0, 0.0, -1.0),
        radius: 0.5,
        material: Arc::new(Material::metal(ColorRgb::new(0.8, 0.6, 0.2), 0.1)),
    };
    let glass_sphere = Hittable::Sphere {
        center: Point3::new(0.0, 0.0, -1.0),
        radius: 0.5,
        material: Arc::new(Material::dielectric(1.5)),
    };

    let root = Hittable::Group(vec![ground, lambert_sphere, metal_sphere, glass_sphere]);
    let environment = Arc::new(Material::environment(ColorRgb::new(0.5, 0.7, 1.0)));
    let world = World::new(root, environment);

    let camera = Camera::new(
        Point3::new(-2.0, 2.0, 1.0),
        Point3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 1.0, 0.0),
        40.0,
    );
    (world, camera)
}
