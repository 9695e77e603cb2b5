//! The scene: a hittable hierarchy plus the material struck by rays that
//! escape it.

use std::sync::Arc;

use crate::hittable::Hittable;
use crate::material::Material;

#[derive(Clone, Debug)]
pub struct World {
    pub root: Hittable,
    pub environment_material: Arc<Material>,
}

impl World {
    pub fn new(root: Hittable, environment_material: Arc<Material>) -> Self {
        Self {
            root,
            environment_material,
        }
    }

    /// Runs once before rendering starts: refreshes every hittable's cached
    /// transform matrices.
    pub fn frame_begin(&mut self) {
        self.root.frame_begin();
    }
}
