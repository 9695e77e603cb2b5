//! Indexed triangle: three vertex ids into a `MeshGeometry`'s parallel
//! arrays, plus a material id. Indexed storage is smaller than a
//! per-triangle copy of positions/normals/UVs and matches how meshes arrive
//! from loaders.

use crate::math::Vec3u;

#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub vertex_ids: Vec3u,
    pub material_id: u32,
}

impl Triangle {
    pub fn new(vertex_ids: [u32; 3], material_id: u32) -> Self {
        Self {
            vertex_ids: Vec3u::new(vertex_ids[0], vertex_ids[1], vertex_ids[2]),
            material_id,
        }
    }
}
