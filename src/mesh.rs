//! Triangle mesh storage: a [`MeshGeometry`] (positions plus optional
//! per-vertex UV/normal/tangent arrays and the BVH over its triangles) and a
//! [`Mesh`] (a geometry plus the per-triangle-material-id material table).

use std::sync::{Arc, OnceLock};

use anyhow::{ensure, Result};

use crate::bvh::{Bvh, Stats as BvhStats};
use crate::material::Material;
use crate::math::{Point2, Point3, Vec3, Vec4};
use crate::triangle::Triangle;

/// The BVH and its reordered triangle slice, built lazily and at most once
/// per `MeshGeometry` (see `ensure_bvh_built`).
#[derive(Debug)]
struct Built {
    triangles: Vec<Triangle>,
    bvh: Bvh,
}

/// Vertex attribute buffers plus the (lazily built) BVH over its triangles.
/// `ensure_bvh_built` is the spec'd `frameBegin` hook: idempotent, and
/// deferred until a frame actually needs it rather than run eagerly at
/// construction time.
#[derive(Debug)]
pub struct MeshGeometry {
    pub positions: Vec<Point3>,
    pub uvs: Option<Vec<Point2>>,
    pub normals: Option<Vec<Vec3>>,
    /// xyz = tangent direction, w = bitangent handedness (+-1), matching the
    /// glTF tangent convention the source also uses.
    pub tangents: Option<Vec<Vec4>>,
    name: String,
    initial_triangles: Vec<Triangle>,
    built: OnceLock<Built>,
}

impl MeshGeometry {
    pub fn new(
        name: &str,
        positions: Vec<Point3>,
        uvs: Option<Vec<Point2>>,
        normals: Option<Vec<Vec3>>,
        tangents: Option<Vec<Vec4>>,
        triangles: Vec<Triangle>,
    ) -> Result<Self> {
        ensure!(!positions.is_empty(), "mesh {name} has no vertices");
        ensure!(!triangles.is_empty(), "mesh {name} has no triangles");
        if let Some(uvs) = &uvs {
            ensure!(uvs.len() == positions.len(), "mesh {name}: uv/position count mismatch");
        }
        if let Some(normals) = &normals {
            ensure!(
                normals.len() == positions.len(),
                "mesh {name}: normal/position count mismatch"
            );
        }
        if let Some(tangents) = &tangents {
            ensure!(
                tangents.len() == positions.len(),
                "mesh {name}: tangent/position count mismatch"
            );
        }
        for triangle in &triangles {
            for id in [
                triangle.vertex_ids.x,
                triangle.vertex_ids.y,
                triangle.vertex_ids.z,
            ] {
                ensure!(
                    (id as usize) < positions.len(),
                    "mesh {name}: triangle references out-of-range vertex {id}"
                );
            }
        }

        Ok(Self {
            positions,
            uvs,
            normals,
            tangents,
            name: name.to_string(),
            initial_triangles: triangles,
            built: OnceLock::new(),
        })
    }

    /// Builds the BVH over this geometry's triangles on first call;
    /// subsequent calls are a no-op, matching the spec's "`frameBegin`
    /// lazily builds the BVH ... built at most once per `MeshGeometry`"
    /// contract. Safe to call from multiple `TransformedInstance`s sharing
    /// this geometry through `Arc`.
    pub fn ensure_bvh_built(&self) {
        self.built.get_or_init(|| {
            let mut triangles = self.initial_triangles.clone();
            let (bvh, stats) = Bvh::build(&mut triangles, &self.positions);
            log::debug!(
                "{} BVH: buildTime={}us triangleCount={} nodeCount={} leafCount={} maxDepth={} avgTrianglesPerLeaf={:.2} maxTrianglesPerLeaf={}",
                self.name,
                stats.build_time_us,
                stats.triangle_count,
                stats.node_count,
                stats.leaf_count,
                stats.max_depth,
                bvh_stats_avg_per_leaf(&stats),
                stats.max_triangles_per_leaf,
            );
            Built { triangles, bvh }
        });
    }

    fn built(&self) -> &Built {
        self.built
            .get()
            .expect("MeshGeometry::ensure_bvh_built must run (via frame_begin) before querying the BVH")
    }

    pub fn bvh(&self) -> &Bvh {
        &self.built().bvh
    }

    /// The BVH-reordered triangle list; only valid after `ensure_bvh_built`.
    pub fn triangles(&self) -> &[Triangle] {
        &self.built().triangles
    }
}

fn bvh_stats_avg_per_leaf(stats: &BvhStats) -> f32 {
    if stats.leaf_count == 0 {
        0.0
    } else {
        stats.triangle_count as f32 / stats.leaf_count as f32
    }
}

/// A geometry plus the materials its triangles' `material_id` indexes into.
/// `geometry` is reference-counted so the same mesh data can back multiple
/// [`crate::hittable::Hittable::TransformedInstance`]s without duplication.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<MeshGeometry>,
    pub materials: Vec<Arc<Material>>,
}

impl Mesh {
    pub fn new(geometry: Arc<MeshGeometry>, materials: Vec<Arc<Material>>) -> Result<Self> {
        for triangle in &geometry.initial_triangles {
            ensure!(
                (triangle.material_id as usize) < materials.len(),
                "triangle references out-of-range material {}",
                triangle.material_id
            );
        }
        Ok(Self { geometry, materials })
    }

    pub fn material_for(&self, triangle: &Triangle) -> &Arc<Material> {
        &self.materials[triangle.material_id as usize]
    }

    /// `true` if every material on this mesh wants backface culling and none
    /// of them is a dielectric (glass needs both faces to refract/reflect
    /// correctly), matching `Model::frameBegin`'s AND-reduction.
    pub fn effective_backface_culling(&self) -> bool {
        self.materials
            .iter()
            .all(|material| material.backface_culling && !material.kind.is_dielectric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialKind;
    use crate::math::Vec3u;

    fn unit_triangle_mesh() -> MeshGeometry {
        MeshGeometry::new(
            "test",
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            None,
            None,
            None,
            vec![Triangle::new([0, 1, 2], 0)],
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_triangle_indices() {
        let result = MeshGeometry::new(
            "bad",
            vec![Point3::origin()],
            None,
            None,
            None,
            vec![Triangle {
                vertex_ids: Vec3u::new(0, 1, 2),
                material_id: 0,
            }],
        );
        assert!(result.is_err());
    }

    #[test]
    fn builds_a_bvh_over_its_triangles() {
        let geometry = unit_triangle_mesh();
        geometry.ensure_bvh_built();
        assert_eq!(geometry.bvh().nodes().len(), 1);
    }

    #[test]
    fn ensure_bvh_built_is_idempotent() {
        let geometry = unit_triangle_mesh();
        geometry.ensure_bvh_built();
        let node_count_before = geometry.bvh().nodes().len();
        geometry.ensure_bvh_built();
        assert_eq!(geometry.bvh().nodes().len(), node_count_before);
    }

    #[test]
    fn backface_culling_disabled_for_any_dielectric_material() {
        let geometry = Arc::new(unit_triangle_mesh());
        let mut glass = Material::lambert(crate::color::ColorRgb::WHITE);
        glass.kind = MaterialKind::Dielectric;
        glass.ior = 1.5;
        glass.backface_culling = true;
        let mesh = Mesh::new(geometry, vec![Arc::new(glass)]).unwrap();
        assert!(!mesh.effective_backface_culling());
    }
}
