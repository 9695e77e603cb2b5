//! Binary bounding-volume hierarchy over a mesh's triangles, built with a
//! binned Surface-Area-Heuristic (PBRT-style bucketed SAH, the
//! `Node{aabb, offset, triangle_count}` leaf/interior encoding) via an
//! iterative work-queue build, and traversed with a fixed-size stack pushing
//! the nearer child last so it pops first. The ray-triangle test is Woop's
//! watertight shear-transform formulation, needed for correctness on
//! edge-sharing triangles.

use std::collections::VecDeque;
use std::time::Instant;

use crate::aabb::Aabb;
use crate::math::{Point3, Vec3};
use crate::ray::Ray;
use crate::triangle::Triangle;

/// Leaves hold `triangle_count <= MAX_TRIS_PER_LEAF` triangles contiguous in
/// the mesh's (BVH-reordered) triangle array.
pub const MAX_TRIS_PER_LEAF: u32 = 32;
/// Both a build depth cap and the traversal stack's fixed capacity.
pub const MAX_DEPTH: usize = 128;
/// Bins per axis evaluated by `find_best_split`.
const SPLIT_BINS: usize = 12;

#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub aabb: Aabb,
    /// `0` for interior nodes; otherwise the number of triangles in this leaf.
    pub triangle_count: u32,
    /// Leaf: index of the first triangle in the reordered triangle array.
    /// Interior: index of the first of two consecutive children.
    pub offset: u32,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.triangle_count > 0
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub build_time_us: u64,
    pub triangle_count: u32,
    pub node_count: u32,
    pub leaf_count: u32,
    pub max_depth: u32,
    pub max_triangles_per_leaf: u32,
}

#[derive(Clone, Debug)]
pub struct Bvh {
    nodes: Vec<Node>,
}

/// A single triangle's closest-hit result: which triangle, where on it, how
/// far along the ray. `point`/`normal`/`uv` are derived by the caller (the
/// `Model` hittable) from the mesh's vertex attributes and these
/// barycentrics, not stored here.
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub triangle_id: u32,
    /// `(b0, b1, b2)` weights for the triangle's three vertices, summing to 1.
    pub barycentric: Vec3,
    pub t: f32,
}

struct Item {
    aabb: Aabb,
    centroid: Point3,
}

fn triangle_aabb(triangle: &Triangle, positions: &[Point3]) -> Aabb {
    let mut aabb = Aabb::empty();
    aabb.extend(positions[triangle.vertex_ids.x as usize]);
    aabb.extend(positions[triangle.vertex_ids.y as usize]);
    aabb.extend(positions[triangle.vertex_ids.z as usize]);
    aabb
}

struct Split {
    axis: usize,
    position: f32,
    cost: f32,
}

/// For each of the 3 axes, bins triangle centroids into `SPLIT_BINS` equal
/// width buckets and evaluates the SAH cost of the `SPLIT_BINS - 1` planes
/// between them. Returns the cheapest split across all axes, or `None` if
/// every axis is centroid-degenerate (all centroids coincide).
fn find_best_split(items: &[Item], node_aabb: &Aabb) -> Option<Split> {
    let centroid_bounds = items
        .iter()
        .fold(Aabb::empty(), |acc, item| {
            let mut b = acc;
            b.extend(item.centroid);
            b
        });

    let mut best: Option<Split> = None;

    for axis in 0..3 {
        let axis_min = centroid_bounds.min()[axis];
        let axis_max = centroid_bounds.max()[axis];
        let extent = axis_max - axis_min;
        if extent <= 0.0 {
            continue;
        }

        #[derive(Clone, Copy)]
        struct Bin {
            count: u32,
            aabb: Aabb,
        }
        let mut bins = [Bin {
            count: 0,
            aabb: Aabb::empty(),
        }; SPLIT_BINS];

        let bin_of = |centroid: f32| -> usize {
            let t = (centroid - axis_min) / extent;
            ((t * SPLIT_BINS as f32) as usize).min(SPLIT_BINS - 1)
        };

        for item in items {
            let bin = &mut bins[bin_of(item.centroid[axis])];
            bin.count += 1;
            bin.aabb.merge(&item.aabb);
        }

        // Prefix (left) and suffix (right) unions of bin data.
        let mut left_count = [0u32; SPLIT_BINS];
        let mut left_aabb = [Aabb::empty(); SPLIT_BINS];
        let mut running_count = 0u32;
        let mut running_aabb = Aabb::empty();
        for i in 0..SPLIT_BINS {
            running_count += bins[i].count;
            running_aabb.merge(&bins[i].aabb);
            left_count[i] = running_count;
            left_aabb[i] = running_aabb;
        }

        let mut right_count = [0u32; SPLIT_BINS];
        let mut right_aabb = [Aabb::empty(); SPLIT_BINS];
        let mut running_count = 0u32;
        let mut running_aabb = Aabb::empty();
        for i in (0..SPLIT_BINS).rev() {
            running_count += bins[i].count;
            running_aabb.merge(&bins[i].aabb);
            right_count[i] = running_count;
            right_aabb[i] = running_aabb;
        }

        for split in 0..SPLIT_BINS - 1 {
            let lc = left_count[split];
            let rc = right_count[split + 1];
            if lc == 0 || rc == 0 {
                continue;
            }
            let cost = lc as f32 * left_aabb[split].surface_area()
                + rc as f32 * right_aabb[split + 1].surface_area();
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                let position = axis_min + extent * (split + 1) as f32 / SPLIT_BINS as f32;
                best = Some(Split {
                    axis,
                    position,
                    cost,
                });
            }
        }
    }

    let parent_cost = items.len() as f32 * node_aabb.surface_area();
    best.filter(|split| split.cost < parent_cost)
}

/// Partitions `items`/`triangles` in lockstep by centroid position relative
/// to `plane` along `axis`, returning the split point (count of the left
/// partition).
fn partition_by_plane(
    items: &mut [Item],
    triangles: &mut [Triangle],
    axis: usize,
    plane: f32,
) -> usize {
    let mut i = 0;
    let mut j = items.len();
    while i < j {
        if items[i].centroid[axis] < plane {
            i += 1;
        } else {
            j -= 1;
            items.swap(i, j);
            triangles.swap(i, j);
        }
    }
    i
}

impl Bvh {
    /// Builds a BVH over `triangles`, reordering them in place so every leaf
    /// owns a contiguous slice. `positions` is the owning mesh's vertex
    /// buffer, indexed by `Triangle::vertex_ids`.
    pub fn build(triangles: &mut [Triangle], positions: &[Point3]) -> (Self, Stats) {
        let timer = Instant::now();
        let triangle_count = triangles.len();
        assert!(triangle_count > 0, "cannot build a BVH over zero triangles");

        let mut items: Vec<Item> = triangles
            .iter()
            .map(|triangle| {
                let aabb = triangle_aabb(triangle, positions);
                Item {
                    centroid: aabb.center(),
                    aabb,
                }
            })
            .collect();

        let mut nodes = vec![Node {
            aabb: Aabb::empty(),
            triangle_count: triangle_count as u32,
            offset: 0,
        }];

        let mut queue = VecDeque::new();
        queue.push_back((0usize, 0usize));

        let mut leaf_count = 0u32;
        let mut max_depth = 0u32;
        let mut max_triangles_per_leaf = 0u32;

        while let Some((node_index, depth)) = queue.pop_front() {
            let (offset, count) = {
                let node = &nodes[node_index];
                (node.offset as usize, node.triangle_count as usize)
            };

            let node_aabb = items[offset..offset + count]
                .iter()
                .fold(Aabb::empty(), |acc, item| acc.merged(&item.aabb));
            nodes[node_index].aabb = node_aabb;
            max_depth = max_depth.max(depth as u32);

            let finalize_leaf = |leaf_count: &mut u32, max_triangles_per_leaf: &mut u32| {
                *leaf_count += 1;
                *max_triangles_per_leaf = (*max_triangles_per_leaf).max(count as u32);
            };

            if count as u32 <= MAX_TRIS_PER_LEAF || depth >= MAX_DEPTH {
                finalize_leaf(&mut leaf_count, &mut max_triangles_per_leaf);
                continue;
            }

            let Some(split) = find_best_split(&items[offset..offset + count], &node_aabb) else {
                finalize_leaf(&mut leaf_count, &mut max_triangles_per_leaf);
                continue;
            };

            let mid = partition_by_plane(
                &mut items[offset..offset + count],
                &mut triangles[offset..offset + count],
                split.axis,
                split.position,
            );

            if mid == 0 || mid == count {
                // All centroids landed on one side despite a "valid" SAH
                // plane (can happen with coincident bins); fall back to leaf.
                finalize_leaf(&mut leaf_count, &mut max_triangles_per_leaf);
                continue;
            }

            let left_index = nodes.len() as u32;
            nodes.push(Node {
                aabb: Aabb::empty(),
                triangle_count: mid as u32,
                offset: offset as u32,
            });
            nodes.push(Node {
                aabb: Aabb::empty(),
                triangle_count: (count - mid) as u32,
                offset: (offset + mid) as u32,
            });

            nodes[node_index].triangle_count = 0;
            nodes[node_index].offset = left_index;

            queue.push_back((left_index as usize, depth + 1));
            queue.push_back((left_index as usize + 1, depth + 1));
        }

        nodes.shrink_to_fit();

        let stats = Stats {
            build_time_us: timer.elapsed().as_micros() as u64,
            triangle_count: triangle_count as u32,
            node_count: nodes.len() as u32,
            leaf_count,
            max_depth,
            max_triangles_per_leaf,
        };
        log::debug!(
            "BVH build: buildTime={}us triangleCount={} nodeCount={} leafCount={} maxDepth={} maxTrianglesPerLeaf={}",
            stats.build_time_us,
            stats.triangle_count,
            stats.node_count,
            stats.leaf_count,
            stats.max_depth,
            stats.max_triangles_per_leaf,
        );

        (Self { nodes }, stats)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Stack-based closest-hit traversal. Mutates `ray.t_interval.max` as
    /// closer hits are found; returns the closest hit, if any.
    pub fn closest_hit(
        &self,
        ray: &mut Ray,
        positions: &[Point3],
        triangles: &[Triangle],
        backface_culling: bool,
    ) -> Option<TriangleHit> {
        let mut stack = [0u32; MAX_DEPTH];
        let mut stack_size = 0usize;
        stack[0] = 0;
        stack_size += 1;

        let direction_negative = ray.direction_negative();
        let mut result: Option<TriangleHit> = None;

        while stack_size > 0 {
            stack_size -= 1;
            let node_index = stack[stack_size] as usize;
            let node = &self.nodes[node_index];

            #[cfg(feature = "bvh_test")]
            {
                ray.aabb_test_count += 1;
            }
            if node
                .aabb
                .hit(ray.origin, ray.inv_direction, direction_negative, ray.t_interval)
                .is_none()
            {
                continue;
            }

            if node.is_leaf() {
                let start = node.offset as usize;
                let end = start + node.triangle_count as usize;
                for triangle_index in start..end {
                    #[cfg(feature = "bvh_test")]
                    {
                        ray.triangle_test_count += 1;
                    }
                    if let Some(hit) =
                        triangle_hit(ray, positions, &triangles[triangle_index], backface_culling)
                    {
                        if ray.t_interval.surrounds(hit.t) {
                            ray.t_interval.max = hit.t;
                            result = Some(TriangleHit {
                                triangle_id: triangle_index as u32,
                                ..hit
                            });
                        }
                    }
                }
                continue;
            }

            // Push farther child first, nearer child last, so the nearer
            // child is the next one popped. The true split axis isn't kept
            // on the node, so we approximate it with the node's own longest
            // axis, which is correctness-neutral: both push orders visit
            // every node a shrinking t_interval would still require.
            let axis = node.aabb.longest_axis();
            let (near, far) = if ray.direction[axis] >= 0.0 {
                (node.offset, node.offset + 1)
            } else {
                (node.offset + 1, node.offset)
            };
            stack[stack_size] = far;
            stack_size += 1;
            stack[stack_size] = near;
            stack_size += 1;
        }

        result
    }
}

/// Woop's watertight ray-triangle intersection (shear-transform
/// formulation). Permutes axes so `kz` is the dimension the ray direction is
/// largest in, shears the other two so the ray becomes `+z`, then evaluates
/// edge functions in the sheared space. Degenerate triangles fall out as a
/// zero determinant and are silently skipped.
pub fn triangle_hit(
    ray: &Ray,
    positions: &[Point3],
    triangle: &Triangle,
    backface_culling: bool,
) -> Option<TriangleHit> {
    let d = ray.direction;
    let kz = if d.x.abs() > d.y.abs() {
        if d.x.abs() > d.z.abs() {
            0
        } else {
            2
        }
    } else if d.y.abs() > d.z.abs() {
        1
    } else {
        2
    };
    let mut kx = (kz + 1) % 3;
    let mut ky = (kx + 1) % 3;
    if d[kz] < 0.0 {
        std::mem::swap(&mut kx, &mut ky);
    }

    let sx = d[kx] / d[kz];
    let sy = d[ky] / d[kz];
    let sz = 1.0 / d[kz];

    let p0 = positions[triangle.vertex_ids.x as usize] - ray.origin;
    let p1 = positions[triangle.vertex_ids.y as usize] - ray.origin;
    let p2 = positions[triangle.vertex_ids.z as usize] - ray.origin;

    let ax = p0[kx] - sx * p0[kz];
    let ay = p0[ky] - sy * p0[kz];
    let bx = p1[kx] - sx * p1[kz];
    let by = p1[ky] - sy * p1[kz];
    let cx = p2[kx] - sx * p2[kz];
    let cy = p2[ky] - sy * p2[kz];

    let u = cx * by - cy * bx;
    let v = ax * cy - ay * cx;
    let w = bx * ay - by * ax;

    let same_sign = (u >= 0.0 && v >= 0.0 && w >= 0.0) || (u <= 0.0 && v <= 0.0 && w <= 0.0);
    if !same_sign {
        return None;
    }

    let det = u + v + w;
    if det == 0.0 {
        return None;
    }
    if backface_culling && det < 0.0 {
        return None;
    }

    let az = sz * p0[kz];
    let bz = sz * p1[kz];
    let cz = sz * p2[kz];
    let t_scaled = u * az + v * bz + w * cz;
    let rcp_det = 1.0 / det;
    let t = t_scaled * rcp_det;
    if !t.is_finite() {
        return None;
    }

    Some(TriangleHit {
        triangle_id: u32::MAX,
        barycentric: Vec3::new(u * rcp_det, v * rcp_det, w * rcp_det),
        t,
    })
}

/// Linear scan over every triangle. Reference implementation for the
/// BVH-vs-brute-force equivalence test; never used on the hot path.
pub fn brute_force_closest_hit(
    ray: &mut Ray,
    positions: &[Point3],
    triangles: &[Triangle],
    backface_culling: bool,
) -> Option<TriangleHit> {
    let mut result = None;
    for (triangle_index, triangle) in triangles.iter().enumerate() {
        if let Some(hit) = triangle_hit(ray, positions, triangle, backface_culling) {
            if ray.t_interval.surrounds(hit.t) {
                ray.t_interval.max = hit.t;
                result = Some(TriangleHit {
                    triangle_id: triangle_index as u32,
                    ..hit
                });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use approx::assert_abs_diff_eq;

    fn cube_mesh() -> (Vec<Point3>, Vec<Triangle>) {
        // Two triangles per face of a unit cube centered at the origin.
        let p = [
            Point3::new(-0.5, -0.5, -0.5),
            Point3::new(0.5, -0.5, -0.5),
            Point3::new(0.5, 0.5, -0.5),
            Point3::new(-0.5, 0.5, -0.5),
            Point3::new(-0.5, -0.5, 0.5),
            Point3::new(0.5, -0.5, 0.5),
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(-0.5, 0.5, 0.5),
        ];
        let quads = [
            ([0, 1, 2, 3]), // -z
            ([5, 4, 7, 6]), // +z
            ([4, 0, 3, 7]), // -x
            ([1, 5, 6, 2]), // +x
            ([3, 2, 6, 7]), // +y
            ([4, 5, 1, 0]), // -y
        ];
        let mut triangles = vec![];
        for q in quads {
            triangles.push(Triangle::new([q[0], q[1], q[2]], 0));
            triangles.push(Triangle::new([q[0], q[2], q[3]], 0));
        }
        (p.to_vec(), triangles)
    }

    #[test]
    fn conservativeness_every_leaf_inside_its_node() {
        let (positions, mut triangles) = cube_mesh();
        let (bvh, _) = Bvh::build(&mut triangles, &positions);
        for node in bvh.nodes() {
            if node.triangle_count == 0 {
                continue;
            }
            let start = node.offset as usize;
            let end = start + node.triangle_count as usize;
            for triangle in &triangles[start..end] {
                let tri_aabb = triangle_aabb(triangle, &positions);
                assert!(tri_aabb.min().x >= node.aabb.min().x - 1e-5);
                assert!(tri_aabb.max().x <= node.aabb.max().x + 1e-5);
            }
        }
    }

    #[test]
    fn coverage_every_triangle_in_exactly_one_leaf() {
        let (positions, mut triangles) = cube_mesh();
        let total = triangles.len();
        let (bvh, _) = Bvh::build(&mut triangles, &positions);
        let mut covered = vec![false; total];
        for node in bvh.nodes() {
            if node.triangle_count == 0 {
                continue;
            }
            let start = node.offset as usize;
            let end = start + node.triangle_count as usize;
            for i in start..end {
                assert!(!covered[i], "triangle {i} covered by more than one leaf");
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn closest_hit_matches_brute_force() {
        let (positions, mut triangles) = cube_mesh();
        let (bvh, _) = Bvh::build(&mut triangles, &positions);

        let mut rng = crate::math::Xoshiro256StarStar::seed_from_u64(1234);
        for _ in 0..200 {
            let origin = Point3::from(rng.vec3(-2.0, 2.0));
            let direction = rng.vec3(-1.0, 1.0);
            if direction.norm_squared() < 1e-6 {
                continue;
            }

            let mut ray_bvh = Ray::new(origin, direction);
            let hit_bvh = bvh.closest_hit(&mut ray_bvh, &positions, &triangles, false);

            let mut ray_brute = Ray::new(origin, direction);
            let hit_brute = brute_force_closest_hit(&mut ray_brute, &positions, &triangles, false);

            match (hit_bvh, hit_brute) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert_eq!(a.triangle_id, b.triangle_id);
                    assert_abs_diff_eq!(a.t, b.t, epsilon = 1e-4);
                }
                _ => panic!("BVH and brute force disagree on hit/miss"),
            }
        }
    }

    #[test]
    fn watertight_shared_edge_hits_exactly_once() {
        // Two triangles sharing the edge (1,0,0)-(0,1,0), spanning the
        // diagonal of a unit square in the z=0 plane.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let triangles = vec![Triangle::new([0, 1, 2], 0), Triangle::new([1, 3, 2], 0)];

        // Fire rays along the shared edge direction; each must hit exactly one.
        for i in 0..50 {
            let t = i as f32 / 49.0;
            let origin = Point3::new(t, 1.0 - t, -1.0);
            let mut ray = Ray::new(origin, Vec3::new(0.0, 0.0, 1.0));
            ray.t_interval = Interval::new(0.001, f32::INFINITY);
            let mut hits = 0;
            for triangle in &triangles {
                if triangle_hit(&ray, &positions, triangle, false).is_some() {
                    hits += 1;
                }
            }
            assert_eq!(hits, 1, "edge ray at t={t} hit {hits} triangles");
        }
    }

    #[test]
    fn backface_culling_rejects_one_winding() {
        let positions = vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let front = Triangle::new([0, 1, 2], 0);
        let ray_front = Ray::new(Point3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0));
        let ray_back = Ray::new(Point3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0));

        let hit_front = triangle_hit(&ray_front, &positions, &front, true);
        let hit_back = triangle_hit(&ray_back, &positions, &front, true);
        assert!(hit_front.is_some() != hit_back.is_some());
    }
}
