//! Generic BVH traversal and the concrete collision traversals.
//!
//! A [`TraversalNode`] bundles everything the recursive driver needs: leaf
//! predicates and child accessors for both sides, a bounding-volume prune
//! test, the leaf-pair test, and an early-stop predicate. The driver
//! ([`collision_recurse`]) descends the side chosen by `first_over_second`,
//! checks `can_stop` between siblings, and leaves the semantics of a leaf
//! pair entirely to the node.
//!
//! Three traversals are provided:
//!
//! - [`SphereMeshCollision`]: a sphere against a mesh tree; the sphere side
//!   is always a leaf so the recursion only descends the mesh
//! - [`MeshMeshCandidates`]: two mesh trees, enumerating the overlapping
//!   leaf pairs for a caller-side narrow phase
//! - [`MeshMeshContinuous`]: two swept mesh trees, running vertex-face and
//!   edge-edge sweep tests per leaf pair and tracking the earliest time of
//!   contact

use nalgebra::Point3;
use tracing::debug;

use crate::bv::{Aabb, BoundingVolume};
use crate::bvh::BvhTree;
use crate::contact::{CollisionRequest, ContactPoint, QueryStats};
use crate::error::CollisionError;
use crate::mesh::TriangleMeshData;
use crate::narrow::{edge_edge_toc, sphere_triangle_intersect, vertex_face_toc};
use crate::transform::Transform3d;

/// Traversal protocol consumed by [`collision_recurse`].
///
/// `b1` indexes the first side's tree, `b2` the second's. A side with no
/// tree structure (a single shape) reports itself as a permanent leaf.
pub trait TraversalNode {
    /// Whether `b1` is a leaf of the first side.
    fn is_first_leaf(&self, b1: usize) -> bool;

    /// Whether `b2` is a leaf of the second side.
    fn is_second_leaf(&self, b2: usize) -> bool;

    /// Whether to descend the first side (true) or the second (false).
    /// Only called when at least one side is internal.
    fn first_over_second(&self, b1: usize, b2: usize) -> bool;

    /// Children of an internal node on the first side.
    fn first_children(&self, b1: usize) -> (usize, usize);

    /// Children of an internal node on the second side.
    fn second_children(&self, b2: usize) -> (usize, usize);

    /// Whether the bounding volumes of `b1` and `b2` are disjoint. A `true`
    /// result prunes the subtree pair.
    fn bv_disjoint(&mut self, b1: usize, b2: usize) -> bool;

    /// Exact test for a leaf pair.
    fn leaf_test(&mut self, b1: usize, b2: usize);

    /// Whether the traversal may stop early.
    fn can_stop(&self) -> bool {
        false
    }
}

/// Recursive collision traversal over a node's two trees.
pub fn collision_recurse<N: TraversalNode>(node: &mut N, b1: usize, b2: usize) {
    let leaf1 = node.is_first_leaf(b1);
    let leaf2 = node.is_second_leaf(b2);

    if leaf1 && leaf2 {
        if !node.bv_disjoint(b1, b2) {
            node.leaf_test(b1, b2);
        }
        return;
    }
    if node.bv_disjoint(b1, b2) {
        return;
    }

    if !leaf1 && (leaf2 || node.first_over_second(b1, b2)) {
        let (left, right) = node.first_children(b1);
        collision_recurse(node, left, b2);
        if node.can_stop() {
            return;
        }
        collision_recurse(node, right, b2);
    } else {
        let (left, right) = node.second_children(b2);
        collision_recurse(node, b1, left);
        if node.can_stop() {
            return;
        }
        collision_recurse(node, b1, right);
    }
}

/// Squared-diagonal size used to pick the larger volume to descend.
fn bv_size<B: BoundingVolume>(bv: &B) -> f64 {
    let w = bv.width();
    let h = bv.height();
    let d = bv.depth();
    w * w + h * h + d * d
}

/// A contact attributed to a mesh triangle.
#[derive(Debug, Clone)]
pub struct TriangleContact {
    /// Triangle id in the mesh.
    pub triangle: usize,
    /// The contact, in the query's common frame. The normal points from the
    /// triangle toward the other shape.
    pub contact: ContactPoint,
}

// ============================================================================
// Sphere vs mesh
// ============================================================================

/// Discrete collision of a sphere against a mesh tree.
///
/// Works in the mesh's local frame; the sphere transform is expressed
/// relative to the mesh before traversal and contacts are mapped back to
/// world afterwards.
pub struct SphereMeshCollision<'a> {
    radius: f64,
    tf_rel: Transform3d,
    tf_mesh: Transform3d,
    sphere_bv: Aabb,
    mesh: &'a TriangleMeshData,
    tree: &'a BvhTree<Aabb>,
    request: CollisionRequest,
    contacts: Vec<TriangleContact>,
    stats: QueryStats,
}

impl<'a> SphereMeshCollision<'a> {
    /// Set up the traversal. `tf_sphere` and `tf_mesh` place the shapes in
    /// a common frame.
    #[must_use]
    pub fn new(
        radius: f64,
        tf_sphere: &Transform3d,
        mesh: &'a TriangleMeshData,
        tree: &'a BvhTree<Aabb>,
        tf_mesh: &Transform3d,
        request: CollisionRequest,
    ) -> Self {
        let tf_rel = tf_sphere.relative_to(tf_mesh);
        let center = tf_rel.transform_point(&Point3::origin());
        let sphere_bv = Aabb::from_center(center, nalgebra::Vector3::repeat(radius));
        Self {
            radius,
            tf_rel,
            tf_mesh: *tf_mesh,
            sphere_bv,
            mesh,
            tree,
            request,
            contacts: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    /// Run the traversal and return the contacts (up to `max_contacts`) and
    /// the query statistics.
    pub fn collide(mut self) -> (Vec<TriangleContact>, QueryStats) {
        let root = self.tree.root();
        collision_recurse(&mut self, 0, root);
        // Contacts were computed in the mesh frame.
        for tc in &mut self.contacts {
            tc.contact.point = self.tf_mesh.transform_point(&tc.contact.point);
            tc.contact.normal = self.tf_mesh.transform_vector(&tc.contact.normal);
        }
        debug!(contacts = self.contacts.len(), "sphere-mesh traversal done");
        (self.contacts, self.stats)
    }
}

impl TraversalNode for SphereMeshCollision<'_> {
    fn is_first_leaf(&self, _b1: usize) -> bool {
        true
    }

    fn is_second_leaf(&self, b2: usize) -> bool {
        self.tree.is_leaf(b2)
    }

    fn first_over_second(&self, _b1: usize, _b2: usize) -> bool {
        false
    }

    fn first_children(&self, _b1: usize) -> (usize, usize) {
        unreachable!("the sphere side is always a leaf")
    }

    fn second_children(&self, b2: usize) -> (usize, usize) {
        (self.tree.left_child(b2), self.tree.right_child(b2))
    }

    fn bv_disjoint(&mut self, _b1: usize, b2: usize) -> bool {
        if self.request.enable_statistics {
            self.stats.num_bv_tests += 1;
        }
        !self.sphere_bv.overlaps(self.tree.bv(b2))
    }

    fn leaf_test(&mut self, _b1: usize, b2: usize) {
        if self.request.enable_statistics {
            self.stats.num_leaf_tests += 1;
        }
        let triangle = self.tree.primitive_id(b2);
        let [p1, p2, p3] = self.mesh.triangle_points(triangle);
        let identity = Transform3d::identity();
        if let Some(contact) =
            sphere_triangle_intersect(self.radius, &self.tf_rel, &p1, &p2, &p3, &identity)
        {
            self.contacts.push(TriangleContact { triangle, contact });
        }
    }

    fn can_stop(&self) -> bool {
        self.contacts.len() >= self.request.max_contacts
    }
}

// ============================================================================
// Mesh vs mesh, discrete candidates
// ============================================================================

/// Discrete mesh-mesh traversal that enumerates overlapping leaf pairs.
///
/// Generic over the bounding volume; the second tree's volumes are mapped
/// into the first tree's frame per test, so no tree is rebuilt for a moved
/// mesh.
pub struct MeshMeshCandidates<'a, B> {
    tree1: &'a BvhTree<B>,
    tree2: &'a BvhTree<B>,
    tf_rel: Transform3d,
    request: CollisionRequest,
    pairs: Vec<(usize, usize)>,
    stats: QueryStats,
}

impl<'a, B: BoundingVolume> MeshMeshCandidates<'a, B> {
    /// Set up the traversal with each tree's world placement.
    #[must_use]
    pub fn new(
        tree1: &'a BvhTree<B>,
        tf1: &Transform3d,
        tree2: &'a BvhTree<B>,
        tf2: &Transform3d,
        request: CollisionRequest,
    ) -> Self {
        Self {
            tree1,
            tree2,
            tf_rel: tf2.relative_to(tf1),
            request,
            pairs: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    /// Run the traversal and return the candidate primitive-id pairs
    /// (first mesh id, second mesh id) and the query statistics.
    pub fn collide(mut self) -> (Vec<(usize, usize)>, QueryStats) {
        let (r1, r2) = (self.tree1.root(), self.tree2.root());
        collision_recurse(&mut self, r1, r2);
        debug!(pairs = self.pairs.len(), "mesh-mesh candidate traversal done");
        (self.pairs, self.stats)
    }
}

impl<B: BoundingVolume> TraversalNode for MeshMeshCandidates<'_, B> {
    fn is_first_leaf(&self, b1: usize) -> bool {
        self.tree1.is_leaf(b1)
    }

    fn is_second_leaf(&self, b2: usize) -> bool {
        self.tree2.is_leaf(b2)
    }

    fn first_over_second(&self, b1: usize, b2: usize) -> bool {
        bv_size(self.tree1.bv(b1)) > bv_size(self.tree2.bv(b2))
    }

    fn first_children(&self, b1: usize) -> (usize, usize) {
        (self.tree1.left_child(b1), self.tree1.right_child(b1))
    }

    fn second_children(&self, b2: usize) -> (usize, usize) {
        (self.tree2.left_child(b2), self.tree2.right_child(b2))
    }

    fn bv_disjoint(&mut self, b1: usize, b2: usize) -> bool {
        if self.request.enable_statistics {
            self.stats.num_bv_tests += 1;
        }
        let bv2 = self.tree2.bv(b2).transformed(&self.tf_rel);
        !self.tree1.bv(b1).overlaps(&bv2)
    }

    fn leaf_test(&mut self, b1: usize, b2: usize) {
        if self.request.enable_statistics {
            self.stats.num_leaf_tests += 1;
        }
        self.pairs
            .push((self.tree1.primitive_id(b1), self.tree2.primitive_id(b2)));
    }

    fn can_stop(&self) -> bool {
        self.pairs.len() >= self.request.max_contacts
    }
}

// ============================================================================
// Mesh vs mesh, continuous
// ============================================================================

/// A triangle pair that comes into contact during the motion interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdPair {
    /// Triangle id in the first mesh.
    pub id1: usize,
    /// Triangle id in the second mesh.
    pub id2: usize,
    /// Normalized time in `[0, 1]` at which the pair first touches.
    pub time: f64,
}

/// Continuous mesh-mesh traversal over one linear motion interval.
///
/// Both meshes interpolate from their previous vertex buffers to their
/// current ones; the trees must be swept trees built over the same motion
/// (see [`BvhTree::build_swept`]). All positions are taken in one common
/// frame.
#[derive(Debug)]
pub struct MeshMeshContinuous<'a> {
    mesh1: &'a TriangleMeshData,
    prev1: &'a [Point3<f64>],
    mesh2: &'a TriangleMeshData,
    prev2: &'a [Point3<f64>],
    tree1: &'a BvhTree<Aabb>,
    tree2: &'a BvhTree<Aabb>,
    request: CollisionRequest,
    pairs: Vec<CcdPair>,
    time_of_contact: f64,
    stats: QueryStats,
}

/// Result of a continuous mesh-mesh query.
#[derive(Debug, Clone)]
pub struct CcdResult {
    /// Every leaf pair that touches during the interval, with its first
    /// contact time.
    pub pairs: Vec<CcdPair>,
    /// Earliest contact time over all pairs, `None` when nothing touches.
    pub earliest: Option<f64>,
    /// Query statistics (populated when requested).
    pub stats: QueryStats,
}

impl<'a> MeshMeshContinuous<'a> {
    /// Set up the traversal.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::MismatchedVertexBuffers`] if a previous
    /// vertex buffer's length differs from its mesh's vertex count.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mesh1: &'a TriangleMeshData,
        prev1: &'a [Point3<f64>],
        tree1: &'a BvhTree<Aabb>,
        mesh2: &'a TriangleMeshData,
        prev2: &'a [Point3<f64>],
        tree2: &'a BvhTree<Aabb>,
        request: CollisionRequest,
    ) -> Result<Self, CollisionError> {
        for (prev, mesh) in [(prev1, mesh1), (prev2, mesh2)] {
            if prev.len() != mesh.vertices().len() {
                return Err(CollisionError::MismatchedVertexBuffers {
                    previous: prev.len(),
                    current: mesh.vertices().len(),
                });
            }
        }
        Ok(Self {
            mesh1,
            prev1,
            mesh2,
            prev2,
            tree1,
            tree2,
            request,
            pairs: Vec::new(),
            time_of_contact: 1.0,
            stats: QueryStats::default(),
        })
    }

    /// Run the traversal.
    pub fn collide(mut self) -> CcdResult {
        let (r1, r2) = (self.tree1.root(), self.tree2.root());
        collision_recurse(&mut self, r1, r2);
        debug!(
            pairs = self.pairs.len(),
            time_of_contact = self.time_of_contact,
            "continuous traversal done"
        );
        CcdResult {
            earliest: (!self.pairs.is_empty()).then_some(self.time_of_contact),
            pairs: self.pairs,
            stats: self.stats,
        }
    }

    /// Triangle corner positions at the interval start and end.
    fn endpoints(
        mesh: &TriangleMeshData,
        prev: &[Point3<f64>],
        id: usize,
    ) -> ([Point3<f64>; 3], [Point3<f64>; 3]) {
        let tri = &mesh.triangles()[id];
        let idx = tri.indices();
        (
            [prev[idx[0]], prev[idx[1]], prev[idx[2]]],
            [
                mesh.vertices()[idx[0]],
                mesh.vertices()[idx[1]],
                mesh.vertices()[idx[2]],
            ],
        )
    }
}

impl TraversalNode for MeshMeshContinuous<'_> {
    fn is_first_leaf(&self, b1: usize) -> bool {
        self.tree1.is_leaf(b1)
    }

    fn is_second_leaf(&self, b2: usize) -> bool {
        self.tree2.is_leaf(b2)
    }

    fn first_over_second(&self, b1: usize, b2: usize) -> bool {
        bv_size(self.tree1.bv(b1)) > bv_size(self.tree2.bv(b2))
    }

    fn first_children(&self, b1: usize) -> (usize, usize) {
        (self.tree1.left_child(b1), self.tree1.right_child(b1))
    }

    fn second_children(&self, b2: usize) -> (usize, usize) {
        (self.tree2.left_child(b2), self.tree2.right_child(b2))
    }

    fn bv_disjoint(&mut self, b1: usize, b2: usize) -> bool {
        if self.request.enable_statistics {
            self.stats.num_bv_tests += 1;
        }
        !self.tree1.bv(b1).overlaps(self.tree2.bv(b2))
    }

    /// Sweep the two triangles against each other: six vertex-face tests
    /// (each triangle's vertices against the other's face) and nine
    /// edge-edge tests, keeping the minimum time of contact.
    fn leaf_test(&mut self, b1: usize, b2: usize) {
        if self.request.enable_statistics {
            self.stats.num_leaf_tests += 1;
        }
        let id1 = self.tree1.primitive_id(b1);
        let id2 = self.tree2.primitive_id(b2);
        let (start1, end1) = Self::endpoints(self.mesh1, self.prev1, id1);
        let (start2, end2) = Self::endpoints(self.mesh2, self.prev2, id2);

        let mut min_time: Option<f64> = None;
        let mut record = |t: Option<(f64, Point3<f64>)>| {
            if let Some((time, _)) = t {
                min_time = Some(min_time.map_or(time, |m: f64| m.min(time)));
            }
        };

        for k in 0..3 {
            record(vertex_face_toc(&start1[k], &end1[k], &start2, &end2));
            record(vertex_face_toc(&start2[k], &end2[k], &start1, &end1));
        }
        if self.request.enable_statistics {
            self.stats.num_vf_tests += 6;
        }

        for i in 0..3 {
            let (a0, a1) = (start1[i], end1[i]);
            let (b0, b1v) = (start1[(i + 1) % 3], end1[(i + 1) % 3]);
            for j in 0..3 {
                let (c0, c1) = (start2[j], end2[j]);
                let (d0, d1) = (start2[(j + 1) % 3], end2[(j + 1) % 3]);
                record(edge_edge_toc(&a0, &a1, &b0, &b1v, &c0, &c1, &d0, &d1));
            }
        }
        if self.request.enable_statistics {
            self.stats.num_ee_tests += 9;
        }

        if let Some(time) = min_time {
            self.pairs.push(CcdPair { id1, id2, time });
            if time < self.time_of_contact {
                self.time_of_contact = time;
            }
        }
    }

    fn can_stop(&self) -> bool {
        self.pairs.len() >= self.request.max_contacts
    }
}
