//! Bounding volume hierarchies over triangle meshes.
//!
//! The tree is built top-down: fit a volume around the node's primitives,
//! ask the splitter for a partition rule, split, recurse. Leaves hold a
//! single primitive so traversal never loops over leaf contents.
//!
//! Nodes live in a flat arena indexed by `usize`, with the root at index 0.
//! The tree is generic over the bounding volume type; an axis-aligned tree
//! and an oriented tree share one builder because the split direction comes
//! from [`BoundingVolume::split_axis`].
//!
//! For continuous collision a swept tree is built with
//! [`BvhTree::build_swept`]: each leaf volume bounds a triangle's vertices
//! at both the previous and current positions, so an overlap test is
//! conservative for the whole motion interval.

use nalgebra::Point3;
use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::debug;

use crate::bv::BoundingVolume;
use crate::error::CollisionError;
use crate::mesh::TriangleMeshData;
use crate::splitter::{BvSplitter, MeshTopology};

/// A node in the hierarchy.
#[derive(Debug, Clone)]
enum BvhNode<B> {
    /// Internal node with two children in the arena.
    Internal { bv: B, left: usize, right: usize },
    /// Leaf holding one primitive id.
    Leaf { bv: B, primitive: usize },
}

/// A bounding volume hierarchy with single-primitive leaves.
#[derive(Debug, Clone)]
pub struct BvhTree<B> {
    nodes: Vec<BvhNode<B>>,
}

impl<B: BoundingVolume> BvhTree<B> {
    /// Build a tree over a mesh's triangles.
    ///
    /// The splitter's buffers are bound for the duration of the build and
    /// cleared afterwards.
    #[must_use]
    pub fn build<'a>(mesh: &'a TriangleMeshData, splitter: &mut BvSplitter<'a>) -> Self {
        Self::build_inner(mesh, None, splitter)
    }

    /// Build a swept tree for a mesh moving from `previous_vertices` to its
    /// current vertex positions. Each leaf bounds both endpoints of its
    /// triangle's motion.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::MismatchedVertexBuffers`] if the previous
    /// buffer's length differs from the mesh's vertex count.
    pub fn build_swept<'a>(
        mesh: &'a TriangleMeshData,
        previous_vertices: &[Point3<f64>],
        splitter: &mut BvSplitter<'a>,
    ) -> Result<Self, CollisionError> {
        if previous_vertices.len() != mesh.vertices().len() {
            return Err(CollisionError::MismatchedVertexBuffers {
                previous: previous_vertices.len(),
                current: mesh.vertices().len(),
            });
        }
        Ok(Self::build_inner(mesh, Some(previous_vertices), splitter))
    }

    fn build_inner<'a>(
        mesh: &'a TriangleMeshData,
        previous_vertices: Option<&[Point3<f64>]>,
        splitter: &mut BvSplitter<'a>,
    ) -> Self {
        // Per-primitive point sets, gathered once up front. Swept leaves
        // carry six points instead of three.
        let corners: Vec<SmallVec<[Point3<f64>; 6]>> = (0..mesh.triangles().len())
            .into_par_iter()
            .map(|id| {
                let tri = &mesh.triangles()[id];
                let mut pts: SmallVec<[Point3<f64>; 6]> = SmallVec::new();
                for v in tri.indices() {
                    pts.push(mesh.vertices()[v]);
                }
                if let Some(prev) = previous_vertices {
                    for v in tri.indices() {
                        pts.push(prev[v]);
                    }
                }
                pts
            })
            .collect();

        splitter.set(mesh.vertices(), mesh.triangles(), MeshTopology::Triangles);

        let mut nodes = Vec::with_capacity(2 * corners.len());
        let mut ids: Vec<usize> = (0..corners.len()).collect();
        build_recursive(&mut nodes, &mut ids, &corners, splitter);
        splitter.clear();

        debug!(
            primitives = corners.len(),
            nodes = nodes.len(),
            swept = previous_vertices.is_some(),
            "bvh built"
        );
        Self { nodes }
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the root node.
    #[must_use]
    pub fn root(&self) -> usize {
        0
    }

    /// Whether the node is a leaf.
    #[must_use]
    pub fn is_leaf(&self, node: usize) -> bool {
        matches!(self.nodes[node], BvhNode::Leaf { .. })
    }

    /// Left child of an internal node.
    ///
    /// # Panics
    ///
    /// Panics if `node` is a leaf.
    #[must_use]
    pub fn left_child(&self, node: usize) -> usize {
        match &self.nodes[node] {
            BvhNode::Internal { left, .. } => *left,
            BvhNode::Leaf { .. } => panic!("leaf node has no children"),
        }
    }

    /// Right child of an internal node.
    ///
    /// # Panics
    ///
    /// Panics if `node` is a leaf.
    #[must_use]
    pub fn right_child(&self, node: usize) -> usize {
        match &self.nodes[node] {
            BvhNode::Internal { right, .. } => *right,
            BvhNode::Leaf { .. } => panic!("leaf node has no children"),
        }
    }

    /// The primitive id stored at a leaf.
    ///
    /// # Panics
    ///
    /// Panics if `node` is internal.
    #[must_use]
    pub fn primitive_id(&self, node: usize) -> usize {
        match &self.nodes[node] {
            BvhNode::Leaf { primitive, .. } => *primitive,
            BvhNode::Internal { .. } => panic!("internal node has no primitive"),
        }
    }

    /// The bounding volume of a node.
    #[must_use]
    pub fn bv(&self, node: usize) -> &B {
        match &self.nodes[node] {
            BvhNode::Internal { bv, .. } | BvhNode::Leaf { bv, .. } => bv,
        }
    }
}

/// Build the subtree over `ids`, returning its arena index.
fn build_recursive<B: BoundingVolume>(
    nodes: &mut Vec<BvhNode<B>>,
    ids: &mut [usize],
    corners: &[SmallVec<[Point3<f64>; 6]>],
    splitter: &mut BvSplitter<'_>,
) -> usize {
    let points: Vec<Point3<f64>> = ids
        .iter()
        .flat_map(|&id| corners[id].iter().copied())
        .collect();
    let bv = B::fit(&points);

    if ids.len() == 1 {
        nodes.push(BvhNode::Leaf {
            bv,
            primitive: ids[0],
        });
        return nodes.len() - 1;
    }

    splitter.compute_rule(&bv, ids);
    let mut mid = partition(ids, |id| !splitter.apply(id));
    if mid == 0 || mid == ids.len() {
        // Degenerate partition (coincident centroids). Fall back to an even
        // index split so the recursion always terminates.
        mid = ids.len() / 2;
    }

    let index = nodes.len();
    // Placeholder so children land after their parent; patched below.
    nodes.push(BvhNode::Internal {
        bv: bv.clone(),
        left: 0,
        right: 0,
    });
    let (left_ids, right_ids) = ids.split_at_mut(mid);
    let left = build_recursive(nodes, left_ids, corners, splitter);
    let right = build_recursive(nodes, right_ids, corners, splitter);
    nodes[index] = BvhNode::Internal { bv, left, right };
    index
}

/// In-place partition: elements satisfying `pred` move to the front.
/// Returns the number of elements satisfying `pred`.
fn partition<F: FnMut(usize) -> bool>(ids: &mut [usize], mut pred: F) -> usize {
    let mut store = 0;
    for i in 0..ids.len() {
        if pred(ids[i]) {
            ids.swap(store, i);
            store += 1;
        }
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bv::{Aabb, BoundingVolume, Obb};
    use crate::mesh::Triangle;
    use crate::splitter::SplitMethod;

    /// A strip of `n` unit right triangles along the X axis.
    fn strip(n: usize) -> TriangleMeshData {
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..n {
            let x = i as f64 * 2.0;
            let base = vertices.len();
            vertices.push(Point3::new(x, 0.0, 0.0));
            vertices.push(Point3::new(x + 1.0, 0.0, 0.0));
            vertices.push(Point3::new(x, 1.0, 0.0));
            triangles.push(Triangle::new(base, base + 1, base + 2));
        }
        TriangleMeshData::new(vertices, triangles).unwrap()
    }

    fn leaf_primitives<B: BoundingVolume>(tree: &BvhTree<B>) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if tree.is_leaf(node) {
                out.push(tree.primitive_id(node));
            } else {
                stack.push(tree.left_child(node));
                stack.push(tree.right_child(node));
            }
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn test_build_covers_all_primitives() {
        let mesh = strip(7);
        let mut splitter = BvSplitter::new(SplitMethod::Median);
        let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);
        // n leaves and n - 1 internal nodes.
        assert_eq!(tree.num_nodes(), 13);
        assert_eq!(leaf_primitives(&tree), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_root_bv_bounds_mesh() {
        let mesh = strip(4);
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);
        let root = tree.bv(tree.root());
        for v in mesh.vertices() {
            assert!(root.min.x <= v.x && v.x <= root.max.x);
            assert!(root.min.y <= v.y && v.y <= root.max.y);
        }
    }

    #[test]
    fn test_children_within_parent_extent() {
        let mesh = strip(8);
        let mut splitter = BvSplitter::new(SplitMethod::Median);
        let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if !tree.is_leaf(node) {
                let parent = tree.bv(node);
                for child in [tree.left_child(node), tree.right_child(node)] {
                    let c = tree.bv(child);
                    assert!(c.min.x >= parent.min.x - 1e-12);
                    assert!(c.max.x <= parent.max.x + 1e-12);
                    stack.push(child);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_coincident_triangles() {
        // All triangles identical: the splitter cannot separate them, the
        // index-split fallback must still give one primitive per leaf.
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let triangles = vec![Triangle::new(0, 1, 2); 5];
        let mesh = TriangleMeshData::new(vertices, triangles).unwrap();
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);
        assert_eq!(leaf_primitives(&tree), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_obb_tree_builds() {
        let mesh = strip(4);
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        let tree: BvhTree<Obb> = BvhTree::build(&mesh, &mut splitter);
        assert_eq!(tree.num_nodes(), 7);
        assert_eq!(leaf_primitives(&tree), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_swept_tree_bounds_both_endpoints() {
        let mesh = strip(2);
        let prev: Vec<Point3<f64>> = mesh
            .vertices()
            .iter()
            .map(|v| Point3::new(v.x, v.y, v.z - 3.0))
            .collect();
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        let tree = BvhTree::<Aabb>::build_swept(&mesh, &prev, &mut splitter).unwrap();
        let root = tree.bv(tree.root());
        assert!(root.min.z <= -3.0);
        assert!(root.max.z >= 0.0);
    }

    #[test]
    fn test_swept_tree_length_mismatch() {
        let mesh = strip(2);
        let prev = vec![Point3::new(0.0, 0.0, 0.0)];
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        let err = BvhTree::<Aabb>::build_swept(&mesh, &prev, &mut splitter).unwrap_err();
        assert!(matches!(
            err,
            CollisionError::MismatchedVertexBuffers { .. }
        ));
    }
}
