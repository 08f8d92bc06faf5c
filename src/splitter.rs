//! Split-rule computation for top-down BVH construction.
//!
//! A splitter is bound to the vertex and triangle buffers of the mesh being
//! partitioned, computes a split rule from the bounding volume of a node's
//! primitives, and is then queried per primitive to decide which child the
//! primitive belongs to.
//!
//! # Split methods
//!
//! - [`SplitMethod::Mean`]: threshold at the mean of the primitive centroid
//!   projections
//! - [`SplitMethod::Median`]: threshold at the median projection, giving
//!   balanced children
//! - [`SplitMethod::BvCenter`]: threshold at the projection of the node
//!   BV's centre, the cheapest rule
//!
//! The split direction comes from the bounding volume itself: the longest
//! world axis for axis-aligned volumes, the first principal axis for
//! oriented ones.

use nalgebra::Point3;

use crate::bv::{BoundingVolume, SplitAxis};
use crate::mesh::Triangle;

/// Strategy for choosing the split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMethod {
    /// Mean of the primitive centroid projections.
    #[default]
    Mean,
    /// Median of the primitive centroid projections.
    Median,
    /// Projection of the bounding volume's centre.
    BvCenter,
}

/// Whether primitive ids index triangles or points directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshTopology {
    /// Primitive ids index into a triangle buffer.
    Triangles,
    /// Primitive ids index vertices directly.
    PointCloud,
}

/// Splitter bound to a mesh's buffers for the duration of a tree build.
#[derive(Debug)]
pub struct BvSplitter<'a> {
    method: SplitMethod,
    vertices: Option<&'a [Point3<f64>]>,
    triangles: Option<&'a [Triangle]>,
    topology: MeshTopology,
    rule: Option<SplitRule>,
}

#[derive(Debug, Clone)]
struct SplitRule {
    axis: SplitAxis,
    threshold: f64,
}

impl<'a> BvSplitter<'a> {
    /// Create a splitter with the given threshold strategy. Buffers are
    /// bound with [`set`](Self::set) before each build.
    #[must_use]
    pub fn new(method: SplitMethod) -> Self {
        Self {
            method,
            vertices: None,
            triangles: None,
            topology: MeshTopology::PointCloud,
            rule: None,
        }
    }

    /// The threshold strategy in use.
    #[must_use]
    pub fn method(&self) -> SplitMethod {
        self.method
    }

    /// Bind the mesh buffers for an upcoming build. For
    /// [`MeshTopology::PointCloud`] the triangle buffer may be empty.
    pub fn set(
        &mut self,
        vertices: &'a [Point3<f64>],
        triangles: &'a [Triangle],
        topology: MeshTopology,
    ) {
        self.vertices = Some(vertices);
        self.triangles = Some(triangles);
        self.topology = topology;
        self.rule = None;
    }

    /// Centroid of the primitive with the given id.
    fn centroid(&self, id: usize) -> Point3<f64> {
        let vertices = self.vertices.unwrap_or(&[]);
        match self.topology {
            MeshTopology::PointCloud => vertices[id],
            MeshTopology::Triangles => {
                let tri = &self.triangles.unwrap_or(&[])[id];
                let sum = vertices[tri.v0].coords
                    + vertices[tri.v1].coords
                    + vertices[tri.v2].coords;
                Point3::from(sum / 3.0)
            }
        }
    }

    /// Compute the split rule for a node covering `primitive_ids`, bounded
    /// by `bv`.
    pub fn compute_rule<B: BoundingVolume>(&mut self, bv: &B, primitive_ids: &[usize]) {
        debug_assert!(self.vertices.is_some(), "splitter buffers not bound");
        let axis = bv.split_axis();

        let threshold = match self.method {
            SplitMethod::BvCenter => axis.project(&bv.center()),
            SplitMethod::Mean => {
                let sum: f64 = primitive_ids
                    .iter()
                    .map(|&id| axis.project(&self.centroid(id)))
                    .sum();
                sum / primitive_ids.len().max(1) as f64
            }
            SplitMethod::Median => {
                let mut proj: Vec<f64> = primitive_ids
                    .iter()
                    .map(|&id| axis.project(&self.centroid(id)))
                    .collect();
                proj.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let n = proj.len();
                if n == 0 {
                    0.0
                } else if n % 2 == 1 {
                    proj[n / 2]
                } else {
                    (proj[n / 2 - 1] + proj[n / 2]) * 0.5
                }
            }
        };

        self.rule = Some(SplitRule { axis, threshold });
    }

    /// Whether the primitive belongs to the right (upper) child under the
    /// current rule.
    ///
    /// Must be called after [`compute_rule`](Self::compute_rule).
    #[must_use]
    pub fn apply(&self, primitive_id: usize) -> bool {
        debug_assert!(self.rule.is_some(), "no split rule computed");
        let Some(rule) = &self.rule else {
            return false;
        };
        rule.axis.project(&self.centroid(primitive_id)) > rule.threshold
    }

    /// Convenience for the tree builder: classify an already-computed
    /// centroid under the current rule.
    #[must_use]
    pub fn apply_point(&self, centroid: &Point3<f64>) -> bool {
        let Some(rule) = &self.rule else {
            return false;
        };
        rule.axis.project(centroid) > rule.threshold
    }

    /// Drop the buffer bindings and any computed rule.
    pub fn clear(&mut self) {
        self.vertices = None;
        self.triangles = None;
        self.rule = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bv::Aabb;

    fn points_on_x() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_mean_split_point_cloud() {
        let points = points_on_x();
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        splitter.set(&points, &[], MeshTopology::PointCloud);
        let bv = Aabb::fit(&points);
        splitter.compute_rule(&bv, &[0, 1, 2, 3]);
        // Mean projection is 3.25: only the outlier goes right.
        assert!(!splitter.apply(0));
        assert!(!splitter.apply(1));
        assert!(!splitter.apply(2));
        assert!(splitter.apply(3));
    }

    #[test]
    fn test_median_split_balances() {
        let points = points_on_x();
        let mut splitter = BvSplitter::new(SplitMethod::Median);
        splitter.set(&points, &[], MeshTopology::PointCloud);
        let bv = Aabb::fit(&points);
        splitter.compute_rule(&bv, &[0, 1, 2, 3]);
        // Median of {0, 1, 2, 10} is 1.5: two on each side.
        let right: Vec<bool> = (0..4).map(|i| splitter.apply(i)).collect();
        assert_eq!(right, vec![false, false, true, true]);
    }

    #[test]
    fn test_median_odd_count_uses_middle() {
        let points = points_on_x();
        let mut splitter = BvSplitter::new(SplitMethod::Median);
        splitter.set(&points, &[], MeshTopology::PointCloud);
        let bv = Aabb::fit(&points);
        splitter.compute_rule(&bv, &[0, 1, 3]);
        // Median of {0, 1, 10} is 1: the middle element stays left.
        assert!(!splitter.apply(0));
        assert!(!splitter.apply(1));
        assert!(splitter.apply(3));
    }

    #[test]
    fn test_bv_center_split() {
        let points = points_on_x();
        let mut splitter = BvSplitter::new(SplitMethod::BvCenter);
        splitter.set(&points, &[], MeshTopology::PointCloud);
        let bv = Aabb::fit(&points);
        splitter.compute_rule(&bv, &[0, 1, 2, 3]);
        // BV centre projects to 5: only the outlier is beyond it.
        assert!(!splitter.apply(2));
        assert!(splitter.apply(3));
    }

    #[test]
    fn test_triangle_centroids() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(11.0, 0.0, 0.0),
            Point3::new(10.0, 1.0, 0.0),
        ];
        let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(3, 4, 5)];
        let mut splitter = BvSplitter::new(SplitMethod::Mean);
        splitter.set(&vertices, &triangles, MeshTopology::Triangles);
        let bv = Aabb::fit(&vertices);
        splitter.compute_rule(&bv, &[0, 1]);
        assert!(!splitter.apply(0));
        assert!(splitter.apply(1));
    }
}
