//! Bounding volumes used by the BVH and the traversal engine.
//!
//! The [`BoundingVolume`] trait captures the capability set the splitter and
//! the traversal driver need: overlap testing, a centre point, extents along
//! the volume's principal axes, a split direction, and fitting from a point
//! set. Two concrete volumes are provided:
//!
//! - [`Aabb`]: axis-aligned box, the workhorse for mesh trees
//! - [`Obb`]: oriented box with covariance-fitted axes, exercising the
//!   dot-product split specialization for oriented volumes
//!
//! Other oriented volumes (rectangle-swept spheres and the like) would
//! implement the same trait.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::transform::Transform3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction along which a BV splitter partitions primitives.
///
/// Axis-aligned volumes split along one of the three world axes and project
/// by coordinate indexing; oriented volumes split along their first principal
/// axis and project by dot product. Same algorithm, two projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitAxis {
    /// A world axis: 0 = X, 1 = Y, 2 = Z.
    World(usize),
    /// An arbitrary unit direction.
    Oriented(Vector3<f64>),
}

impl SplitAxis {
    /// Project a point onto the split direction.
    #[must_use]
    pub fn project(&self, p: &Point3<f64>) -> f64 {
        match self {
            Self::World(axis) => p.coords[*axis],
            Self::Oriented(dir) => dir.dot(&p.coords),
        }
    }
}

/// Capability set required of a bounding volume.
pub trait BoundingVolume: Clone + std::fmt::Debug {
    /// Fit a volume around a set of points.
    ///
    /// The point set must be non-empty; fitting an empty set is a
    /// precondition violation.
    fn fit(points: &[Point3<f64>]) -> Self;

    /// Whether this volume overlaps another expressed in the same frame.
    fn overlaps(&self, other: &Self) -> bool;

    /// Centre of the volume.
    fn center(&self) -> Point3<f64>;

    /// Extent along the volume's first principal axis.
    fn width(&self) -> f64;

    /// Extent along the volume's second principal axis.
    fn height(&self) -> f64;

    /// Extent along the volume's third principal axis.
    fn depth(&self) -> f64;

    /// The direction a splitter should partition along: the volume's longest
    /// principal direction.
    fn split_axis(&self) -> SplitAxis;

    /// The volume mapped through a rigid transform.
    ///
    /// May be conservative (a bound of the transformed volume) rather than
    /// exact.
    fn transformed(&self, tf: &Transform3d) -> Self;
}

// ============================================================================
// Axis-aligned bounding box
// ============================================================================

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create a box from min and max corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// An empty (inverted) box; expanding it with any point yields that
    /// point.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// A box centred at `center` with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The tight box around a triangle.
    #[must_use]
    pub fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        Self {
            min: Point3::new(
                v0.x.min(v1.x).min(v2.x),
                v0.y.min(v1.y).min(v2.y),
                v0.z.min(v1.z).min(v2.z),
            ),
            max: Point3::new(
                v0.x.max(v1.x).max(v2.x),
                v0.y.max(v1.y).max(v2.y),
                v0.z.max(v1.z).max(v2.z),
            ),
        }
    }

    /// Expand this box to include another.
    pub fn expand(&mut self, other: &Self) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.min.z = self.min.z.min(other.min.z);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
        self.max.z = self.max.z.max(other.max.z);
    }

    /// Expand this box to include a point.
    pub fn expand_point(&mut self, point: &Point3<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Whether the box is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Extent along each world axis.
    #[must_use]
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Index of the longest world axis (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }
}

impl BoundingVolume for Aabb {
    fn fit(points: &[Point3<f64>]) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.expand_point(p);
        }
        aabb
    }

    fn overlaps(&self, other: &Self) -> bool {
        !(self.max.x < other.min.x
            || other.max.x < self.min.x
            || self.max.y < other.min.y
            || other.max.y < self.min.y
            || self.max.z < other.min.z
            || other.max.z < self.min.z)
    }

    fn center(&self) -> Point3<f64> {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    fn depth(&self) -> f64 {
        self.max.z - self.min.z
    }

    fn split_axis(&self) -> SplitAxis {
        SplitAxis::World(self.longest_axis())
    }

    fn transformed(&self, tf: &Transform3d) -> Self {
        // Conservative: bound the eight transformed corners.
        let mut out = Self::empty();
        for &x in &[self.min.x, self.max.x] {
            for &y in &[self.min.y, self.max.y] {
                for &z in &[self.min.z, self.max.z] {
                    out.expand_point(&tf.transform_point(&Point3::new(x, y, z)));
                }
            }
        }
        out
    }
}

// ============================================================================
// Oriented bounding box
// ============================================================================

/// Oriented bounding box with axes fitted from the covariance of the point
/// set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Obb {
    /// Centre of the box.
    pub center: Point3<f64>,
    /// Box axes as matrix columns, ordered by decreasing extent.
    pub axes: Matrix3<f64>,
    /// Half-extents along the box axes.
    pub half_extents: Vector3<f64>,
}

impl Obb {
    /// Project this box's half-extents onto a direction.
    fn projected_radius(&self, dir: &Vector3<f64>) -> f64 {
        self.half_extents.x * dir.dot(&self.axes.column(0).into_owned()).abs()
            + self.half_extents.y * dir.dot(&self.axes.column(1).into_owned()).abs()
            + self.half_extents.z * dir.dot(&self.axes.column(2).into_owned()).abs()
    }
}

impl BoundingVolume for Obb {
    /// Fit by eigen-decomposition of the point covariance matrix, then size
    /// the box by projecting the points onto the resulting axes.
    fn fit(points: &[Point3<f64>]) -> Self {
        let n = points.len().max(1) as f64;
        let mut mean = Vector3::zeros();
        for p in points {
            mean += p.coords;
        }
        mean /= n;

        let mut cov = Matrix3::zeros();
        for p in points {
            let d = p.coords - mean;
            cov += d * d.transpose();
        }
        cov /= n;

        let eigen = cov.symmetric_eigen();
        // Order the eigenvectors by decreasing eigenvalue so column 0 is the
        // direction of largest spread.
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let c0 = eigen.eigenvectors.column(order[0]).into_owned();
        let c1 = eigen.eigenvectors.column(order[1]).into_owned();
        // Rebuild the third axis so the frame is right-handed.
        let c2 = c0.cross(&c1);
        let axes = Matrix3::from_columns(&[c0, c1, c2]);

        // Extents from the projection range of the points.
        let mut lo = Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut hi = Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            let local = axes.transpose() * p.coords;
            for i in 0..3 {
                lo[i] = lo[i].min(local[i]);
                hi[i] = hi[i].max(local[i]);
            }
        }
        let local_center = (lo + hi) * 0.5;

        Self {
            center: Point3::from(axes * local_center),
            axes,
            half_extents: (hi - lo) * 0.5,
        }
    }

    /// Separating-axis overlap test over the 15 candidate axes (6 face
    /// normals + 9 edge cross products).
    fn overlaps(&self, other: &Self) -> bool {
        let t = other.center - self.center;
        for i in 0..3 {
            let axis = self.axes.column(i).into_owned();
            if t.dot(&axis).abs() > self.half_extents[i] + other.projected_radius(&axis) {
                return false;
            }
        }
        for j in 0..3 {
            let axis = other.axes.column(j).into_owned();
            if t.dot(&axis).abs() > self.projected_radius(&axis) + other.half_extents[j] {
                return false;
            }
        }
        for i in 0..3 {
            for j in 0..3 {
                let axis = self
                    .axes
                    .column(i)
                    .cross(&other.axes.column(j).into_owned());
                let len = axis.norm();
                if len < 1e-12 {
                    continue; // parallel edges
                }
                let axis = axis / len;
                if t.dot(&axis).abs()
                    > self.projected_radius(&axis) + other.projected_radius(&axis)
                {
                    return false;
                }
            }
        }
        true
    }

    fn center(&self) -> Point3<f64> {
        self.center
    }

    fn width(&self) -> f64 {
        2.0 * self.half_extents.x
    }

    fn height(&self) -> f64 {
        2.0 * self.half_extents.y
    }

    fn depth(&self) -> f64 {
        2.0 * self.half_extents.z
    }

    fn split_axis(&self) -> SplitAxis {
        SplitAxis::Oriented(self.axes.column(0).into_owned())
    }

    fn transformed(&self, tf: &Transform3d) -> Self {
        Self {
            center: tf.transform_point(&self.center),
            axes: tf.rotation * self.axes,
            half_extents: self.half_extents,
        }
    }
}
