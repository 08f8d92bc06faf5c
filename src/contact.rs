//! Contact results and query configuration.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single contact point produced by an intersection routine.
///
/// Lives only in a query's result buffer; nothing in this crate persists
/// contacts across queries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Unit contact normal.
    pub normal: Vector3<f64>,
    /// Contact position in the query frame.
    pub point: Point3<f64>,
    /// Penetration depth; positive when the shapes overlap.
    pub depth: f64,
}

impl ContactPoint {
    /// Create a contact point.
    #[must_use]
    pub const fn new(normal: Vector3<f64>, point: Point3<f64>, depth: f64) -> Self {
        Self {
            normal,
            point,
            depth,
        }
    }
}

/// Caller-supplied configuration for a collision query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionRequest {
    /// Maximum number of contacts (or continuous collision pairs) to record
    /// before the traversal may stop early. Must be at least 1.
    pub max_contacts: usize,
    /// Whether to count bounding-volume and leaf tests during traversal.
    /// Counting is skipped entirely when disabled.
    pub enable_statistics: bool,
}

impl Default for CollisionRequest {
    fn default() -> Self {
        Self {
            max_contacts: 4,
            enable_statistics: false,
        }
    }
}

impl CollisionRequest {
    /// A request recording at most `max_contacts` contacts.
    #[must_use]
    pub fn with_max_contacts(mut self, max_contacts: usize) -> Self {
        self.max_contacts = max_contacts.max(1);
        self
    }

    /// Enable or disable traversal statistics counters.
    #[must_use]
    pub fn with_statistics(mut self, enable: bool) -> Self {
        self.enable_statistics = enable;
        self
    }
}

/// Counters accumulated over one traversal call.
///
/// All counters stay zero unless [`CollisionRequest::enable_statistics`] is
/// set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueryStats {
    /// Number of bounding-volume overlap tests performed.
    pub num_bv_tests: usize,
    /// Number of leaf-level tests performed.
    pub num_leaf_tests: usize,
    /// Number of vertex-face sweep tests (continuous collision only).
    pub num_vf_tests: usize,
    /// Number of edge-edge sweep tests (continuous collision only).
    pub num_ee_tests: usize,
}
