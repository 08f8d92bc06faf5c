//! Triangle mesh storage.
//!
//! [`TriangleMeshData`] owns the vertex and triangle buffers a BVH is built
//! over. Construction validates the index buffer so the rest of the crate
//! can index without bounds anxiety.

use nalgebra::Point3;

use crate::error::CollisionError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A triangle as three indices into a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// First vertex index.
    pub v0: usize,
    /// Second vertex index.
    pub v1: usize,
    /// Third vertex index.
    pub v2: usize,
}

impl Triangle {
    /// Create a triangle from three vertex indices.
    #[must_use]
    pub const fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Self { v0, v1, v2 }
    }

    /// The indices as an array, in winding order.
    #[must_use]
    pub const fn indices(&self) -> [usize; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Validated triangle mesh buffers.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriangleMeshData {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<Triangle>,
}

impl TriangleMeshData {
    /// Build a mesh from vertex and triangle buffers.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::EmptyMesh`] if either buffer is empty, or
    /// [`CollisionError::TriangleIndexOutOfBounds`] if a triangle references
    /// a vertex that does not exist.
    pub fn new(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<Triangle>,
    ) -> Result<Self, CollisionError> {
        if vertices.is_empty() || triangles.is_empty() {
            return Err(CollisionError::EmptyMesh);
        }
        for (t, tri) in triangles.iter().enumerate() {
            for index in tri.indices() {
                if index >= vertices.len() {
                    return Err(CollisionError::TriangleIndexOutOfBounds {
                        triangle: t,
                        index,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// The vertex buffer.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// The triangle buffer.
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// The three corner points of triangle `id`.
    #[must_use]
    pub fn triangle_points(&self, id: usize) -> [Point3<f64>; 3] {
        let tri = &self.triangles[id];
        [
            self.vertices[tri.v0],
            self.vertices[tri.v1],
            self.vertices[tri.v2],
        ]
    }
}
