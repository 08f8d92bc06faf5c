//! Error types for the validated construction boundary.
//!
//! Solvers and traversal trust their preconditions (see the crate docs);
//! errors are only reported where geometry enters the crate: mesh
//! construction and continuous-query setup.

/// Errors that can occur while building collision geometry or queries.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CollisionError {
    /// A triangle refers to a vertex index outside the vertex buffer.
    #[error("triangle {triangle} refers to vertex {index}, but only {vertex_count} vertices exist")]
    TriangleIndexOutOfBounds {
        /// Index of the offending triangle.
        triangle: usize,
        /// The out-of-range vertex index.
        index: usize,
        /// Number of vertices in the buffer.
        vertex_count: usize,
    },

    /// A mesh was created with no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// The previous-position buffer of a continuous query does not match the
    /// current-position buffer.
    #[error("previous vertex buffer has {previous} entries, current has {current}")]
    MismatchedVertexBuffers {
        /// Length of the previous-position buffer.
        previous: usize,
        /// Length of the current-position buffer.
        current: usize,
    },

    /// No analytical solver exists for the requested shape pair.
    #[error("no solver for the requested shape pair")]
    UnsupportedShapePair,
}
