//! Narrow-phase collision detection with BVH-accelerated traversal.
//!
//! The crate provides three layers:
//!
//! - **Narrow phase** ([`narrow`]): analytical contact solvers for
//!   sphere-sphere, sphere-triangle, and box-box pairs, plus continuous
//!   (swept) vertex-face and edge-edge tests for linearly moving triangles.
//! - **Acceleration** ([`bvh`], [`bv`], [`splitter`], [`morton`]): top-down
//!   bounding volume hierarchies over triangle meshes, generic over the
//!   bounding volume (axis-aligned or covariance-fitted oriented boxes),
//!   with pluggable split policies and Morton-order spatial sorting.
//! - **Traversal** ([`traversal`]): a generic recursive tree-pair traversal
//!   driving discrete shape-vs-mesh collision, mesh-vs-mesh candidate
//!   enumeration, and continuous mesh-vs-mesh time-of-contact queries.
//!
//! # Conventions
//!
//! All geometry is `f64`. Contacts carry a unit normal pointing from the
//! first shape into the second and a positive penetration depth; distance
//! queries return `None` when the shapes overlap. Solvers trust their
//! preconditions (unit-length rotation columns, non-degenerate shapes);
//! validation happens where geometry enters the crate, in
//! [`mesh::TriangleMeshData::new`] and the continuous-query constructors,
//! which return [`error::CollisionError`].
//!
//! # Example
//!
//! ```
//! use collision_core::{narrow, Shape, Transform3d};
//! use nalgebra::Vector3;
//!
//! let sphere = Shape::sphere(1.0);
//! let tf1 = Transform3d::identity();
//! let tf2 = Transform3d::from_translation(Vector3::new(1.5, 0.0, 0.0));
//! let contact = narrow::collide(&sphere, &tf1, &sphere, &tf2)
//!     .expect("supported pair")
//!     .expect("overlapping");
//! assert!((contact.depth - 0.5).abs() < 1e-12);
//! ```

pub mod bv;
pub mod bvh;
pub mod contact;
pub mod error;
pub mod mesh;
pub mod morton;
pub mod narrow;
pub mod shape;
pub mod splitter;
pub mod transform;
pub mod traversal;

pub use bv::{Aabb, BoundingVolume, Obb, SplitAxis};
pub use bvh::BvhTree;
pub use contact::{CollisionRequest, ContactPoint, QueryStats};
pub use error::CollisionError;
pub use mesh::{Triangle, TriangleMeshData};
pub use shape::Shape;
pub use splitter::{BvSplitter, MeshTopology, SplitMethod};
pub use transform::Transform3d;
pub use traversal::{
    collision_recurse, CcdPair, CcdResult, MeshMeshCandidates, MeshMeshContinuous,
    SphereMeshCollision, TraversalNode, TriangleContact,
};
