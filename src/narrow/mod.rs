//! Narrow-phase solvers: exact contact computation for primitive pairs.
//!
//! Discrete solvers report a [`ContactPoint`](crate::contact::ContactPoint)
//! with a positive penetration depth and a normal pointing from the first
//! shape into the second; separation queries return `None` when the shapes
//! overlap. Continuous solvers report the earliest time of contact over a
//! unit motion interval.

pub mod box_box;
pub mod continuous;
pub mod sphere;

use crate::contact::ContactPoint;
use crate::error::CollisionError;
use crate::shape::Shape;
use crate::transform::Transform3d;

/// Epsilon for geometric degeneracy checks (zero-length normals, collapsed
/// triangles).
pub const GEOM_EPSILON: f64 = 1e-10;

pub use box_box::{box_box_intersect, box_box_manifold, BoxBoxFeature};
pub use continuous::{edge_edge_toc, vertex_face_toc};
pub use sphere::{
    sphere_sphere_distance, sphere_sphere_intersect, sphere_triangle_distance,
    sphere_triangle_intersect,
};

/// Dispatch a shape pair to its analytical solver.
///
/// `Ok(None)` means the shapes do not touch; the contact normal in
/// `Ok(Some(..))` points from `shape1` into `shape2`.
///
/// # Errors
///
/// Returns [`CollisionError::UnsupportedShapePair`] for pairs with no
/// analytical solver (box-sphere, box-triangle, triangle-triangle).
pub fn collide(
    shape1: &Shape,
    tf1: &Transform3d,
    shape2: &Shape,
    tf2: &Transform3d,
) -> Result<Option<ContactPoint>, CollisionError> {
    match (shape1, shape2) {
        (Shape::Sphere { radius: r1 }, Shape::Sphere { radius: r2 }) => {
            Ok(sphere_sphere_intersect(*r1, tf1, *r2, tf2))
        }
        (Shape::Sphere { radius }, Shape::Triangle { vertices: [a, b, c] }) => {
            // The solver's normal points from the triangle into the sphere;
            // flip it to match the first-into-second convention.
            Ok(
                sphere_triangle_intersect(*radius, tf1, a, b, c, tf2).map(|mut contact| {
                    contact.normal = -contact.normal;
                    contact
                }),
            )
        }
        (Shape::Triangle { vertices: [a, b, c] }, Shape::Sphere { radius }) => {
            Ok(sphere_triangle_intersect(*radius, tf2, a, b, c, tf1))
        }
        (Shape::Box { half_extents: h1 }, Shape::Box { half_extents: h2 }) => {
            Ok(box_box_intersect(h1, tf1, h2, tf2))
        }
        _ => Err(CollisionError::UnsupportedShapePair),
    }
}
