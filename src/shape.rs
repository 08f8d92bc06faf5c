//! Geometric shape primitives for narrow-phase collision detection.
//!
//! This module defines the [`Shape`] enum consumed by the pairwise solvers
//! and the shape-vs-mesh traversal. Shapes are immutable value types owned by
//! the caller; solvers only ever read them.

use nalgebra::{Point3, Vector3};

use crate::bv::Aabb;
use crate::transform::Transform3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid collision primitive.
///
/// Each shape is described in its own local frame; a [`Transform3d`] places
/// it in the world for a query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Sphere centred at the local origin.
    Sphere {
        /// Sphere radius.
        radius: f64,
    },
    /// Oriented box centred at the local origin.
    Box {
        /// Half-extents along the local X, Y, Z axes.
        half_extents: Vector3<f64>,
    },
    /// A single triangle.
    Triangle {
        /// The three vertices in local coordinates.
        vertices: [Point3<f64>; 3],
    },
}

impl Shape {
    /// Create a sphere shape.
    #[must_use]
    pub const fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box shape from half-extents.
    #[must_use]
    pub const fn box_shape(half_extents: Vector3<f64>) -> Self {
        Self::Box { half_extents }
    }

    /// Create a triangle shape.
    #[must_use]
    pub const fn triangle(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self::Triangle {
            vertices: [v0, v1, v2],
        }
    }

    /// Axis-aligned bounding box of the shape placed by `tf`.
    ///
    /// The box bound is conservative for rotated boxes (it bounds the rotated
    /// corners); the sphere bound is exact.
    #[must_use]
    pub fn aabb(&self, tf: &Transform3d) -> Aabb {
        match self {
            Self::Sphere { radius } => {
                let c = Point3::from(tf.translation);
                let r = Vector3::new(*radius, *radius, *radius);
                Aabb::new(c - r, c + r)
            }
            Self::Box { half_extents } => {
                // Project the rotated half-extents onto the world axes:
                // extent_i = sum_j |R[i][j]| * h[j]
                let r = &tf.rotation;
                let h = half_extents;
                let extent = Vector3::new(
                    r.m11.abs() * h.x + r.m12.abs() * h.y + r.m13.abs() * h.z,
                    r.m21.abs() * h.x + r.m22.abs() * h.y + r.m23.abs() * h.z,
                    r.m31.abs() * h.x + r.m32.abs() * h.y + r.m33.abs() * h.z,
                );
                let c = Point3::from(tf.translation);
                Aabb::new(c - extent, c + extent)
            }
            Self::Triangle { vertices } => {
                let mut aabb = Aabb::empty();
                for v in vertices {
                    aabb.expand_point(&tf.transform_point(v));
                }
                aabb
            }
        }
    }
}
