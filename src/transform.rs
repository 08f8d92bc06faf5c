//! Rigid transforms used by the collision queries.
//!
//! A [`Transform3d`] is a rotation (orthonormal 3x3 matrix) plus a
//! translation. Points map as `R * p + t`. Solvers treat transforms as
//! immutable per query and never normalize the rotation themselves; callers
//! are responsible for supplying an orthonormal matrix.

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid (rotation + translation) transform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform3d {
    /// Orthonormal rotation matrix.
    pub rotation: Matrix3<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for Transform3d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3d {
    /// Create a transform from a rotation matrix and a translation.
    #[must_use]
    pub const fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    /// Rotation about the X axis by `angle` radians, no translation.
    #[must_use]
    pub fn from_rotation_x(angle: f64) -> Self {
        Self {
            rotation: Rotation3::from_axis_angle(&Vector3::x_axis(), angle).into_inner(),
            translation: Vector3::zeros(),
        }
    }

    /// Rotation about the Y axis by `angle` radians, no translation.
    #[must_use]
    pub fn from_rotation_y(angle: f64) -> Self {
        Self {
            rotation: Rotation3::from_axis_angle(&Vector3::y_axis(), angle).into_inner(),
            translation: Vector3::zeros(),
        }
    }

    /// Rotation about the Z axis by `angle` radians, no translation.
    #[must_use]
    pub fn from_rotation_z(angle: f64) -> Self {
        Self {
            rotation: Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner(),
            translation: Vector3::zeros(),
        }
    }

    /// Map a point: `R * p + t`.
    #[must_use]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// Map a direction: `R * v` (translation ignored).
    #[must_use]
    pub fn transform_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }

    /// The inverse transform.
    ///
    /// Relies on the rotation being orthonormal (`R^-1 == R^T`).
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    /// Compose two transforms: `self * other` maps a point through `other`
    /// first, then through `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform expressing `self` in the frame of `reference`, i.e.
    /// `reference.inverse() * self`.
    #[must_use]
    pub fn relative_to(&self, reference: &Self) -> Self {
        reference.inverse().compose(self)
    }
}

impl std::ops::Mul for Transform3d {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.compose(&rhs)
    }
}
