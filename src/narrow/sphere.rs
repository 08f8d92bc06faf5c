//! Analytical sphere-sphere and sphere-triangle tests.
//!
//! These are closed-form solutions, more robust than iterative methods for
//! these shape pairs. The sphere-triangle distance query uses the standard
//! seven-region barycentric classification of the closest point on a
//! triangle.

use nalgebra::{Point3, Vector3};

use super::GEOM_EPSILON;
use crate::contact::ContactPoint;
use crate::transform::Transform3d;

/// Sphere-sphere intersection.
///
/// Returns a contact whose normal points from the first sphere toward the
/// second and whose point sits at the middle of the overlap interval along
/// the centre line.
#[must_use]
pub fn sphere_sphere_intersect(
    radius1: f64,
    tf1: &Transform3d,
    radius2: f64,
    tf2: &Transform3d,
) -> Option<ContactPoint> {
    let c1 = tf1.transform_point(&Point3::origin());
    let c2 = tf2.transform_point(&Point3::origin());
    let diff = c2 - c1;
    let len = diff.norm();
    if len > radius1 + radius2 {
        return None;
    }
    // Coincident centres keep the raw (zero) direction rather than inventing
    // an arbitrary axis; callers that need a usable normal should treat a
    // zero normal as fully degenerate.
    let normal = if len > 0.0 { diff / len } else { diff };
    let depth = radius1 + radius2 - len;
    Some(ContactPoint {
        normal,
        point: c1 + normal * (radius1 - depth * 0.5),
        depth,
    })
}

/// Sphere-sphere separation distance. `None` when the spheres overlap.
#[must_use]
pub fn sphere_sphere_distance(
    radius1: f64,
    tf1: &Transform3d,
    radius2: f64,
    tf2: &Transform3d,
) -> Option<f64> {
    let c1 = tf1.transform_point(&Point3::origin());
    let c2 = tf2.transform_point(&Point3::origin());
    let dist = (c2 - c1).norm() - radius1 - radius2;
    (dist > 0.0).then_some(dist)
}

/// Squared distance from point `p` to the segment from `from` to `to`.
fn segment_sqr_distance(from: &Point3<f64>, to: &Point3<f64>, p: &Point3<f64>) -> f64 {
    let diff = p - from;
    let dir = to - from;
    let mut t = diff.dot(&dir);
    if t > 0.0 {
        let dir_sqr = dir.norm_squared();
        if t < dir_sqr {
            t /= dir_sqr;
        } else {
            t = 1.0;
        }
    } else {
        t = 0.0;
    }
    (diff - dir * t).norm_squared()
}

/// Whether the projection of `p` onto the triangle plane falls inside the
/// triangle. `normal` is the (unnormalized) triangle plane normal.
fn project_in_triangle(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    normal: &Vector3<f64>,
    p: &Point3<f64>,
) -> bool {
    let edge1 = p2 - p1;
    let edge2 = p3 - p2;
    let edge3 = p1 - p3;

    let p1_to_p = p - p1;
    let p2_to_p = p - p2;
    let p3_to_p = p - p3;

    let r1 = edge1.cross(&p1_to_p).dot(normal);
    let r2 = edge2.cross(&p2_to_p).dot(normal);
    let r3 = edge3.cross(&p3_to_p).dot(normal);
    (r1 > 0.0 && r2 > 0.0 && r3 > 0.0) || (r1 <= 0.0 && r2 <= 0.0 && r3 <= 0.0)
}

/// Sphere-triangle intersection.
///
/// The triangle vertices are given in the sphere's frame after applying
/// `tf` to them; the returned contact normal points from the triangle into
/// the sphere, with the contact point on the triangle.
#[must_use]
pub fn sphere_triangle_intersect(
    radius: f64,
    tf_sphere: &Transform3d,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    tf_tri: &Transform3d,
) -> Option<ContactPoint> {
    let center = tf_sphere.transform_point(&Point3::origin());
    let p1 = tf_tri.transform_point(p1);
    let p2 = tf_tri.transform_point(p2);
    let p3 = tf_tri.transform_point(p3);

    let mut normal = (p2 - p1).cross(&(p3 - p1));
    let norm_len = normal.norm();
    if norm_len < GEOM_EPSILON {
        return None; // degenerate triangle
    }
    normal /= norm_len;

    // Orient the plane normal toward the sphere centre.
    let mut distance_from_plane = (center - p1).dot(&normal);
    if distance_from_plane < 0.0 {
        distance_from_plane = -distance_from_plane;
        normal = -normal;
    }

    let radius_with_threshold = radius + GEOM_EPSILON;
    let mut has_contact = false;
    let mut contact_point = Point3::origin();

    if distance_from_plane < radius_with_threshold {
        if project_in_triangle(&p1, &p2, &p3, &normal, &center) {
            has_contact = true;
            contact_point = center - normal * distance_from_plane;
        } else {
            // Probe each edge as a capsule of the sphere's radius. Later
            // edges overwrite earlier matches, so the last qualifying edge
            // provides the contact.
            let r2 = radius_with_threshold * radius_with_threshold;
            for (a, b) in [(&p1, &p2), (&p2, &p3), (&p3, &p1)] {
                if segment_sqr_distance(a, b, &center) < r2 {
                    has_contact = true;
                    contact_point = nearest_on_segment(a, b, &center);
                }
            }
        }
    }

    if !has_contact {
        return None;
    }

    let contact_to_center = center - contact_point;
    let distance_sqr = contact_to_center.norm_squared();
    if distance_sqr > radius_with_threshold * radius_with_threshold {
        return None;
    }

    if distance_sqr > 0.0 {
        let distance = distance_sqr.sqrt();
        Some(ContactPoint {
            normal: contact_to_center / distance,
            point: contact_point,
            depth: radius - distance,
        })
    } else {
        // Centre exactly on the triangle surface.
        Some(ContactPoint {
            normal,
            point: contact_point,
            depth: radius,
        })
    }
}

/// Closest point to `p` on the segment from `a` to `b`.
fn nearest_on_segment(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> Point3<f64> {
    let dir = b - a;
    let dir_sqr = dir.norm_squared();
    if dir_sqr < GEOM_EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&dir) / dir_sqr).clamp(0.0, 1.0);
    a + dir * t
}

/// Sphere-triangle separation distance. `None` when they overlap.
///
/// Uses the closed-form closest-point-on-triangle query: the plane of the
/// triangle is parameterized barycentrically and the minimizer is clamped
/// region by region (interior, three edges, three vertices).
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn sphere_triangle_distance(
    radius: f64,
    tf_sphere: &Transform3d,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    tf_tri: &Transform3d,
) -> Option<f64> {
    let center = tf_sphere.transform_point(&Point3::origin());
    let p1 = tf_tri.transform_point(p1);
    let p2 = tf_tri.transform_point(p2);
    let p3 = tf_tri.transform_point(p3);

    let diff = p1 - center;
    let edge0 = p2 - p1;
    let edge1 = p3 - p1;
    let a00 = edge0.norm_squared();
    let a01 = edge0.dot(&edge1);
    let a11 = edge1.norm_squared();
    let b0 = diff.dot(&edge0);
    let b1 = diff.dot(&edge1);
    let c = diff.norm_squared();
    let det = (a00 * a11 - a01 * a01).abs();
    let mut s = a01 * b1 - a11 * b0;
    let mut t = a01 * b0 - a00 * b1;

    let mut sqr_distance;

    if s + t <= det {
        if s < 0.0 {
            if t < 0.0 {
                // region 4
                if b0 < 0.0 {
                    t = 0.0;
                    if -b0 >= a00 {
                        s = 1.0;
                        sqr_distance = a00 + 2.0 * b0 + c;
                    } else {
                        s = -b0 / a00;
                        sqr_distance = b0 * s + c;
                    }
                } else {
                    s = 0.0;
                    if b1 >= 0.0 {
                        t = 0.0;
                        sqr_distance = c;
                    } else if -b1 >= a11 {
                        t = 1.0;
                        sqr_distance = a11 + 2.0 * b1 + c;
                    } else {
                        t = -b1 / a11;
                        sqr_distance = b1 * t + c;
                    }
                }
            } else {
                // region 3
                s = 0.0;
                if b1 >= 0.0 {
                    t = 0.0;
                    sqr_distance = c;
                } else if -b1 >= a11 {
                    t = 1.0;
                    sqr_distance = a11 + 2.0 * b1 + c;
                } else {
                    t = -b1 / a11;
                    sqr_distance = b1 * t + c;
                }
            }
        } else if t < 0.0 {
            // region 5
            t = 0.0;
            if b0 >= 0.0 {
                s = 0.0;
                sqr_distance = c;
            } else if -b0 >= a00 {
                s = 1.0;
                sqr_distance = a00 + 2.0 * b0 + c;
            } else {
                s = -b0 / a00;
                sqr_distance = b0 * s + c;
            }
        } else {
            // region 0: interior minimum
            let inv_det = 1.0 / det;
            s *= inv_det;
            t *= inv_det;
            sqr_distance =
                s * (a00 * s + a01 * t + 2.0 * b0) + t * (a01 * s + a11 * t + 2.0 * b1) + c;
        }
    } else if s < 0.0 {
        // region 2
        let tmp0 = a01 + b0;
        let tmp1 = a11 + b1;
        if tmp1 > tmp0 {
            let numer = tmp1 - tmp0;
            let denom = a00 - 2.0 * a01 + a11;
            if numer >= denom {
                s = 1.0;
                t = 0.0;
                sqr_distance = a00 + 2.0 * b0 + c;
            } else {
                s = numer / denom;
                t = 1.0 - s;
                sqr_distance =
                    s * (a00 * s + a01 * t + 2.0 * b0) + t * (a01 * s + a11 * t + 2.0 * b1) + c;
            }
        } else {
            s = 0.0;
            if tmp1 <= 0.0 {
                t = 1.0;
                sqr_distance = a11 + 2.0 * b1 + c;
            } else if b1 >= 0.0 {
                t = 0.0;
                sqr_distance = c;
            } else {
                t = -b1 / a11;
                sqr_distance = b1 * t + c;
            }
        }
    } else if t < 0.0 {
        // region 6
        let tmp0 = a01 + b1;
        let tmp1 = a00 + b0;
        if tmp1 > tmp0 {
            let numer = tmp1 - tmp0;
            let denom = a00 - 2.0 * a01 + a11;
            if numer >= denom {
                t = 1.0;
                s = 0.0;
                sqr_distance = a11 + 2.0 * b1 + c;
            } else {
                t = numer / denom;
                s = 1.0 - t;
                sqr_distance =
                    s * (a00 * s + a01 * t + 2.0 * b0) + t * (a01 * s + a11 * t + 2.0 * b1) + c;
            }
        } else {
            t = 0.0;
            if tmp1 <= 0.0 {
                s = 1.0;
                sqr_distance = a00 + 2.0 * b0 + c;
            } else if b0 >= 0.0 {
                s = 0.0;
                sqr_distance = c;
            } else {
                s = -b0 / a00;
                sqr_distance = b0 * s + c;
            }
        }
    } else {
        // region 1
        let numer = a11 + b1 - a01 - b0;
        if numer <= 0.0 {
            s = 0.0;
            sqr_distance = a11 + 2.0 * b1 + c;
        } else {
            let denom = a00 - 2.0 * a01 + a11;
            if numer >= denom {
                s = 1.0;
                sqr_distance = a00 + 2.0 * b0 + c;
            } else {
                s = numer / denom;
                let t = 1.0 - s;
                sqr_distance =
                    s * (a00 * s + a01 * t + 2.0 * b0) + t * (a01 * s + a11 * t + 2.0 * b1) + c;
            }
        }
    }

    // Rounding can push the interior minimum slightly negative.
    if sqr_distance < 0.0 {
        sqr_distance = 0.0;
    }

    (sqr_distance > radius * radius).then(|| sqr_distance.sqrt() - radius)
}
