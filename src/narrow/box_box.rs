//! Box-box contact generation via the separating axis theorem.
//!
//! Tests the fifteen candidate axes (three face normals per box plus the
//! nine pairwise edge cross products) and, when no axis separates the
//! boxes, builds a contact manifold. Edge-edge codes give a single contact
//! at the closest approach of the two edges; face codes clip the incident
//! face against the reference face and keep the penetrating clip points.
//!
//! Face axes get a small bias over edge axes so nearly-flat stacks resolve
//! as face contacts, which produce far more stable manifolds.

use nalgebra::{Matrix3, Point3, Vector3};
use smallvec::SmallVec;

use crate::contact::ContactPoint;
use crate::transform::Transform3d;

/// Bias applied when an edge axis competes with the current best face axis.
const FUDGE_FACTOR: f64 = 1.05;
/// Avoids edge-axis false positives when edges are nearly parallel.
const FUDGE2: f64 = 1.0e-6;

/// Which feature pair produced the manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxBoxFeature {
    /// A face of the first box (axis index 0..3).
    Face1(usize),
    /// A face of the second box (axis index 0..3).
    Face2(usize),
    /// An edge of the first box against an edge of the second
    /// (axis index pair).
    Edge(usize, usize),
}

/// Closest-approach parameters of two lines `pa + alpha * ua` and
/// `pb + beta * ub`. Nearly parallel lines return `(0, 0)`.
fn line_closest_approach(
    pa: &Point3<f64>,
    ua: &Vector3<f64>,
    pb: &Point3<f64>,
    ub: &Vector3<f64>,
) -> (f64, f64) {
    let p = pb - pa;
    let uaub = ua.dot(ub);
    let q1 = ua.dot(&p);
    let q2 = -ub.dot(&p);
    let d = 1.0 - uaub * uaub;
    if d <= 0.0001 {
        (0.0, 0.0)
    } else {
        let d = 1.0 / d;
        ((q1 + uaub * q2) * d, (uaub * q1 + q2) * d)
    }
}

/// Clip a 2D quadrilateral against the rectangle `|x| <= h[0]`,
/// `|y| <= h[1]`. Returns at most eight points.
fn intersect_rect_quad(h: [f64; 2], quad: [[f64; 2]; 4]) -> SmallVec<[[f64; 2]; 8]> {
    let mut current: SmallVec<[[f64; 2]; 8]> = SmallVec::from_slice(&quad);
    let mut next: SmallVec<[[f64; 2]; 8]> = SmallVec::new();

    for dir in 0..2 {
        for sign in [-1.0, 1.0] {
            next.clear();
            for i in 0..current.len() {
                let p = current[i];
                let q = current[(i + 1) % current.len()];
                let p_inside = sign * p[dir] < h[dir];
                let q_inside = sign * q[dir] < h[dir];
                if p_inside {
                    next.push(p);
                    if next.len() == 8 {
                        return next;
                    }
                }
                if p_inside != q_inside {
                    let mut v = [0.0; 2];
                    v[1 - dir] = p[1 - dir]
                        + (q[1 - dir] - p[1 - dir]) / (q[dir] - p[dir])
                            * (sign * h[dir] - p[dir]);
                    v[dir] = sign * h[dir];
                    next.push(v);
                    if next.len() == 8 {
                        return next;
                    }
                }
            }
            std::mem::swap(&mut current, &mut next);
            if current.is_empty() {
                return current;
            }
        }
    }
    current
}

/// Pick `m` well-spread indices from `points`, always keeping `must_keep`.
///
/// Spreads the picks by angle around the polygon centroid so the reduced
/// manifold still spans the contact area.
fn cull_points(points: &[[f64; 2]], m: usize, must_keep: usize) -> SmallVec<[usize; 8]> {
    let n = points.len();
    let mut kept: SmallVec<[usize; 8]> = SmallVec::new();
    if n <= m {
        kept.extend(0..n);
        return kept;
    }

    // Area-weighted polygon centroid, falling back to huge-weight midpoints
    // for degenerate (zero-area) polygons.
    let (cx, cy) = {
        let mut area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = points[i];
            let q = points[(i + 1) % n];
            let cross = p[0] * q[1] - q[0] * p[1];
            area += cross;
            cx += cross * (p[0] + q[0]);
            cy += cross * (p[1] + q[1]);
        }
        // Large finite weight keeps the centroid (and the angles derived
        // from it) meaningful for zero-area polygons; infinity would wash
        // the coordinates out.
        let scale = if area.abs() > f64::EPSILON {
            1.0 / (3.0 * area)
        } else {
            1e18
        };
        (cx * scale, cy * scale)
    };

    let angles: Vec<f64> = points
        .iter()
        .map(|p| (p[1] - cy).atan2(p[0] - cx))
        .collect();

    let mut avail = vec![true; n];
    avail[must_keep] = false;
    kept.push(must_keep);
    for j in 1..m {
        let mut target = angles[must_keep] + j as f64 * (2.0 * std::f64::consts::PI / m as f64);
        if target > std::f64::consts::PI {
            target -= 2.0 * std::f64::consts::PI;
        }
        let mut best = usize::MAX;
        let mut best_diff = f64::INFINITY;
        for (i, &a) in angles.iter().enumerate() {
            if avail[i] {
                let mut diff = (a - target).abs();
                if diff > std::f64::consts::PI {
                    diff = 2.0 * std::f64::consts::PI - diff;
                }
                if diff < best_diff {
                    best_diff = diff;
                    best = i;
                }
            }
        }
        avail[best] = false;
        kept.push(best);
    }
    kept
}

/// Box-box contact manifold.
///
/// Half-extents are per box; transforms place the boxes in a common frame.
/// On contact, every returned point carries the same world normal, pointing
/// from the first box into the second, with positive penetration depth. At
/// most `max_contacts` points are returned (at least one when the boxes
/// touch); `None` means a separating axis exists.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn box_box_manifold(
    half1: &Vector3<f64>,
    tf1: &Transform3d,
    half2: &Vector3<f64>,
    tf2: &Transform3d,
    max_contacts: usize,
) -> Option<(BoxBoxFeature, Vec<ContactPoint>)> {
    let a = half1;
    let b = half2;
    let r1 = &tf1.rotation;
    let r2 = &tf2.rotation;
    let p = tf2.translation - tf1.translation;
    let pp = r1.transpose() * p;
    let rot = r1.transpose() * r2;
    let mut q = rot.map(f64::abs);

    let mut s = f64::NEG_INFINITY;
    let mut invert_normal = false;
    let mut code = 0usize;
    // World-frame normal for face codes; box1-frame normal for edge codes.
    let mut normal_r = Vector3::zeros();
    let mut normal_c = Vector3::zeros();

    // Face axes of box 1.
    for i in 0..3 {
        let s2 = pp[i].abs() - (a[i] + b[0] * q[(i, 0)] + b[1] * q[(i, 1)] + b[2] * q[(i, 2)]);
        if s2 > 0.0 {
            return None;
        }
        if s2 > s {
            s = s2;
            normal_r = r1.column(i).into_owned();
            invert_normal = pp[i] < 0.0;
            code = i + 1;
        }
    }

    // Face axes of box 2.
    for i in 0..3 {
        let u = r2.column(i).into_owned();
        let expr = p.dot(&u);
        let s2 = expr.abs() - (a[0] * q[(0, i)] + a[1] * q[(1, i)] + a[2] * q[(2, i)] + b[i]);
        if s2 > 0.0 {
            return None;
        }
        if s2 > s {
            s = s2;
            normal_r = u;
            invert_normal = expr < 0.0;
            code = i + 4;
        }
    }

    // Edge cross products get a tolerance so nearly-parallel edge pairs do
    // not produce spurious separations.
    q.apply(|x| *x += FUDGE2);
    let eps = f64::EPSILON;
    for i in 0..3 {
        let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
        for j in 0..3 {
            let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
            let expr = pp[i2] * rot[(i1, j)] - pp[i1] * rot[(i2, j)];
            let radius = a[i1] * q[(i2, j)]
                + a[i2] * q[(i1, j)]
                + b[j1] * q[(i, j2)]
                + b[j2] * q[(i, j1)];
            let mut s2 = expr.abs() - radius;
            if s2 > 0.0 {
                return None;
            }
            // Axis u1_i x u2_j in box 1's frame.
            let mut n = Vector3::zeros();
            n[i1] = -rot[(i2, j)];
            n[i2] = rot[(i1, j)];
            let len = n.norm();
            if len > eps {
                s2 /= len;
                if s2 * FUDGE_FACTOR > s {
                    s = s2;
                    normal_c = n / len;
                    invert_normal = expr < 0.0;
                    code = 7 + i * 3 + j;
                }
            }
        }
    }

    if code == 0 {
        return None;
    }

    let mut normal = if code > 6 { r1 * normal_c } else { normal_r };
    if invert_normal {
        normal = -normal;
    }
    let depth = -s;

    if code > 6 {
        // Edge-edge: one contact at the closest approach of the two
        // penetrating edges.
        let mut pa = Point3::from(tf1.translation);
        for j in 0..3 {
            let u = r1.column(j).into_owned();
            let sign = if normal.dot(&u) > 0.0 { 1.0 } else { -1.0 };
            pa += u * (sign * a[j]);
        }
        let mut pb = Point3::from(tf2.translation);
        for j in 0..3 {
            let u = r2.column(j).into_owned();
            let sign = if normal.dot(&u) > 0.0 { -1.0 } else { 1.0 };
            pb += u * (sign * b[j]);
        }
        let axis1 = (code - 7) / 3;
        let axis2 = (code - 7) % 3;
        let ua = r1.column(axis1).into_owned();
        let ub = r2.column(axis2).into_owned();
        let (alpha, beta) = line_closest_approach(&pa, &ua, &pb, &ub);
        let pa = pa + ua * alpha;
        let pb = pb + ub * beta;
        return Some((
            BoxBoxFeature::Edge(axis1, axis2),
            vec![ContactPoint {
                normal,
                point: Point3::from((pa.coords + pb.coords) * 0.5),
                depth,
            }],
        ));
    }

    // Face contact. The box owning the separating face is the reference;
    // the other contributes its most anti-parallel (incident) face.
    let (ra, rb, ta, tb, sa, sb): (&Matrix3<f64>, &Matrix3<f64>, _, _, _, _) = if code <= 3 {
        (r1, r2, tf1.translation, tf2.translation, a, b)
    } else {
        (r2, r1, tf2.translation, tf1.translation, b, a)
    };
    // Reference-face outward normal, pointing toward the incident box.
    let normal2 = if code <= 3 { normal } else { -normal };

    // Incident face: the axis of rb most aligned with normal2.
    let nr = rb.transpose() * normal2;
    let anr = nr.map(f64::abs);
    let (lanr, a1, a2) = if anr[1] > anr[0] {
        if anr[1] > anr[2] {
            (1, 0, 2)
        } else {
            (2, 0, 1)
        }
    } else if anr[0] > anr[2] {
        (0, 1, 2)
    } else {
        (2, 0, 1)
    };

    // Centre of the incident face, relative to the reference box centre.
    let mut center = tb - ta;
    if nr[lanr] < 0.0 {
        center += rb.column(lanr) * sb[lanr];
    } else {
        center -= rb.column(lanr) * sb[lanr];
    }

    // The two reference-face tangent axes.
    let code_n = if code <= 3 { code - 1 } else { code - 4 };
    let (code1, code2) = match code_n {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let c1 = center.dot(&ra.column(code1).into_owned());
    let c2 = center.dot(&ra.column(code2).into_owned());
    let m11 = ra.column(code1).dot(&rb.column(a1));
    let m12 = ra.column(code1).dot(&rb.column(a2));
    let m21 = ra.column(code2).dot(&rb.column(a1));
    let m22 = ra.column(code2).dot(&rb.column(a2));

    // Incident face corners projected onto the reference face plane.
    let k1 = m11 * sb[a1];
    let k2 = m21 * sb[a1];
    let k3 = m12 * sb[a2];
    let k4 = m22 * sb[a2];
    let quad = [
        [c1 - k1 - k3, c2 - k2 - k4],
        [c1 - k1 + k3, c2 - k2 + k4],
        [c1 + k1 + k3, c2 + k2 + k4],
        [c1 + k1 - k3, c2 + k2 - k4],
    ];
    let rect = [sa[code1], sa[code2]];
    let clipped = intersect_rect_quad(rect, quad);
    if clipped.is_empty() {
        return None;
    }

    // Map clip points back to 3D and keep those inside the reference box.
    let det_inv = 1.0 / (m11 * m22 - m12 * m21);
    let m11 = m11 * det_inv;
    let m12 = m12 * det_inv;
    let m21 = m21 * det_inv;
    let m22 = m22 * det_inv;

    let mut points: SmallVec<[Vector3<f64>; 8]> = SmallVec::new();
    let mut depths: SmallVec<[f64; 8]> = SmallVec::new();
    let mut planar: SmallVec<[[f64; 2]; 8]> = SmallVec::new();
    for cp in &clipped {
        let k1 = m22 * (cp[0] - c1) - m12 * (cp[1] - c2);
        let k2 = -m21 * (cp[0] - c1) + m11 * (cp[1] - c2);
        let point = center + rb.column(a1) * k1 + rb.column(a2) * k2;
        let dep = sa[code_n] - normal2.dot(&point);
        if dep >= 0.0 {
            points.push(point);
            depths.push(dep);
            planar.push(*cp);
        }
    }
    if points.is_empty() {
        return None;
    }

    let max_contacts = max_contacts.max(1);
    let feature = if code <= 3 {
        BoxBoxFeature::Face1(code_n)
    } else {
        BoxBoxFeature::Face2(code_n)
    };

    let to_contact = |point: &Vector3<f64>, dep: f64| {
        let pos = Point3::from(point + ta);
        ContactPoint {
            normal,
            // For a box-2 reference face the clip points lie on box 2's
            // surface; shift them along the normal onto box 1's surface so
            // both cases report the same convention.
            point: if code <= 3 { pos } else { pos - normal * dep },
            depth: dep,
        }
    };

    if points.len() <= max_contacts {
        let contacts = points
            .iter()
            .zip(depths.iter())
            .map(|(pt, &dep)| to_contact(pt, dep))
            .collect();
        return Some((feature, contacts));
    }

    // Too many clip points: keep the deepest and spread the rest.
    let mut deepest = 0;
    for (i, &d) in depths.iter().enumerate() {
        if d > depths[deepest] {
            deepest = i;
        }
    }
    let kept = cull_points(&planar, max_contacts, deepest);
    let contacts = kept
        .iter()
        .map(|&i| to_contact(&points[i], depths[i]))
        .collect();
    Some((feature, contacts))
}

/// Box-box intersection reduced to a single contact.
///
/// Averages the manifold points; the depth is the deepest point's.
#[must_use]
pub fn box_box_intersect(
    half1: &Vector3<f64>,
    tf1: &Transform3d,
    half2: &Vector3<f64>,
    tf2: &Transform3d,
) -> Option<ContactPoint> {
    let (_, contacts) = box_box_manifold(half1, tf1, half2, tf2, 8)?;
    let mut sum = Vector3::zeros();
    let mut depth: f64 = 0.0;
    for c in &contacts {
        sum += c.point.coords;
        depth = depth.max(c.depth);
    }
    Some(ContactPoint {
        normal: contacts[0].normal,
        point: Point3::from(sum / contacts.len() as f64),
        depth,
    })
}
