//! Morton (Z-order) codes for spatially sorting primitives.
//!
//! Quantizes 3D positions against a reference AABB and interleaves the
//! coordinate bits so that sorting by code groups spatially nearby
//! primitives. Three precisions are provided: 30-bit codes in a `u32`,
//! 60-bit codes in a `u64`, and arbitrary multiple-of-3 widths up to 126
//! bits in a `u128` for very deep quantization grids.

use nalgebra::{Point3, Vector3};

use crate::bv::Aabb;

/// Quantize a normalized coordinate `x` in `[0, 1]` to an integer cell in
/// `[0, n - 1]`. Out-of-range inputs clamp.
#[must_use]
pub fn quantize(x: f64, n: u32) -> u32 {
    let v = (x * f64::from(n)) as i64;
    v.clamp(0, i64::from(n) - 1) as u32
}

/// Spread the low 10 bits of `x` so each lands three positions apart.
fn spread10(x: u32) -> u32 {
    let mut x = x & 0x0000_03ff;
    x = (x | (x << 16)) & 0x0300_00ff;
    x = (x | (x << 8)) & 0x0300_f00f;
    x = (x | (x << 4)) & 0x030c_30c3;
    x = (x | (x << 2)) & 0x0924_9249;
    x
}

/// Interleave three 10-bit cell indices into a 30-bit Morton code.
#[must_use]
pub fn morton_code(x: u32, y: u32, z: u32) -> u32 {
    (spread10(x) << 2) | (spread10(y) << 1) | spread10(z)
}

/// Interleave three 20-bit cell indices into a 60-bit Morton code.
#[must_use]
pub fn morton_code60(x: u32, y: u32, z: u32) -> u64 {
    let hi = morton_code(x >> 10, y >> 10, z >> 10);
    let lo = morton_code(x & 0x3ff, y & 0x3ff, z & 0x3ff);
    (u64::from(hi) << 30) | u64::from(lo)
}

/// Encoder producing 30-bit Morton codes (10 bits per axis) relative to a
/// reference bounding box.
#[derive(Debug, Clone, Copy)]
pub struct MortonEncoder32 {
    base: Point3<f64>,
    inv: Vector3<f64>,
}

impl MortonEncoder32 {
    /// Build an encoder covering the given reference box.
    #[must_use]
    pub fn new(bounds: &Aabb) -> Self {
        let extent = bounds.extent();
        Self {
            base: bounds.min,
            inv: Vector3::new(
                safe_inv(extent.x),
                safe_inv(extent.y),
                safe_inv(extent.z),
            ),
        }
    }

    /// Encode a point; points outside the reference box clamp to the
    /// boundary cells.
    #[must_use]
    pub fn encode(&self, point: &Point3<f64>) -> u32 {
        let d = point - self.base;
        morton_code(
            quantize(d.x * self.inv.x, 1024),
            quantize(d.y * self.inv.y, 1024),
            quantize(d.z * self.inv.z, 1024),
        )
    }
}

/// Encoder producing 60-bit Morton codes (20 bits per axis) relative to a
/// reference bounding box.
#[derive(Debug, Clone, Copy)]
pub struct MortonEncoder64 {
    base: Point3<f64>,
    inv: Vector3<f64>,
}

impl MortonEncoder64 {
    /// Build an encoder covering the given reference box.
    #[must_use]
    pub fn new(bounds: &Aabb) -> Self {
        let extent = bounds.extent();
        Self {
            base: bounds.min,
            inv: Vector3::new(
                safe_inv(extent.x),
                safe_inv(extent.y),
                safe_inv(extent.z),
            ),
        }
    }

    /// Encode a point; points outside the reference box clamp to the
    /// boundary cells.
    #[must_use]
    pub fn encode(&self, point: &Point3<f64>) -> u64 {
        let d = point - self.base;
        morton_code60(
            quantize(d.x * self.inv.x, 1 << 20),
            quantize(d.y * self.inv.y, 1 << 20),
            quantize(d.z * self.inv.z, 1 << 20),
        )
    }
}

/// Encoder producing Morton codes of a caller-chosen width, up to 126 bits
/// (42 bits per axis), in a `u128`.
#[derive(Debug, Clone, Copy)]
pub struct MortonEncoderWide {
    base: Point3<f64>,
    inv: Vector3<f64>,
    bits: u32,
}

impl MortonEncoderWide {
    /// Build an encoder covering the given reference box.
    ///
    /// `bits` is the total code width; it must be a positive multiple of 3
    /// no larger than 126.
    #[must_use]
    pub fn new(bounds: &Aabb, bits: u32) -> Self {
        debug_assert!(bits > 0 && bits % 3 == 0 && bits <= 126);
        let extent = bounds.extent();
        Self {
            base: bounds.min,
            inv: Vector3::new(
                safe_inv(extent.x),
                safe_inv(extent.y),
                safe_inv(extent.z),
            ),
            bits,
        }
    }

    /// Total code width in bits.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Encode a point by repeated binary subdivision of the normalized
    /// coordinates, most significant interleaved bit first.
    #[must_use]
    pub fn encode(&self, point: &Point3<f64>) -> u128 {
        let d = point - self.base;
        let mut x = (d.x * self.inv.x).clamp(0.0, 1.0);
        let mut y = (d.y * self.inv.y).clamp(0.0, 1.0);
        let mut z = (d.z * self.inv.z).clamp(0.0, 1.0);

        let mut code: u128 = 0;
        for _ in 0..self.bits / 3 {
            code <<= 3;
            x *= 2.0;
            y *= 2.0;
            z *= 2.0;
            if x >= 1.0 {
                code |= 4;
                x -= 1.0;
            }
            if y >= 1.0 {
                code |= 2;
                y -= 1.0;
            }
            if z >= 1.0 {
                code |= 1;
                z -= 1.0;
            }
        }
        code
    }
}

/// Permutation of `points` indices in ascending 60-bit Morton order over the
/// tight bounds of the set. Useful for pre-sorting primitives before a tree
/// build to improve cache locality.
#[must_use]
pub fn morton_order(points: &[Point3<f64>]) -> Vec<usize> {
    let mut bounds = Aabb::empty();
    for p in points {
        bounds.expand_point(p);
    }
    let encoder = MortonEncoder64::new(&bounds);
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| encoder.encode(&points[i]));
    order
}

fn safe_inv(x: f64) -> f64 {
    if x > 0.0 {
        1.0 / x
    } else {
        0.0
    }
}
