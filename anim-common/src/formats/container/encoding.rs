//! Key encoding for compressed animations

use bitcode::{Decode, Encode};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::QsTransform;

// ============================================================================
// Quaternion Encoding: Smallest-Three
// ============================================================================

/// Bits per stored quaternion component
const COMPONENT_BITS: u32 = 20;
const COMPONENT_MAX: u64 = (1 << COMPONENT_BITS) - 1;
/// Half the quantized range: `(2^20 - 1) / 2`
const COMPONENT_SCALE: f32 = 524_287.5;

/// Encode a quaternion using smallest-three encoding (64 bits)
///
/// Drops the largest component and reconstructs it from the other three.
///
/// Bit layout: `[unused:2][a:20][b:20][c:20][idx:2]`
/// - idx identifies which component was dropped (largest)
/// - a, b, c are the three smallest components quantized to 20 bits
///
/// Quantization: `round((v * √2 + 1) * 524287.5)` for the [0, 2^20 - 1] range
pub fn encode_quat_smallest_three(q: Quat) -> u64 {
    let q = q.to_array();
    let [x, y, z, w] = q;

    // 1. Find index of largest absolute component
    let abs_q = [x.abs(), y.abs(), z.abs(), w.abs()];
    let idx = if abs_q[0] > abs_q[1] && abs_q[0] > abs_q[2] && abs_q[0] > abs_q[3] {
        0
    } else if abs_q[1] > abs_q[2] && abs_q[1] > abs_q[3] {
        1
    } else if abs_q[2] > abs_q[3] {
        2
    } else {
        3
    };

    // 2. Ensure largest component is positive (q == -q for rotations)
    let sign = if q[idx] < 0.0 { -1.0 } else { 1.0 };
    let q = q.map(|c| c * sign);

    // 3. Select the 3 smallest components (skip idx)
    let (a, b, c) = match idx {
        0 => (q[1], q[2], q[3]),
        1 => (q[0], q[2], q[3]),
        2 => (q[0], q[1], q[3]),
        _ => (q[0], q[1], q[2]),
    };

    // 4. Quantize: [-1/√2, 1/√2] → [0, 2^20 - 1]
    let sqrt2 = std::f32::consts::SQRT_2;
    let quantize = |v: f32| {
        let q = ((v * sqrt2 + 1.0) * COMPONENT_SCALE).round().max(0.0) as u64;
        q.min(COMPONENT_MAX)
    };

    // 5. Pack
    (quantize(a) << (2 + 2 * COMPONENT_BITS))
        | (quantize(b) << (2 + COMPONENT_BITS))
        | (quantize(c) << 2)
        | idx as u64
}

/// Decode a smallest-three encoded quaternion (64 bits)
pub fn decode_quat_smallest_three(packed: u64) -> Quat {
    let idx = (packed & 0x3) as usize;
    let qc = ((packed >> 2) & COMPONENT_MAX) as f32;
    let qb = ((packed >> (2 + COMPONENT_BITS)) & COMPONENT_MAX) as f32;
    let qa = ((packed >> (2 + 2 * COMPONENT_BITS)) & COMPONENT_MAX) as f32;

    // Dequantize: [0, 2^20 - 1] → [-1/√2, 1/√2]
    let sqrt2_inv = 1.0 / std::f32::consts::SQRT_2;
    let a = (qa / COMPONENT_SCALE - 1.0) * sqrt2_inv;
    let b = (qb / COMPONENT_SCALE - 1.0) * sqrt2_inv;
    let c = (qc / COMPONENT_SCALE - 1.0) * sqrt2_inv;

    // Reconstruct largest component: sqrt(1 - a² - b² - c²)
    let largest = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();

    let [x, y, z, w] = match idx {
        0 => [largest, a, b, c],
        1 => [a, largest, b, c],
        2 => [a, b, largest, c],
        _ => [a, b, c, largest],
    };
    Quat::from_xyzw(x, y, z, w)
}

// ============================================================================
// Full Encode/Decode Pipeline
// ============================================================================

/// One stored transform key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct PackedTransform {
    /// Smallest-three packed rotation
    pub rotation: u64,
    pub translation: [f32; 3],
    pub scale: [f32; 3],
}

pub fn encode_transform(t: &QsTransform) -> PackedTransform {
    PackedTransform {
        rotation: encode_quat_smallest_three(t.rotation),
        translation: t.translation.to_array(),
        scale: t.scale.to_array(),
    }
}

pub fn decode_transform(p: &PackedTransform) -> QsTransform {
    QsTransform {
        translation: Vec3::from_array(p.translation),
        rotation: decode_quat_smallest_three(p.rotation),
        scale: Vec3::from_array(p.scale),
    }
}
