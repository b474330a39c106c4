//! Translation/rotation/scale transforms
//!
//! [`QsTransform`] composes the way the runtime format expects: scale is
//! applied per component and never feeds into the translation of a child.
//!
//! ```text
//! (a × b).translation = a.translation + a.rotation · b.translation
//! (a × b).rotation    = a.rotation · b.rotation
//! (a × b).scale       = a.scale ⊙ b.scale
//! ```

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Tolerance for treating two keys as the same value
pub const KEY_EPSILON: f32 = 1e-6;

/// Bone transform (TRS) in some reference frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QsTransform {
    pub translation: Vec3,
    /// Quaternion rotation
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for QsTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl QsTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Inverse such that `t * t.inverse()` is the identity
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        Self {
            translation: -(rotation * self.translation),
            rotation,
            scale: self.scale.recip(),
        }
    }

    /// Component-wise comparison within [`KEY_EPSILON`]
    ///
    /// Quaternion signs are compared as stored: `q` and `-q` are different keys.
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.translation.abs_diff_eq(other.translation, KEY_EPSILON)
            && Vec4::from(self.rotation).abs_diff_eq(Vec4::from(other.rotation), KEY_EPSILON)
            && self.scale.abs_diff_eq(other.scale, KEY_EPSILON)
    }

    /// Flat layout used by the tool document: `[tx, ty, tz, rw, rx, ry, rz, sx, sy, sz]`
    pub fn to_array(&self) -> [f32; 10] {
        let t = self.translation;
        let r = self.rotation;
        let s = self.scale;
        [t.x, t.y, t.z, r.w, r.x, r.y, r.z, s.x, s.y, s.z]
    }

    /// Inverse of [`QsTransform::to_array`]
    pub fn from_array(a: [f32; 10]) -> Self {
        Self {
            translation: Vec3::new(a[0], a[1], a[2]),
            rotation: Quat::from_xyzw(a[4], a[5], a[6], a[3]),
            scale: Vec3::new(a[7], a[8], a[9]),
        }
    }
}

impl Mul for QsTransform {
    type Output = QsTransform;

    fn mul(self, rhs: QsTransform) -> QsTransform {
        QsTransform {
            translation: self.translation + self.rotation * rhs.translation,
            rotation: self.rotation * rhs.rotation,
            scale: self.scale * rhs.scale,
        }
    }
}

/// Renormalize every rotation in the buffer
///
/// Degenerate rotations (zero length) are replaced with the identity.
pub fn normalize_rotations(transforms: &mut [QsTransform]) {
    for t in transforms {
        t.rotation = normalize_quat(t.rotation);
    }
}

pub(crate) fn normalize_quat(q: Quat) -> Quat {
    let len = q.length();
    if len > f32::EPSILON {
        q / len
    } else {
        Quat::IDENTITY
    }
}

/// Shortest-path spherical interpolation between two rotations
pub fn slerp(q0: Quat, q1: Quat, t: f32) -> Quat {
    let mut dot = q0.dot(q1);

    // Ensure shortest path
    let mut q1 = q1;
    if dot < 0.0 {
        q1 = -q1;
        dot = -dot;
    }

    // If quaternions are very close, use linear interpolation
    if dot > 0.9995 {
        return normalize_quat(q0 + (q1 - q0) * t);
    }

    let theta_0 = dot.acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = (theta_0 - theta).cos() - dot * sin_theta / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    q0 * s0 + q1 * s1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn sample() -> QsTransform {
        QsTransform::new(
            Vec3::new(1.0, -2.0, 0.5),
            Quat::from_rotation_y(0.7) * Quat::from_rotation_x(-0.3),
            Vec3::new(1.0, 2.0, 0.5),
        )
    }

    #[test]
    fn test_identity_is_neutral() {
        let t = sample();
        assert!((QsTransform::IDENTITY * t).approx_eq(&t));
        assert!((t * QsTransform::IDENTITY).approx_eq(&t));
    }

    #[test]
    fn test_inverse_cancels() {
        let t = sample();
        let a = t * t.inverse();
        let b = t.inverse() * t;
        for p in [a, b] {
            assert!(p.translation.abs_diff_eq(Vec3::ZERO, 1e-5), "{:?}", p);
            assert!(p.rotation.abs_diff_eq(Quat::IDENTITY, 1e-5), "{:?}", p);
            assert!(p.scale.abs_diff_eq(Vec3::ONE, 1e-5), "{:?}", p);
        }
    }

    #[test]
    fn test_scale_does_not_touch_child_translation() {
        let parent = QsTransform::new(Vec3::ZERO, Quat::IDENTITY, Vec3::splat(2.0));
        let child = QsTransform::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let combined = parent * child;
        assert_eq!(combined.translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(combined.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_rotation_moves_child_translation() {
        let parent = QsTransform::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let child = QsTransform::from_translation(Vec3::X);
        let combined = parent * child;
        assert!(combined.translation.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_array_layout() {
        let t = sample();
        let a = t.to_array();
        assert_eq!(a[3], t.rotation.w);
        assert_eq!(a[4], t.rotation.x);
        assert_eq!(QsTransform::from_array(a), t);
    }

    #[test]
    fn test_approx_eq_respects_quaternion_sign() {
        let t = sample();
        let mut flipped = t;
        flipped.rotation = -flipped.rotation;
        assert!(!t.approx_eq(&flipped));

        let mut nudged = t;
        nudged.translation.x += KEY_EPSILON * 0.5;
        assert!(t.approx_eq(&nudged));
    }

    #[test]
    fn test_normalize_rotations() {
        let mut buf = [
            QsTransform::from_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 2.0)),
            QsTransform::from_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)),
        ];
        normalize_rotations(&mut buf);
        assert_eq!(buf[0].rotation, Quat::IDENTITY);
        assert_eq!(buf[1].rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_slerp_takes_short_path() {
        let q0 = Quat::IDENTITY;
        let q1 = -Quat::from_rotation_z(0.2);
        let mid = slerp(q0, q1, 0.5);
        let expected = Quat::from_rotation_z(0.1);
        assert!(mid.dot(expected).abs() > 0.9999, "{:?}", mid);
    }
}
