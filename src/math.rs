//!
//! Pose math: per-bone transforms and the blend operators used by layers,
//! blend trees and crossfades.
//!

use glam::{Quat, Vec3};

/// One bone's local pose at one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyData {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for KeyData {
    #[inline]
    fn default() -> KeyData {
        KeyData::IDENTITY
    }
}

impl KeyData {
    /// Translation zero, rotation identity, scale one.
    pub const IDENTITY: KeyData = KeyData {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> KeyData {
        KeyData {
            translation,
            rotation,
            scale,
        }
    }

    /// Linear interpolation of translation and scale, spherical interpolation
    /// of rotation.
    #[inline]
    pub fn lerp(from: &KeyData, to: &KeyData, alpha: f32) -> KeyData {
        KeyData {
            translation: from.translation.lerp(to.translation, alpha),
            rotation: quat_slerp(from.rotation, to.rotation, alpha),
            scale: from.scale.lerp(to.scale, alpha),
        }
    }

    /// Moves `self` toward `target` by `weight`. Used by override layers.
    #[inline]
    pub fn blend_toward(&mut self, target: &KeyData, weight: f32) {
        *self = KeyData::lerp(self, target, weight);
    }

    /// Converts an absolute pose into a delta relative to `reference`.
    ///
    /// Translation is the difference, rotation is the quaternion quotient
    /// `reference⁻¹ · self`, scale is the component-wise ratio (zero reference
    /// components give a neutral ratio of 1).
    #[inline]
    pub fn to_delta(&self, reference: &KeyData) -> KeyData {
        KeyData {
            translation: self.translation - reference.translation,
            rotation: quat_div(self.rotation, reference.rotation),
            scale: Vec3::new(
                safe_ratio(self.scale.x, reference.scale.x),
                safe_ratio(self.scale.y, reference.scale.y),
                safe_ratio(self.scale.z, reference.scale.z),
            ),
        }
    }

    /// Accumulates a delta pose scaled by `weight`.
    #[inline]
    pub fn add_delta(&mut self, delta: &KeyData, weight: f32) {
        self.translation += delta.translation * weight;
        self.rotation = (self.rotation * quat_from_identity(delta.rotation, weight)).normalize();
        let one_minus_weight = Vec3::splat(1.0 - weight);
        self.scale *= one_minus_weight + delta.scale * weight;
    }

    #[inline]
    pub fn abs_diff_eq(&self, other: &KeyData, diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, diff)
            && quat_abs_diff_eq(self.rotation, other.rotation, diff)
            && self.scale.abs_diff_eq(other.scale, diff)
    }
}

#[inline]
fn safe_ratio(value: f32, reference: f32) -> f32 {
    if reference == 0.0 {
        1.0
    } else {
        value / reference
    }
}

/// Shortest path spherical interpolation.
#[inline]
pub fn quat_slerp(from: Quat, to: Quat, alpha: f32) -> Quat {
    let to = if from.dot(to) < 0.0 { -to } else { to };
    from.slerp(to, alpha)
}

/// Quaternion "division": the rotation that brings `divisor` onto `dividend`.
#[inline]
pub fn quat_div(dividend: Quat, divisor: Quat) -> Quat {
    (divisor.conjugate() * dividend).normalize()
}

/// Spherical interpolation from identity toward `rotation` by `weight`.
#[inline]
pub fn quat_from_identity(rotation: Quat, weight: f32) -> Quat {
    quat_slerp(Quat::IDENTITY, rotation, weight)
}

/// Compares two rotations, `q` and `-q` are considered equal.
#[inline]
pub fn quat_abs_diff_eq(a: Quat, b: Quat, diff: f32) -> bool {
    a.abs_diff_eq(b, diff) || a.abs_diff_eq(-b, diff)
}
