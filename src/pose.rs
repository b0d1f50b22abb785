//!
//! Skeleton ordered pose buffers.
//!

use crate::math::KeyData;
use crate::motion::Motion;
use crate::skeleton::BoneRemap;

///
/// A pose in skeleton bone ordering.
///
/// Every bone carries a validity flag: a bone is valid once some source wrote
/// it. Blending a valid bone with an invalid one keeps the valid value, so a
/// source without data is omitted from the blend instead of being zero-filled.
///
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Pose {
    keys: Vec<KeyData>,
    valid: Vec<bool>,
}

impl Pose {
    pub fn new(num_bones: usize) -> Pose {
        Pose {
            keys: vec![KeyData::IDENTITY; num_bones],
            valid: vec![false; num_bones],
        }
    }

    /// Resizes and invalidates every bone.
    pub fn reset(&mut self, num_bones: usize) {
        self.keys.clear();
        self.keys.resize(num_bones, KeyData::IDENTITY);
        self.valid.clear();
        self.valid.resize(num_bones, false);
    }

    /// Invalidates every bone, keeping the size.
    #[inline]
    pub fn clear(&mut self) {
        self.valid.iter_mut().for_each(|v| *v = false);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if at least one bone is valid.
    #[inline]
    pub fn has_any(&self) -> bool {
        self.valid.iter().any(|v| *v)
    }

    #[inline]
    pub fn keys(&self) -> &[KeyData] {
        &self.keys
    }

    #[inline]
    pub fn is_valid(&self, bone: usize) -> bool {
        self.valid.get(bone).copied().unwrap_or(false)
    }

    #[inline]
    pub fn get(&self, bone: usize) -> Option<&KeyData> {
        if self.is_valid(bone) {
            Some(&self.keys[bone])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, bone: usize, key: KeyData) {
        if bone < self.keys.len() {
            self.keys[bone] = key;
            self.valid[bone] = true;
        }
    }

    pub fn copy_from(&mut self, other: &Pose) {
        self.keys.clone_from(&other.keys);
        self.valid.clone_from(&other.valid);
    }

    /// Samples `motion` at `time` seconds into the bones reached by `remap`.
    ///
    /// With `additive` the result is a delta relative to the first key frame.
    pub fn sample_motion(&mut self, motion: &Motion, remap: &BoneRemap, time: f32, additive: bool) {
        let span = motion.locate(time);
        for (motion_bone, bone) in remap.iter() {
            if bone >= self.keys.len() {
                continue;
            }
            let mut key = motion.sample_bone(&span, motion_bone);
            if additive {
                key = key.to_delta(&motion.reference_bone(motion_bone));
            }
            self.keys[bone] = key;
            self.valid[bone] = true;
        }
    }

    /// Moves this pose toward `other` by `alpha`.
    ///
    /// Bones valid only in `other` are copied, bones valid only in `self` are kept.
    pub fn blend_with(&mut self, other: &Pose, alpha: f32) {
        let count = self.keys.len().min(other.keys.len());
        for bone in 0..count {
            match (self.valid[bone], other.valid[bone]) {
                (true, true) => self.keys[bone].blend_toward(&other.keys[bone], alpha),
                (false, true) => {
                    self.keys[bone] = other.keys[bone];
                    self.valid[bone] = true;
                }
                _ => {}
            }
        }
    }

    /// Writes `lerp(from, to, alpha)` into this pose, with the same validity
    /// rules as `blend_with`.
    pub fn blend(&mut self, from: &Pose, to: &Pose, alpha: f32) {
        self.copy_from(from);
        self.blend_with(to, alpha);
    }
}
