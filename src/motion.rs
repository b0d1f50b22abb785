//!
//! Motion (clip) data structure definition.
//!

use bimap::BiMap;
use std::sync::Arc;

use crate::base::{AnimError, SKELETON_MAX_BONES};
use crate::math::KeyData;
use crate::skeleton::BoneRemap;

/// Index of a motion slot in an `AnimatorController`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionId(pub u32);

impl MotionId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One sampled pose for an entire skeleton, in motion-local bone ordering.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyFrame {
    pub time: f32,
    pub keys: Vec<KeyData>,
}

/// Read-only motion clip.
///
/// Key frames are stored in increasing time order, every key frame holds one
/// `KeyData` per motion bone. The motion has its own bone ordering, described
/// by a name table; `BoneRemap` maps it onto a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    name: String,
    sample_rate: f32,
    length: f32,
    key_frames: Vec<KeyFrame>,
    bone_names: BiMap<String, u16>,
}

/// Two key frames surrounding a time, and the interpolation ratio between them.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameSpan {
    pub from: usize,
    pub to: usize,
    pub alpha: f32,
}

impl Motion {
    /// Creates a `Motion` from explicit key frames.
    ///
    /// Key frame times must be strictly increasing, every key frame must hold
    /// one key per bone name. Motion length is the time of the last key frame.
    pub fn from_raw<S: AsRef<str>>(
        name: &str,
        sample_rate: f32,
        bone_names: &[S],
        key_frames: Vec<KeyFrame>,
    ) -> Result<Motion, AnimError> {
        if key_frames.is_empty() {
            return Err(AnimError::InvalidMotionData("no key frame".into()));
        }
        if bone_names.len() > SKELETON_MAX_BONES {
            return Err(AnimError::InvalidMotionData("too many bones".into()));
        }
        if !(sample_rate > 0.0) {
            return Err(AnimError::InvalidMotionData("sample rate".into()));
        }

        let mut names = BiMap::with_capacity(bone_names.len());
        for (idx, bone) in bone_names.iter().enumerate() {
            if names.insert_no_overwrite(bone.as_ref().to_string(), idx as u16).is_err() {
                return Err(AnimError::InvalidMotionData(format!("duplicated bone {}", bone.as_ref())));
            }
        }

        let mut prev_time = f32::NEG_INFINITY;
        for frame in &key_frames {
            if frame.keys.len() != bone_names.len() {
                return Err(AnimError::InvalidMotionData(format!("key count at {}", frame.time)));
            }
            if !(frame.time > prev_time) {
                return Err(AnimError::InvalidMotionData(format!("time order at {}", frame.time)));
            }
            prev_time = frame.time;
        }

        let length = key_frames.last().map(|frame| frame.time).unwrap_or_default();
        Ok(Motion {
            name: name.to_string(),
            sample_rate,
            length,
            key_frames,
            bone_names: names,
        })
    }

    /// Creates a `Motion` from evenly spaced samples, the i-th sample lands at
    /// `i / sample_rate` seconds.
    pub fn from_samples<S: AsRef<str>>(
        name: &str,
        sample_rate: f32,
        bone_names: &[S],
        samples: Vec<Vec<KeyData>>,
    ) -> Result<Motion, AnimError> {
        let key_frames = samples
            .into_iter()
            .enumerate()
            .map(|(idx, keys)| KeyFrame {
                time: idx as f32 / sample_rate,
                keys,
            })
            .collect();
        Motion::from_raw(name, sample_rate, bone_names, key_frames)
    }
}

impl Motion {
    /// Motion name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Samples per second the motion was baked with.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Duration in seconds.
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.key_frames
    }

    #[inline]
    pub fn num_bones(&self) -> usize {
        self.bone_names.len()
    }

    #[inline]
    pub fn bone_name(&self, idx: u16) -> Option<&str> {
        self.bone_names.get_by_right(&idx).map(|name| name.as_str())
    }

    #[inline]
    pub fn bone_by_name(&self, name: &str) -> Option<u16> {
        self.bone_names.get_by_left(name).copied()
    }

    /// Finds the key frames surrounding `time` (seconds, clamped to the motion).
    pub fn locate(&self, time: f32) -> FrameSpan {
        let last = self.key_frames.len() - 1;
        if time.is_nan() || time <= self.key_frames[0].time {
            return FrameSpan { from: 0, to: 0, alpha: 0.0 };
        }
        if time >= self.key_frames[last].time {
            return FrameSpan {
                from: last,
                to: last,
                alpha: 0.0,
            };
        }

        // first frame strictly after time, exists since time < last frame time
        let to = self.key_frames.partition_point(|frame| frame.time <= time);
        let from = to - 1;
        let t0 = self.key_frames[from].time;
        let t1 = self.key_frames[to].time;
        FrameSpan {
            from,
            to,
            alpha: (time - t0) / (t1 - t0),
        }
    }

    /// Interpolates bone `bone` (motion-local index) inside `span`.
    #[inline]
    pub fn sample_bone(&self, span: &FrameSpan, bone: usize) -> KeyData {
        let k0 = &self.key_frames[span.from].keys[bone];
        if span.from == span.to {
            return *k0;
        }
        let k1 = &self.key_frames[span.to].keys[bone];
        KeyData::lerp(k0, k1, span.alpha)
    }

    /// First key frame value of bone `bone`, the reference of additive deltas.
    #[inline]
    pub fn reference_bone(&self, bone: usize) -> KeyData {
        self.key_frames[0].keys[bone]
    }
}

/// A named motion slot of an `AnimatorController`.
///
/// The slot exists as soon as the motion is registered, data arrives later
/// from an external loader. Blocks referencing an unloaded slot produce no pose.
#[derive(Debug, Default, Clone)]
pub struct MotionSlot {
    pub name: String,
    pub data: Option<Arc<Motion>>,
}

impl MotionSlot {
    pub fn new(name: &str) -> MotionSlot {
        MotionSlot {
            name: name.to_string(),
            data: None,
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }
}

/// Loaded motions together with their bone remaps for one skeleton.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundMotions<'t> {
    slots: &'t [MotionSlot],
    remaps: &'t [Option<BoneRemap>],
}

impl<'t> BoundMotions<'t> {
    pub(crate) fn new(slots: &'t [MotionSlot], remaps: &'t [Option<BoneRemap>]) -> BoundMotions<'t> {
        BoundMotions { slots, remaps }
    }

    /// Returns the motion and its remap, if `id` is loaded.
    #[inline]
    pub(crate) fn get(&self, id: MotionId) -> Option<(&'t Motion, &'t BoneRemap)> {
        let motion = self.slots.get(id.index())?.data.as_deref()?;
        let remap = self.remaps.get(id.index())?.as_ref()?;
        Some((motion, remap))
    }

    /// Length in seconds of a loaded motion.
    #[inline]
    pub(crate) fn length(&self, id: MotionId) -> Option<f32> {
        self.get(id).map(|(motion, _)| motion.length())
    }
}
