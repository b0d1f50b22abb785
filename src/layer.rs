//!
//! Layers: a root state machine composited onto the output through a bone
//! mask.
//!

use crate::base::{AnimError, SKELETON_MAX_BONES};
use crate::block::BlockId;
use crate::math::KeyData;
use crate::parameter::ParameterTable;
use crate::pose::Pose;
use crate::skeleton::Skeleton;

/// How a non-root layer is applied onto the layers below it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerBlendMode {
    /// Interpolates toward the layer pose.
    #[default]
    Override,
    /// Adds the layer pose, sampled as a delta from each motion's first frame.
    Additive,
}

///
/// Per-bone weight and enable flag, indexed by skeleton bone.
///
/// A fresh mask enables every bone with weight 1.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvatarMask {
    weights: Vec<f32>,
    enabled: Vec<bool>,
}

impl Default for AvatarMask {
    fn default() -> AvatarMask {
        AvatarMask::full()
    }
}

impl AvatarMask {
    /// Every bone enabled with weight 1.
    pub fn full() -> AvatarMask {
        AvatarMask {
            weights: vec![1.0; SKELETON_MAX_BONES],
            enabled: vec![true; SKELETON_MAX_BONES],
        }
    }

    /// Every bone disabled.
    pub fn empty() -> AvatarMask {
        AvatarMask {
            weights: vec![1.0; SKELETON_MAX_BONES],
            enabled: vec![false; SKELETON_MAX_BONES],
        }
    }

    #[inline]
    pub fn weight(&self, bone: usize) -> f32 {
        self.weights.get(bone).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn is_enabled(&self, bone: usize) -> bool {
        self.enabled.get(bone).copied().unwrap_or(false)
    }

    /// Sets one bone, `weight` is clamped to `[0, 1]`.
    pub fn set(&mut self, bone: usize, enabled: bool, weight: f32) -> Result<(), AnimError> {
        if bone >= SKELETON_MAX_BONES {
            return Err(AnimError::InvalidSkeleton(format!("bone {}", bone)));
        }
        self.enabled[bone] = enabled;
        self.weights[bone] = weight.clamp(0.0, 1.0);
        Ok(())
    }

    /// Sets one bone by name.
    pub fn set_by_name(&mut self, skeleton: &Skeleton, name: &str, enabled: bool, weight: f32) -> Result<(), AnimError> {
        let bone = skeleton
            .bone_by_name(name)
            .ok_or_else(|| AnimError::InvalidSkeleton(format!("bone {}", name)))?;
        self.set(bone as usize, enabled, weight)
    }

    /// Number of enabled bones.
    pub fn count_enabled(&self) -> usize {
        self.enabled.iter().filter(|enabled| **enabled).count()
    }
}

///
/// A layer of an `AnimatorController`.
///
/// Layer 0 is the root layer: it overwrites every bone its state machine
/// produced, ignoring mask, weight and blend mode. Other layers blend onto
/// the result of the layers below them.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub(crate) name: String,
    pub(crate) mask: AvatarMask,
    pub(crate) blend_mode: LayerBlendMode,
    pub(crate) weight: f32,
    pub(crate) weight_parameter: Option<String>,
    pub(crate) root_state_machine: BlockId,
}

impl Layer {
    pub(crate) fn new(name: &str, root_state_machine: BlockId) -> Layer {
        Layer {
            name: name.to_string(),
            mask: AvatarMask::full(),
            blend_mode: LayerBlendMode::Override,
            weight: 1.0,
            weight_parameter: None,
            root_state_machine,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn mask(&self) -> &AvatarMask {
        &self.mask
    }

    #[inline]
    pub fn mask_mut(&mut self) -> &mut AvatarMask {
        &mut self.mask
    }

    #[inline]
    pub fn blend_mode(&self) -> LayerBlendMode {
        self.blend_mode
    }

    #[inline]
    pub fn set_blend_mode(&mut self, blend_mode: LayerBlendMode) {
        self.blend_mode = blend_mode;
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the constant weight, clamped to `[0, 1]`.
    #[inline]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn weight_parameter(&self) -> Option<&str> {
        self.weight_parameter.as_deref()
    }

    /// Multiplies the layer weight by a numeric parameter.
    #[inline]
    pub fn set_weight_parameter(&mut self, parameter: Option<&str>) {
        self.weight_parameter = parameter.map(|name| name.to_string());
    }

    #[inline]
    pub fn root_state_machine(&self) -> BlockId {
        self.root_state_machine
    }

    /// Layer weight for the current parameter values, in `[0, 1]`.
    pub fn effective_weight(&self, params: &ParameterTable) -> f32 {
        let factor = match &self.weight_parameter {
            Some(name) => params.numeric(name),
            None => 1.0,
        };
        (self.weight * factor).clamp(0.0, 1.0)
    }

    ///
    /// Composites `pose` onto `output`.
    ///
    /// * `root` - Whether this is the root layer.
    /// * `weight` - Layer weight from `effective_weight()`.
    /// * `threshold` - Bones whose effective weight falls below it are skipped.
    /// * `enabled_bones` - Bones the caller allows writing, empty for all.
    ///
    pub(crate) fn compose(
        &self,
        root: bool,
        pose: &Pose,
        weight: f32,
        threshold: f32,
        enabled_bones: &[bool],
        output: &mut [KeyData],
    ) {
        let count = output.len().min(pose.len());
        for (bone, out) in output.iter_mut().enumerate().take(count) {
            if !enabled_bones.is_empty() && !enabled_bones.get(bone).copied().unwrap_or(false) {
                continue;
            }
            let key = match pose.get(bone) {
                Some(key) => key,
                None => continue,
            };

            if root {
                *out = *key;
                continue;
            }

            if !self.mask.is_enabled(bone) {
                continue;
            }
            let bone_weight = weight * self.mask.weight(bone);
            if bone_weight < threshold || bone_weight <= 0.0 {
                continue;
            }
            match self.blend_mode {
                LayerBlendMode::Override => out.blend_toward(key, bone_weight),
                LayerBlendMode::Additive => out.add_delta(key, bone_weight),
            }
        }
    }
}
