//!
//! Animator settings.
//!

use crate::base::{AnimError, DEFAULT_WEIGHT_THRESHOLD, SKELETON_MAX_BONES};

///
/// Per-animator evaluation settings.
///
/// # Example
///
/// ```
/// use animator_rs::AnimatorSettings;
///
/// let settings = AnimatorSettings {
///     reset_to_rest_pose: false,
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimatorSettings {
    /// Blend contributions (blend tree children, layer bones) with a weight
    /// below it are skipped.
    pub weight_threshold: f32,

    /// Starts every evaluation from the skeleton rest pose. Otherwise layers
    /// are composited onto the previous output.
    pub reset_to_rest_pose: bool,

    /// Upper bound on skeleton size, at most `SKELETON_MAX_BONES`.
    pub max_bones: usize,
}

impl Default for AnimatorSettings {
    fn default() -> AnimatorSettings {
        AnimatorSettings {
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            reset_to_rest_pose: true,
            max_bones: SKELETON_MAX_BONES,
        }
    }
}

impl AnimatorSettings {
    /// Validates the settings.
    pub fn validate(&self) -> Result<(), AnimError> {
        let mut ok = self.weight_threshold.is_finite();
        ok &= (0.0..1.0).contains(&self.weight_threshold);
        ok &= self.max_bones > 0 && self.max_bones <= SKELETON_MAX_BONES;
        if !ok {
            return Err(AnimError::InvalidSettings);
        }
        Ok(())
    }
}
