//!
//! Blend tree, a block blending several motions into one virtual motion.
//!

use glam::Vec3;

use crate::base::AnimError;
use crate::motion::{BoundMotions, MotionId};
use crate::parameter::ParameterTable;
use crate::playback::{TimelineEvent, WrapMode};
use crate::pose::Pose;
use crate::state::{speed_factor, TimeStep};

/// Weighting algorithm of a blend tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendType {
    /// One parameter, interpolates the two thresholds surrounding it.
    #[default]
    Simple1D,
    /// Two parameters, interpolates the two nearest thresholds.
    Simple2D,
    /// Two parameters, gradient band interpolation over every child.
    FreeformCartesian2D,
    /// Three parameters, gradient band interpolation over every child.
    FreeformCartesian3D,
}

impl BlendType {
    /// Number of parameters driving the blend.
    #[inline]
    pub fn dimensions(&self) -> usize {
        match self {
            BlendType::Simple1D => 1,
            BlendType::Simple2D | BlendType::FreeformCartesian2D => 2,
            BlendType::FreeformCartesian3D => 3,
        }
    }
}

/// A motion placed at a threshold of the parameter space.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendChild {
    pub motion: Option<MotionId>,
    /// Position in parameter space, unused components are ignored.
    pub threshold: [f32; 3],
}

///
/// Blends child motions by weights computed from parameter values.
///
/// All children share the tree's normalized time: each one is sampled at the
/// same fraction of its own length. Children without loaded motion get no
/// weight.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendTree {
    pub blend_type: BlendType,
    pub parameters: Vec<String>,
    pub children: Vec<BlendChild>,
    pub speed: f32,
    pub speed_parameter: Option<String>,
    wrap_mode: WrapMode,
    pub events: Vec<TimelineEvent>,
}

impl BlendTree {
    /// Creates an empty tree. Missing parameter names read as zero.
    pub fn new<S: AsRef<str>>(blend_type: BlendType, parameters: &[S]) -> BlendTree {
        BlendTree {
            blend_type,
            parameters: parameters
                .iter()
                .take(blend_type.dimensions())
                .map(|name| name.as_ref().to_string())
                .collect(),
            children: Vec::new(),
            speed: 1.0,
            speed_parameter: None,
            wrap_mode: WrapMode::Loop,
            events: Vec::new(),
        }
    }

    pub fn with_child_1d(mut self, motion: MotionId, threshold: f32) -> BlendTree {
        self.add_child(Some(motion), [threshold, 0.0, 0.0]);
        self
    }

    pub fn with_child_2d(mut self, motion: MotionId, x: f32, y: f32) -> BlendTree {
        self.add_child(Some(motion), [x, y, 0.0]);
        self
    }

    pub fn with_child_3d(mut self, motion: MotionId, x: f32, y: f32, z: f32) -> BlendTree {
        self.add_child(Some(motion), [x, y, z]);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> BlendTree {
        self.speed = speed;
        self
    }

    pub fn with_speed_parameter(mut self, parameter: &str) -> BlendTree {
        self.speed_parameter = Some(parameter.to_string());
        self
    }

    pub fn with_event(mut self, event: TimelineEvent) -> BlendTree {
        self.events.push(event);
        self
    }

    pub fn add_child(&mut self, motion: Option<MotionId>, threshold: [f32; 3]) {
        self.children.push(BlendChild { motion, threshold });
    }

    #[inline]
    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode
    }

    /// Sets the wrap mode, only `Loop` and `Clamp` are supported.
    pub fn set_wrap_mode(&mut self, wrap_mode: WrapMode) -> Result<(), AnimError> {
        if !wrap_mode.is_blend_tree_mode() {
            return Err(AnimError::InvalidWrapMode);
        }
        self.wrap_mode = wrap_mode;
        Ok(())
    }

    /// Current parameter point.
    fn point(&self, params: &ParameterTable) -> Vec3 {
        let mut point = [0.0; 3];
        for (axis, name) in self.parameters.iter().enumerate().take(3) {
            point[axis] = params.numeric(name);
        }
        Vec3::from_array(point)
    }

    fn child_point(&self, idx: usize) -> Vec3 {
        let mut point = self.children[idx].threshold;
        for value in point.iter_mut().skip(self.blend_type.dimensions()) {
            *value = 0.0;
        }
        Vec3::from_array(point)
    }

    ///
    /// Computes the weight of every child into `weights` (one per child).
    ///
    /// Weights of loaded children sum to 1 if at least one child is loaded,
    /// unloaded children get 0.
    ///
    pub(crate) fn compute_weights(&self, params: &ParameterTable, motions: &BoundMotions, weights: &mut Vec<f32>) {
        weights.clear();
        weights.resize(self.children.len(), 0.0);

        let active: Vec<usize> = (0..self.children.len())
            .filter(|idx| {
                self.children[*idx]
                    .motion
                    .map(|id| motions.get(id).is_some())
                    .unwrap_or(false)
            })
            .collect();
        if active.is_empty() {
            return;
        }
        if active.len() == 1 {
            weights[active[0]] = 1.0;
            return;
        }

        let point = self.point(params);
        match self.blend_type {
            BlendType::Simple1D => self.weights_1d(point.x, &active, weights),
            BlendType::Simple2D => self.weights_2d(point, &active, weights),
            BlendType::FreeformCartesian2D | BlendType::FreeformCartesian3D => {
                self.weights_freeform(point, &active, weights)
            }
        }
    }

    fn weights_1d(&self, value: f32, active: &[usize], weights: &mut [f32]) {
        let mut lower: Option<usize> = None;
        let mut upper: Option<usize> = None;
        for &idx in active {
            let threshold = self.children[idx].threshold[0];
            if threshold <= value {
                if lower.map_or(true, |low| threshold > self.children[low].threshold[0]) {
                    lower = Some(idx);
                }
            } else if upper.map_or(true, |up| threshold < self.children[up].threshold[0]) {
                upper = Some(idx);
            }
        }

        match (lower, upper) {
            (Some(low), Some(up)) => {
                let t0 = self.children[low].threshold[0];
                let t1 = self.children[up].threshold[0];
                let ratio = (value - t0) / (t1 - t0);
                weights[low] = 1.0 - ratio;
                weights[up] = ratio;
            }
            (Some(only), None) | (None, Some(only)) => weights[only] = 1.0,
            (None, None) => {}
        }
    }

    fn weights_2d(&self, point: Vec3, active: &[usize], weights: &mut [f32]) {
        let mut nearest: [Option<(usize, f32)>; 2] = [None, None];
        for &idx in active {
            let dist = self.child_point(idx).distance_squared(point);
            match nearest {
                [None, _] => nearest[0] = Some((idx, dist)),
                [Some((_, d0)), _] if dist < d0 => {
                    nearest[1] = nearest[0];
                    nearest[0] = Some((idx, dist));
                }
                [_, None] => nearest[1] = Some((idx, dist)),
                [_, Some((_, d1))] if dist < d1 => nearest[1] = Some((idx, dist)),
                _ => {}
            }
        }

        let (a, b) = match nearest {
            [Some((a, _)), Some((b, _))] => (a, b),
            [Some((a, _)), None] => {
                weights[a] = 1.0;
                return;
            }
            _ => return,
        };
        let pa = self.child_point(a);
        let ab = self.child_point(b) - pa;
        let len2 = ab.length_squared();
        let ratio = if len2 > 0.0 {
            ((point - pa).dot(ab) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        weights[a] = 1.0 - ratio;
        weights[b] = ratio;
    }

    fn weights_freeform(&self, point: Vec3, active: &[usize], weights: &mut [f32]) {
        let mut total = 0.0;
        for &i in active {
            let pi = self.child_point(i);
            let pip = point - pi;
            let mut influence = f32::MAX;
            for &j in active {
                if i == j {
                    continue;
                }
                let pij = self.child_point(j) - pi;
                let len2 = pij.length_squared();
                if len2 <= 0.0 {
                    continue;
                }
                influence = influence.min(1.0 - pip.dot(pij) / len2);
            }
            if influence == f32::MAX {
                influence = 1.0;
            }
            let influence = influence.max(0.0);
            weights[i] = influence;
            total += influence;
        }

        if total > 0.0 {
            for &i in active {
                weights[i] /= total;
            }
        } else {
            // degenerated layout, the nearest child takes everything
            let nearest = active.iter().copied().min_by(|a, b| {
                let da = self.child_point(*a).distance_squared(point);
                let db = self.child_point(*b).distance_squared(point);
                da.total_cmp(&db)
            });
            if let Some(nearest) = nearest {
                weights[nearest] = 1.0;
            }
        }
    }

    /// Normalized advance for `dt` seconds, using `weights` from `compute_weights()`.
    ///
    /// The reciprocal lengths of contributing children are accumulated pairwise
    /// by relative weight, the same way poses are accumulated in `sample()`.
    pub(crate) fn time_step(
        &self,
        dt: f32,
        weights: &[f32],
        threshold: f32,
        motions: &BoundMotions,
        params: &ParameterTable,
    ) -> TimeStep {
        let mut accumulated = 0.0;
        let mut inv_length = 0.0;
        for (child, weight) in self.children.iter().zip(weights.iter()) {
            if *weight < threshold || *weight <= 0.0 {
                continue;
            }
            let len = match child.motion.and_then(|id| motions.length(id)) {
                Some(len) if len > 0.0 => len,
                _ => continue,
            };
            accumulated += weight;
            inv_length += (1.0 / len - inv_length) * (weight / accumulated);
        }

        let raw = if accumulated > 0.0 { dt * inv_length } else { dt };
        TimeStep {
            weighted: raw * speed_factor(self.speed, self.speed_parameter.as_deref(), params),
            raw,
        }
    }

    /// Samples every contributing child at `normalized` time and blends them
    /// into `out`. Returns false if no child contributed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn sample(
        &self,
        normalized: f32,
        weights: &[f32],
        threshold: f32,
        motions: &BoundMotions,
        additive: bool,
        scratch: &mut Pose,
        out: &mut Pose,
    ) -> bool {
        out.clear();
        if scratch.len() != out.len() {
            scratch.reset(out.len());
        }

        let mut accumulated = 0.0;
        for (child, weight) in self.children.iter().zip(weights.iter()) {
            if *weight < threshold || *weight <= 0.0 {
                continue;
            }
            let (motion, remap) = match child.motion.and_then(|id| motions.get(id)) {
                Some(bound) => bound,
                None => continue,
            };
            scratch.clear();
            let time = self.wrap_mode.clip_time(normalized, motion.length());
            scratch.sample_motion(motion, remap, time, additive);
            accumulated += weight;
            out.blend_with(scratch, weight / accumulated);
        }
        accumulated > 0.0
    }
}
